//! secp256k1 key pairs with BIP-32 metadata.

use hmac::{Hmac, Mac};
use k256::ecdsa::SigningKey;
use sha2::Sha512;
use walle::hash::hash160;
use walle::{Error, Result, Secret32};
use zeroize::{Zeroize, Zeroizing};

use crate::derive::{self, PublicNode, HARDENED_OFFSET};

type HmacSha512 = Hmac<Sha512>;

/// Compute both SEC1 encodings of the public key for `private_key`.
///
/// Fails with [`Error::InvalidPrivateKey`] when the key is zero or not below
/// the curve order.
pub fn pub_from_priv(private_key: &[u8; 32]) -> Result<([u8; 65], [u8; 33])> {
    let signing_key = SigningKey::from_slice(private_key).map_err(|_| Error::InvalidPrivateKey)?;
    let verifying_key = signing_key.verifying_key();

    let mut uncompressed = [0u8; 65];
    uncompressed.copy_from_slice(verifying_key.to_encoded_point(false).as_bytes());
    let mut compressed = [0u8; 33];
    compressed.copy_from_slice(verifying_key.to_encoded_point(true).as_bytes());
    Ok((uncompressed, compressed))
}

/// A private/public key pair with its chain code and position in the tree.
#[derive(Clone)]
pub struct KeyPair {
    private_key: Secret32,
    public_key_uncompressed: [u8; 65],
    public_key_compressed: [u8; 33],
    chain_code: Secret32,
    /// Index that produced this key, including the hardened bit.
    derivation_index: u32,
    depth: u8,
    parent_fingerprint: [u8; 4],
}

impl Zeroize for KeyPair {
    fn zeroize(&mut self) {
        self.private_key.zeroize();
        self.chain_code.zeroize();
        self.public_key_uncompressed.zeroize();
        self.public_key_compressed.zeroize();
        self.derivation_index = 0;
        self.depth = 0;
        self.parent_fingerprint.zeroize();
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl KeyPair {
    /// Create the BIP-32 master key from a seed.
    ///
    /// `HMAC-SHA512(key = "Bitcoin seed", seed)`: the left half is the private
    /// key, the right half the chain code.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(Error::InvalidLength {
                expected: 64,
                actual: seed.len(),
            });
        }

        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed").map_err(|_| Error::KeyDerivation)?;
        mac.update(seed);
        let mut result = Zeroizing::new([0u8; 64]);
        result.copy_from_slice(&mac.finalize().into_bytes());

        let private_key = Secret32::from_slice(&result[..32])?;
        let chain_code = Secret32::from_slice(&result[32..])?;

        let pair = Self::from_parts(private_key, chain_code, 0, 0, [0u8; 4])?;
        tracing::debug!("derived master key");
        Ok(pair)
    }

    /// Assemble a key pair, computing the public key from the private key.
    pub fn from_parts(
        private_key: Secret32,
        chain_code: Secret32,
        derivation_index: u32,
        depth: u8,
        parent_fingerprint: [u8; 4],
    ) -> Result<Self> {
        let (public_key_uncompressed, public_key_compressed) =
            pub_from_priv(private_key.as_bytes())?;
        Ok(Self {
            private_key,
            public_key_uncompressed,
            public_key_compressed,
            chain_code,
            derivation_index,
            depth,
            parent_fingerprint,
        })
    }

    /// Derive a direct child. See [`derive::derive_child`].
    pub fn derive_child(&self, index: u32, hardened: bool) -> Result<Self> {
        derive::derive_child(self, index, hardened)
    }

    /// Derive along a path such as `m/84'/0'/0'/0/0`.
    pub fn derive_path(&self, path: &str) -> Result<Self> {
        let path: derive::DerivationPath = path.parse()?;
        let mut current = self.clone();
        for child in path.iter() {
            current = current.derive_child(child.index(), child.is_hardened())?;
        }
        Ok(current)
    }

    /// Drop the private half.
    pub fn public_node(&self) -> PublicNode {
        PublicNode::new(
            self.public_key_compressed,
            *self.chain_code.as_bytes(),
            self.derivation_index,
            self.depth,
            self.parent_fingerprint,
        )
    }

    /// Raw 32-byte private key.
    pub fn private_key(&self) -> &[u8; 32] {
        self.private_key.as_bytes()
    }

    /// 65-byte SEC1 uncompressed public key.
    pub const fn public_key_uncompressed(&self) -> &[u8; 65] {
        &self.public_key_uncompressed
    }

    /// 33-byte SEC1 compressed public key.
    pub const fn public_key_compressed(&self) -> &[u8; 33] {
        &self.public_key_compressed
    }

    /// Chain code.
    pub fn chain_code(&self) -> &[u8; 32] {
        self.chain_code.as_bytes()
    }

    /// Index that produced this key, with the hardened bit if set.
    pub const fn derivation_index(&self) -> u32 {
        self.derivation_index
    }

    /// Whether this key came from hardened derivation.
    pub const fn is_hardened(&self) -> bool {
        self.derivation_index >= HARDENED_OFFSET
    }

    /// Depth in the tree (0 for the master key).
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// First four bytes of the parent's key identifier.
    pub const fn parent_fingerprint(&self) -> &[u8; 4] {
        &self.parent_fingerprint
    }

    /// First four bytes of `HASH160` of this key's compressed public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key_compressed)
    }
}

pub(crate) fn fingerprint_of(public_key_compressed: &[u8; 33]) -> [u8; 4] {
    let id = hash160(public_key_compressed);
    [id[0], id[1], id[2], id[3]]
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("depth", &self.depth)
            .field("derivation_index", &self.derivation_index)
            .field("public_key", &hex::encode(self.public_key_compressed))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}
