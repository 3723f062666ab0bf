//! BIP-32 child key derivation.

use core::fmt;
use core::str::FromStr;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, PublicKey, Scalar};
use sha2::Sha512;
use walle::{Error, Result, Secret32};
use zeroize::Zeroizing;

use crate::keypair::{fingerprint_of, KeyPair};

type HmacSha512 = Hmac<Sha512>;

/// Hardened index offset (2^31).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Split an HMAC-SHA512 output into `IL` as a scalar and `IR`.
///
/// Returns [`Error::InvalidChildKey`] unless `0 < IL < n`.
fn split_il(output: &[u8]) -> Result<(Scalar, Secret32)> {
    let il = Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&output[..32])))
        .ok_or(Error::InvalidChildKey)?;
    if il == Scalar::ZERO {
        return Err(Error::InvalidChildKey);
    }
    Ok((il, Secret32::from_slice(&output[32..64])?))
}

fn effective_index(index: u32, hardened: bool) -> Result<u32> {
    if index >= HARDENED_OFFSET {
        return Err(Error::InvalidParameter("child index must be below 2^31"));
    }
    Ok(if hardened { index | HARDENED_OFFSET } else { index })
}

/// Derive the child of `parent` at `index`.
///
/// Hardened children hash `0x00 || parent private key || ser32(i)`; normal
/// children hash the parent's compressed public key `|| ser32(i)`. The HMAC key
/// is the parent chain code. The child private key is `(IL + parent) mod n`.
///
/// Fails with [`Error::InvalidChildKey`] when `IL >= n` or the result is zero.
/// There is no automatic retry: callers move on to `index + 1`.
pub fn derive_child(parent: &KeyPair, index: u32, hardened: bool) -> Result<KeyPair> {
    let i = effective_index(index, hardened)?;
    if parent.depth() == u8::MAX {
        return Err(Error::InvalidParameter("maximum derivation depth reached"));
    }

    let mut mac = HmacSha512::new_from_slice(parent.chain_code()).map_err(|_| Error::KeyDerivation)?;
    if hardened {
        mac.update(&[0u8]);
        mac.update(parent.private_key());
    } else {
        mac.update(parent.public_key_compressed());
    }
    mac.update(&i.to_be_bytes());

    let mut output = Zeroizing::new([0u8; 64]);
    output.copy_from_slice(&mac.finalize().into_bytes());
    let (il, chain_code) = split_il(&output[..])?;

    let parent_scalar =
        Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(parent.private_key())))
            .ok_or(Error::InvalidPrivateKey)?;
    let child = il + parent_scalar;
    if child == Scalar::ZERO {
        return Err(Error::InvalidChildKey);
    }
    let child_bytes: [u8; 32] = child.to_bytes().into();

    tracing::trace!(depth = parent.depth() + 1, index = i, "derived child key");
    KeyPair::from_parts(
        Secret32::new(child_bytes),
        chain_code,
        i,
        parent.depth() + 1,
        parent.fingerprint(),
    )
}

/// Public half of an extended key, for watch-only derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicNode {
    public_key: [u8; 33],
    chain_code: [u8; 32],
    derivation_index: u32,
    depth: u8,
    parent_fingerprint: [u8; 4],
}

impl PublicNode {
    /// Assemble a node from its parts.
    pub const fn new(
        public_key: [u8; 33],
        chain_code: [u8; 32],
        derivation_index: u32,
        depth: u8,
        parent_fingerprint: [u8; 4],
    ) -> Self {
        Self {
            public_key,
            chain_code,
            derivation_index,
            depth,
            parent_fingerprint,
        }
    }

    /// Derive a normal child from the public key alone (CKDpub).
    ///
    /// Hardened indices need the private key and are rejected with
    /// [`Error::InvalidParameter`].
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        let i = effective_index(index, false)?;
        if self.depth == u8::MAX {
            return Err(Error::InvalidParameter("maximum derivation depth reached"));
        }

        let mut mac = HmacSha512::new_from_slice(&self.chain_code).map_err(|_| Error::KeyDerivation)?;
        mac.update(&self.public_key);
        mac.update(&i.to_be_bytes());
        let output = mac.finalize().into_bytes();
        let (il, chain_code) = split_il(&output)?;

        let parent = PublicKey::from_sec1_bytes(&self.public_key).map_err(|_| Error::InvalidPublicKey)?;
        let point = ProjectivePoint::GENERATOR * il + parent.to_projective();
        let child = PublicKey::from_affine(point.to_affine()).map_err(|_| Error::InvalidChildKey)?;

        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(child.to_encoded_point(true).as_bytes());

        Ok(Self {
            public_key,
            chain_code: *chain_code.as_bytes(),
            derivation_index: i,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
        })
    }

    /// 33-byte SEC1 compressed public key.
    pub const fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    /// Chain code.
    pub const fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Index that produced this node, with the hardened bit if set.
    pub const fn derivation_index(&self) -> u32 {
        self.derivation_index
    }

    /// Depth in the tree.
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// First four bytes of the parent's key identifier.
    pub const fn parent_fingerprint(&self) -> &[u8; 4] {
        &self.parent_fingerprint
    }

    /// First four bytes of `HASH160` of the public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key)
    }
}

impl fmt::Debug for PublicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicNode")
            .field("depth", &self.depth)
            .field("derivation_index", &self.derivation_index)
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildNumber {
    /// Normal derivation: 0 to 2^31 - 1
    Normal(u32),
    /// Hardened derivation, stored without the offset
    Hardened(u32),
}

impl ChildNumber {
    /// Index without the hardened bit.
    pub const fn index(self) -> u32 {
        match self {
            Self::Normal(i) | Self::Hardened(i) => i,
        }
    }

    /// Check if this is a hardened index.
    pub const fn is_hardened(self) -> bool {
        matches!(self, Self::Hardened(_))
    }

    /// Raw value used in derivation.
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::Normal(i) => i,
            Self::Hardened(i) => i | HARDENED_OFFSET,
        }
    }
}

impl From<u32> for ChildNumber {
    fn from(value: u32) -> Self {
        if value >= HARDENED_OFFSET {
            Self::Hardened(value & !HARDENED_OFFSET)
        } else {
            Self::Normal(value)
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(i) => write!(f, "{i}"),
            Self::Hardened(i) => write!(f, "{i}'"),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (digits, hardened) = match s.strip_suffix('\'').or_else(|| s.strip_suffix('h')) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let index: u32 = digits.parse().map_err(|_| Error::InvalidDerivationPath)?;
        if index >= HARDENED_OFFSET {
            return Err(Error::InvalidDerivationPath);
        }
        Ok(if hardened {
            Self::Hardened(index)
        } else {
            Self::Normal(index)
        })
    }
}

/// BIP-32 derivation path such as `m/84'/0'/0'/0/5`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// Path `m/84'/coin'/account'/chain/index`.
    pub fn bip84(coin_type: u32, account: u32, chain: u32, index: u32) -> Self {
        Self(vec![
            ChildNumber::Hardened(84),
            ChildNumber::Hardened(coin_type),
            ChildNumber::Hardened(account),
            ChildNumber::Normal(chain),
            ChildNumber::Normal(index),
        ])
    }

    /// Steps from the root.
    pub fn iter(&self) -> impl Iterator<Item = ChildNumber> + '_ {
        self.0.iter().copied()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the bare `m` path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let rest = match s {
            "m" | "M" => return Ok(Self::default()),
            _ => s
                .strip_prefix("m/")
                .or_else(|| s.strip_prefix("M/"))
                .ok_or(Error::InvalidDerivationPath)?,
        };
        rest.split('/')
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const TEST_SEED_1: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");

    fn master() -> KeyPair {
        KeyPair::from_seed(&TEST_SEED_1).unwrap()
    }

    mod child_tests {
        use super::*;

        #[test]
        fn test_bip32_vector1_m_0h() {
            let child = master().derive_child(0, true).unwrap();
            assert_eq!(child.depth(), 1);
            assert_eq!(child.derivation_index(), 0x8000_0000);
            assert_eq!(child.parent_fingerprint(), &hex!("3442193e"));
            assert_eq!(
                child.private_key(),
                &hex!("edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea")
            );
            assert_eq!(
                child.chain_code(),
                &hex!("47fdacbd0f1097043b78c63c20c34ef4ed9a111d980047ad16282c7ae6236141")
            );
        }

        #[test]
        fn test_bip32_vector1_m_0h_1() {
            let child = master().derive_child(0, true).unwrap().derive_child(1, false).unwrap();
            assert_eq!(
                child.private_key(),
                &hex!("3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368")
            );
            assert_eq!(
                child.public_key_compressed(),
                &hex!("03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c")
            );
        }

        #[test]
        fn test_index_out_of_range() {
            assert!(matches!(
                master().derive_child(HARDENED_OFFSET, false),
                Err(Error::InvalidParameter(_))
            ));
        }

        #[test]
        fn test_hardened_flag_changes_child() {
            let m = master();
            let normal = m.derive_child(7, false).unwrap();
            let hardened = m.derive_child(7, true).unwrap();
            assert_ne!(normal.private_key(), hardened.private_key());
            assert!(!normal.is_hardened());
            assert!(hardened.is_hardened());
        }

        #[test]
        fn test_no_collisions_over_many_indices() {
            let m = master();
            let mut seen = HashSet::new();
            for i in 0..1000 {
                for hardened in [false, true] {
                    let child = m.derive_child(i, hardened).unwrap();
                    assert!(seen.insert(*child.public_key_compressed()));
                }
            }
        }

        #[test]
        fn test_split_il_rejects_order_and_zero() {
            let mut output = [0u8; 64];
            assert_eq!(split_il(&output).unwrap_err(), Error::InvalidChildKey);
            output[..32].copy_from_slice(&hex!(
                "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141"
            ));
            assert_eq!(split_il(&output).unwrap_err(), Error::InvalidChildKey);
            output[31] = 0x40;
            assert!(split_il(&output).is_ok());
        }
    }

    mod public_tests {
        use super::*;

        #[test]
        fn test_ckdpub_matches_ckdpriv() {
            let account = master().derive_path("m/84'/0'/0'").unwrap();
            let node = account.public_node();
            for i in [0u32, 1, 2, 1000] {
                let from_private = account.derive_child(i, false).unwrap();
                let from_public = node.derive_child(i).unwrap();
                assert_eq!(from_public.public_key(), from_private.public_key_compressed());
                assert_eq!(from_public.chain_code(), from_private.chain_code());
                assert_eq!(from_public, from_private.public_node());
            }
        }

        #[test]
        fn test_ckdpub_rejects_hardened() {
            let node = master().public_node();
            assert!(node.derive_child(HARDENED_OFFSET | 3).is_err());
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_parse_and_display() {
            let path: DerivationPath = "m/84'/0'/0'/0/5".parse().unwrap();
            assert_eq!(path, DerivationPath::bip84(0, 0, 0, 5));
            assert_eq!(path.to_string(), "m/84'/0'/0'/0/5");
            let h: DerivationPath = "m/84h/0h".parse().unwrap();
            assert_eq!(h.to_string(), "m/84'/0'");
        }

        #[test]
        fn test_parse_root() {
            let root: DerivationPath = "m".parse().unwrap();
            assert!(root.is_empty());
            assert_eq!(master().derive_path("m").unwrap().depth(), 0);
        }

        #[test]
        fn test_parse_errors() {
            for bad in ["", "84'/0'", "m/", "m/x", "m/2147483648", "m//1"] {
                assert_eq!(
                    bad.parse::<DerivationPath>(),
                    Err(Error::InvalidDerivationPath),
                    "{bad}"
                );
            }
        }

        #[test]
        fn test_derive_path_depth() {
            let m = master();
            assert_eq!(m.derive_path("m/0'").unwrap().depth(), 1);
            assert_eq!(m.derive_path("m/0'/1").unwrap().depth(), 2);
        }

        #[test]
        fn test_child_number_from_u32() {
            assert_eq!(ChildNumber::from(5), ChildNumber::Normal(5));
            assert_eq!(ChildNumber::from(HARDENED_OFFSET | 5), ChildNumber::Hardened(5));
            assert_eq!(ChildNumber::Hardened(5).to_u32(), 0x8000_0005);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_derivation_is_deterministic(index in 0u32..HARDENED_OFFSET, hardened in any::<bool>()) {
            let a = master().derive_child(index, hardened).unwrap();
            let b = master().derive_child(index, hardened).unwrap();
            prop_assert_eq!(a.private_key(), b.private_key());
            prop_assert_eq!(a.chain_code(), b.chain_code());
        }
    }
}
