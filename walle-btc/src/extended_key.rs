//! Extended key serialization (BIP-32 with SLIP-132 version families).
//!
//! Payload layout, 78 bytes before the Base58Check checksum:
//!
//! ```text
//! version (4) || depth (1) || parent fingerprint (4) || child index (4, BE)
//!   || chain code (32) || key data (33)
//! ```
//!
//! Key data is `0x00 || private key` or the compressed public key.

use walle::{base58, Error, Result, Secret32};
use zeroize::Zeroizing;

use crate::derive::PublicNode;
use crate::keypair::KeyPair;
use crate::network::Network;

const PAYLOAD_LEN: usize = 78;

/// Version-byte family, chosen by the wallet's BIP purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyFamily {
    /// `xprv`/`xpub`, purpose 44.
    Bip44,
    /// `yprv`/`ypub`, purpose 49.
    Bip49,
    /// `zprv`/`zpub`, purpose 84.
    #[default]
    Bip84,
}

impl KeyFamily {
    const ALL: [Self; 3] = [Self::Bip44, Self::Bip49, Self::Bip84];

    /// Family for a BIP purpose number.
    pub fn from_purpose(purpose: u32) -> Result<Self> {
        match purpose {
            44 => Ok(Self::Bip44),
            49 => Ok(Self::Bip49),
            84 => Ok(Self::Bip84),
            _ => Err(Error::InvalidParameter("purpose must be 44, 49 or 84")),
        }
    }

    /// BIP purpose number.
    pub const fn purpose(self) -> u32 {
        match self {
            Self::Bip44 => 44,
            Self::Bip49 => 49,
            Self::Bip84 => 84,
        }
    }

    /// Version bytes for the private key.
    pub const fn private_version(self, network: Network) -> [u8; 4] {
        match (self, network) {
            (Self::Bip44, Network::Mainnet) => [0x04, 0x88, 0xad, 0xe4],
            (Self::Bip49, Network::Mainnet) => [0x04, 0x9d, 0x78, 0x78],
            (Self::Bip84, Network::Mainnet) => [0x04, 0xb2, 0x43, 0x0c],
            (Self::Bip44, Network::Testnet) => [0x04, 0x35, 0x83, 0x94],
            (Self::Bip49, Network::Testnet) => [0x04, 0x4a, 0x4e, 0x28],
            (Self::Bip84, Network::Testnet) => [0x04, 0x5f, 0x18, 0xbc],
        }
    }

    /// Version bytes for the public key.
    pub const fn public_version(self, network: Network) -> [u8; 4] {
        match (self, network) {
            (Self::Bip44, Network::Mainnet) => [0x04, 0x88, 0xb2, 0x1e],
            (Self::Bip49, Network::Mainnet) => [0x04, 0x9d, 0x7c, 0xb2],
            (Self::Bip84, Network::Mainnet) => [0x04, 0xb2, 0x47, 0x46],
            (Self::Bip44, Network::Testnet) => [0x04, 0x35, 0x87, 0xcf],
            (Self::Bip49, Network::Testnet) => [0x04, 0x4a, 0x52, 0x62],
            (Self::Bip84, Network::Testnet) => [0x04, 0x5f, 0x1c, 0xf6],
        }
    }

    /// Identify version bytes. The flag is true for private versions.
    fn lookup(version: [u8; 4]) -> Option<(Self, Network, bool)> {
        for family in Self::ALL {
            for network in [Network::Mainnet, Network::Testnet] {
                if family.private_version(network) == version {
                    return Some((family, network, true));
                }
                if family.public_version(network) == version {
                    return Some((family, network, false));
                }
            }
        }
        None
    }
}

/// Private and public serializations of one node.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKeyAddress {
    /// Base58Check extended private key.
    pub extended_private: Zeroizing<String>,
    /// Base58Check extended public key.
    pub extended_public: String,
}

impl core::fmt::Debug for ExtendedKeyAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtendedKeyAddress")
            .field("extended_private", &"[REDACTED]")
            .field("extended_public", &self.extended_public)
            .finish()
    }
}

fn serialize(
    version: [u8; 4],
    depth: u8,
    parent_fingerprint: &[u8; 4],
    child_index: u32,
    chain_code: &[u8; 32],
    key_data: &[u8; 33],
) -> Zeroizing<String> {
    let mut data = Zeroizing::new(Vec::with_capacity(PAYLOAD_LEN));
    data.extend_from_slice(&version);
    data.push(depth);
    data.extend_from_slice(parent_fingerprint);
    data.extend_from_slice(&child_index.to_be_bytes());
    data.extend_from_slice(chain_code);
    data.extend_from_slice(key_data);
    Zeroizing::new(base58::check_encode(&data))
}

/// Serialize the private half of `key`.
pub fn format_private(key: &KeyPair, family: KeyFamily, network: Network) -> Zeroizing<String> {
    let mut key_data = Zeroizing::new([0u8; 33]);
    key_data[1..].copy_from_slice(key.private_key());
    serialize(
        family.private_version(network),
        key.depth(),
        key.parent_fingerprint(),
        key.derivation_index(),
        key.chain_code(),
        &key_data,
    )
}

/// Serialize a public node.
pub fn format_public(node: &PublicNode, family: KeyFamily, network: Network) -> String {
    let encoded = serialize(
        family.public_version(network),
        node.depth(),
        node.parent_fingerprint(),
        node.derivation_index(),
        node.chain_code(),
        node.public_key(),
    );
    encoded.as_str().to_string()
}

/// Serialize both halves of `key`.
pub fn format(key: &KeyPair, family: KeyFamily, network: Network) -> ExtendedKeyAddress {
    ExtendedKeyAddress {
        extended_private: format_private(key, family, network),
        extended_public: format_public(&key.public_node(), family, network),
    }
}

struct Decoded {
    family: KeyFamily,
    network: Network,
    private: bool,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    chain_code: Secret32,
    key_data: Zeroizing<[u8; 33]>,
}

fn deserialize(encoded: &str) -> Result<Decoded> {
    let data = Zeroizing::new(base58::check_decode(encoded)?);
    if data.len() != PAYLOAD_LEN {
        return Err(Error::InvalidLength {
            expected: PAYLOAD_LEN,
            actual: data.len(),
        });
    }

    let version = [data[0], data[1], data[2], data[3]];
    let (family, network, private) =
        KeyFamily::lookup(version).ok_or(Error::UnknownVersion(version))?;

    let depth = data[4];
    let parent_fingerprint = [data[5], data[6], data[7], data[8]];
    let child_index = u32::from_be_bytes([data[9], data[10], data[11], data[12]]);
    if depth == 0 && (parent_fingerprint != [0u8; 4] || child_index != 0) {
        return Err(Error::MalformedInput("master key with parent data"));
    }

    let chain_code = Secret32::from_slice(&data[13..45])?;
    let mut key_data = Zeroizing::new([0u8; 33]);
    key_data.copy_from_slice(&data[45..78]);

    Ok(Decoded {
        family,
        network,
        private,
        depth,
        parent_fingerprint,
        child_index,
        chain_code,
        key_data,
    })
}

/// Parse an extended private key string.
pub fn parse_private(encoded: &str) -> Result<(KeyPair, KeyFamily, Network)> {
    let decoded = deserialize(encoded)?;
    if !decoded.private {
        return Err(Error::MalformedInput("expected an extended private key"));
    }
    if decoded.key_data[0] != 0x00 {
        return Err(Error::MalformedInput("private key data must start with 0x00"));
    }

    let private_key = Secret32::from_slice(&decoded.key_data[1..])?;
    let key = KeyPair::from_parts(
        private_key,
        decoded.chain_code,
        decoded.child_index,
        decoded.depth,
        decoded.parent_fingerprint,
    )?;
    Ok((key, decoded.family, decoded.network))
}

/// Parse an extended public key string.
pub fn parse_public(encoded: &str) -> Result<(PublicNode, KeyFamily, Network)> {
    let decoded = deserialize(encoded)?;
    if decoded.private {
        return Err(Error::MalformedInput("expected an extended public key"));
    }
    if k256::PublicKey::from_sec1_bytes(&decoded.key_data[..]).is_err() {
        return Err(Error::InvalidPublicKey);
    }

    let node = PublicNode::new(
        *decoded.key_data,
        *decoded.chain_code.as_bytes(),
        decoded.child_index,
        decoded.depth,
        decoded.parent_fingerprint,
    );
    Ok((node, decoded.family, decoded.network))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const TEST_SEED_1: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");

    mod bip32_vector1 {
        use super::*;

        fn master() -> KeyPair {
            KeyPair::from_seed(&TEST_SEED_1).unwrap()
        }

        #[test]
        fn test_chain_m() {
            let ext = format(&master(), KeyFamily::Bip44, Network::Mainnet);
            assert_eq!(
                ext.extended_private.as_str(),
                "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
            );
            assert_eq!(
                ext.extended_public,
                "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
            );
        }

        #[test]
        fn test_chain_m_0h() {
            let child = master().derive_child(0, true).unwrap();
            let ext = format(&child, KeyFamily::Bip44, Network::Mainnet);
            assert_eq!(
                ext.extended_private.as_str(),
                "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
            );
            assert_eq!(
                ext.extended_public,
                "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
            );
        }

        #[test]
        fn test_chain_m_0h_1() {
            let child = master().derive_path("m/0'/1").unwrap();
            let ext = format(&child, KeyFamily::Bip44, Network::Mainnet);
            assert_eq!(
                ext.extended_private.as_str(),
                "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs"
            );
            assert_eq!(
                ext.extended_public,
                "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ"
            );
        }
    }

    mod parse_tests {
        use super::*;

        const XPRV_M_0H: &str = "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7";
        const XPUB_M_0H: &str = "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw";

        #[test]
        fn test_parse_private() {
            let (key, family, network) = parse_private(XPRV_M_0H).unwrap();
            assert_eq!(family, KeyFamily::Bip44);
            assert_eq!(network, Network::Mainnet);
            assert_eq!(key.depth(), 1);
            assert_eq!(key.derivation_index(), 0x8000_0000);
            assert_eq!(key.parent_fingerprint(), &hex!("3442193e"));
            assert_eq!(format_private(&key, family, network).as_str(), XPRV_M_0H);
        }

        #[test]
        fn test_parse_public_and_derive() {
            let (node, _, _) = parse_public(XPUB_M_0H).unwrap();
            let child = node.derive_child(1).unwrap();
            assert_eq!(
                format_public(&child, KeyFamily::Bip44, Network::Mainnet),
                "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ"
            );
        }

        #[test]
        fn test_kind_mismatch() {
            assert!(matches!(parse_public(XPRV_M_0H), Err(Error::MalformedInput(_))));
            assert!(matches!(parse_private(XPUB_M_0H), Err(Error::MalformedInput(_))));
        }

        #[test]
        fn test_unknown_version() {
            let mut payload = vec![0xde, 0xad, 0xbe, 0xef];
            payload.extend_from_slice(&[0u8; 74]);
            let encoded = base58::check_encode(&payload);
            assert_eq!(
                parse_private(&encoded).unwrap_err(),
                Error::UnknownVersion([0xde, 0xad, 0xbe, 0xef])
            );
        }

        #[test]
        fn test_bad_checksum_and_length() {
            let mut corrupted = XPRV_M_0H.to_string();
            corrupted.pop();
            corrupted.push('8');
            assert!(parse_private(&corrupted).is_err());
            assert!(matches!(
                parse_private(&base58::check_encode(&[0x04; 10])),
                Err(Error::InvalidLength { expected: 78, .. })
            ));
        }

        #[test]
        fn test_master_with_fingerprint_rejected() {
            let master = KeyPair::from_seed(&TEST_SEED_1).unwrap();
            let mut data = Vec::new();
            data.extend_from_slice(&KeyFamily::Bip44.private_version(Network::Mainnet));
            data.push(0);
            data.extend_from_slice(&[1, 2, 3, 4]);
            data.extend_from_slice(&0u32.to_be_bytes());
            data.extend_from_slice(master.chain_code());
            data.push(0);
            data.extend_from_slice(master.private_key());
            assert!(matches!(
                parse_private(&base58::check_encode(&data)),
                Err(Error::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn test_family_prefixes() {
        let master = KeyPair::from_seed(&TEST_SEED_1).unwrap();
        for (family, prv, publ) in [
            (KeyFamily::Bip44, "xprv", "xpub"),
            (KeyFamily::Bip49, "yprv", "ypub"),
            (KeyFamily::Bip84, "zprv", "zpub"),
        ] {
            let ext = format(&master, family, Network::Mainnet);
            assert!(ext.extended_private.starts_with(prv));
            assert!(ext.extended_public.starts_with(publ));
            assert_eq!(KeyFamily::from_purpose(family.purpose()).unwrap(), family);
        }
        let testnet = format(&master, KeyFamily::Bip84, Network::Testnet);
        assert!(testnet.extended_private.starts_with("vprv"));
        assert!(testnet.extended_public.starts_with("vpub"));
    }

    #[test]
    fn test_debug_redacts_private() {
        let master = KeyPair::from_seed(&TEST_SEED_1).unwrap();
        let ext = format(&master, KeyFamily::Bip84, Network::Mainnet);
        let debug = format!("{ext:?}");
        assert!(!debug.contains(ext.extended_private.as_str()));
    }
}
