//! Native segwit (P2WPKH) addresses.

use walle::bech32;
use walle::hash::hash160;
use walle::{Error, Result};

use crate::network::Network;

/// P2WPKH address for a compressed public key.
///
/// `HASH160(pubkey)` as a witness v0 program, Bech32-encoded under the
/// network's hrp.
pub fn p2wpkh(public_key_compressed: &[u8; 33], network: Network) -> Result<String> {
    bech32::segwit_encode(network.hrp(), 0, &hash160(public_key_compressed))
}

/// Check that `address` is a P2WPKH address on `network` and return its
/// 20-byte public key hash.
pub fn parse_p2wpkh(address: &str, network: Network) -> Result<[u8; 20]> {
    let (version, program) = bech32::segwit_decode(network.hrp(), address)?;
    if version != 0 || program.len() != 20 {
        return Err(Error::MalformedInput("not a P2WPKH address"));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&program);
    Ok(hash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const GENERATOR_PUB: [u8; 33] =
        hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");

    #[test]
    fn test_bip173_p2wpkh() {
        assert_eq!(
            p2wpkh(&GENERATOR_PUB, Network::Mainnet).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn test_testnet_prefix() {
        let addr = p2wpkh(&GENERATOR_PUB, Network::Testnet).unwrap();
        assert_eq!(addr, "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx");
    }

    #[test]
    fn test_parse_p2wpkh() {
        let hash = parse_p2wpkh("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Mainnet).unwrap();
        assert_eq!(hash, hex!("751e76e8199196d454941c45d1b3a323f1433bd6"));
        assert!(parse_p2wpkh("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Testnet).is_err());
    }

    #[test]
    fn test_parse_rejects_taproot() {
        let taproot = bech32::segwit_encode("bc", 1, &[7u8; 32]).unwrap();
        assert!(matches!(
            parse_p2wpkh(&taproot, Network::Mainnet),
            Err(Error::MalformedInput(_))
        ));
    }
}
