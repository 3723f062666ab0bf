//! Wallet Import Format for private keys.
//!
//! `version || key (32) || 0x01` under Base58Check. Only keys for compressed
//! public keys are produced or accepted.

use walle::{base58, Error, Result, Secret32};
use zeroize::Zeroizing;

use crate::network::Network;

const COMPRESSED_FLAG: u8 = 0x01;
const PAYLOAD_LEN: usize = 34;

/// Encode a private key as WIF.
pub fn encode(private_key: &[u8; 32], network: Network) -> Zeroizing<String> {
    let mut payload = Zeroizing::new(Vec::with_capacity(PAYLOAD_LEN));
    payload.push(network.wif_version());
    payload.extend_from_slice(private_key);
    payload.push(COMPRESSED_FLAG);
    Zeroizing::new(base58::check_encode(&payload))
}

/// Decode a WIF string into the private key and its network.
pub fn decode(wif: &str) -> Result<(Secret32, Network)> {
    let payload = Zeroizing::new(base58::check_decode(wif)?);
    if payload.len() != PAYLOAD_LEN {
        return Err(Error::InvalidLength {
            expected: PAYLOAD_LEN,
            actual: payload.len(),
        });
    }
    if payload[PAYLOAD_LEN - 1] != COMPRESSED_FLAG {
        return Err(Error::MalformedInput("missing compressed-key flag"));
    }

    let network = match payload[0] {
        0x80 => Network::Mainnet,
        0xef => Network::Testnet,
        _ => return Err(Error::MalformedInput("unknown WIF version")),
    };
    let key = Secret32::from_slice(&payload[1..33])?;
    crate::keypair::pub_from_priv(key.as_bytes())?;
    Ok((key, network))
}
