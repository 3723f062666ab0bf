//! ECDSA signing over secp256k1 with DER output.
//!
//! Messages are hashed with SHA-256 and signed deterministically (RFC 6979).
//! Signatures are normalized to low-S.

use core::fmt;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{SigningKey, VerifyingKey};
use walle::hash::sha256;
use walle::{Error, Result};

/// An ECDSA signature with its DER encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    der: Vec<u8>,
}

impl Signature {
    /// Build from big-endian `r` and `s`.
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        let der = der_encode(&r, &s);
        Self { r, s, der }
    }

    /// The `r` component.
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// The `s` component.
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// `r || s`.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.der))
    }
}

/// Encode `r` and `s` as a DER `SEQUENCE` of two `INTEGER`s.
///
/// Redundant leading zero bytes are dropped and a single `0x00` is prefixed
/// when the remaining high bit is set.
pub fn der_encode(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    let r = der_integer(r);
    let s = der_integer(s);

    let mut der = Vec::with_capacity(6 + r.len() + s.len());
    der.push(0x30);
    der.push((4 + r.len() + s.len()) as u8);
    der.push(0x02);
    der.push(r.len() as u8);
    der.extend_from_slice(&r);
    der.push(0x02);
    der.push(s.len() as u8);
    der.extend_from_slice(&s);
    der
}

fn der_integer(value: &[u8; 32]) -> Vec<u8> {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len() - 1);
    let trimmed = &value[start..];
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Sign `message` with `private_key`.
///
/// The signature is checked against the key's own public key before it is
/// returned; a mismatch is reported as [`Error::SigningFailed`].
pub fn sign(message: &[u8], private_key: &[u8; 32]) -> Result<Signature> {
    let digest = sha256(message);
    let signing_key = SigningKey::from_slice(private_key).map_err(|_| Error::InvalidPrivateKey)?;

    let signature: k256::ecdsa::Signature = signing_key.sign_prehash(&digest).map_err(|_| {
        tracing::error!("ECDSA primitive failed");
        Error::SigningFailed
    })?;
    let signature = signature.normalize_s().unwrap_or(signature);

    if signing_key
        .verifying_key()
        .verify_prehash(&digest, &signature)
        .is_err()
    {
        tracing::error!("fresh signature failed verification");
        return Err(Error::SigningFailed);
    }

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok(Signature::new(r, s))
}

/// Check `signature` over `message` against a SEC1 public key.
pub fn verify(message: &[u8], signature: &Signature, public_key: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = k256::ecdsa::Signature::from_slice(&signature.to_compact()) else {
        return false;
    };
    key.verify_prehash(&sha256(message), &sig).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keypair::pub_from_priv;
    use hex_literal::hex;

    const KEY: [u8; 32] = hex!("0c28fca386c7a227600b2fe50b7cae11ec86d3bf1fbe471be89827e19d72aa1d");

    mod der_tests {
        use super::*;

        #[test]
        fn test_no_padding_is_70_bytes() {
            let der = der_encode(&[0x11; 32], &[0x22; 32]);
            assert_eq!(der.len(), 70);
            assert_eq!(&der[..4], &[0x30, 68, 0x02, 32]);
        }

        #[test]
        fn test_r_high_bit_padded() {
            let der = der_encode(&[0x80; 32], &[0x22; 32]);
            assert_eq!(der.len(), 71);
            assert_eq!(der[1], 69);
            assert_eq!(der[3], 33);
            assert_eq!(der[4], 0x00);
            assert_eq!(der[5], 0x80);
        }

        #[test]
        fn test_s_high_bit_padded() {
            let der = der_encode(&[0x11; 32], &[0xff; 32]);
            assert_eq!(der.len(), 71);
            assert_eq!(der[36], 0x02);
            assert_eq!(der[37], 33);
            assert_eq!(der[38], 0x00);
        }

        #[test]
        fn test_leading_zeros_trimmed() {
            let mut r = [0x33; 32];
            r[0] = 0;
            let der = der_encode(&r, &[0x22; 32]);
            assert_eq!(der.len(), 69);
            assert_eq!(der[3], 31);
        }
    }

    #[test]
    fn test_sign_is_deterministic_and_verifies() {
        let a = sign(b"hello walle", &KEY).unwrap();
        let b = sign(b"hello walle", &KEY).unwrap();
        assert_eq!(a, b);

        let (_, compressed) = pub_from_priv(&KEY).unwrap();
        assert!(verify(b"hello walle", &a, &compressed));
        assert!(!verify(b"hello wallet", &a, &compressed));
    }

    #[test]
    fn test_uncompressed_key_verifies() {
        let sig = sign(b"msg", &KEY).unwrap();
        let (uncompressed, _) = pub_from_priv(&KEY).unwrap();
        assert!(verify(b"msg", &sig, &uncompressed));
    }

    #[test]
    fn test_low_s_and_der_matches_k256() {
        let signing_key = SigningKey::from_slice(&KEY).unwrap();
        for i in 0u32..64 {
            let message = i.to_be_bytes();
            let ours = sign(&message, &KEY).unwrap();
            assert_eq!(ours.s()[0] & 0x80, 0, "s must be low");
            assert!(ours.der().len() <= 71);

            let theirs: k256::ecdsa::Signature = signing_key.sign_prehash(&sha256(&message)).unwrap();
            let theirs = theirs.normalize_s().unwrap_or(theirs);
            assert_eq!(ours.der(), theirs.to_der().as_bytes());
        }
    }

    #[test]
    fn test_invalid_key() {
        assert_eq!(sign(b"msg", &[0u8; 32]).unwrap_err(), Error::InvalidPrivateKey);
    }

    #[test]
    fn test_verify_rejects_garbage_key() {
        let sig = sign(b"msg", &KEY).unwrap();
        assert!(!verify(b"msg", &sig, &[0x02; 33]));
    }
}
