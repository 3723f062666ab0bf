//! Base58 and Base58Check encoding.
//!
//! The payload is treated as one big-endian unsigned integer and written in
//! radix 58. Each leading zero byte is carried separately as a `'1'`.

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::hash::double_sha256;

/// Bitcoin Base58 alphabet (no `0`, `O`, `I` or `l`).
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of the Base58Check checksum suffix.
pub const CHECKSUM_LEN: usize = 4;

/// Encode bytes as Base58.
pub fn encode(payload: &[u8]) -> String {
    let zeros = payload.iter().take_while(|&&b| b == 0).count();
    let mut n = BigUint::from_bytes_be(payload);

    let mut digits = Vec::with_capacity(payload.len() * 138 / 100 + 1);
    while n.bits() > 0 {
        let rem = &n % 58u32;
        digits.push(ALPHABET[rem.to_u32_digits().first().copied().unwrap_or(0) as usize]);
        n /= 58u32;
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(core::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|&c| c as char));
    out
}

/// Decode a Base58 string, restoring one zero byte per leading `'1'`.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let zeros = encoded.bytes().take_while(|&c| c == b'1').count();
    let n = accumulate(encoded)?;

    let mut out = vec![0u8; zeros];
    if n.bits() > 0 {
        out.extend_from_slice(&n.to_bytes_be());
    }
    Ok(out)
}

/// Decode a Base58 string into exactly `len` big-endian bytes.
///
/// Fails with [`Error::InvalidLength`] when the value does not fit.
pub fn decode_to(encoded: &str, len: usize) -> Result<Vec<u8>> {
    let n = accumulate(encoded)?;
    let bytes = if n.bits() > 0 { n.to_bytes_be() } else { Vec::new() };
    if bytes.len() > len {
        return Err(Error::InvalidLength {
            expected: len,
            actual: bytes.len(),
        });
    }

    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

fn accumulate(encoded: &str) -> Result<BigUint> {
    let mut n = BigUint::default();
    for c in encoded.bytes() {
        let value = digit_value(c).ok_or(Error::InvalidEncoding)?;
        n = n * 58u32 + value;
    }
    Ok(n)
}

fn digit_value(c: u8) -> Option<u32> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u32)
}

/// Encode `payload` with a 4-byte double-SHA-256 checksum appended.
pub fn check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    let checksum = double_sha256(payload);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    encode(&data)
}

/// Decode a Base58Check string and return the payload without its checksum.
pub fn check_decode(encoded: &str) -> Result<Vec<u8>> {
    let data = decode(encoded)?;
    if data.len() < CHECKSUM_LEN + 1 {
        return Err(Error::InvalidLength {
            expected: CHECKSUM_LEN + 1,
            actual: data.len(),
        });
    }

    let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if checksum != &double_sha256(payload)[..CHECKSUM_LEN] {
        return Err(Error::InvalidChecksum);
    }
    Ok(payload.to_vec())
}
