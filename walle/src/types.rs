//! Key-sized secret values.

use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Thirty-two secret bytes: a private key, a chain code or half of an
/// HMAC-SHA512 output.
///
/// Wiped on drop. Comparison runs in constant time and `Debug` never shows
/// the contents.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret32([u8; 32]);

impl Secret32 {
    /// Wrap `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Copy a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        <[u8; 32]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })
    }

    /// Borrow the secret.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl ConstantTimeEq for Secret32 {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for Secret32 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Secret32 {}

impl core::fmt::Debug for Secret32 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Secret32([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", Secret32::new([0xab; 32]));
        assert_eq!(debug, "Secret32([REDACTED])");
    }

    #[test]
    fn test_equality() {
        assert_eq!(Secret32::new([1; 32]), Secret32::new([1; 32]));
        assert_ne!(Secret32::new([1; 32]), Secret32::new([2; 32]));
        assert!(bool::from(Secret32::new([3; 32]).ct_eq(&Secret32::new([3; 32]))));
    }

    #[test]
    fn test_from_slice_requires_32_bytes() {
        assert_eq!(Secret32::from_slice(&[9u8; 32]).unwrap().as_bytes(), &[9u8; 32]);
        assert_eq!(
            Secret32::from_slice(&[0u8; 33]).unwrap_err(),
            Error::InvalidLength {
                expected: 32,
                actual: 33
            }
        );
    }

    #[test]
    fn test_zeroize_wipes() {
        let mut secret = Secret32::new([0xff; 32]);
        secret.zeroize();
        assert_eq!(secret.as_bytes(), &[0u8; 32]);
    }
}
