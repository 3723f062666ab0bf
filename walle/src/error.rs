//! Error types for the wallet engine.

use core::fmt;

/// Errors that can occur during wallet operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied parameter is out of range.
    InvalidParameter(&'static str),
    /// Child derivation produced a key outside `1..n`; retry with the next index.
    InvalidChildKey,
    /// A recovery word is not in the BIP-39 word list.
    UnknownWord(String),
    /// The recovery sentence is structurally invalid.
    InvalidMnemonic(String),
    /// Wrong password, or the sealed blob was tampered with.
    AuthenticationFailed,
    /// Input bytes do not have the expected shape.
    MalformedInput(&'static str),
    /// The EC primitive failed or the produced signature did not verify.
    SigningFailed,
    /// Private key is zero or not below the curve order.
    InvalidPrivateKey,
    /// Public key bytes are not a valid curve point.
    InvalidPublicKey,
    /// Text contains characters outside the expected alphabet.
    InvalidEncoding,
    /// Embedded checksum does not match.
    InvalidChecksum,
    /// Decoded data has the wrong length.
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
    /// Extended key version bytes are not a known family.
    UnknownVersion([u8; 4]),
    /// Derivation path string could not be parsed.
    InvalidDerivationPath,
    /// The process-wide secure arena was already initialized.
    ArenaAlreadyInitialized,
    /// The secure arena has no room for the requested allocation.
    ArenaExhausted {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available.
        available: usize,
    },
    /// PBKDF2 key derivation failed.
    KeyDerivation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Self::InvalidChildKey => {
                write!(f, "derived child key is invalid, retry with the next index")
            }
            Self::UnknownWord(word) => write!(f, "\"{word}\" is not a BIP-39 word"),
            Self::InvalidMnemonic(reason) => write!(f, "invalid mnemonic: {reason}"),
            Self::AuthenticationFailed => {
                write!(f, "authentication failed: wrong password or corrupted data")
            }
            Self::MalformedInput(what) => write!(f, "malformed input: {what}"),
            Self::SigningFailed => write!(f, "signing failed"),
            Self::InvalidPrivateKey => write!(f, "invalid private key"),
            Self::InvalidPublicKey => write!(f, "invalid public key"),
            Self::InvalidEncoding => write!(f, "invalid encoding"),
            Self::InvalidChecksum => write!(f, "checksum mismatch"),
            Self::InvalidLength { expected, actual } => {
                write!(f, "invalid length: expected {expected} bytes, got {actual}")
            }
            Self::UnknownVersion(v) => write!(
                f,
                "unknown extended key version {:02x}{:02x}{:02x}{:02x}",
                v[0], v[1], v[2], v[3]
            ),
            Self::InvalidDerivationPath => write!(f, "invalid derivation path"),
            Self::ArenaAlreadyInitialized => write!(f, "secure arena already initialized"),
            Self::ArenaExhausted {
                requested,
                available,
            } => write!(
                f,
                "secure arena exhausted: requested {requested} bytes, {available} available"
            ),
            Self::KeyDerivation => write!(f, "PBKDF2 key derivation failed"),
        }
    }
}

impl std::error::Error for Error {}

/// A convenient Result type alias for walle operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_does_not_leak_parameters() {
        let msg = Error::InvalidParameter("password length").to_string();
        assert_eq!(msg, "invalid parameter: password length");
    }

    #[test]
    fn test_display_unknown_version() {
        let msg = Error::UnknownVersion([0x04, 0x88, 0xad, 0xe4]).to_string();
        assert!(msg.ends_with("0488ade4"));
    }

    #[test]
    fn test_display_length() {
        let msg = Error::InvalidLength {
            expected: 82,
            actual: 3,
        }
        .to_string();
        assert_eq!(msg, "invalid length: expected 82 bytes, got 3");
    }
}
