//! Password-sealed storage for secret records.
//!
//! A 256-bit key is stretched from the password with PBKDF2-HMAC-SHA256 and
//! used with AES-256-GCM. Every seal draws a fresh 96-bit nonce.
//!
//! Serialized layout:
//!
//! ```text
//! version (1) || nonce (12) || plaintext length (4, BE) || ciphertext || tag (16)
//! ```
//!
//! The version byte and declared length are bound in as associated data.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::Hmac;
use rand_core::{CryptoRng, OsRng, RngCore};
use sha2::Sha256;

use crate::arena::{SecretBuf, SecureArena};
use crate::error::{Error, Result};

/// PBKDF2 rounds for password stretching.
pub const SEAL_ROUNDS: u32 = 32_768;

/// Fixed application salt.
const SEAL_SALT: &[u8] = b"walle-secret-at-rest-v1";

/// Shortest accepted password, in characters.
pub const PASSWORD_MIN: usize = 10;

/// Longest accepted password, in characters.
pub const PASSWORD_MAX: usize = 41;

const FORMAT_VERSION: u8 = 0x01;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN + 4;

/// A sealed secret.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    nonce: [u8; NONCE_LEN],
    plaintext_len: u32,
    ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Declared plaintext length in bytes.
    pub fn plaintext_len(&self) -> usize {
        self.plaintext_len as usize
    }

    /// Nonce used for this blob.
    pub const fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext followed by the authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.plaintext_len.to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a stored blob.
    ///
    /// Only the framing is checked here; the declared length is checked
    /// against the ciphertext by [`open`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(Error::MalformedInput("sealed blob too short"));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(Error::MalformedInput("unsupported sealed blob version"));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1..=NONCE_LEN]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[1 + NONCE_LEN..HEADER_LEN]);

        Ok(Self {
            nonce,
            plaintext_len: u32::from_be_bytes(len),
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }

    fn aad(&self) -> [u8; 5] {
        let len = self.plaintext_len.to_be_bytes();
        [FORMAT_VERSION, len[0], len[1], len[2], len[3]]
    }
}

impl core::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("plaintext_len", &self.plaintext_len)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Check a password against the accepted length range.
pub fn check_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(Error::InvalidParameter(
            "password must be between 10 and 41 characters",
        ));
    }
    Ok(())
}

fn derive_key(arena: &SecureArena, password: &str) -> Result<SecretBuf> {
    let mut key = arena.alloc(KEY_LEN)?;
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), SEAL_SALT, SEAL_ROUNDS, &mut key)
        .map_err(|_| Error::KeyDerivation)?;
    Ok(key)
}

fn cipher_for(arena: &SecureArena, password: &str) -> Result<Aes256Gcm> {
    let key = derive_key(arena, password)?;
    Aes256Gcm::new_from_slice(&key).map_err(|_| Error::KeyDerivation)
}

/// Seal `plaintext` under `password` with a nonce from the OS generator.
///
/// The stretched key and the working copy of the plaintext are leased from
/// `arena`.
pub fn seal(arena: &SecureArena, plaintext: &[u8], password: &str) -> Result<EncryptedBlob> {
    seal_with(arena, &mut OsRng, plaintext, password)
}

/// Seal `plaintext` under `password`, drawing the nonce from `rng`.
pub fn seal_with<R: RngCore + CryptoRng>(
    arena: &SecureArena,
    rng: &mut R,
    plaintext: &[u8],
    password: &str,
) -> Result<EncryptedBlob> {
    check_password(password)?;
    let plaintext_len =
        u32::try_from(plaintext.len()).map_err(|_| Error::InvalidParameter("plaintext too large"))?;

    let cipher = cipher_for(arena, password)?;
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let mut blob = EncryptedBlob {
        nonce,
        plaintext_len,
        ciphertext: Vec::new(),
    };
    let aad = blob.aad();

    let mut work = arena.copy_from(plaintext)?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &aad, &mut work)
        .map_err(|_| Error::MalformedInput("encryption failed"))?;

    let mut ciphertext = Vec::with_capacity(work.len() + TAG_LEN);
    ciphertext.extend_from_slice(&work);
    ciphertext.extend_from_slice(&tag);
    blob.ciphertext = ciphertext;

    tracing::debug!(len = plaintext.len(), "sealed secret");
    Ok(blob)
}

/// Open a sealed blob into a buffer leased from `arena`.
///
/// Fails with [`Error::MalformedInput`] when the declared length does not
/// match the ciphertext, and with [`Error::AuthenticationFailed`] on a wrong
/// password or any tampering. Password length bounds are not applied here:
/// a password outside them can never have sealed a blob.
pub fn open(arena: &SecureArena, blob: &EncryptedBlob, password: &str) -> Result<SecretBuf> {
    let len = blob.plaintext_len();
    if blob.ciphertext.len() != len + TAG_LEN {
        return Err(Error::MalformedInput("declared length does not match ciphertext"));
    }

    let cipher = cipher_for(arena, password)?;
    let aad = blob.aad();
    let (body, tag) = blob.ciphertext.split_at(len);

    let mut plaintext = arena.copy_from(body)?;
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&blob.nonce),
            &aad,
            &mut plaintext,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| {
            tracing::debug!("sealed secret failed authentication");
            Error::AuthenticationFailed
        })?;

    Ok(plaintext)
}
