//! BIP-39 sentences and seeds.
//!
//! Only the English word list is supported. Recovery validates the words and
//! recomputes the seed; entropy is never reconstructed from a sentence.
//! Sentences, entropy and seeds are all held in [`SecureArena`] buffers.

use std::borrow::Cow;

use bip39::Language;
use hmac::Hmac;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::arena::{SecretBuf, SecureArena};
use crate::error::{Error, Result};

/// PBKDF2 rounds for sentence-to-seed stretching.
pub const PBKDF2_ROUNDS: u32 = 2048;

/// Longest accepted BIP-39 passphrase, in characters.
pub const PASSPHRASE_MAX: usize = 21;

/// Supported sentence lengths and their entropy sizes in bytes.
pub const WORD_COUNTS: [(usize, usize); 5] = [(12, 16), (15, 20), (18, 24), (21, 28), (24, 32)];

/// Length of a BIP-39 seed in bytes.
pub const SEED_LEN: usize = 64;

const BITS_PER_WORD: usize = 11;
const MAX_WORDS: usize = 24;

/// Entropy length in bytes for a sentence of `word_count` words.
pub fn entropy_len(word_count: usize) -> Result<usize> {
    WORD_COUNTS
        .iter()
        .find(|(words, _)| *words == word_count)
        .map(|(_, bytes)| *bytes)
        .ok_or(Error::InvalidParameter("word count must be 12, 15, 18, 21 or 24"))
}

fn word_list() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}

/// Index of `word` in the English word list.
pub fn word_index(word: &str) -> Option<usize> {
    word_list().binary_search(&word).ok()
}

/// Draw fresh entropy from `rng` and turn it into a sentence.
pub fn generate_sentence<R: RngCore + CryptoRng>(
    arena: &SecureArena,
    rng: &mut R,
    word_count: usize,
) -> Result<SecretBuf> {
    let len = entropy_len(word_count)?;
    let mut entropy = arena.alloc(len)?;
    rng.fill_bytes(&mut entropy);
    sentence_from_entropy(arena, &entropy)
}

/// Encode raw entropy as a sentence held in `arena`.
///
/// The first byte of `SHA256(entropy)` is appended and the bit string is cut
/// into 11-bit word indices.
pub fn sentence_from_entropy(arena: &SecureArena, entropy: &[u8]) -> Result<SecretBuf> {
    let word_count = WORD_COUNTS
        .iter()
        .find(|(_, bytes)| *bytes == entropy.len())
        .map(|(words, _)| *words)
        .ok_or(Error::InvalidLength {
            expected: 16,
            actual: entropy.len(),
        })?;

    let mut bits = arena.alloc(entropy.len() + 1)?;
    bits[..entropy.len()].copy_from_slice(entropy);
    bits[entropy.len()] = Sha256::digest(entropy)[0];

    let mut indices = Zeroizing::new([0u16; MAX_WORDS]);
    for (w, slot) in indices.iter_mut().take(word_count).enumerate() {
        for b in 0..BITS_PER_WORD {
            let bit = w * BITS_PER_WORD + b;
            let set = (bits[bit / 8] >> (7 - bit % 8)) & 1;
            *slot = (*slot << 1) | u16::from(set);
        }
    }

    let list = word_list();
    let sentence = join_words(arena, indices[..word_count].iter().map(|&i| list[usize::from(i)]))?;
    tracing::debug!(words = word_count, "encoded mnemonic sentence");
    Ok(sentence)
}

/// Write `words` separated by single spaces straight into an arena buffer.
fn join_words<'w, I>(arena: &SecureArena, words: I) -> Result<SecretBuf>
where
    I: Iterator<Item = &'w str> + Clone,
{
    let len = words.clone().map(|w| w.len() + 1).sum::<usize>().saturating_sub(1);
    let mut out = arena.alloc(len)?;
    let mut pos = 0;
    for word in words {
        if pos > 0 {
            out[pos] = b' ';
            pos += 1;
        }
        out[pos..pos + word.len()].copy_from_slice(word.as_bytes());
        pos += word.len();
    }
    Ok(out)
}

/// Validate a recovery sentence and return it re-joined with single spaces.
///
/// Fails with [`Error::InvalidMnemonic`] on an unsupported word count and
/// [`Error::UnknownWord`] on the first word missing from the list.
pub fn validate_sentence(arena: &SecureArena, sentence: &str) -> Result<SecretBuf> {
    let count = sentence.split_whitespace().count();
    if entropy_len(count).is_err() {
        return Err(Error::InvalidMnemonic(format!(
            "expected 12, 15, 18, 21 or 24 words, got {count}"
        )));
    }

    if let Some(unknown) = sentence.split_whitespace().find(|w| word_index(w).is_none()) {
        return Err(Error::UnknownWord(unknown.to_string()));
    }

    join_words(arena, sentence.split_whitespace())
}

/// Check a passphrase against the supported length.
pub fn check_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() > PASSPHRASE_MAX {
        return Err(Error::InvalidParameter("passphrase must be at most 21 characters"));
    }
    Ok(())
}

/// NFKD form of `text`, borrowed when it is already normalized.
fn nfkd(text: &str) -> Zeroizing<String> {
    let mut cow = Cow::Borrowed(text);
    bip39::Mnemonic::normalize_utf8_cow(&mut cow);
    Zeroizing::new(cow.into_owned())
}

/// Stretch a sentence and passphrase into the 64-byte BIP-39 seed.
///
/// `seed = PBKDF2-HMAC-SHA512(NFKD(sentence), "mnemonic" || NFKD(passphrase), 2048)`.
/// The seed is written into a buffer leased from `arena`.
pub fn seed(arena: &SecureArena, sentence: &str, passphrase: &str) -> Result<SecretBuf> {
    check_passphrase(passphrase)?;

    let sentence = nfkd(sentence);
    let passphrase = nfkd(passphrase);
    let mut salt = Zeroizing::new(String::with_capacity(8 + passphrase.len()));
    salt.push_str("mnemonic");
    salt.push_str(&passphrase);

    let mut out = arena.alloc(SEED_LEN)?;
    pbkdf2::pbkdf2::<Hmac<Sha512>>(sentence.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out)
        .map_err(|_| Error::KeyDerivation)?;
    Ok(out)
}
