//! Mnemonic sentence, seed and root keys.

use rand_core::{CryptoRng, OsRng, RngCore};
use walle::mnemonic as words;
use walle::{Result, SecretBuf, SecureArena};

use crate::keypair::KeyPair;

/// A BIP-39 sentence together with the seed and master key it yields.
///
/// The sentence and seed live in buffers leased from a [`SecureArena`].
pub struct Mnemonic {
    sentence: SecretBuf,
    seed: SecretBuf,
    root_keys: KeyPair,
}

impl Mnemonic {
    /// Generate a new sentence of `word_count` words from the OS generator.
    ///
    /// Fails with [`walle::Error::InvalidParameter`] for an unsupported word count or
    /// a passphrase longer than 21 characters.
    pub fn generate(arena: &SecureArena, word_count: usize, passphrase: &str) -> Result<Self> {
        Self::generate_with(arena, &mut OsRng, word_count, passphrase)
    }

    /// Generate a new sentence with entropy drawn from `rng`.
    pub fn generate_with<R: RngCore + CryptoRng>(
        arena: &SecureArena,
        rng: &mut R,
        word_count: usize,
        passphrase: &str,
    ) -> Result<Self> {
        words::entropy_len(word_count)?;
        words::check_passphrase(passphrase)?;
        let sentence = words::generate_sentence(arena, rng, word_count)?;
        Self::from_sentence(arena, sentence, passphrase)
    }

    /// Build from known entropy (16, 20, 24, 28 or 32 bytes).
    pub fn from_entropy(arena: &SecureArena, entropy: &[u8], passphrase: &str) -> Result<Self> {
        words::check_passphrase(passphrase)?;
        let sentence = words::sentence_from_entropy(arena, entropy)?;
        Self::from_sentence(arena, sentence, passphrase)
    }

    /// Recover from an existing sentence.
    ///
    /// Checks the word count and that every word is in the list, then
    /// recomputes the seed. The sentence checksum is not verified.
    pub fn recover(arena: &SecureArena, sentence: &str, passphrase: &str) -> Result<Self> {
        words::check_passphrase(passphrase)?;
        let sentence = words::validate_sentence(arena, sentence)?;
        let recovered = Self::from_sentence(arena, sentence, passphrase)?;
        tracing::debug!(words = recovered.word_count(), "recovered wallet from mnemonic");
        Ok(recovered)
    }

    fn from_sentence(arena: &SecureArena, sentence: SecretBuf, passphrase: &str) -> Result<Self> {
        let seed = words::seed(arena, sentence.as_str()?, passphrase)?;
        let root_keys = KeyPair::from_seed(&seed)?;
        Ok(Self {
            sentence,
            seed,
            root_keys,
        })
    }

    /// Space-separated sentence.
    pub fn sentence(&self) -> Result<&str> {
        self.sentence.as_str()
    }

    /// Number of words in the sentence.
    pub fn word_count(&self) -> usize {
        self.sentence.iter().filter(|&&b| b == b' ').count() + 1
    }

    /// 64-byte BIP-39 seed.
    pub fn seed(&self) -> &[u8] {
        &self.seed
    }

    /// BIP-32 master key.
    pub const fn root_keys(&self) -> &KeyPair {
        &self.root_keys
    }
}

impl core::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("word_count", &self.word_count())
            .field("sentence", &"[REDACTED]")
            .finish()
    }
}
