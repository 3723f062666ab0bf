//! # Walle - Bitcoin Wallet Engine Core
//!
//! Chain-agnostic building blocks for the walle wallet: hashing, Base58Check
//! and Bech32 encodings, BIP-39 sentences and seeds, secret buffers and the
//! password-sealed storage format.
//!
//! Bitcoin key derivation, addresses and signing live in `walle-btc`.
//!
//! ## Features
//!
//! - **Explicit secret handling**: every secret type zeroizes on drop
//! - **Authenticated storage**: AES-256-GCM with a PBKDF2-derived key
//! - **Self-contained checksums**: Base58Check and BIP-173/350 computed here

#![warn(
    missing_docs,
    rust_2018_idioms,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::uninlined_format_args,
    clippy::return_self_not_must_use,
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::similar_names,
    clippy::many_single_char_names,
    clippy::unreadable_literal,
    clippy::missing_fields_in_debug
)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod base58;
pub mod bech32;
pub mod cipher;
pub mod error;
pub mod hash;
pub mod mnemonic;
pub mod types;

pub use arena::{SecretBuf, SecureArena};
pub use bech32::Variant;
pub use cipher::{EncryptedBlob, PASSWORD_MAX, PASSWORD_MIN};
pub use error::{Error, Result};
pub use mnemonic::PASSPHRASE_MAX;
pub use types::Secret32;

// Re-export rand_core so downstream crates share one RNG trait version
pub use rand_core;
