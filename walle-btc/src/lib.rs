//! Bitcoin key derivation for the walle wallet.
//!
//! Builds on the [`walle`] core to provide BIP-32 hierarchical keys, the
//! BIP-84 account layout, extended-key and address formatting, WIF and
//! ECDSA signing.
//!
//! # Usage
//!
//! ```
//! use walle::SecureArena;
//! use walle_btc::{Bip84Account, Chain, Mnemonic, Network};
//!
//! let arena = SecureArena::init(walle::arena::DEFAULT_CAPACITY).unwrap();
//! let mnemonic = Mnemonic::recover(
//!     &arena,
//!     "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
//!     "",
//! ).unwrap();
//! let account = Bip84Account::from_mnemonic(&mnemonic, Network::Mainnet).unwrap();
//! let first = account.derive_address(Chain::Receive, 0).unwrap();
//! assert_eq!(first.address, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
//! ```

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
    clippy::cast_possible_truncation,
    clippy::unreadable_literal,
    clippy::missing_fields_in_debug
)]
#![forbid(unsafe_code)]

mod account;
pub mod address;
mod derive;
pub mod extended_key;
mod keypair;
mod mnemonic;
mod network;
pub mod sign;
pub mod wif;

pub use account::{Bip84Account, Chain, DerivedAddress};
pub use derive::{derive_child, ChildNumber, DerivationPath, PublicNode, HARDENED_OFFSET};
pub use extended_key::{ExtendedKeyAddress, KeyFamily};
pub use keypair::{pub_from_priv, KeyPair};
pub use mnemonic::Mnemonic;
pub use network::{Network, ParseNetworkError};
pub use sign::Signature;

pub use walle::{Error, Result};

#[cfg(test)]
pub(crate) fn test_arena() -> walle::SecureArena {
    walle::SecureArena::for_tests(1 << 16)
}
