//! BIP-84 account layout: `m/84'/coin'/account'/chain/index`.

use core::fmt;
use core::str::FromStr;

use walle::{Error, Result};
use zeroize::Zeroizing;

use crate::address;
use crate::derive::DerivationPath;
use crate::extended_key::{self, ExtendedKeyAddress, KeyFamily};
use crate::keypair::KeyPair;
use crate::mnemonic::Mnemonic;
use crate::network::Network;
use crate::sign::{self, Signature};
use crate::wif;

const PURPOSE: u32 = 84;

/// External (receive) or internal (change) chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chain {
    /// Addresses handed out to payers.
    Receive,
    /// Addresses for change outputs.
    Change,
}

impl Chain {
    /// Chain index in the derivation path.
    pub const fn index(self) -> u32 {
        match self {
            Self::Receive => 0,
            Self::Change => 1,
        }
    }

    /// Chain for a path index.
    pub fn from_index(index: u32) -> Result<Self> {
        match index {
            0 => Ok(Self::Receive),
            1 => Ok(Self::Change),
            _ => Err(Error::InvalidParameter("chain must be 0 (receive) or 1 (change)")),
        }
    }

    /// Chain name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "receive" | "external" | "0" => Ok(Self::Receive),
            "change" | "internal" | "1" => Ok(Self::Change),
            _ => Err(Error::InvalidParameter("chain must be receive or change")),
        }
    }
}

/// A derived address with its keys.
pub struct DerivedAddress {
    /// Full derivation path.
    pub path: DerivationPath,
    /// Chain the address belongs to.
    pub chain: Chain,
    /// Index within the chain.
    pub index: u32,
    /// Private key in WIF format.
    pub private_key_wif: Zeroizing<String>,
    /// Compressed public key in hex.
    pub public_key_hex: String,
    /// P2WPKH address.
    pub address: String,
}

impl fmt::Debug for DerivedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAddress")
            .field("path", &self.path.to_string())
            .field("address", &self.address)
            .field("public_key_hex", &self.public_key_hex)
            .field("private_key_wif", &"[REDACTED]")
            .finish()
    }
}

/// One BIP-84 account with its receive and change chain nodes.
#[derive(Debug)]
pub struct Bip84Account {
    account: KeyPair,
    receive: KeyPair,
    change: KeyPair,
    account_index: u32,
    network: Network,
}

impl Bip84Account {
    /// Account 0 of `mnemonic`.
    pub fn from_mnemonic(mnemonic: &Mnemonic, network: Network) -> Result<Self> {
        Self::from_root(mnemonic.root_keys(), network, 0)
    }

    /// Account `account_index` below a master key.
    pub fn from_root(root: &KeyPair, network: Network, account_index: u32) -> Result<Self> {
        let account = root
            .derive_child(PURPOSE, true)?
            .derive_child(network.coin_type(), true)?
            .derive_child(account_index, true)?;
        Self::from_account_key(account, network)
    }

    /// Wrap an account-level key, e.g. one parsed from a stored `zprv`.
    pub fn from_account_key(account: KeyPair, network: Network) -> Result<Self> {
        if account.depth() != 3 || !account.is_hardened() {
            return Err(Error::InvalidParameter("expected a hardened depth-3 account key"));
        }
        let account_index = account.derivation_index() & !crate::HARDENED_OFFSET;
        let receive = account.derive_child(Chain::Receive.index(), false)?;
        let change = account.derive_child(Chain::Change.index(), false)?;
        tracing::debug!(account = account_index, %network, "opened BIP-84 account");
        Ok(Self {
            account,
            receive,
            change,
            account_index,
            network,
        })
    }

    /// Parse a stored account extended private key.
    pub fn from_extended_private(encoded: &str) -> Result<Self> {
        let (key, family, network) = extended_key::parse_private(encoded)?;
        if family != KeyFamily::Bip84 {
            return Err(Error::MalformedInput("expected a BIP-84 extended key"));
        }
        Self::from_account_key(key, network)
    }

    /// Network of this account.
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Account number (unhardened).
    pub const fn account_index(&self) -> u32 {
        self.account_index
    }

    /// The account-level key pair.
    pub const fn account_key(&self) -> &KeyPair {
        &self.account
    }

    /// Node of `chain`.
    pub const fn chain_key(&self, chain: Chain) -> &KeyPair {
        match chain {
            Chain::Receive => &self.receive,
            Chain::Change => &self.change,
        }
    }

    /// `zprv`/`zpub` of the account node.
    pub fn extended_keys(&self) -> ExtendedKeyAddress {
        extended_key::format(&self.account, KeyFamily::Bip84, self.network)
    }

    /// Full path of an address.
    pub fn path(&self, chain: Chain, index: u32) -> DerivationPath {
        DerivationPath::bip84(self.network.coin_type(), self.account_index, chain.index(), index)
    }

    /// Key pair at `chain/index`.
    ///
    /// Propagates [`Error::InvalidChildKey`]; see
    /// [`derive_next_address`](Self::derive_next_address) for the skip-ahead
    /// variant.
    pub fn derive_key(&self, chain: Chain, index: u32) -> Result<KeyPair> {
        self.chain_key(chain).derive_child(index, false)
    }

    /// Address and keys at `chain/index`.
    pub fn derive_address(&self, chain: Chain, index: u32) -> Result<DerivedAddress> {
        let key = self.derive_key(chain, index)?;
        Ok(DerivedAddress {
            path: self.path(chain, index),
            chain,
            index,
            private_key_wif: wif::encode(key.private_key(), self.network),
            public_key_hex: hex::encode(key.public_key_compressed()),
            address: address::p2wpkh(key.public_key_compressed(), self.network)?,
        })
    }

    /// First derivable address at or after `start`, skipping invalid indices.
    pub fn derive_next_address(&self, chain: Chain, start: u32) -> Result<DerivedAddress> {
        let mut index = start;
        loop {
            match self.derive_address(chain, index) {
                Err(Error::InvalidChildKey) => {
                    tracing::warn!(index, %chain, "skipping index with invalid child key");
                    index = index
                        .checked_add(1)
                        .ok_or(Error::InvalidParameter("chain index space exhausted"))?;
                }
                other => return other,
            }
        }
    }

    /// `count` consecutive addresses on `chain` starting at `start`.
    pub fn derive_many(&self, chain: Chain, start: u32, count: u32) -> Result<Vec<DerivedAddress>> {
        let end = start
            .checked_add(count)
            .ok_or(Error::InvalidParameter("index range overflows"))?;
        (start..end).map(|i| self.derive_address(chain, i)).collect()
    }

    /// Sign `message` with the key at `chain/index`.
    pub fn sign(&self, chain: Chain, index: u32, message: &[u8]) -> Result<Signature> {
        let key = self.derive_key(chain, index)?;
        sign::sign(message, key.private_key())
    }
}
