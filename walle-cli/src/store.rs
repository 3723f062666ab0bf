//! Wallet record storage.
//!
//! A wallet is one sealed account record plus append-only address rows per
//! chain. Private keys are never stored per address; they are re-derived from
//! the account key on demand.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walle::EncryptedBlob;
use walle_btc::{Chain, Network};

/// Name of the wallet file inside the wallet directory.
pub const WALLET_FILE: &str = "wallet.json";

const FORMAT_VERSION: u32 = 1;

/// Errors raised by a [`RecordStore`].
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem failure.
    Io(io::Error),
    /// The wallet file is not valid JSON for this format.
    Json(serde_json::Error),
    /// No wallet exists at the given location.
    NotFound(PathBuf),
    /// A wallet already exists at the given location.
    AlreadyExists(PathBuf),
    /// The stored data is inconsistent.
    Corrupt(&'static str),
    /// An address row was appended below the last recorded index.
    OutOfOrder {
        /// Chain being appended to.
        chain: Chain,
        /// Lowest index the store accepts.
        expected: u32,
        /// Index that was offered.
        got: u32,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "wallet storage error: {e}"),
            Self::Json(e) => write!(f, "wallet file is malformed: {e}"),
            Self::NotFound(p) => write!(f, "no wallet found at {}", p.display()),
            Self::AlreadyExists(p) => write!(f, "a wallet already exists at {}", p.display()),
            Self::Corrupt(what) => write!(f, "wallet file is corrupt: {what}"),
            Self::OutOfOrder {
                chain,
                expected,
                got,
            } => write!(f, "{chain} address {got} appended out of order, expected {expected}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::Corrupt(_)
            | Self::OutOfOrder { .. } => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// A stored address row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Index within the chain.
    pub index: u32,
    /// Encoded address.
    pub address: String,
}

/// Keyed record storage for one wallet.
pub trait RecordStore {
    /// Whether a wallet has been created.
    fn exists(&self) -> bool;

    /// Create the wallet with its sealed account record.
    fn create(&mut self, network: Network, sealed_account: &EncryptedBlob) -> Result<(), StoreError>;

    /// The sealed account record and the wallet's network.
    fn sealed_account(&self) -> Result<(EncryptedBlob, Network), StoreError>;

    /// Append an address row. Indices must be strictly increasing.
    fn insert_address(&mut self, chain: Chain, index: u32, address: &str) -> Result<(), StoreError>;

    /// All rows for `chain`, in index order.
    fn addresses(&self, chain: Chain) -> Result<Vec<AddressRecord>, StoreError>;

    /// Lowest index the next appended row on `chain` may use.
    fn next_index(&self, chain: Chain) -> Result<u32, StoreError> {
        next_after(&self.addresses(chain)?)
    }
}

fn next_after(rows: &[AddressRecord]) -> Result<u32, StoreError> {
    match rows.last() {
        None => Ok(0),
        Some(last) => last
            .index
            .checked_add(1)
            .ok_or(StoreError::Corrupt("address index space exhausted")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WalletFile {
    version: u32,
    network: String,
    /// Hex of the serialized sealed account record.
    account: String,
    #[serde(default)]
    receive: Vec<AddressRecord>,
    #[serde(default)]
    change: Vec<AddressRecord>,
}

impl WalletFile {
    fn rows(&self, chain: Chain) -> &Vec<AddressRecord> {
        match chain {
            Chain::Receive => &self.receive,
            Chain::Change => &self.change,
        }
    }

    fn rows_mut(&mut self, chain: Chain) -> &mut Vec<AddressRecord> {
        match chain {
            Chain::Receive => &mut self.receive,
            Chain::Change => &mut self.change,
        }
    }
}

/// [`RecordStore`] backed by a JSON file in a wallet directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(WALLET_FILE),
        }
    }

    /// Path of the wallet file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<WalletFile, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let file: WalletFile = serde_json::from_str(&text)?;
        if file.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt("unsupported wallet file version"));
        }
        Ok(file)
    }

    fn write(&self, file: &WalletFile) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(file)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "wallet file written");
        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn create(&mut self, network: Network, sealed_account: &EncryptedBlob) -> Result<(), StoreError> {
        if self.exists() {
            return Err(StoreError::AlreadyExists(self.path.clone()));
        }
        self.write(&WalletFile {
            version: FORMAT_VERSION,
            network: network.name().to_string(),
            account: hex::encode(sealed_account.to_bytes()),
            receive: Vec::new(),
            change: Vec::new(),
        })
    }

    fn sealed_account(&self) -> Result<(EncryptedBlob, Network), StoreError> {
        let file = self.read()?;
        let bytes =
            hex::decode(&file.account).map_err(|_| StoreError::Corrupt("account record is not hex"))?;
        let blob = EncryptedBlob::from_bytes(&bytes)
            .map_err(|_| StoreError::Corrupt("account record is not a sealed blob"))?;
        let network = file
            .network
            .parse()
            .map_err(|_| StoreError::Corrupt("unknown network"))?;
        Ok((blob, network))
    }

    fn insert_address(&mut self, chain: Chain, index: u32, address: &str) -> Result<(), StoreError> {
        let mut file = self.read()?;
        let rows = file.rows_mut(chain);
        let expected = next_after(rows)?;
        if index < expected {
            return Err(StoreError::OutOfOrder {
                chain,
                expected,
                got: index,
            });
        }
        rows.push(AddressRecord {
            index,
            address: address.to_string(),
        });
        self.write(&file)
    }

    fn addresses(&self, chain: Chain) -> Result<Vec<AddressRecord>, StoreError> {
        Ok(self.read()?.rows(chain).clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    pub(crate) fn temp_dir(tag: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("walle-{tag}-{}-{n}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sealed() -> EncryptedBlob {
        let arena = walle::SecureArena::for_tests(1024);
        walle::cipher::seal(&arena, b"zprv-placeholder", "store password").unwrap()
    }

    #[test]
    fn test_create_and_read_back() {
        let dir = temp_dir("create");
        let mut store = JsonStore::new(&dir);
        assert!(!store.exists());
        let blob = sealed();
        store.create(Network::Mainnet, &blob).unwrap();
        assert!(store.exists());

        let (read, network) = store.sealed_account().unwrap();
        assert_eq!(read, blob);
        assert_eq!(network, Network::Mainnet);
        assert_eq!(store.next_index(Chain::Receive).unwrap(), 0);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let dir = temp_dir("overwrite");
        let mut store = JsonStore::new(&dir);
        store.create(Network::Mainnet, &sealed()).unwrap();
        assert!(matches!(
            store.create(Network::Mainnet, &sealed()),
            Err(StoreError::AlreadyExists(_))
        ));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_append_only_rows() {
        let dir = temp_dir("rows");
        let mut store = JsonStore::new(&dir);
        store.create(Network::Testnet, &sealed()).unwrap();
        store.insert_address(Chain::Receive, 0, "tb1qa").unwrap();
        store.insert_address(Chain::Receive, 1, "tb1qb").unwrap();
        store.insert_address(Chain::Change, 0, "tb1qc").unwrap();

        assert!(matches!(
            store.insert_address(Chain::Receive, 1, "tb1qz"),
            Err(StoreError::OutOfOrder {
                expected: 2,
                got: 1,
                ..
            })
        ));
        // A skipped index leaves a gap
        store.insert_address(Chain::Change, 2, "tb1qd").unwrap();
        assert_eq!(store.next_index(Chain::Change).unwrap(), 3);

        let receive = store.addresses(Chain::Receive).unwrap();
        assert_eq!(receive.len(), 2);
        assert_eq!(receive[1].address, "tb1qb");
        assert_eq!(store.next_index(Chain::Receive).unwrap(), 2);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_wallet() {
        let store = JsonStore::new(temp_dir("missing"));
        assert!(matches!(store.sealed_account(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_account_record() {
        let dir = temp_dir("corrupt");
        let mut store = JsonStore::new(&dir);
        store.create(Network::Mainnet, &sealed()).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        value["account"] = serde_json::Value::String("zz".into());
        fs::write(store.path(), value.to_string()).unwrap();
        assert!(matches!(store.sealed_account(), Err(StoreError::Corrupt(_))));
        fs::remove_dir_all(dir).unwrap();
    }
}
