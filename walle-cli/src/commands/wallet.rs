//! Wallet command handlers.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use walle::bech32::{self, Variant};
use walle::{cipher, SecretBuf, SecureArena};
use walle_btc::{Bip84Account, Chain, DerivedAddress, Mnemonic, Network};
use zeroize::Zeroize;

use crate::store::{JsonStore, RecordStore, StoreError};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Where the wallet lives and where secrets are held while a command runs.
pub struct WalletContext<'a> {
    dir: PathBuf,
    arena: &'a SecureArena,
}

impl<'a> WalletContext<'a> {
    /// Resolve the wallet directory, defaulting to `~/.walle`.
    pub fn new(dir: Option<PathBuf>, arena: &'a SecureArena) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = match dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .ok_or("cannot determine home directory, pass --wallet-dir")?
                .join(".walle"),
        };
        Ok(Self { dir, arena })
    }

    fn store(&self) -> JsonStore {
        JsonStore::new(&self.dir)
    }

    /// Move a password into the arena and wipe the original.
    fn take_password(&self, password: &mut String) -> Result<SecretBuf, Box<dyn std::error::Error>> {
        let checked = cipher::check_password(password);
        let buf = self.arena.copy_from(password.as_bytes());
        password.zeroize();
        checked?;
        Ok(buf?)
    }

    /// Move a passphrase into the arena and wipe the original.
    fn take_passphrase(&self, passphrase: &mut String) -> Result<SecretBuf, Box<dyn std::error::Error>> {
        let checked = walle::mnemonic::check_passphrase(passphrase);
        let buf = self.arena.copy_from(passphrase.as_bytes());
        passphrase.zeroize();
        checked?;
        Ok(buf?)
    }

    /// Unseal the stored account key.
    fn open_account(&self, password: &SecretBuf) -> Result<(Bip84Account, JsonStore), Box<dyn std::error::Error>> {
        let store = self.store();
        let (sealed, network) = store.sealed_account()?;
        let zprv = cipher::open(self.arena, &sealed, password.as_str()?)?;
        let account = Bip84Account::from_extended_private(zprv.as_str()?)?;
        if account.network() != network {
            return Err(StoreError::Corrupt("account key network does not match wallet").into());
        }
        Ok((account, store))
    }

    /// Seal the account of `mnemonic` and record its first receive address.
    fn save_new_wallet(
        &self,
        mnemonic: &Mnemonic,
        network: Network,
        password: &SecretBuf,
    ) -> Result<DerivedAddress, Box<dyn std::error::Error>> {
        let mut store = self.store();
        let account = Bip84Account::from_mnemonic(mnemonic, network)?;
        let keys = account.extended_keys();
        let sealed = cipher::seal(self.arena, keys.extended_private.as_bytes(), password.as_str()?)?;
        store.create(network, &sealed)?;

        let first = account.derive_next_address(Chain::Receive, 0)?;
        store.insert_address(Chain::Receive, first.index, &first.address)?;
        tracing::info!(path = %store.path().display(), %network, "wallet created");
        Ok(first)
    }

    fn ensure_absent(&self) -> CmdResult {
        let store = self.store();
        if store.exists() {
            return Err(StoreError::AlreadyExists(store.path().to_path_buf()).into());
        }
        Ok(())
    }
}

const fn network_for(testnet: bool) -> Network {
    if testnet {
        Network::Testnet
    } else {
        Network::Mainnet
    }
}

/// Arguments for `walle create`.
#[derive(Args)]
pub struct CreateArgs {
    /// Number of mnemonic words (12, 15, 18, 21, or 24).
    #[arg(short, long, default_value = "12")]
    words: usize,

    /// BIP39 passphrase (optional extra security, up to 21 characters).
    #[arg(short, long, env = "WALLE_PASSPHRASE", hide_env_values = true, default_value = "")]
    passphrase: String,

    /// Password sealing the wallet file (10 to 41 characters).
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Use testnet instead of mainnet.
    #[arg(short, long)]
    testnet: bool,
}

impl CreateArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let passphrase = ctx.take_passphrase(&mut self.passphrase)?;
        ctx.ensure_absent()?;

        let network = network_for(self.testnet);
        let mnemonic = Mnemonic::generate(ctx.arena, self.words, passphrase.as_str()?)?;
        let first = ctx.save_new_wallet(&mnemonic, network, &password)?;
        print_new_wallet(mnemonic.sentence()?, !passphrase.is_empty(), network, &first);
        Ok(())
    }
}

/// Arguments for `walle recover`.
#[derive(Args)]
pub struct RecoverArgs {
    /// BIP39 mnemonic phrase.
    #[arg(short, long, env = "WALLE_MNEMONIC", hide_env_values = true)]
    mnemonic: String,

    /// BIP39 passphrase (if used when creating).
    #[arg(short, long, env = "WALLE_PASSPHRASE", hide_env_values = true, default_value = "")]
    passphrase: String,

    /// Password sealing the wallet file (10 to 41 characters).
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Use testnet instead of mainnet.
    #[arg(short, long)]
    testnet: bool,
}

impl RecoverArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let passphrase = ctx.take_passphrase(&mut self.passphrase)?;
        let sentence = ctx.arena.copy_from(self.mnemonic.as_bytes())?;
        self.mnemonic.zeroize();
        ctx.ensure_absent()?;

        let network = network_for(self.testnet);
        let mnemonic = Mnemonic::recover(ctx.arena, sentence.as_str()?, passphrase.as_str()?)?;
        let first = ctx.save_new_wallet(&mnemonic, network, &password)?;
        print_recovered_wallet(network, &first);
        Ok(())
    }
}

/// Arguments for `walle receive`.
#[derive(Args)]
pub struct ReceiveArgs {
    /// Derive a change address instead of a receive address.
    #[arg(short, long)]
    change: bool,

    /// Wallet password.
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,
}

impl ReceiveArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let (account, mut store) = ctx.open_account(&password)?;

        let chain = if self.change { Chain::Change } else { Chain::Receive };
        let start = store.next_index(chain)?;
        let derived = account.derive_next_address(chain, start)?;
        store.insert_address(chain, derived.index, &derived.address)?;

        print_address(&derived);
        Ok(())
    }
}

/// Arguments for `walle addresses`.
#[derive(Args)]
pub struct AddressesArgs {
    /// Only list this chain (receive or change).
    #[arg(long)]
    chain: Option<Chain>,
}

impl AddressesArgs {
    pub fn execute(self, ctx: &WalletContext<'_>) -> CmdResult {
        let store = ctx.store();
        let (_, network) = store.sealed_account()?;
        let chains = match self.chain {
            Some(chain) => vec![chain],
            None => vec![Chain::Receive, Chain::Change],
        };

        println!();
        println!("      {}      {}", "Network".cyan().bold(), network);
        for chain in chains {
            let rows = store.addresses(chain)?;
            println!();
            println!("      {} ({})", chain.name().cyan().bold(), rows.len());
            for row in rows {
                println!("      {:>6}  {}", format!("[{}]", row.index).dimmed(), row.address.green());
            }
        }
        println!();
        Ok(())
    }
}

/// Arguments for `walle keys`.
#[derive(Args)]
pub struct KeysArgs {
    /// Chain of the address (receive or change).
    #[arg(long, default_value = "receive")]
    chain: Chain,

    /// Index of the address within the chain.
    #[arg(short, long, default_value = "0")]
    index: u32,

    /// Wallet password.
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,
}

impl KeysArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let (account, _) = ctx.open_account(&password)?;
        let derived = account.derive_address(self.chain, self.index)?;
        print_keys(&derived);
        Ok(())
    }
}

/// Arguments for `walle account`.
#[derive(Args)]
pub struct AccountArgs {
    /// Also print the extended private key.
    #[arg(long)]
    show_private: bool,

    /// Wallet password.
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,
}

impl AccountArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let (account, _) = ctx.open_account(&password)?;
        let keys = account.extended_keys();
        let path = format!("m/84'/{}'/{}'", account.network().coin_type(), account.account_index());

        println!();
        println!("      {}      {}", "Network".cyan().bold(), account.network());
        println!("      {}         {}", "Path".cyan().bold(), path);
        println!("      {}         {}", "zpub".cyan().bold(), keys.extended_public.green());
        if self.show_private {
            println!("      {}         {}", "zprv".cyan().bold(), keys.extended_private.as_str());
        }
        println!();
        Ok(())
    }
}

/// Arguments for `walle sign`.
#[derive(Args)]
pub struct SignArgs {
    /// Message to sign (UTF-8).
    #[arg(short, long)]
    message: String,

    /// Chain of the signing key (receive or change).
    #[arg(long, default_value = "receive")]
    chain: Chain,

    /// Index of the signing key within the chain.
    #[arg(short, long, default_value = "0")]
    index: u32,

    /// Wallet password.
    #[arg(long, env = "WALLE_PASSWORD", hide_env_values = true)]
    password: String,
}

impl SignArgs {
    pub fn execute(mut self, ctx: &WalletContext<'_>) -> CmdResult {
        let password = ctx.take_password(&mut self.password)?;
        let (account, _) = ctx.open_account(&password)?;
        let derived = account.derive_address(self.chain, self.index)?;
        let signature = account.sign(self.chain, self.index, self.message.as_bytes())?;

        println!();
        println!("      {}      {}", "Address".cyan().bold(), derived.address.green());
        println!("      {}   {}", "Public Key".cyan().bold(), derived.public_key_hex.dimmed());
        println!("      {}            {}", "r".cyan().bold(), hex::encode(signature.r()));
        println!("      {}            {}", "s".cyan().bold(), hex::encode(signature.s()));
        println!("      {}          {}", "DER".cyan().bold(), hex::encode(signature.der()));
        println!();
        Ok(())
    }
}

/// Arguments for `walle check-address`.
#[derive(Args)]
pub struct CheckAddressArgs {
    /// Address to check.
    address: String,
}

impl CheckAddressArgs {
    pub fn execute(self) -> CmdResult {
        let lower = self.address.to_ascii_lowercase();
        let hrp = lower.rfind('1').map_or("", |pos| &lower[..pos]);

        match bech32::verify(hrp, &self.address) {
            Some(variant) => {
                let name = match variant {
                    Variant::Bech32 => "bech32",
                    Variant::Bech32m => "bech32m",
                };
                println!("      {}     {}", "Checksum".cyan().bold(), name.green());
                if let Ok((version, program)) = bech32::segwit_decode(hrp, &self.address) {
                    println!("      {}      v{} ({} byte program)", "Witness".cyan().bold(), version, program.len());
                }
                Ok(())
            }
            None => {
                println!("      {}     {}", "Checksum".cyan().bold(), "invalid".red());
                Err("address checksum is invalid".into())
            }
        }
    }
}

#[rustfmt::skip]
fn print_new_wallet(sentence: &str, has_passphrase: bool, network: Network, first: &DerivedAddress) {
    println!();
    println!("      {}      {}", "Network".cyan().bold(), network);
    println!("      {}     {}", "Mnemonic".cyan().bold(), sentence);
    if has_passphrase {
        println!("      {}   {}", "Passphrase".cyan().bold(), "(set)".dimmed());
    }
    println!();
    println!("      {}", "Write the mnemonic down. It is the only way to recover this wallet.".yellow());
    println!();
    println!("      {}         {}", "Path".cyan().bold(), first.path);
    println!("      {}      {}", "Address".cyan().bold(), first.address.green());
    println!();
}

#[rustfmt::skip]
fn print_recovered_wallet(network: Network, first: &DerivedAddress) {
    println!();
    println!("      {}      {}", "Network".cyan().bold(), network);
    println!("      {}         {}", "Path".cyan().bold(), first.path);
    println!("      {}      {}", "Address".cyan().bold(), first.address.green());
    println!();
}

#[rustfmt::skip]
fn print_address(derived: &DerivedAddress) {
    println!();
    println!("      {}        {}", "Chain".cyan().bold(), derived.chain);
    println!("      {}         {}", "Path".cyan().bold(), derived.path);
    println!("      {}      {}", "Address".cyan().bold(), derived.address.green());
    println!();
}

#[rustfmt::skip]
fn print_keys(derived: &DerivedAddress) {
    println!();
    println!("      {}         {}", "Path".cyan().bold(), derived.path);
    println!("      {}      {}", "Address".cyan().bold(), derived.address.green());
    println!("      {}   {}", "Public Key".cyan().bold(), derived.public_key_hex.dimmed());
    println!("      {}  {}", "Private Key".cyan().bold(), derived.private_key_wif.as_str());
    println!();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::tests::temp_dir;

    const ABANDON_ABOUT: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const PASSWORD: &str = "wallet password";

    fn arena() -> SecureArena {
        SecureArena::for_tests(walle::arena::DEFAULT_CAPACITY)
    }

    fn recover_into(ctx: &WalletContext<'_>) {
        RecoverArgs {
            mnemonic: ABANDON_ABOUT.to_string(),
            passphrase: String::new(),
            password: PASSWORD.to_string(),
            testnet: false,
        }
        .execute(ctx)
        .unwrap();
    }

    #[test]
    fn test_recover_then_receive() {
        let dir = temp_dir("cli-receive");
        let arena = arena();
        let ctx = WalletContext::new(Some(dir.clone()), &arena).unwrap();
        recover_into(&ctx);

        let store = ctx.store();
        let rows = store.addresses(Chain::Receive).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");

        ReceiveArgs {
            change: false,
            password: PASSWORD.to_string(),
        }
        .execute(&ctx)
        .unwrap();
        ReceiveArgs {
            change: true,
            password: PASSWORD.to_string(),
        }
        .execute(&ctx)
        .unwrap();

        let receive = store.addresses(Chain::Receive).unwrap();
        assert_eq!(receive[1].address, "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g");
        let change = store.addresses(Chain::Change).unwrap();
        assert_eq!(change[0].address, "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el");

        assert_eq!(arena.in_use(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_create_then_open_returns_every_lease() {
        let dir = temp_dir("cli-create");
        let arena = arena();
        let ctx = WalletContext::new(Some(dir.clone()), &arena).unwrap();
        CreateArgs {
            words: 24,
            passphrase: "extra words".to_string(),
            password: PASSWORD.to_string(),
            testnet: true,
        }
        .execute(&ctx)
        .unwrap();
        assert_eq!(arena.in_use(), 0);

        let password = arena.copy_from(PASSWORD.as_bytes()).unwrap();
        let (account, store) = ctx.open_account(&password).unwrap();
        assert_eq!(account.network(), Network::Testnet);
        let rows = store.addresses(Chain::Receive).unwrap();
        let first = &rows[0];
        assert_eq!(
            account.derive_address(Chain::Receive, first.index).unwrap().address,
            first.address
        );
        assert_eq!(arena.in_use(), PASSWORD.len());
        drop(password);
        assert_eq!(arena.in_use(), 0);

        AccountArgs {
            show_private: false,
            password: PASSWORD.to_string(),
        }
        .execute(&ctx)
        .unwrap();
        assert_eq!(arena.in_use(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let dir = temp_dir("cli-password");
        let arena = arena();
        let ctx = WalletContext::new(Some(dir.clone()), &arena).unwrap();
        recover_into(&ctx);

        let err = ctx
            .open_account(&arena.copy_from(b"not the password").unwrap())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<walle::Error>(),
            Some(&walle::Error::AuthenticationFailed)
        );
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_existing_wallet_not_overwritten() {
        let dir = temp_dir("cli-exists");
        let arena = arena();
        let ctx = WalletContext::new(Some(dir.clone()), &arena).unwrap();
        recover_into(&ctx);

        let err = RecoverArgs {
            mnemonic: ABANDON_ABOUT.to_string(),
            passphrase: String::new(),
            password: PASSWORD.to_string(),
            testnet: false,
        }
        .execute(&ctx)
        .unwrap_err();
        assert!(err.downcast_ref::<StoreError>().is_some());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_short_password_rejected_before_any_work() {
        let dir = temp_dir("cli-short");
        let arena = arena();
        let ctx = WalletContext::new(Some(dir.clone()), &arena).unwrap();
        let err = CreateArgs {
            words: 12,
            passphrase: String::new(),
            password: "short".to_string(),
            testnet: false,
        }
        .execute(&ctx)
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<walle::Error>(),
            Some(walle::Error::InvalidParameter(_))
        ));
        assert!(!ctx.store().exists());
    }

    #[test]
    fn test_check_address() {
        let ok = CheckAddressArgs {
            address: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string(),
        };
        assert!(ok.execute().is_ok());
        let bad = CheckAddressArgs {
            address: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5".to_string(),
        };
        assert!(bad.execute().is_err());
    }
}
