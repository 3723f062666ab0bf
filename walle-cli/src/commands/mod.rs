//! CLI command definitions and handlers.

mod wallet;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use walle::SecureArena;

pub use wallet::WalletContext;

/// Walle - a command-line Bitcoin wallet.
#[derive(Parser)]
#[command(name = "walle")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the wallet file (default: ~/.walle).
    #[arg(long, global = true, env = "WALLE_DIR")]
    pub wallet_dir: Option<PathBuf>,

    /// Log engine activity to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available wallet commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new wallet with a fresh mnemonic.
    Create(wallet::CreateArgs),

    /// Recover a wallet from an existing mnemonic.
    Recover(wallet::RecoverArgs),

    /// Derive and record the next receive (or change) address.
    Receive(wallet::ReceiveArgs),

    /// List recorded addresses.
    #[command(alias = "show")]
    Addresses(wallet::AddressesArgs),

    /// Show the keys of one address.
    Keys(wallet::KeysArgs),

    /// Show the account extended keys.
    Account(wallet::AccountArgs),

    /// Sign a message with an address key.
    Sign(wallet::SignArgs),

    /// Check the checksum of a Bech32 address.
    CheckAddress(wallet::CheckAddressArgs),
}

impl Cli {
    /// Execute the selected command.
    pub fn execute(self, arena: &SecureArena) -> Result<(), Box<dyn std::error::Error>> {
        let ctx = WalletContext::new(self.wallet_dir, arena)?;
        match self.command {
            Commands::Create(args) => args.execute(&ctx)?,
            Commands::Recover(args) => args.execute(&ctx)?,
            Commands::Receive(args) => args.execute(&ctx)?,
            Commands::Addresses(args) => args.execute(&ctx)?,
            Commands::Keys(args) => args.execute(&ctx)?,
            Commands::Account(args) => args.execute(&ctx)?,
            Commands::Sign(args) => args.execute(&ctx)?,
            Commands::CheckAddress(args) => args.execute()?,
        }
        Ok(())
    }
}
