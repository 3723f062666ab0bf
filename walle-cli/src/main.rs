//! Walle - a command-line Bitcoin wallet.
//!
//! Creates and recovers BIP-84 wallets, hands out receive and change
//! addresses, and keeps the account key sealed under a password.

mod commands;
mod store;

use clap::Parser;
use commands::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walle::arena::{SecureArena, DEFAULT_CAPACITY};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "walle=debug,walle_btc=debug,walle_cli=debug"
    } else {
        "walle=warn,walle_btc=warn,walle_cli=warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let arena = SecureArena::init(DEFAULT_CAPACITY)?;
    let result = cli.execute(&arena);
    arena.teardown();
    result
}
