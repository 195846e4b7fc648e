//! Multisig Signer CLI Application
//!
//! A command-line interface for offline multi-signature co-signing.

use clap::{Parser, Subcommand};
use multisig_signer::cli::{self, AppContext};
use multisig_signer::core::{AccountId, Hbar};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig-signer")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Offline multi-signature co-signing for threshold-key accounts", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, global = true, default_value = ".multisig_data")]
    data_dir: PathBuf,

    /// Ignore undecodable signature lines instead of aborting
    #[arg(long, global = true)]
    skip_malformed: bool,

    /// Signature lines to read per collection round (asked for when omitted)
    #[arg(long, global = true)]
    expected: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local ledger with the operator account
    Init {
        /// Replace an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Create a new public / private key pair
    Generate {
        /// Save the keys to a file without asking
        #[arg(long)]
        save: bool,
    },

    /// Display the details of a transaction (else MULTI_SIG_BYTES)
    Query {
        /// Transaction bytes as base64
        #[arg(short, long)]
        bytes: Option<String>,
    },

    /// Query, then sign a transaction with one or more private keys
    Sign {
        /// Transaction bytes as base64
        #[arg(short, long)]
        bytes: Option<String>,

        /// Private keys as csv (else MULTI_SIG_PRIVATE_KEYS)
        #[arg(long)]
        private_keys: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Create a new account secured by a threshold key
    NewAccount {
        /// Signatures required (else MULTI_SIG_THRESHOLD)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Public keys as csv (else MULTI_SIG_PUBLIC_KEYS)
        #[arg(long)]
        public_keys: Option<String>,

        /// Initial balance in hbar
        #[arg(long)]
        initial_balance: Option<Hbar>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Convert an account to multisig, or back to the operator's single key
    Convert {
        /// Account to operate on (else MULTI_SIG_ADJUST_ACCOUNT)
        #[arg(short, long)]
        account: Option<AccountId>,

        /// Signatures required (else MULTI_SIG_THRESHOLD)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Public keys as csv (else MULTI_SIG_PUBLIC_KEYS)
        #[arg(long)]
        public_keys: Option<String>,

        /// Private key currently securing the account (else OLD_KEY, then the operator key)
        #[arg(long)]
        old_key: Option<String>,

        /// Revert to the operator's single key
        #[arg(long)]
        single_key: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Update a multisig account to a new threshold key
    Update {
        /// Account to operate on (else MULTI_SIG_ADJUST_ACCOUNT)
        #[arg(short, long)]
        account: Option<AccountId>,

        /// Signatures required (else MULTI_SIG_THRESHOLD)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Public keys as csv (else MULTI_SIG_PUBLIC_KEYS)
        #[arg(long)]
        public_keys: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Send hbar from an account, collecting its signatures
    Transfer {
        /// Sending account (else MULTI_SIG_ADJUST_ACCOUNT)
        #[arg(short, long)]
        from: Option<AccountId>,

        /// Receiving account
        #[arg(long)]
        to: AccountId,

        /// Amount in hbar
        #[arg(long)]
        amount: Hbar,
    },

    /// Show an account's key and balance
    Info {
        /// Account to show
        #[arg(short, long)]
        account: AccountId,
    },

    /// List all accounts and balances
    Balance,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir;
    let (skip_malformed, expected) = (cli.skip_malformed, cli.expected);
    let context = || AppContext::new(data_dir.clone(), skip_malformed, expected);

    match cli.command {
        Commands::Generate { save } => {
            cli::cmd_generate(&data_dir, save)?;
        }

        Commands::Init { force } => {
            cli::cmd_init(&context()?, force)?;
        }

        Commands::Query { bytes } => {
            cli::cmd_query(&context()?, bytes)?;
        }

        Commands::Sign {
            bytes,
            private_keys,
            yes,
        } => {
            cli::cmd_sign(&context()?, bytes, private_keys, yes)?;
        }

        Commands::NewAccount {
            threshold,
            public_keys,
            initial_balance,
            yes,
        } => {
            cli::cmd_new_account(&context()?, threshold, public_keys, initial_balance, yes)?;
        }

        Commands::Convert {
            account,
            threshold,
            public_keys,
            old_key,
            single_key,
            yes,
        } => {
            cli::cmd_convert(&context()?, account, threshold, public_keys, old_key, single_key, yes)?;
        }

        Commands::Update {
            account,
            threshold,
            public_keys,
            yes,
        } => {
            cli::cmd_update(&context()?, account, threshold, public_keys, yes)?;
        }

        Commands::Transfer { from, to, amount } => {
            cli::cmd_transfer(&context()?, from, to, amount)?;
        }

        Commands::Info { account } => {
            cli::cmd_info(&context()?, account)?;
        }

        Commands::Balance => {
            cli::cmd_balance(&context()?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_parses_without_context() {
        let cli = Cli::try_parse_from(["multisig-signer", "generate", "--save"]).unwrap();
        assert!(matches!(cli.command, Commands::Generate { save: true }));
        assert_eq!(cli.expected, None);
    }

    #[test]
    fn test_expected_is_global() {
        let cli = Cli::try_parse_from([
            "multisig-signer",
            "transfer",
            "--to",
            "0.0.2",
            "--amount",
            "1",
            "--expected",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.expected, Some(3));
        assert!(matches!(cli.command, Commands::Transfer { from: None, .. }));
    }
}
