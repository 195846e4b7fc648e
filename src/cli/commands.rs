//! CLI commands for the multisig signer
//!
//! Implements all command handlers for the CLI interface.

use crate::cli::config::{parse_csv, parse_var, ConfigError, OperatorConfig};
use crate::cli::config::{MULTI_SIG_ADJUST_ACCOUNT, MULTI_SIG_PRIVATE_KEYS, MULTI_SIG_THRESHOLD};
use crate::cli::prompt::confirm_stdio;
use crate::core::{build_threshold_key, AccountId, Hbar, Key, SystemClock, ThresholdKey, Transaction};
use crate::crypto::{KeyPair, PublicKey};
use crate::ledger::{submit_and_report, LedgerClient, LocalLedger, Receipt};
use crate::multisig::{
    create_multisig_account, decode_transaction, describe, resolve_old_authority,
    sign_contributions, transfer_from_account, update_account_keys, Coordinator, ExpectedCount,
    KeyAuthority, MalformedLinePolicy, TerminalSource, COPY_MARKER,
};
use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, StdinLock, Stdout};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Initial balance of accounts created by `new-account`
pub const DEFAULT_INITIAL_BALANCE: Hbar = Hbar::new(10);

type TerminalCoordinator = Coordinator<TerminalSource<StdinLock<'static>, Stdout>, SystemClock, Stdout>;

/// Everything a command needs besides its own arguments
pub struct AppContext {
    pub config: OperatorConfig,
    pub data_dir: PathBuf,
    pub policy: MalformedLinePolicy,
    pub expected: ExpectedCount,
}

impl AppContext {
    /// Read configuration from the environment
    ///
    /// Without `expected`, each collection round asks the operator how many
    /// signatures to read.
    pub fn new(data_dir: PathBuf, skip_malformed: bool, expected: Option<usize>) -> CliResult<Self> {
        let (policy, expected) = collection_settings(skip_malformed, expected);
        Ok(Self {
            config: OperatorConfig::from_env()?,
            data_dir,
            policy,
            expected,
        })
    }

    /// Open the ledger for the configured environment
    pub fn ledger(&self) -> CliResult<LocalLedger> {
        self.config.require_local()?;
        Ok(LocalLedger::open(&self.data_dir, Box::new(SystemClock))?)
    }

    /// A coordinator reading pasted signatures from the terminal.
    /// Holds the stdin lock, so build it after any confirmation prompt.
    fn coordinator(&self) -> TerminalCoordinator {
        Coordinator::new(TerminalSource::stdio(), SystemClock, io::stdout())
            .with_policy(self.policy)
            .with_expected(self.expected)
    }

    /// The account to operate on: `--account`, else MULTI_SIG_ADJUST_ACCOUNT
    fn target_account(&self, account: Option<AccountId>) -> Result<AccountId, ConfigError> {
        account
            .or(self.config.adjust_account)
            .ok_or(ConfigError::Missing(MULTI_SIG_ADJUST_ACCOUNT))
    }

    /// Threshold key from flags, falling back to the environment
    fn threshold_key(
        &self,
        threshold: Option<u32>,
        public_keys: Option<&str>,
    ) -> CliResult<ThresholdKey> {
        let keys: Vec<PublicKey> = match public_keys {
            Some(csv) => parse_csv("--public-keys", csv)?,
            None => self.config.public_keys.clone(),
        };
        let threshold = threshold
            .or(self.config.threshold)
            .ok_or(ConfigError::Missing(MULTI_SIG_THRESHOLD))?;

        for key in &keys {
            println!("   ➕ Adding public key: {}", key);
        }
        Ok(build_threshold_key(keys, threshold)?)
    }

    fn print_payer(&self) -> CliResult<()> {
        let operator = self.config.operator()?;
        println!("   💳 Using account {} as payer", operator.account_id);
        println!("   🌐 Using environment: {}", self.config.environment);
        Ok(())
    }
}

fn collection_settings(
    skip_malformed: bool,
    expected: Option<usize>,
) -> (MalformedLinePolicy, ExpectedCount) {
    let policy = if skip_malformed {
        MalformedLinePolicy::Skip
    } else {
        MalformedLinePolicy::Abort
    };
    (policy, expected.map_or(ExpectedCount::Ask, ExpectedCount::Fixed))
}

fn aborted() -> CliResult<()> {
    println!("🚫 User aborted");
    Ok(())
}

/// Print a receipt and, on success, return it
fn report(ledger: &mut LocalLedger, transaction: &Transaction, label: &str) -> CliResult<Receipt> {
    match submit_and_report(ledger, transaction) {
        Ok(receipt) => {
            println!("✅ {}: {}", label, receipt.status);
            Ok(receipt)
        }
        Err(e) => {
            println!("❌ {}: {}", label, e);
            Err(e.into())
        }
    }
}

/// Initialize the local ledger with the operator account
pub fn cmd_init(ctx: &AppContext, force: bool) -> CliResult<()> {
    ctx.config.require_local()?;
    let operator = ctx.config.operator()?;

    if LocalLedger::exists(&ctx.data_dir) && !force {
        println!("⚠️  Ledger already exists at {:?}", ctx.data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let ledger = LocalLedger::init(
        &ctx.data_dir,
        operator.account_id,
        operator.key.public_key(),
        Box::new(SystemClock),
    )?;
    let info = ledger.account_info(&operator.account_id)?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", ctx.data_dir);
    println!("   👤 Operator: {}", info.account_id);
    println!("   💰 Balance: {}", info.balance);

    Ok(())
}

/// Key file text: private key, public key, then the recovery phrase
pub fn key_file_contents(key_pair: &KeyPair, mnemonic: &Mnemonic) -> String {
    format!(
        "New Private Key:\n{}\nNew Public Key:\n{}\nMnemonic:\n{}\n",
        key_pair.private_key_hex(),
        key_pair.public_key_hex(),
        mnemonic
    )
}

/// Write `contents` to `PK-<timestamp>.txt` in `dir` and read it back
pub fn save_key_file(dir: &Path, contents: &str, now: DateTime<Utc>) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("PK-{}.txt", now.format("%Y-%m-%dT%H-%M-%S")));
    fs::write(&path, contents)?;

    if fs::read_to_string(&path)? != contents {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} did not read back as written", path.display()),
        ));
    }
    Ok(path)
}

/// Generate a new key pair, optionally saving it to a file
pub fn cmd_generate(dir: &Path, save: bool) -> CliResult<()> {
    println!("🔐 Generating new keys...");
    let (key_pair, mnemonic) = KeyPair::generate_with_mnemonic()?;
    let contents = key_file_contents(&key_pair, &mnemonic);

    let save = confirm_stdio(
        "Do you want to save your new generated keys to file?\n\
         **HIGHLY RECOMMENDED as if lost the wallet could become inaccessible**",
        save,
    )?;

    if !save {
        println!("{}", contents);
        return Ok(());
    }

    match save_key_file(dir, &contents, Utc::now()) {
        Ok(path) => println!("💾 Keys saved to {}", path.display()),
        Err(e) => {
            log::error!("Could not save keys: {}", e);
            println!("❌ Could not save keys, printing instead:\n{}", contents);
            return Err(e.into());
        }
    }

    Ok(())
}

/// Decode and display a transaction blob. Returns `None` when no blob was given.
pub fn cmd_query(ctx: &AppContext, bytes: Option<String>) -> CliResult<Option<Transaction>> {
    let Some(blob) = bytes.or_else(|| ctx.config.transaction_bytes.clone()) else {
        println!("📭 No tx supplied to query - exiting");
        return Ok(None);
    };

    println!("\n-Decoding...");
    let transaction = decode_transaction(&blob)?;

    println!("\n🔍 Proposed transaction:");
    println!("{}", describe(&transaction));

    Ok(Some(transaction))
}

/// Review a transaction and produce one signature line per private key
pub fn cmd_sign(
    ctx: &AppContext,
    bytes: Option<String>,
    private_keys: Option<String>,
    yes: bool,
) -> CliResult<()> {
    let Some(transaction) = cmd_query(ctx, bytes)? else {
        return Ok(());
    };

    if !confirm_stdio("Do you want to sign the proposed tx?", yes)? {
        return aborted();
    }

    let keys: Vec<KeyPair> = match private_keys {
        Some(csv) => parse_csv("--private-keys", &csv)?,
        None => ctx.config.private_keys.clone(),
    };
    if keys.is_empty() {
        return Err(ConfigError::Missing(MULTI_SIG_PRIVATE_KEYS).into());
    }
    println!("\n🔑 {} private key(s) loaded", keys.len());

    for (index, contribution) in sign_contributions(&transaction, &keys)?.iter().enumerate() {
        println!("\n✍️  Signed - tx@{} *\n{}\n{}\n{}", index, COPY_MARKER, contribution, COPY_MARKER);
    }

    Ok(())
}

/// Create an account secured by a threshold key
pub fn cmd_new_account(
    ctx: &AppContext,
    threshold: Option<u32>,
    public_keys: Option<String>,
    initial_balance: Option<Hbar>,
    yes: bool,
) -> CliResult<()> {
    let operator = ctx.config.operator()?;
    let mut ledger = ctx.ledger()?;
    let initial_balance = initial_balance.unwrap_or(DEFAULT_INITIAL_BALANCE);

    ctx.print_payer()?;
    println!("   💰 Initial balance: {}", initial_balance);
    let threshold_key = ctx.threshold_key(threshold, public_keys.as_deref())?;
    println!("   🔐 Key structure: {}", threshold_key.description());

    if !confirm_stdio("Do you want to create the account as a multi signature wallet?", yes)? {
        return aborted();
    }

    let transaction = create_multisig_account(threshold_key, initial_balance, &operator)?;
    let receipt = report(&mut ledger, &transaction, "Account create")?;

    if let Some(account_id) = receipt.account_id {
        println!("\n📝 Please note down the new account ID: {}", account_id);
    }

    Ok(())
}

/// Switch an account between its current key and a threshold key, or back
/// to the operator's single key with `single_key`
pub fn cmd_convert(
    ctx: &AppContext,
    account: Option<AccountId>,
    threshold: Option<u32>,
    public_keys: Option<String>,
    old_key: Option<String>,
    single_key: bool,
    yes: bool,
) -> CliResult<()> {
    let operator = ctx.config.operator()?;
    let mut ledger = ctx.ledger()?;
    let account = ctx.target_account(account)?;
    let current = ledger.account_info(&account)?.key;

    ctx.print_payer()?;
    println!("   🎯 Account: {} (currently {})", account, current.description());

    let explicit_old: Option<KeyPair> = match old_key {
        Some(hex) => Some(parse_var("--old-key", &hex)?),
        None => ctx.config.old_key.clone(),
    };
    if explicit_old.is_some() {
        println!("   🔑 Using supplied old key");
    }
    let old = resolve_old_authority(&current, explicit_old, &operator)?;

    let (new, question) = if single_key {
        (
            KeyAuthority::Signer(operator.key.clone()),
            "Do you want to revert the account to a single signature wallet?",
        )
    } else {
        let threshold_key = ctx.threshold_key(threshold, public_keys.as_deref())?;
        println!("   🔐 New key structure: {}", threshold_key.description());
        println!("\n⚠️  Account update requires the new keys to sign too\n");
        (
            KeyAuthority::Threshold(threshold_key),
            "Do you want to change the account to a multiSig wallet?",
        )
    };

    if !confirm_stdio(question, yes)? {
        return aborted();
    }

    let mut coordinator = ctx.coordinator();
    let transaction = update_account_keys(&mut coordinator, account, &old, &new, &operator)?;
    report(&mut ledger, &transaction, "Account update")?;

    Ok(())
}

/// Replace the threshold key on a multisig account with a new one
pub fn cmd_update(
    ctx: &AppContext,
    account: Option<AccountId>,
    threshold: Option<u32>,
    public_keys: Option<String>,
    yes: bool,
) -> CliResult<()> {
    let operator = ctx.config.operator()?;
    let mut ledger = ctx.ledger()?;
    let account = ctx.target_account(account)?;
    let current = ledger.account_info(&account)?.key;

    ctx.print_payer()?;
    println!("   🎯 Account: {} (currently {})", account, current.description());

    let old = resolve_old_authority(&current, None, &operator)?;
    let threshold_key = ctx.threshold_key(threshold, public_keys.as_deref())?;
    println!("   🔐 New key structure: {}", threshold_key.description());

    if !confirm_stdio("Do you want to update the multisig on the wallet?", yes)? {
        return aborted();
    }

    let mut coordinator = ctx.coordinator();
    let transaction = update_account_keys(
        &mut coordinator,
        account,
        &old,
        &KeyAuthority::Threshold(threshold_key),
        &operator,
    )?;
    report(&mut ledger, &transaction, "Account update")?;

    Ok(())
}

/// Move hbar out of an account, collecting its signatures if it is multisig
pub fn cmd_transfer(
    ctx: &AppContext,
    from: Option<AccountId>,
    to: AccountId,
    amount: Hbar,
) -> CliResult<()> {
    let operator = ctx.config.operator()?;
    let mut ledger = ctx.ledger()?;
    let from = ctx.target_account(from)?;
    let from_key = resolve_old_authority(&ledger.account_info(&from)?.key, None, &operator)?;

    println!("📤 Transfer {} from {} to {}", amount, from, to);

    let mut coordinator = ctx.coordinator();
    let transaction =
        transfer_from_account(&mut coordinator, from, &from_key, to, amount, &operator)?;
    report(&mut ledger, &transaction, "Transfer")?;

    Ok(())
}

fn print_key(key: &Key) {
    match key {
        Key::Single(public_key) => println!("   └─ 🔑 {}", public_key),
        Key::Threshold(threshold_key) => {
            println!("   └─ 🔐 {}", threshold_key.description());
            for public_key in threshold_key.keys() {
                println!("      └─ {}", public_key);
            }
        }
    }
}

/// Show an account's key and balance
pub fn cmd_info(ctx: &AppContext, account: AccountId) -> CliResult<()> {
    let info = ctx.ledger()?.account_info(&account)?;

    println!("👤 Account {}", info.account_id);
    println!("   ├─ 💰 Balance: {}", info.balance);
    print_key(&info.key);

    Ok(())
}

/// List every account on the ledger
pub fn cmd_balance(ctx: &AppContext) -> CliResult<()> {
    let ledger = ctx.ledger()?;

    println!("📋 Accounts:");
    for info in ledger.accounts() {
        println!("   {} - {} ({})", info.account_id, info.balance, info.key.description());
    }

    Ok(())
}
