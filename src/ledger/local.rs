//! File-backed local ledger
//!
//! Stands in for the network during development. Transactions are checked
//! the way a consensus node would check them: validity window, duplicate ids,
//! fees, signatures and key policies. Accepted transactions update the
//! account table, which is saved to `ledger.json` after every change.

use crate::core::{
    AccountId, Clock, Hbar, Key, Transaction, TransactionId, TransactionKind,
    DEFAULT_NODE_ACCOUNT,
};
use crate::crypto::PublicKey;
use crate::ledger::client::{AccountInfo, LedgerClient, LedgerError, Receipt, Status};
use crate::ledger::storage::Storage;
use chrono::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Balance of the operator account created by `init`
pub const GENESIS_BALANCE: Hbar = Hbar::new(1_000);

/// Flat fee charged to the payer of every accepted transaction
pub const TRANSACTION_FEE: Hbar = Hbar::from_tinybars(100_000);

/// How far ahead of the ledger clock a valid start may be
pub const MAX_CLOCK_SKEW_SECS: i64 = 10;

/// First number handed out to created accounts
pub const FIRST_ACCOUNT_NUM: u64 = 1001;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AccountRecord {
    key: Key,
    balance: Hbar,
}

/// Everything persisted between runs
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LedgerState {
    nodes: Vec<AccountId>,
    accounts: BTreeMap<AccountId, AccountRecord>,
    next_account_num: u64,
    seen: BTreeSet<TransactionId>,
}

/// A single-process ledger
pub struct LocalLedger {
    state: LedgerState,
    clock: Box<dyn Clock>,
    storage: Option<Storage>,
}

fn reject<T>(status: Status) -> Result<T, LedgerError> {
    Err(LedgerError::Rejected(status))
}

impl LocalLedger {
    /// In-memory ledger holding only the operator account
    pub fn genesis(operator: AccountId, key: Key, balance: Hbar, clock: Box<dyn Clock>) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(operator, AccountRecord { key, balance });

        Self {
            state: LedgerState {
                nodes: vec![DEFAULT_NODE_ACCOUNT],
                accounts,
                next_account_num: FIRST_ACCOUNT_NUM,
                seen: BTreeSet::new(),
            },
            clock,
            storage: None,
        }
    }

    /// Create a fresh ledger in `data_dir`, replacing any existing one
    pub fn init(
        data_dir: &Path,
        operator: AccountId,
        key: PublicKey,
        clock: Box<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::genesis(operator, Key::Single(key), GENESIS_BALANCE, clock);
        ledger.storage = Some(Storage::new(data_dir)?);
        ledger.save()?;
        info!("Initialized ledger at {}", data_dir.display());
        Ok(ledger)
    }

    /// Load the ledger saved in `data_dir`
    pub fn open(data_dir: &Path, clock: Box<dyn Clock>) -> Result<Self, LedgerError> {
        let storage = Storage::new(data_dir)?;
        if !storage.exists() {
            return Err(LedgerError::NotInitialized(data_dir.display().to_string()));
        }
        let state: LedgerState = storage.load()?;
        debug!(
            "Loaded ledger with {} accounts from {}",
            state.accounts.len(),
            storage.path().display()
        );

        Ok(Self {
            state,
            clock,
            storage: Some(storage),
        })
    }

    /// Whether `data_dir` already holds a ledger
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(crate::ledger::storage::LEDGER_FILE).exists()
    }

    /// Write the state to disk. A no-op for in-memory ledgers.
    pub fn save(&self) -> Result<(), LedgerError> {
        if let Some(storage) = &self.storage {
            storage.save(&self.state)?;
        }
        Ok(())
    }

    /// All accounts in id order
    pub fn accounts(&self) -> Vec<AccountInfo> {
        self.state
            .accounts
            .iter()
            .map(|(id, record)| AccountInfo {
                account_id: *id,
                key: record.key.clone(),
                balance: record.balance,
            })
            .collect()
    }

    fn record(&self, account_id: &AccountId) -> Option<&AccountRecord> {
        self.state.accounts.get(account_id)
    }

    /// Run every check, then apply. Nothing changes on rejection.
    fn execute(&mut self, transaction: &Transaction) -> Result<Receipt, LedgerError> {
        let transaction_id = *transaction.transaction_id();

        if !transaction
            .node_account_ids()
            .iter()
            .any(|node| self.state.nodes.contains(node))
        {
            return reject(Status::InvalidNodeAccount);
        }

        let now = self.clock.now();
        if transaction.is_expired_at(now) {
            return reject(Status::TransactionExpired);
        }
        if transaction_id.valid_start.to_datetime() > now + Duration::seconds(MAX_CLOCK_SKEW_SECS) {
            return reject(Status::InvalidTransactionStart);
        }

        if self.state.seen.contains(&transaction_id) {
            return reject(Status::DuplicateTransaction);
        }

        let payer = transaction_id.account_id;
        let Some(payer_record) = self.record(&payer) else {
            return reject(Status::PayerAccountNotFound);
        };

        if TRANSACTION_FEE > transaction.max_transaction_fee() {
            return reject(Status::InsufficientTxFee);
        }
        if payer_record.balance < TRANSACTION_FEE {
            return reject(Status::InsufficientPayerBalance);
        }

        let invalid = transaction.invalid_signers()?;
        if !invalid.is_empty() {
            warn!("{} carries {} invalid signature(s)", transaction_id, invalid.len());
            return reject(Status::InvalidSignature);
        }

        let signers = transaction.signers();
        if !payer_record.key.is_satisfied_by(&signers) {
            return reject(Status::InvalidSignature);
        }

        // Balances after this transaction, applied only once every check passes
        let mut balances: BTreeMap<AccountId, Hbar> = BTreeMap::new();
        let mut created = None;
        let mut new_key = None;

        let payer_after = payer_record
            .balance
            .checked_sub(TRANSACTION_FEE)
            .ok_or(LedgerError::Rejected(Status::InsufficientPayerBalance))?;
        balances.insert(payer, payer_after);

        match transaction.kind() {
            TransactionKind::Transfer { transfers } => {
                let total = transfers
                    .iter()
                    .try_fold(Hbar::ZERO, |sum, t| sum.checked_add(t.amount));
                if total != Some(Hbar::ZERO) {
                    return reject(Status::InvalidAccountAmounts);
                }

                for transfer in transfers {
                    let Some(record) = self.record(&transfer.account_id) else {
                        return reject(Status::InvalidAccountId);
                    };
                    if transfer.amount.is_negative() && !record.key.is_satisfied_by(&signers) {
                        return reject(Status::InvalidSignature);
                    }

                    let current = balances
                        .get(&transfer.account_id)
                        .copied()
                        .unwrap_or(record.balance);
                    let updated = current
                        .checked_add(transfer.amount)
                        .filter(|b| !b.is_negative())
                        .ok_or(LedgerError::Rejected(Status::InsufficientAccountBalance))?;
                    balances.insert(transfer.account_id, updated);
                }
            }
            TransactionKind::AccountUpdate { account_id, key } => {
                let Some(record) = self.record(account_id) else {
                    return reject(Status::InvalidAccountId);
                };
                if key.is_empty() {
                    return reject(Status::KeyRequired);
                }
                if !record.key.is_satisfied_by(&signers) {
                    debug!("{}: current key of {} not satisfied", transaction_id, account_id);
                    return reject(Status::InvalidSignature);
                }
                if !key.is_satisfied_by(&signers) {
                    debug!("{}: new key of {} not satisfied", transaction_id, account_id);
                    return reject(Status::InvalidSignature);
                }
                new_key = Some((*account_id, key.clone()));
            }
            TransactionKind::AccountCreate {
                key,
                initial_balance,
            } => {
                if key.is_empty() {
                    return reject(Status::KeyRequired);
                }
                if initial_balance.is_negative() {
                    return reject(Status::InvalidAccountAmounts);
                }
                let payer_after = payer_after
                    .checked_sub(*initial_balance)
                    .filter(|b| !b.is_negative())
                    .ok_or(LedgerError::Rejected(Status::InsufficientPayerBalance))?;
                balances.insert(payer, payer_after);

                let account_id = AccountId::from_num(self.state.next_account_num);
                created = Some((
                    account_id,
                    AccountRecord {
                        key: key.clone(),
                        balance: *initial_balance,
                    },
                ));
            }
            TransactionKind::ContractCall { gas, .. } => {
                if *gas == 0 {
                    return reject(Status::InsufficientGas);
                }
            }
        }

        for (account_id, balance) in balances {
            if let Some(record) = self.state.accounts.get_mut(&account_id) {
                record.balance = balance;
            }
        }
        if let Some((account_id, key)) = new_key {
            if let Some(record) = self.state.accounts.get_mut(&account_id) {
                record.key = key;
            }
        }

        let mut receipt = Receipt::success(transaction_id);
        if let Some((account_id, record)) = created {
            self.state.accounts.insert(account_id, record);
            self.state.next_account_num += 1;
            receipt.account_id = Some(account_id);
        }
        self.state.seen.retain(|id| id.expires_at() > now);
        self.state.seen.insert(transaction_id);

        Ok(receipt)
    }
}

impl LedgerClient for LocalLedger {
    fn submit(&mut self, transaction: &Transaction) -> Result<Receipt, LedgerError> {
        match self.execute(transaction) {
            Ok(receipt) => {
                self.save()?;
                info!(
                    "{} {} reached consensus",
                    transaction.kind().name(),
                    receipt.transaction_id
                );
                Ok(receipt)
            }
            Err(LedgerError::Rejected(status)) => {
                warn!("{} rejected: {}", transaction.transaction_id(), status);
                Err(LedgerError::Rejected(status))
            }
            Err(e) => Err(e),
        }
    }

    fn account_info(&self, account_id: &AccountId) -> Result<AccountInfo, LedgerError> {
        let record = self
            .record(account_id)
            .ok_or(LedgerError::AccountNotFound(*account_id))?;
        Ok(AccountInfo {
            account_id: *account_id,
            key: record.key.clone(),
            balance: record.balance,
        })
    }
}
