//! Submission interface and receipts

use crate::core::{AccountId, Hbar, Key, Transaction, TransactionError, TransactionId};
use crate::ledger::storage::StorageError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Final status of a submitted transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    InvalidNodeAccount,
    TransactionExpired,
    InvalidTransactionStart,
    DuplicateTransaction,
    PayerAccountNotFound,
    InsufficientTxFee,
    InsufficientPayerBalance,
    InvalidSignature,
    InvalidAccountId,
    InvalidAccountAmounts,
    InsufficientAccountBalance,
    InsufficientGas,
    KeyRequired,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::InvalidNodeAccount => "INVALID_NODE_ACCOUNT",
            Status::TransactionExpired => "TRANSACTION_EXPIRED",
            Status::InvalidTransactionStart => "INVALID_TRANSACTION_START",
            Status::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Status::PayerAccountNotFound => "PAYER_ACCOUNT_NOT_FOUND",
            Status::InsufficientTxFee => "INSUFFICIENT_TX_FEE",
            Status::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Status::InvalidSignature => "INVALID_SIGNATURE",
            Status::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Status::InvalidAccountAmounts => "INVALID_ACCOUNT_AMOUNTS",
            Status::InsufficientAccountBalance => "INSUFFICIENT_ACCOUNT_BALANCE",
            Status::InsufficientGas => "INSUFFICIENT_GAS",
            Status::KeyRequired => "KEY_REQUIRED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an accepted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: Status,
    pub transaction_id: TransactionId,
    /// Set when the transaction created an account
    pub account_id: Option<AccountId>,
}

impl Receipt {
    pub fn success(transaction_id: TransactionId) -> Self {
        Self {
            status: Status::Success,
            transaction_id,
            account_id: None,
        }
    }
}

/// Current state of an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub key: Key,
    pub balance: Hbar,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction rejected: {0}")]
    Rejected(Status),
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Ledger not initialized at {0}; run `init` first")]
    NotInitialized(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
}

/// A network that accepts signed transactions
pub trait LedgerClient {
    /// Submit a fully signed transaction. Policy failures come back as
    /// [`LedgerError::Rejected`].
    fn submit(&mut self, transaction: &Transaction) -> Result<Receipt, LedgerError>;

    fn account_info(&self, account_id: &AccountId) -> Result<AccountInfo, LedgerError>;
}

/// Submit `transaction` and log how it ended
pub fn submit_and_report<L: LedgerClient + ?Sized>(
    client: &mut L,
    transaction: &Transaction,
) -> Result<Receipt, LedgerError> {
    match client.submit(transaction) {
        Ok(receipt) => {
            info!("Receipt for {}: {}", receipt.transaction_id, receipt.status);
            Ok(receipt)
        }
        Err(e) => {
            warn!("Submission of {} failed: {}", transaction.transaction_id(), e);
            Err(e)
        }
    }
}
