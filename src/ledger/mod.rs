//! Submission path
//!
//! The [`LedgerClient`] trait is the only seam between the signing workflow
//! and a network. [`LocalLedger`] implements it against a JSON file so the
//! whole flow runs offline.

pub mod client;
pub mod local;
pub mod storage;

pub use client::{submit_and_report, AccountInfo, LedgerClient, LedgerError, Receipt, Status};
pub use local::{LocalLedger, FIRST_ACCOUNT_NUM, GENESIS_BALANCE, TRANSACTION_FEE};
pub use storage::{Storage, StorageError, LEDGER_FILE};
