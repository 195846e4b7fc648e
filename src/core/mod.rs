//! Core ledger data model
//!
//! This module contains the building blocks shared by the signing workflow
//! and the ledger:
//! - Account ids and the paying operator
//! - Clocks
//! - Hbar amounts
//! - Key policies (single keys, M-of-N threshold keys)
//! - Frozen transactions and their builder

pub mod account;
pub mod clock;
pub mod hbar;
pub mod key;
pub mod transaction;

pub use account::{AccountId, AccountIdError, ContractId, Operator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use hbar::{Hbar, HbarError, TINYBARS_PER_HBAR};
pub use key::{build_threshold_key, Key, KeyPolicyError, ThresholdKey};
pub use transaction::{
    HbarTransfer, Timestamp, Transaction, TransactionBody, TransactionBuilder, TransactionError,
    TransactionId, TransactionKind, DEFAULT_MAX_TRANSACTION_FEE, DEFAULT_NODE_ACCOUNT,
    MAX_MEMO_BYTES, TRANSACTION_VALID_DURATION_SECS,
};
