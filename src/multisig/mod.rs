//! Offline multi-signature co-signing
//!
//! A transaction is frozen, shown to the operator as a base64 blob, and
//! carried by hand to each key holder. Every holder answers with a
//! `<public key>:<signature>` line that is pasted back and attached.
//!
//! # Example
//!
//! ```ignore
//! use multisig_signer::core::SystemClock;
//! use multisig_signer::multisig::{Coordinator, TerminalSource};
//!
//! let mut coordinator = Coordinator::new(TerminalSource::stdio(), SystemClock, std::io::stdout());
//! let round = coordinator.collect_signatures(transaction, 2)?;
//! if round.report.likely_expired {
//!     // submit anyway; the network has the final word
//! }
//! ```

pub mod account;
pub mod contribution;
pub mod coordinator;
pub mod signer;
pub mod source;

use crate::core::TransactionError;
use crate::crypto::{KeyError, PublicKey};
use thiserror::Error;

pub use account::{
    create_multisig_account, resolve_old_authority, transfer_from_account, update_account_keys,
    KeyAuthority,
};
pub use contribution::{ContributionError, SignatureContribution};
pub use coordinator::{
    CollectionPhase, CollectionReport, Coordinator, ExpectedCount, MalformedLinePolicy,
    SigningRound,
    COPY_MARKER, EXPIRY_WARNING_SECS,
};
pub use signer::{decode_transaction, describe, sign_contributions, TransactionSummary};
pub use source::{ScriptedSource, SignatureSource, TerminalSource};

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Malformed signature line #{index}: {source}")]
    Contribution {
        index: usize,
        #[source]
        source: ContributionError,
    },
    #[error("No private key available for {0}")]
    MissingPrivateKey(PublicKey),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}
