//! Multisig Signer: offline multi-signature co-signing in Rust
//!
//! This crate provides the pieces needed to operate accounts secured by
//! M-of-N threshold keys when the key holders are never online together:
//! - ECDSA digital signatures (secp256k1)
//! - Threshold key policies and frozen, portable transactions
//! - A coordinator that collects pasted signatures and attaches them
//! - The key holder's side: decode, review and sign a transaction blob
//! - Account creation, key conversion and key rotation flows
//! - A file-backed local ledger that enforces key policies on submission
//!
//! # Example
//!
//! ```rust
//! use multisig_signer::core::{build_threshold_key, AccountId, Hbar, Operator, TransactionBuilder};
//! use multisig_signer::crypto::KeyPair;
//! use multisig_signer::multisig::{decode_transaction, sign_contributions};
//!
//! // A 2-of-3 threshold key
//! let holders: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
//! let key = build_threshold_key(holders.iter().map(|k| k.public_key()).collect(), 2).unwrap();
//! assert_eq!(key.description(), "2-of-3");
//!
//! // The operator freezes a transfer and shares it as base64
//! let operator = Operator::new(AccountId::from_num(2), KeyPair::generate());
//! let tx = TransactionBuilder::hbar_transfer(AccountId::from_num(1001), operator.account_id, Hbar::new(5))
//!     .generate_transaction_id(operator.account_id)
//!     .freeze()
//!     .unwrap();
//! let blob = tx.to_base64().unwrap();
//!
//! // A key holder decodes it and answers with a contribution line
//! let received = decode_transaction(&blob).unwrap();
//! let lines = sign_contributions(&received, &holders[..1]).unwrap();
//! println!("{}", lines[0]);
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod multisig;

// Re-export commonly used types
pub use crate::core::{
    build_threshold_key, AccountId, Hbar, Key, Operator, ThresholdKey, Transaction,
    TransactionBuilder, TransactionId,
};
pub use crate::crypto::{KeyPair, PublicKey};
pub use crate::ledger::{LedgerClient, LocalLedger, Receipt, Status};
pub use crate::multisig::{
    update_account_keys, Coordinator, KeyAuthority, MalformedLinePolicy, MultisigError,
    SignatureContribution,
};
