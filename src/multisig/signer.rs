//! The key holder's side of the exchange
//!
//! A key holder receives the encoded transaction, inspects what it does, and
//! answers with one contribution line per private key they control.

use crate::core::{Hbar, HbarTransfer, Transaction, TransactionError, TransactionKind};
use crate::crypto::{sha256_hex, KeyPair};
use crate::multisig::contribution::SignatureContribution;
use crate::multisig::MultisigError;
use log::debug;
use std::fmt;

/// Decode a pasted transaction blob
pub fn decode_transaction(blob: &str) -> Result<Transaction, TransactionError> {
    Transaction::from_base64(blob)
}

/// Human-readable view of a proposed transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSummary {
    pub transaction_id: String,
    pub memo: String,
    pub max_transaction_fee: Hbar,
    pub kind_name: &'static str,
    pub kind_detail: String,
    pub hbar_transfers: Vec<HbarTransfer>,
    pub signature_count: usize,
    /// Hex SHA-256 of the body, comparable with the operator's screen
    pub body_digest: Option<String>,
}

/// Summarize a transaction for the signer to review
pub fn describe(transaction: &Transaction) -> TransactionSummary {
    let kind = transaction.kind();
    let (kind_detail, hbar_transfers) = match kind {
        TransactionKind::AccountUpdate { account_id, key } => (
            format!("Account Update : {account_id} -> {}", key.description()),
            Vec::new(),
        ),
        TransactionKind::Transfer { transfers } => {
            ("Transfer Transaction".to_string(), transfers.clone())
        }
        TransactionKind::ContractCall {
            contract_id,
            gas,
            function,
            ..
        } => (format!("{contract_id} : gas -> {gas} : {function}"), Vec::new()),
        TransactionKind::AccountCreate {
            key,
            initial_balance,
        } => (
            format!("Account Create : {} with {initial_balance}", key.description()),
            Vec::new(),
        ),
    };

    TransactionSummary {
        transaction_id: transaction.transaction_id().to_string(),
        memo: transaction.memo().to_string(),
        max_transaction_fee: transaction.max_transaction_fee(),
        kind_name: kind.name(),
        kind_detail,
        hbar_transfers,
        signature_count: transaction.signature_count(),
        body_digest: transaction.body_digest().ok(),
    }
}

impl TransactionSummary {
    /// Transfer legs, one per line
    pub fn hbar_transfers_text(&self) -> String {
        if self.hbar_transfers.is_empty() {
            return "No Hbar transfers found".to_string();
        }
        self.hbar_transfers
            .iter()
            .map(|t| format!("\n\t{}\t->\t{}", t.account_id, t.amount))
            .collect()
    }
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "* transaction id: {}", self.transaction_id)?;
        writeln!(f, "* memo: {}", self.memo)?;
        writeln!(f, "* maxTxFee: {}", self.max_transaction_fee)?;
        writeln!(
            f,
            "* proposed tx type: {} : {}",
            self.kind_name, self.kind_detail
        )?;
        writeln!(f, "* proposed hbar tx: {}", self.hbar_transfers_text())?;
        if let Some(digest) = &self.body_digest {
            writeln!(f, "* body digest: {digest}")?;
        }
        write!(f, "* signatures attached: {}", self.signature_count)
    }
}

/// Sign `transaction` with each key, producing one contribution per key
pub fn sign_contributions(
    transaction: &Transaction,
    keys: &[KeyPair],
) -> Result<Vec<SignatureContribution>, MultisigError> {
    let body = transaction.body_bytes()?;
    debug!(
        "signing {} with {} key(s), body digest {}",
        transaction.transaction_id(),
        keys.len(),
        sha256_hex(&body)
    );
    keys.iter()
        .map(|key| -> Result<SignatureContribution, MultisigError> {
            let signature = key.sign(&body)?;
            Ok(SignatureContribution::new(key.public_key(), signature))
        })
        .collect()
}
