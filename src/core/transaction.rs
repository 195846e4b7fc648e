//! Transaction model
//!
//! A [`Transaction`] is produced once by [`TransactionBuilder::freeze`] and its
//! body can no longer change afterwards. Signatures are the only mutable
//! part: they are kept in a map keyed by public key, so a key contributes at
//! most one signature and a later contribution replaces an earlier one.
//!
//! The byte encoding is canonical JSON. Encoding a decoded transaction yields
//! the same bytes, which is what lets signers on other machines sign exactly
//! what the initiator built.

use crate::core::account::{AccountId, ContractId};
use crate::core::hbar::Hbar;
use crate::core::key::Key;
use crate::crypto::{sha256_hex, KeyError, KeyPair, PublicKey};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// How long after its valid start the network accepts a transaction
pub const TRANSACTION_VALID_DURATION_SECS: i64 = 120;

/// Node every transaction is pinned to unless told otherwise
pub const DEFAULT_NODE_ACCOUNT: AccountId = AccountId::from_num(3);

/// Default fee ceiling (2 ℏ)
pub const DEFAULT_MAX_TRANSACTION_FEE: Hbar = Hbar::new(2);

/// Maximum memo length in bytes
pub const MAX_MEMO_BYTES: usize = 100;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction id not set")]
    MissingTransactionId,
    #[error("Memo is {0} bytes, the limit is 100")]
    MemoTooLong(usize),
    #[error("No node account ids selected")]
    NoNodeAccounts,
    #[error("Invalid transaction encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Invalid base64 transaction blob: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction Id
// =============================================================================

/// Seconds + nanoseconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.seconds, self.nanos).unwrap_or_default()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Payer account plus the moment the transaction becomes valid
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl TransactionId {
    /// A fresh id for `payer` starting now
    pub fn generate(payer: AccountId) -> Self {
        Self::with_valid_start(payer, Timestamp::now())
    }

    pub fn with_valid_start(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            account_id: payer,
            valid_start,
        }
    }

    /// End of the validity window
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.valid_start.to_datetime() + Duration::seconds(TRANSACTION_VALID_DURATION_SECS)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

// =============================================================================
// Body
// =============================================================================

/// One leg of an hbar transfer; negative amounts are debits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbarTransfer {
    pub account_id: AccountId,
    pub amount: Hbar,
}

/// The ledger operation a transaction performs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer {
        transfers: Vec<HbarTransfer>,
    },
    /// An opaque contract function call; parameters are ABI-encoded hex
    ContractCall {
        contract_id: ContractId,
        gas: u64,
        function: String,
        parameters: String,
    },
    AccountUpdate {
        account_id: AccountId,
        key: Key,
    },
    AccountCreate {
        key: Key,
        initial_balance: Hbar,
    },
}

impl TransactionKind {
    /// Short type name
    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::Transfer { .. } => "TransferTransaction",
            TransactionKind::ContractCall { .. } => "ContractExecuteTransaction",
            TransactionKind::AccountUpdate { .. } => "AccountUpdateTransaction",
            TransactionKind::AccountCreate { .. } => "AccountCreateTransaction",
        }
    }
}

/// Everything that is signed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub node_account_ids: Vec<AccountId>,
    pub max_transaction_fee: Hbar,
    pub memo: String,
    pub kind: TransactionKind,
}

// =============================================================================
// Transaction
// =============================================================================

/// Compact ECDSA signature bytes, hex in the encoding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct SignatureBytes(#[serde(with = "hex::serde")] Vec<u8>);

/// A frozen transaction and the signatures collected for it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    body: TransactionBody,
    signatures: BTreeMap<PublicKey, SignatureBytes>,
}

impl Transaction {
    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.body.transaction_id
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.body.kind
    }

    pub fn memo(&self) -> &str {
        &self.body.memo
    }

    pub fn max_transaction_fee(&self) -> Hbar {
        self.body.max_transaction_fee
    }

    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.body.node_account_ids
    }

    /// The bytes every signer signs
    pub fn body_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(&self.body)?)
    }

    /// SHA-256 of the body bytes, hex encoded
    pub fn body_digest(&self) -> Result<String, TransactionError> {
        Ok(sha256_hex(&self.body_bytes()?))
    }

    /// Full encoding: body plus collected signatures
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Text-safe form for copy/paste transport
    pub fn to_base64(&self) -> Result<String, TransactionError> {
        Ok(B64.encode(self.to_bytes()?))
    }

    pub fn from_base64(blob: &str) -> Result<Self, TransactionError> {
        let bytes = B64.decode(blob.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Sign the body with `key_pair` and attach the signature
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<&mut Self, TransactionError> {
        let signature = key_pair.sign(&self.body_bytes()?)?;
        self.add_signature(key_pair.public_key(), signature);
        Ok(self)
    }

    /// Attach a signature made elsewhere. Replaces any earlier signature
    /// from the same key.
    pub fn add_signature(&mut self, public_key: PublicKey, signature: Vec<u8>) -> &mut Self {
        self.signatures.insert(public_key, SignatureBytes(signature));
        self
    }

    pub fn signature(&self, public_key: &PublicKey) -> Option<&[u8]> {
        self.signatures.get(public_key).map(|s| s.0.as_slice())
    }

    pub fn signatures(&self) -> impl Iterator<Item = (&PublicKey, &[u8])> {
        self.signatures.iter().map(|(k, s)| (k, s.0.as_slice()))
    }

    /// Number of distinct keys that signed
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.signatures.keys().copied().collect()
    }

    /// Keys whose attached signature does not verify against the body
    pub fn invalid_signers(&self) -> Result<Vec<PublicKey>, TransactionError> {
        let body = self.body_bytes()?;
        Ok(self
            .signatures
            .iter()
            .filter(|(key, sig)| !matches!(key.verify(&body, &sig.0), Ok(true)))
            .map(|(key, _)| *key)
            .collect())
    }

    /// Whether the validity window has closed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.body.transaction_id.expires_at()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for unsigned transactions
pub struct TransactionBuilder {
    kind: TransactionKind,
    transaction_id: Option<TransactionId>,
    node_account_ids: Vec<AccountId>,
    max_transaction_fee: Hbar,
    memo: String,
}

impl TransactionBuilder {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            transaction_id: None,
            node_account_ids: vec![DEFAULT_NODE_ACCOUNT],
            max_transaction_fee: DEFAULT_MAX_TRANSACTION_FEE,
            memo: String::new(),
        }
    }

    pub fn transfer(transfers: Vec<HbarTransfer>) -> Self {
        Self::new(TransactionKind::Transfer { transfers })
    }

    /// Move `amount` from `from` to `to`
    pub fn hbar_transfer(from: AccountId, to: AccountId, amount: Hbar) -> Self {
        Self::transfer(vec![
            HbarTransfer {
                account_id: from,
                amount: -amount,
            },
            HbarTransfer {
                account_id: to,
                amount,
            },
        ])
    }

    pub fn contract_call(contract_id: ContractId, gas: u64, function: &str, parameters: &[u8]) -> Self {
        Self::new(TransactionKind::ContractCall {
            contract_id,
            gas,
            function: function.to_string(),
            parameters: hex::encode(parameters),
        })
    }

    pub fn account_update(account_id: AccountId, key: Key) -> Self {
        Self::new(TransactionKind::AccountUpdate { account_id, key })
    }

    pub fn account_create(key: Key, initial_balance: Hbar) -> Self {
        Self::new(TransactionKind::AccountCreate {
            key,
            initial_balance,
        })
    }

    pub fn transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Generate a transaction id for `payer` starting now
    pub fn generate_transaction_id(self, payer: AccountId) -> Self {
        self.transaction_id(TransactionId::generate(payer))
    }

    pub fn node_account_ids(mut self, nodes: Vec<AccountId>) -> Self {
        self.node_account_ids = nodes;
        self
    }

    pub fn max_transaction_fee(mut self, fee: Hbar) -> Self {
        self.max_transaction_fee = fee;
        self
    }

    pub fn memo(mut self, memo: &str) -> Self {
        self.memo = memo.to_string();
        self
    }

    /// Finish construction. The returned transaction carries no signatures.
    pub fn freeze(self) -> Result<Transaction, TransactionError> {
        let transaction_id = self
            .transaction_id
            .ok_or(TransactionError::MissingTransactionId)?;

        if self.node_account_ids.is_empty() {
            return Err(TransactionError::NoNodeAccounts);
        }
        if self.memo.len() > MAX_MEMO_BYTES {
            return Err(TransactionError::MemoTooLong(self.memo.len()));
        }

        Ok(Transaction {
            body: TransactionBody {
                transaction_id,
                node_account_ids: self.node_account_ids,
                max_transaction_fee: self.max_transaction_fee,
                memo: self.memo,
                kind: self.kind,
            },
            signatures: BTreeMap::new(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn payer() -> AccountId {
        AccountId::from_num(2)
    }

    fn sample_transfer() -> Transaction {
        TransactionBuilder::hbar_transfer(payer(), AccountId::from_num(1001), Hbar::new(5))
            .transaction_id(TransactionId::with_valid_start(
                payer(),
                Timestamp {
                    seconds: 1_700_000_000,
                    nanos: 123_456_789,
                },
            ))
            .memo("rent")
            .freeze()
            .unwrap()
    }

    #[test]
    fn test_freeze_defaults() {
        let tx = sample_transfer();
        assert_eq!(tx.node_account_ids(), &[DEFAULT_NODE_ACCOUNT]);
        assert_eq!(tx.max_transaction_fee(), DEFAULT_MAX_TRANSACTION_FEE);
        assert_eq!(tx.memo(), "rent");
        assert_eq!(tx.signature_count(), 0);
        assert_eq!(tx.kind().name(), "TransferTransaction");
    }

    #[test]
    fn test_freeze_requires_transaction_id() {
        let result = TransactionBuilder::account_create(
            Key::from(KeyPair::generate().public_key()),
            Hbar::new(1),
        )
        .freeze();
        assert!(matches!(result, Err(TransactionError::MissingTransactionId)));
    }

    #[test]
    fn test_freeze_rejects_long_memo() {
        let result = TransactionBuilder::transfer(Vec::new())
            .generate_transaction_id(payer())
            .memo(&"x".repeat(MAX_MEMO_BYTES + 1))
            .freeze();
        assert!(matches!(result, Err(TransactionError::MemoTooLong(101))));
    }

    #[test]
    fn test_freeze_rejects_empty_node_list() {
        let result = TransactionBuilder::transfer(Vec::new())
            .generate_transaction_id(payer())
            .node_account_ids(Vec::new())
            .freeze();
        assert!(matches!(result, Err(TransactionError::NoNodeAccounts)));
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let mut tx = sample_transfer();
        tx.sign(&KeyPair::generate()).unwrap();

        let bytes = tx.to_bytes().unwrap();
        let blob = tx.to_base64().unwrap();
        let decoded = Transaction::from_base64(&blob).unwrap();

        assert_eq!(decoded, tx);
        assert_eq!(decoded.to_bytes().unwrap(), bytes);
        assert_eq!(decoded.body_bytes().unwrap(), tx.body_bytes().unwrap());
    }

    #[test]
    fn test_round_trip_every_kind() {
        let key = Key::from(KeyPair::generate().public_key());
        let builders = vec![
            TransactionBuilder::contract_call(AccountId::from_num(5005), 400_000, "burn", &[0xde, 0xad]),
            TransactionBuilder::account_update(AccountId::from_num(1001), key.clone()),
            TransactionBuilder::account_create(key, Hbar::new(10)),
        ];

        for builder in builders {
            let tx = builder.generate_transaction_id(payer()).freeze().unwrap();
            let bytes = tx.to_bytes().unwrap();
            assert_eq!(Transaction::from_bytes(&bytes).unwrap().to_bytes().unwrap(), bytes);
        }
    }

    #[test]
    fn test_same_key_overwrites_signature() {
        let mut tx = sample_transfer();
        let key = KeyPair::generate().public_key();

        tx.add_signature(key, vec![1; 64]);
        tx.add_signature(key, vec![2; 64]);

        assert_eq!(tx.signature_count(), 1);
        assert_eq!(tx.signature(&key), Some(&[2u8; 64][..]));
    }

    #[test]
    fn test_signing_does_not_change_body() {
        let mut tx = sample_transfer();
        let before = tx.body_bytes().unwrap();
        let digest = tx.body_digest().unwrap();
        tx.sign(&KeyPair::generate()).unwrap();
        assert_eq!(tx.body_bytes().unwrap(), before);
        assert_eq!(tx.body_digest().unwrap(), digest);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_invalid_signers() {
        let mut tx = sample_transfer();
        let good = KeyPair::generate();
        let bad = KeyPair::generate();

        tx.sign(&good).unwrap();
        tx.add_signature(bad.public_key(), bad.sign(b"something else").unwrap());

        assert_eq!(tx.invalid_signers().unwrap(), vec![bad.public_key()]);
    }

    #[test]
    fn test_validity_window() {
        let tx = sample_transfer();
        let start = tx.transaction_id().valid_start.to_datetime();

        assert!(!tx.is_expired_at(start + Duration::seconds(119)));
        assert!(tx.is_expired_at(start + Duration::seconds(TRANSACTION_VALID_DURATION_SECS)));
    }

    #[test]
    fn test_transaction_id_display() {
        let tx = sample_transfer();
        assert_eq!(
            tx.transaction_id().to_string(),
            "0.0.2@1700000000.123456789"
        );
    }

    #[test]
    fn test_garbage_blob() {
        assert!(matches!(
            Transaction::from_base64("!!!"),
            Err(TransactionError::Base64(_))
        ));
        assert!(matches!(
            Transaction::from_base64("aGVsbG8="),
            Err(TransactionError::Encoding(_))
        ));
    }
}
