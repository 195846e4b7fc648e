//! Key policies: single keys and M-of-N threshold keys
//!
//! A [`ThresholdKey`] is pure data. Nothing in the signing path checks it;
//! only the ledger evaluates whether a set of signers satisfies it.

use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors building a key policy
#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyPolicyError {
    #[error("Invalid threshold {threshold} for {keys} key(s): need 1 <= threshold <= keys")]
    InvalidThreshold { threshold: u32, keys: usize },
    #[error("Duplicate public key in key list: {0}")]
    DuplicateKey(String),
}

/// An M-of-N public key policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholdKey")]
pub struct ThresholdKey {
    keys: Vec<PublicKey>,
    threshold: u32,
}

/// Unchecked wire form of a [`ThresholdKey`]
#[derive(Deserialize)]
struct RawThresholdKey {
    keys: Vec<PublicKey>,
    threshold: u32,
}

impl TryFrom<RawThresholdKey> for ThresholdKey {
    type Error = KeyPolicyError;

    fn try_from(raw: RawThresholdKey) -> Result<Self, Self::Error> {
        if raw.keys.is_empty() && raw.threshold == 0 {
            return Ok(ThresholdKey::empty());
        }
        build_threshold_key(raw.keys, raw.threshold)
    }
}

/// Build an M-of-N threshold key
///
/// Requires `1 <= threshold <= keys.len()` and distinct keys.
pub fn build_threshold_key(
    keys: Vec<PublicKey>,
    threshold: u32,
) -> Result<ThresholdKey, KeyPolicyError> {
    if threshold == 0 || threshold as usize > keys.len() {
        return Err(KeyPolicyError::InvalidThreshold {
            threshold,
            keys: keys.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for key in &keys {
        if !seen.insert(*key) {
            return Err(KeyPolicyError::DuplicateKey(key.to_hex()));
        }
    }

    Ok(ThresholdKey { keys, threshold })
}

impl ThresholdKey {
    /// The empty key list: "no key of this kind is involved"
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            threshold: 0,
        }
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// Required signature count (M)
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Designated key count (N)
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of designated keys present in `signers`
    pub fn signed_count(&self, signers: &BTreeSet<PublicKey>) -> usize {
        self.keys.iter().filter(|k| signers.contains(k)).count()
    }

    /// At least M distinct designated keys signed
    pub fn is_satisfied_by(&self, signers: &BTreeSet<PublicKey>) -> bool {
        !self.is_empty()
            && self.threshold >= 1
            && self.signed_count(signers) >= self.threshold as usize
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.keys.len())
    }
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.description())?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}

/// The key an account is secured by
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Key {
    Single(PublicKey),
    Threshold(ThresholdKey),
}

impl Key {
    pub fn is_satisfied_by(&self, signers: &BTreeSet<PublicKey>) -> bool {
        match self {
            Key::Single(key) => signers.contains(key),
            Key::Threshold(threshold_key) => threshold_key.is_satisfied_by(signers),
        }
    }

    /// A key that can never be satisfied
    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Threshold(tk) if tk.is_empty())
    }

    pub fn description(&self) -> String {
        match self {
            Key::Single(_) => "single key".to_string(),
            Key::Threshold(tk) => format!("{} threshold key", tk.description()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Single(key) => write!(f, "{key}"),
            Key::Threshold(tk) => write!(f, "{tk}"),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Key::Single(key)
    }
}

impl From<ThresholdKey> for Key {
    fn from(key: ThresholdKey) -> Self {
        Key::Threshold(key)
    }
}
