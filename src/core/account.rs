//! Account identifiers and the paying operator

use crate::crypto::KeyPair;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Account id parse errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Invalid account id '{0}': expected <shard>.<realm>.<num>")]
    InvalidFormat(String),
}

/// A ledger account id in `shard.realm.num` form
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

/// Contracts share the account id space
pub type ContractId = AccountId;

impl AccountId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Account `0.0.<num>`
    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    /// Accepts `0.0.1234` or a bare `1234`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AccountIdError::InvalidFormat(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();

        let parsed: Vec<u64> = parts
            .iter()
            .map(|p| p.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;

        match parsed.as_slice() {
            [num] => Ok(Self::from_num(*num)),
            [shard, realm, num] => Ok(Self::new(*shard, *realm, *num)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The account paying for a transaction together with its signing key
#[derive(Clone, Debug)]
pub struct Operator {
    pub account_id: AccountId,
    pub key: KeyPair,
}

impl Operator {
    pub fn new(account_id: AccountId, key: KeyPair) -> Self {
        Self { account_id, key }
    }
}
