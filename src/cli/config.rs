//! Operator configuration
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file. Command-line flags take precedence over everything read here.

use crate::core::{AccountId, Operator};
use crate::crypto::{KeyPair, PublicKey};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MY_ACCOUNT_ID: &str = "MY_ACCOUNT_ID";
pub const MY_PRIVATE_KEY: &str = "MY_PRIVATE_KEY";
pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const MULTI_SIG_PUBLIC_KEYS: &str = "MULTI_SIG_PUBLIC_KEYS";
pub const MULTI_SIG_PRIVATE_KEYS: &str = "MULTI_SIG_PRIVATE_KEYS";
pub const MULTI_SIG_THRESHOLD: &str = "MULTI_SIG_THRESHOLD";
pub const MULTI_SIG_BYTES: &str = "MULTI_SIG_BYTES";
pub const MULTI_SIG_ADJUST_ACCOUNT: &str = "MULTI_SIG_ADJUST_ACCOUNT";
pub const OLD_KEY: &str = "OLD_KEY";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("Environment {0} has no client; use LOCAL")]
    UnsupportedEnvironment(Environment),
}

/// Which network the operator is talking to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Local,
    Test,
    Main,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Environment::Local),
            "TEST" => Ok(Environment::Test),
            "MAIN" => Ok(Environment::Main),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Local => "LOCAL",
            Environment::Test => "TEST",
            Environment::Main => "MAIN",
        };
        f.write_str(name)
    }
}

/// Everything read from the environment, already parsed
#[derive(Clone, Debug, Default)]
pub struct OperatorConfig {
    pub account_id: Option<AccountId>,
    pub private_key: Option<KeyPair>,
    pub environment: Environment,
    pub public_keys: Vec<PublicKey>,
    pub private_keys: Vec<KeyPair>,
    pub threshold: Option<u32>,
    pub transaction_bytes: Option<String>,
    pub adjust_account: Option<AccountId>,
    pub old_key: Option<KeyPair>,
}

impl OperatorConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            account_id: get(MY_ACCOUNT_ID)
                .map(|v| parse_var(MY_ACCOUNT_ID, &v))
                .transpose()?,
            private_key: get(MY_PRIVATE_KEY)
                .map(|v| parse_var(MY_PRIVATE_KEY, &v))
                .transpose()?,
            environment: get(ENVIRONMENT)
                .map(|v| parse_var(ENVIRONMENT, &v))
                .transpose()?
                .unwrap_or_default(),
            public_keys: get(MULTI_SIG_PUBLIC_KEYS)
                .map(|v| parse_csv(MULTI_SIG_PUBLIC_KEYS, &v))
                .transpose()?
                .unwrap_or_default(),
            private_keys: get(MULTI_SIG_PRIVATE_KEYS)
                .map(|v| parse_csv(MULTI_SIG_PRIVATE_KEYS, &v))
                .transpose()?
                .unwrap_or_default(),
            threshold: get(MULTI_SIG_THRESHOLD)
                .map(|v| parse_var(MULTI_SIG_THRESHOLD, &v))
                .transpose()?,
            transaction_bytes: get(MULTI_SIG_BYTES).map(|v| v.trim().to_string()),
            adjust_account: get(MULTI_SIG_ADJUST_ACCOUNT)
                .map(|v| parse_var(MULTI_SIG_ADJUST_ACCOUNT, &v))
                .transpose()?,
            old_key: get(OLD_KEY).map(|v| parse_var(OLD_KEY, &v)).transpose()?,
        })
    }

    /// The paying account and its key
    pub fn operator(&self) -> Result<Operator, ConfigError> {
        let account_id = self.account_id.ok_or(ConfigError::Missing(MY_ACCOUNT_ID))?;
        let key = self
            .private_key
            .clone()
            .ok_or(ConfigError::Missing(MY_PRIVATE_KEY))?;
        Ok(Operator::new(account_id, key))
    }

    /// Fail unless the environment is backed by a client
    pub fn require_local(&self) -> Result<(), ConfigError> {
        match self.environment {
            Environment::Local => Ok(()),
            other => Err(ConfigError::UnsupportedEnvironment(other)),
        }
    }
}

/// Parse a single value, naming the variable on failure
pub fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

/// Parse a comma-separated list, ignoring empty entries
pub fn parse_csv<T>(var: &'static str, value: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_var(var, item))
        .collect()
}
