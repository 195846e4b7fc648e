//! Signature contributions: one `(public key, signature)` pair per key holder
//!
//! Text form, one per line: `<public key hex>:<signature base64>`.

use crate::crypto::{KeyError, PublicKey};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Why a contribution line could not be decoded
#[derive(Error, Debug)]
pub enum ContributionError {
    #[error("missing ':' between public key and signature")]
    MissingSeparator,
    #[error("bad public key: {0}")]
    PublicKey(#[from] KeyError),
    #[error("bad base64 signature: {0}")]
    Signature(#[from] base64::DecodeError),
}

/// A signature produced by one key holder against the transaction body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureContribution {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

impl SignatureContribution {
    pub fn new(public_key: PublicKey, signature: Vec<u8>) -> Self {
        Self {
            public_key,
            signature,
        }
    }

    /// Parse one operator-supplied line. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ContributionError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        line.parse().map(Some)
    }
}

impl FromStr for SignatureContribution {
    type Err = ContributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, signature) = s
            .trim()
            .split_once(':')
            .ok_or(ContributionError::MissingSeparator)?;

        let public_key: PublicKey = key.parse()?;
        let signature = B64.decode(signature.trim())?;

        Ok(Self::new(public_key, signature))
    }
}

impl fmt::Display for SignatureContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.public_key, B64.encode(&self.signature))
    }
}
