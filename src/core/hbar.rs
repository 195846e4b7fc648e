//! Hbar amounts, stored as tinybars

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Tinybars in one hbar
pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HbarError {
    #[error("Invalid hbar amount '{0}'")]
    InvalidAmount(String),
    #[error("Hbar amount '{0}' has more than 8 decimal places")]
    TooPrecise(String),
    #[error("Hbar amount '{0}' is out of range")]
    OutOfRange(String),
}

/// An hbar amount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hbar(i64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    /// Whole hbars
    pub const fn new(hbars: i64) -> Self {
        Self(hbars * TINYBARS_PER_HBAR)
    }

    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    pub const fn tinybars(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_add(other.0).map(Hbar)
    }

    pub fn checked_sub(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_sub(other.0).map(Hbar)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Neg for Hbar {
    type Output = Hbar;

    fn neg(self) -> Hbar {
        Hbar(-self.0)
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = TINYBARS_PER_HBAR as u64;
        let whole = abs / per;
        let frac = abs % per;

        if frac == 0 {
            write!(f, "{sign}{whole} ℏ")
        } else {
            let digits = format!("{frac:08}");
            write!(f, "{sign}{whole}.{} ℏ", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Hbar {
    type Err = HbarError;

    /// Parses a decimal hbar amount such as `10`, `0.5` or `-1.25`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().trim_end_matches('ℏ').trim();
        let invalid = || HbarError::InvalidAmount(s.to_string());
        let out_of_range = || HbarError::OutOfRange(s.to_string());

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 8 {
            return Err(HbarError::TooPrecise(s.to_string()));
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<8}").parse().map_err(|_| invalid())?
        };

        let tinybars = whole
            .checked_mul(TINYBARS_PER_HBAR)
            .and_then(|t| t.checked_add(frac))
            .ok_or_else(out_of_range)?;

        Ok(Hbar(if negative { -tinybars } else { tinybars }))
    }
}
