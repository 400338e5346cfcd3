use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Number of minor units in one coin
pub const MINOR_UNITS_PER_COIN: i64 = 100;

const DECIMAL_PLACES: usize = 2;

/// Errors that can occur when parsing or combining amounts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidFormat(String),

    #[error("Too many decimal places in {0} (maximum {max})", max = DECIMAL_PLACES)]
    TooPrecise(String),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),

    #[error("Amount arithmetic overflowed")]
    Overflow,
}

/// A fixed-point amount of coins, stored as signed minor units
///
/// Serialized as the bare integer number of minor units so that hashing and
/// persistence never go through floating point. Arithmetic is checked only;
/// persisted amounts are not trusted to stay in range.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(units: i64) -> Self {
        Amount(units)
    }

    pub const fn from_coins(coins: i64) -> Self {
        Amount(coins * MINOR_UNITS_PER_COIN)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0.checked_add(rhs.0).map(Amount).ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0.checked_sub(rhs.0).map(Amount).ok_or(AmountError::Overflow)
    }

    pub fn checked_abs(self) -> Result<Amount, AmountError> {
        self.0.checked_abs().map(Amount).ok_or(AmountError::Overflow)
    }

    /// Adds up `amounts`, failing instead of wrapping
    pub fn checked_sum<I>(amounts: I) -> Result<Amount, AmountError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let units = self.0.unsigned_abs();
        let per_coin = MINOR_UNITS_PER_COIN as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            units / per_coin,
            units % per_coin,
            width = DECIMAL_PLACES
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            return Err(AmountError::InvalidFormat(s.to_string()));
        }
        if fraction.len() > DECIMAL_PLACES {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AmountError::OutOfRange(s.to_string()))?
        };
        let fraction: i64 = format!("{:0<width$}", fraction, width = DECIMAL_PLACES)
            .parse()
            .map_err(|_| AmountError::InvalidFormat(s.to_string()))?;

        let units = whole
            .checked_mul(MINOR_UNITS_PER_COIN)
            .and_then(|units| units.checked_add(fraction))
            .ok_or_else(|| AmountError::OutOfRange(s.to_string()))?;

        Ok(Amount(if negative { -units } else { units }))
    }
}
