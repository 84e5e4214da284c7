use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A non-negative number of coins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coins(u64);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    /// Largest amount a store can hold: SQLite integers are signed 64-bit.
    pub const MAX: Coins = Coins(i64::MAX as u64);

    pub const fn new(value: u64) -> Self {
        Coins(value)
    }

    /// Accept a caller-supplied amount only if it is strictly positive.
    pub fn positive(value: i64) -> Option<Self> {
        u64::try_from(value).ok().filter(|v| *v > 0).map(Coins)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// `None` when the sum would exceed [`Coins::MAX`].
    pub fn checked_add(self, rhs: Coins) -> Option<Coins> {
        self.0
            .checked_add(rhs.0)
            .filter(|sum| *sum <= Self::MAX.0)
            .map(Coins)
    }

    /// `None` when `rhs` exceeds `self`, so a balance can never go negative.
    pub fn checked_sub(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_sub(rhs.0).map(Coins)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Coins {
    fn from(value: u64) -> Self {
        Coins(value)
    }
}

impl ToSql for Coins {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = i64::try_from(self.0)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(value))
    }
}

impl FromSql for Coins {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        u64::try_from(raw)
            .map(Coins)
            .map_err(|_| FromSqlError::OutOfRange(raw))
    }
}
