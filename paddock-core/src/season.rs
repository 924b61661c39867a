//! Season identifiers and the `2024s2` user-facing mini-format.
//!
//! iRacing runs four quarterly seasons per year. The service launched in
//! 2008, so any earlier year in a season string can only be a typo.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// First year the racing service ran a season.
pub const FIRST_SEASON_YEAR: u16 = 2008;

/// One quarterly season, e.g. `2024s2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Season {
    pub year: u16,
    pub quarter: u8,
}

/// Season parsing and range errors. All of these are user-input errors:
/// the command layer renders them as a short chat message and moves on.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SeasonError {
    #[error("'{0}' is not a season — expected something like 2024s2")]
    InvalidFormat(String),

    #[error("quarter {0} is out of range (seasons run 1-4)")]
    QuarterOutOfRange(u8),

    #[error("{0} is before the service launched ({FIRST_SEASON_YEAR})")]
    YearTooEarly(u16),

    #[error("season {0} has not started yet")]
    SeasonInFuture(Season),
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s{}", self.year, self.quarter)
    }
}

impl Season {
    /// The season running at `now` (quarters align with calendar quarters).
    pub fn current(now: DateTime<Utc>) -> Self {
        Self {
            year: now.year() as u16,
            quarter: (now.month0() / 3 + 1) as u8,
        }
    }

    /// Parse the literal `<4-digit year>s<1-digit quarter>` pattern.
    ///
    /// Format check only; range checks live in [`Season::validate`].
    pub fn parse(input: &str) -> Result<Self, SeasonError> {
        let invalid = || SeasonError::InvalidFormat(input.to_string());
        let bytes = input.as_bytes();
        if bytes.len() != 6
            || !bytes[..4].iter().all(u8::is_ascii_digit)
            || bytes[4] != b's'
            || !bytes[5].is_ascii_digit()
        {
            return Err(invalid());
        }
        let year: u16 = input[..4].parse().map_err(|_| invalid())?;
        let quarter: u8 = input[5..].parse().map_err(|_| invalid())?;
        Ok(Self { year, quarter })
    }

    /// Range-check against the service launch year and the season running
    /// at `now`.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Self, SeasonError> {
        if !(1..=4).contains(&self.quarter) {
            return Err(SeasonError::QuarterOutOfRange(self.quarter));
        }
        if self.year < FIRST_SEASON_YEAR {
            return Err(SeasonError::YearTooEarly(self.year));
        }
        if self > Self::current(now) {
            return Err(SeasonError::SeasonInFuture(self));
        }
        Ok(self)
    }

    /// Parse and range-check in one step, as the command layer does.
    pub fn parse_validated(input: &str, now: DateTime<Utc>) -> Result<Self, SeasonError> {
        Self::parse(input)?.validate(now)
    }

    /// Whether this season is still running (its final totals can move).
    pub fn is_current(self, now: DateTime<Utc>) -> bool {
        self == Self::current(now)
    }
}
