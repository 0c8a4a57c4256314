//! Calendar months used as the billing unit.
//!
//! A [`Period`] is a month-year pair with the text form `M-YYYY` (month is
//! not zero padded, e.g. `3-2026`). Periods order by
//! [`ordinal`](Period::ordinal), so a later year always sorts after an
//! earlier one regardless of month.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::BillingError;

/// A single billing month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    // Field order matters: the derived ordering compares year first.
    year: i32,
    month: u8,
}

/// Years accepted when parsing or constructing a period. Keeps
/// [`Period::next`] and [`Period::prev`] clear of integer overflow.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

fn check_parts(month: u8, year: i32) -> Result<(), &'static str> {
    if !(1..=12).contains(&month) {
        return Err("month must be between 1 and 12");
    }
    if !YEAR_RANGE.contains(&year) {
        return Err("year must be between 1 and 9999");
    }
    Ok(())
}

impl Period {
    /// Create a period, validating the month and year.
    pub fn new(month: u8, year: i32) -> Result<Self, BillingError> {
        check_parts(month, year).map_err(|reason| BillingError::PeriodParse {
            input: format!("{}-{}", month, year),
            reason: reason.to_string(),
        })?;
        Ok(Self { year, month })
    }

    /// The month this date falls in.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month() as u8,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    #[must_use]
    pub fn from_ordinal(ordinal: i64) -> Self {
        let zero_based = ordinal - 1;
        Self {
            year: zero_based.div_euclid(12) as i32,
            month: (zero_based.rem_euclid(12) + 1) as u8,
        }
    }

    /// Month number, 1 to 12.
    #[inline]
    #[must_use]
    pub fn month(&self) -> u8 {
        self.month
    }

    #[inline]
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// `year * 12 + month`. Consecutive months differ by exactly one.
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    #[must_use]
    pub fn next(&self) -> Self {
        Self::from_ordinal(self.ordinal() + 1)
    }

    #[must_use]
    pub fn prev(&self) -> Self {
        Self::from_ordinal(self.ordinal() - 1)
    }

    /// The twelve periods of a calendar year, January first.
    #[must_use]
    pub fn months_of(year: i32) -> [Period; 12] {
        std::array::from_fn(|i| Self {
            year,
            month: i as u8 + 1,
        })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.month, self.year)
    }
}

impl FromStr for Period {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| BillingError::PeriodParse {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (month, year) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected the form M-YYYY"))?;

        let month: u8 = month
            .parse()
            .map_err(|_| invalid("month is not a number"))?;
        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;

        check_parts(month, year).map_err(invalid)?;

        Ok(Self { year, month })
    }
}

impl TryFrom<String> for Period {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}
