//! Public-holiday lookup contract.
//!
//! Jobs ask a [`HolidayOracle`] about the local date before touching the
//! chat service. The answer distinguishes "not a holiday" from "could not
//! tell", so callers can log the difference while still treating both as a
//! working day.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;

/// Why a holiday lookup could not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The calendar service could not be authenticated.
    Service(String),
    /// The events query itself failed.
    Query(String),
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(reason) => write!(f, "calendar service error: {reason}"),
            Self::Query(reason) => write!(f, "calendar query error: {reason}"),
        }
    }
}

/// Result of asking whether a date is a public holiday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolidayLookup {
    /// The date is a holiday with the given name.
    Holiday { name: String },
    /// The calendar has no holiday on the date.
    WorkingDay,
    /// The calendar could not be consulted.
    LookupFailed(LookupFailure),
}

impl HolidayLookup {
    /// Returns the holiday name if this is a holiday.
    #[must_use]
    pub fn holiday_name(&self) -> Option<&str> {
        match self {
            Self::Holiday { name } => Some(name),
            _ => None,
        }
    }

    /// Whether the job should be skipped for the day.
    #[must_use]
    pub const fn is_holiday(&self) -> bool {
        matches!(self, Self::Holiday { .. })
    }
}

/// Answers whether a calendar date is a public holiday.
#[async_trait]
pub trait HolidayOracle: Send + Sync {
    async fn lookup(&self, date: NaiveDate) -> HolidayLookup;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_holiday_skips() {
        let holiday = HolidayLookup::Holiday {
            name: "New Year".to_owned(),
        };
        assert!(holiday.is_holiday());
        assert_eq!(holiday.holiday_name(), Some("New Year"));

        assert!(!HolidayLookup::WorkingDay.is_holiday());
        assert!(
            !HolidayLookup::LookupFailed(LookupFailure::Query("boom".to_owned())).is_holiday()
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = LookupFailure::Service("no key".to_owned());
        assert_eq!(failure.to_string(), "calendar service error: no key");
    }
}
