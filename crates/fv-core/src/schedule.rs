//! # Due dates and urgency
//!
//! Pure date arithmetic. All dates are `NaiveDate`: calendar days with no
//! time-of-day, so there is no partial-day drift to round away and
//! `days_remaining` is always a whole number.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, Result};

/// `days_remaining` at or below this is CRITICAL (overdue included).
pub const CRITICAL_WITHIN_DAYS: i64 = 15;
/// `days_remaining` at or below this (and above CRITICAL) is WARNING.
pub const WARNING_WITHIN_DAYS: i64 = 30;

/// Input format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Urgency of a deadline, ordered by severity (`Ok < Warning < Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyTier {
    Ok,
    Warning,
    Critical,
}

impl UrgencyTier {
    pub fn from_days_remaining(days_remaining: i64) -> Self {
        if days_remaining <= CRITICAL_WITHIN_DAYS {
            UrgencyTier::Critical
        } else if days_remaining <= WARNING_WITHIN_DAYS {
            UrgencyTier::Warning
        } else {
            UrgencyTier::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Ok => "OK",
            UrgencyTier::Warning => "WARNING",
            UrgencyTier::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Derived state of one deadline as of a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineStatus {
    pub due_date: NaiveDate,
    pub days_remaining: i64,
    pub tier: UrgencyTier,
}

impl DeadlineStatus {
    pub fn evaluate(due_date: NaiveDate, today: NaiveDate) -> Self {
        let (tier, days_remaining) = classify(due_date, today);
        DeadlineStatus { due_date, days_remaining, tier }
    }

    /// Overdue (due today or earlier) deadlines share the CRITICAL tier;
    /// this tells them apart.
    pub fn is_overdue(&self) -> bool {
        self.days_remaining <= 0
    }
}

/// `last_performed + frequency_days`, added day by day on the calendar.
///
/// A zero or negative frequency is an invalid input, not clamped.
pub fn compute_due_date(last_performed: NaiveDate, frequency_days: i64) -> Result<NaiveDate> {
    let days = u64::try_from(frequency_days)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            AppError::validation(format!(
                "frequency_days must be a positive integer, got {frequency_days}"
            ))
        })?;
    last_performed
        .checked_add_days(Days::new(days))
        .ok_or_else(|| {
            AppError::validation(format!(
                "due date out of range for {last_performed} + {frequency_days} days"
            ))
        })
}

/// Returns the tier and signed whole-day distance from `today` to `due_date`.
pub fn classify(due_date: NaiveDate, today: NaiveDate) -> (UrgencyTier, i64) {
    let days_remaining = (due_date - today).num_days();
    (UrgencyTier::from_days_remaining(days_remaining), days_remaining)
}

pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| AppError::validation(format!("malformed date {raw:?}: {e}")))
}

pub fn validate_frequency(frequency_days: i64) -> Result<u32> {
    u32::try_from(frequency_days)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            AppError::validation(format!(
                "frequency_days must be a positive integer, got {frequency_days}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_date_scenario() {
        let due = compute_due_date(date(2024, 1, 1), 180).unwrap();
        assert_eq!(due, date(2024, 6, 29));

        let (tier, days) = classify(due, date(2024, 6, 20));
        assert_eq!(days, 9);
        assert_eq!(tier, UrgencyTier::Critical);
    }

    #[test]
    fn test_due_date_rolls_over_month_and_year() {
        assert_eq!(compute_due_date(date(2023, 1, 20), 180).unwrap(), date(2023, 7, 19));
        assert_eq!(compute_due_date(date(2023, 12, 20), 15).unwrap(), date(2024, 1, 4));
        assert_eq!(compute_due_date(date(2024, 2, 28), 1).unwrap(), date(2024, 2, 29));
        assert_eq!(compute_due_date(date(2023, 2, 28), 1).unwrap(), date(2023, 3, 1));
    }

    #[test]
    fn test_due_date_minus_start_is_frequency() {
        let starts = [date(2020, 2, 29), date(2023, 10, 29), date(2024, 12, 31), date(1999, 3, 1)];
        for start in starts {
            for freq in [1_i64, 7, 28, 30, 31, 90, 180, 365, 366, 1000] {
                let due = compute_due_date(start, freq).unwrap();
                assert_eq!((due - start).num_days(), freq);
            }
        }
    }

    #[test]
    fn test_non_positive_frequency_is_rejected() {
        assert!(matches!(compute_due_date(date(2024, 1, 1), 0), Err(AppError::Validation(_))));
        assert!(matches!(compute_due_date(date(2024, 1, 1), -30), Err(AppError::Validation(_))));
        assert!(matches!(validate_frequency(0), Err(AppError::Validation(_))));
        assert!(matches!(validate_frequency(i64::from(u32::MAX) + 1), Err(AppError::Validation(_))));
        assert_eq!(validate_frequency(180).unwrap(), 180);
    }

    #[test]
    fn test_due_date_overflow_is_rejected() {
        assert!(compute_due_date(NaiveDate::MAX, 1).is_err());
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(UrgencyTier::from_days_remaining(15), UrgencyTier::Critical);
        assert_eq!(UrgencyTier::from_days_remaining(16), UrgencyTier::Warning);
        assert_eq!(UrgencyTier::from_days_remaining(30), UrgencyTier::Warning);
        assert_eq!(UrgencyTier::from_days_remaining(31), UrgencyTier::Ok);
        assert_eq!(UrgencyTier::from_days_remaining(0), UrgencyTier::Critical);
        assert_eq!(UrgencyTier::from_days_remaining(-400), UrgencyTier::Critical);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let mut previous = UrgencyTier::from_days_remaining(500);
        for days in (-500..500).rev() {
            let tier = UrgencyTier::from_days_remaining(days);
            assert!(tier >= previous, "tier went backwards at {days}");
            previous = tier;
        }
    }

    #[test]
    fn test_overdue_is_critical() {
        let status = DeadlineStatus::evaluate(date(2024, 3, 1), date(2024, 3, 5));
        assert_eq!(status.days_remaining, -4);
        assert_eq!(status.tier, UrgencyTier::Critical);
        assert!(status.is_overdue());

        let due_today = DeadlineStatus::evaluate(date(2024, 3, 5), date(2024, 3, 5));
        assert_eq!(due_today.days_remaining, 0);
        assert!(due_today.is_overdue());
        assert!(!DeadlineStatus::evaluate(date(2024, 3, 6), date(2024, 3, 5)).is_overdue());
    }

    #[test]
    fn test_parse_calendar_date() {
        assert_eq!(parse_calendar_date(" 2024-06-29 ").unwrap(), date(2024, 6, 29));
        assert!(parse_calendar_date("29/06/2024").is_err());
        assert!(parse_calendar_date("").is_err());
    }
}
