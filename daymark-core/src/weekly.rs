//! Weekly recurring tasks and the once-per-day reset gate.
//!
//! Completion flags clear once per Eastern-time calendar day. The gate
//! compares dates, not instants, and is keyed by a per-(user, context)
//! last-reset marker so repeated checks within the same day are no-ops.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::todo::Context;

/// Resets follow the household clock, not UTC.
pub const RESET_TZ: Tz = chrono_tz::America::New_York;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTask {
    pub id: String,
    pub user_id: String,
    pub context: Context,
    pub text: String,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub completed_this_week: bool,
    pub last_completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn day_name(day_of_week: u8) -> &'static str {
    DAY_NAMES.get(day_of_week as usize).copied().unwrap_or("Unknown")
}

/// Request shape for creating a weekly task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWeeklyTask {
    pub text: String,
    pub day_of_week: u8,
}

impl NewWeeklyTask {
    pub fn new(text: impl Into<String>, day_of_week: u8) -> Result<Self> {
        if day_of_week > 6 {
            bail!("day_of_week must be 0..=6, got {day_of_week}");
        }
        Ok(Self {
            text: text.into(),
            day_of_week,
        })
    }
}

/// The Eastern-time calendar date of `now`; the value stored as the
/// last-reset marker.
pub fn reset_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&RESET_TZ).date_naive()
}

/// Whether a reset is due: true when no marker exists or the marker is from
/// an earlier Eastern-time day. Calling twice on the same day is idempotent
/// because the caller stamps the marker after a successful reset.
pub fn should_reset(last_reset: Option<NaiveDate>, now: DateTime<Utc>) -> bool {
    match last_reset {
        None => true,
        Some(marker) => marker < reset_date(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn no_marker_always_resets() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(should_reset(None, now));
    }

    #[test]
    fn same_day_marker_blocks_second_reset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        let marker = reset_date(now);
        assert!(!should_reset(Some(marker), now));
    }

    #[test]
    fn next_day_resets_again() {
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        assert!(should_reset(Some(reset_date(first)), next_day));
    }

    #[test]
    fn utc_midnight_is_not_an_eastern_day_boundary() {
        // 2026-03-01T03:00Z is still Feb 28 in New York (EST, UTC-5); a
        // marker from Feb 28 Eastern must hold until Eastern midnight.
        let late_evening_et = Utc.with_ymd_and_hms(2026, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(
            reset_date(late_evening_et),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        let marker = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert!(!should_reset(Some(marker), late_evening_et));

        // After 05:00Z it is March 1 Eastern and the reset fires.
        let next_et_day = Utc.with_ymd_and_hms(2026, 3, 1, 5, 30, 0).unwrap();
        assert!(should_reset(Some(marker), next_et_day));
    }

    #[test]
    fn day_of_week_is_validated() {
        assert!(NewWeeklyTask::new("water plants", 6).is_ok());
        assert!(NewWeeklyTask::new("water plants", 7).is_err());
    }
}
