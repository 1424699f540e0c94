//! Deadline urgency classifier.
//!
//! A deadline is a calendar date; urgency is how close that date's midnight
//! is to `now`, bucketed into ordinal tiers. Evaluated lazily wherever a
//! sorted view is produced — never cached, never recomputed on a timer.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    /// No deadline, or more than 7 days out.
    Normal = 0,
    /// 4-7 days remaining.
    Caution = 1,
    /// 2-3 days remaining.
    Warning = 2,
    /// Due within a day.
    Urgent = 3,
    /// Deadline already passed.
    Overdue = 4,
}

impl Urgency {
    pub fn tier(self) -> u8 {
        self as u8
    }

    /// Pinned tiers float above everything else in the active list.
    pub fn is_pinned(self) -> bool {
        self >= Urgency::Warning
    }

    /// Classify an optional deadline against `now`.
    ///
    /// Days remaining is the calendar-day ceiling of the millisecond
    /// difference: partial days round up, so a deadline one minute away is
    /// still "due within a day" (Urgent), not Overdue. Only a strictly past
    /// deadline is Overdue.
    pub fn classify(deadline: Option<NaiveDate>, now: DateTime<Utc>) -> Urgency {
        let Some(date) = deadline else {
            return Urgency::Normal;
        };

        let deadline_at = date.and_time(NaiveTime::MIN).and_utc();
        let diff_ms = (deadline_at - now).num_milliseconds();
        if diff_ms < 0 {
            return Urgency::Overdue;
        }

        match (diff_ms as u64).div_ceil(MS_PER_DAY as u64) {
            0..=1 => Urgency::Urgent,
            2..=3 => Urgency::Warning,
            4..=7 => Urgency::Caution,
            _ => Urgency::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_deadline_is_normal() {
        assert_eq!(Urgency::classify(None, at(2026, 3, 1, 12, 0)), Urgency::Normal);
    }

    #[test]
    fn past_deadline_is_overdue_regardless_of_time_of_day() {
        let deadline = Some(date(2026, 3, 1));
        for hour in [0, 1, 9, 15, 23] {
            assert_eq!(
                Urgency::classify(deadline, at(2026, 3, 1, hour, 1)),
                Urgency::Overdue,
                "hour {hour}"
            );
        }
        assert_eq!(
            Urgency::classify(Some(date(2025, 12, 31)), at(2026, 3, 1, 0, 0)),
            Urgency::Overdue
        );
    }

    #[test]
    fn one_minute_away_is_urgent_not_overdue() {
        let now = at(2026, 2, 28, 23, 59);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 1)), now), Urgency::Urgent);
    }

    #[test]
    fn exact_midnight_hit_is_urgent() {
        let now = at(2026, 3, 1, 0, 0);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 1)), now), Urgency::Urgent);
    }

    #[test]
    fn tomorrow_is_urgent() {
        let now = at(2026, 3, 1, 9, 0);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 2)), now), Urgency::Urgent);
    }

    #[test]
    fn two_to_three_days_is_warning() {
        let now = at(2026, 3, 1, 9, 0);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 3)), now), Urgency::Warning);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 4)), now), Urgency::Warning);
    }

    #[test]
    fn five_days_out_is_caution() {
        let now = at(2026, 3, 1, 9, 0);
        assert_eq!(Urgency::classify(Some(date(2026, 3, 6)), now), Urgency::Caution);
    }

    #[test]
    fn beyond_a_week_is_normal() {
        let now = at(2026, 3, 1, 0, 0);
        // Exactly 7 days of millis is still Caution; anything past it is Normal.
        assert_eq!(Urgency::classify(Some(date(2026, 3, 8)), now), Urgency::Caution);
        assert_eq!(
            Urgency::classify(Some(date(2026, 3, 8)), now - Duration::minutes(1)),
            Urgency::Normal
        );
        assert_eq!(Urgency::classify(Some(date(2026, 4, 1)), now), Urgency::Normal);
    }

    #[test]
    fn pinning_threshold_is_warning() {
        assert!(!Urgency::Normal.is_pinned());
        assert!(!Urgency::Caution.is_pinned());
        assert!(Urgency::Warning.is_pinned());
        assert!(Urgency::Urgent.is_pinned());
        assert!(Urgency::Overdue.is_pinned());
    }
}
