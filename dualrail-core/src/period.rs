//! Half-open `[start, end)` window and period helpers.
//!
//! The source this pipeline was modeled on mixes `<=` and `<` at window
//! boundaries inconsistently. Every comparison against a window or period in
//! this workspace goes through here so the half-open convention is
//! enforced in exactly one place.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A half-open instant window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Align a timestamp down to the start of its containing fixed-size bucket.
pub fn floor_to_bucket(ts: DateTime<Utc>, bucket: Duration) -> DateTime<Utc> {
    let bucket_secs = bucket.num_seconds().max(1);
    let epoch_secs = ts.timestamp();
    let floored = epoch_secs - epoch_secs.rem_euclid(bucket_secs);
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// A half-open calendar-date period `[start, end)`, used for `RatedUsage` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DatePeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The period covering a single calendar day.
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date + Duration::days(1) }
    }

    /// The period covering the calendar month containing `date`.
    pub fn month(date: NaiveDate) -> Self {
        let start = date.with_day(1).expect("day 1 always valid");
        let end = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        }
        .expect("next month boundary always valid");
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn to_instant_window(&self) -> Window {
        Window::new(
            self.start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            self.end.and_hms_opt(0, 0, 0).unwrap().and_utc(),
        )
    }
}
