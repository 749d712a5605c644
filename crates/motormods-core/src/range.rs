//! # Report Date Ranges
//!
//! Inclusive calendar-day ranges used by every report. Both ends are
//! optional; a range whose start is after its end selects nothing (reports
//! return an empty list rather than failing).
//!
//! Calendar days are UTC days of the stored timestamps.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{parse_date, ValidationResult};

/// Inclusive `[from, to]` date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Unbounded range (all history).
    pub const fn all() -> Self {
        DateRange { from: None, to: None }
    }

    /// Range with both ends set.
    pub const fn between(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Parses the `YYYY-MM-DD` strings the reports UI sends.
    ///
    /// Empty or missing strings leave that end open.
    ///
    /// ```rust
    /// use motormods_core::range::DateRange;
    ///
    /// let r = DateRange::parse(Some("2026-01-01"), Some("")).unwrap();
    /// assert!(r.from.is_some());
    /// assert!(r.to.is_none());
    /// ```
    pub fn parse(from: Option<&str>, to: Option<&str>) -> ValidationResult<Self> {
        let parse_end = |field: &str, value: Option<&str>| -> ValidationResult<Option<NaiveDate>> {
            match value.map(str::trim) {
                None | Some("") => Ok(None),
                Some(v) => parse_date(field, v).map(Some),
            }
        };

        Ok(DateRange {
            from: parse_end("from", from)?,
            to: parse_end("to", to)?,
        })
    }

    /// True when `from > to`; such a range selects nothing.
    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(f), Some(t)) if f > t)
    }

    /// Whether a calendar day falls inside the range.
    pub fn contains(&self, day: NaiveDate) -> bool {
        if self.is_inverted() {
            return false;
        }
        self.from.map_or(true, |f| day >= f) && self.to.map_or(true, |t| day <= t)
    }

    /// Whether a timestamp's calendar day falls inside the range.
    pub fn contains_timestamp(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }

    /// Inclusive lower bound as a timestamp (start of `from`).
    pub fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.from.and_then(start_of_day)
    }

    /// Exclusive upper bound as a timestamp (start of the day after `to`).
    pub fn end_bound_exclusive(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .and_then(start_of_day)
    }
}

fn start_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}
