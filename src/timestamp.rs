//! Calendar day timestamps
//!
//! A [`Timestamp`] is a calendar day counted from 1970-01-01. It never carries a
//! time of day, so arithmetic is plain integer arithmetic on day counts.

use crate::error::HabitError;
use chrono::{Datelike, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Date format used for display, parsing and CSV output
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A calendar day, normalized to a day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(i64);

/// Calendar period used to truncate a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncateField {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Timestamp {
    /// Day zero (1970-01-01)
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from a number of days since 1970-01-01
    pub const fn from_days(days: i64) -> Self {
        Self(days)
    }

    /// Create a timestamp from a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Create a timestamp from year, month and day
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, HabitError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self::from_date)
            .ok_or_else(|| HabitError::DateParse(format!("{year:04}-{month:02}-{day:02}")))
    }

    /// Number of days since 1970-01-01
    pub fn days(&self) -> i64 {
        self.0
    }

    /// Calendar date for this day
    pub fn to_date(&self) -> NaiveDate {
        let days = self.0 + UNIX_EPOCH_DAYS_FROM_CE;
        i32::try_from(days)
            .ok()
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .unwrap_or(if self.0 < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
    }

    pub fn plus(&self, days: i64) -> Self {
        Self(self.0 + days)
    }

    pub fn minus(&self, days: i64) -> Self {
        Self(self.0 - days)
    }

    /// Signed number of days from `self` until `other`.
    ///
    /// Positive when `other` is newer.
    pub fn days_until(&self, other: Timestamp) -> i64 {
        other.0 - self.0
    }

    /// Signed number of days from `a` until `b`
    pub fn days_between(a: Timestamp, b: Timestamp) -> i64 {
        a.days_until(b)
    }

    pub fn is_newer_than(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }

    pub fn is_older_than(&self, other: Timestamp) -> bool {
        self.0 < other.0
    }

    pub fn oldest(a: Timestamp, b: Timestamp) -> Timestamp {
        a.min(b)
    }

    pub fn newest(a: Timestamp, b: Timestamp) -> Timestamp {
        a.max(b)
    }

    pub fn weekday(&self) -> Weekday {
        self.to_date().weekday()
    }

    /// Truncate to the first day of the period containing this day.
    ///
    /// `first_weekday` only matters for [`TruncateField::Week`].
    pub fn truncate(&self, field: TruncateField, first_weekday: Weekday) -> Timestamp {
        let date = self.to_date();
        match field {
            TruncateField::Day => *self,
            TruncateField::Week => {
                let delta = date.weekday().num_days_from_monday() as i64
                    - first_weekday.num_days_from_monday() as i64;
                self.minus(delta.rem_euclid(7))
            }
            TruncateField::Month => Self::first_of(date.year(), date.month()).unwrap_or(*self),
            TruncateField::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                Self::first_of(date.year(), month).unwrap_or(*self)
            }
            TruncateField::Year => Self::first_of(date.year(), 1).unwrap_or(*self),
        }
    }

    fn first_of(year: i32, month: u32) -> Option<Timestamp> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }
}

impl From<NaiveDate> for Timestamp {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_date().format(DATE_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = HabitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Self::from_date)
            .map_err(|e| HabitError::DateParse(format!("'{}': {}", s, e)))
    }
}

impl TryFrom<String> for Timestamp {
    type Error = HabitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.to_string()
    }
}

/// Source of "today" for the derivation engine.
pub trait Clock: Send + Sync {
    fn today(&self) -> Timestamp;
}

/// Clock backed by the local system date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Timestamp {
        Timestamp::from_date(Local::now().date_naive())
    }
}

/// Clock pinned to a given day, adjustable at runtime.
#[derive(Debug)]
pub struct FixedClock {
    days: AtomicI64,
}

impl FixedClock {
    pub fn new(today: Timestamp) -> Self {
        Self {
            days: AtomicI64::new(today.days()),
        }
    }

    pub fn set(&self, today: Timestamp) {
        self.days.store(today.days(), Ordering::SeqCst);
    }

    /// Move the clock by a signed number of days
    pub fn advance(&self, days: i64) {
        self.days.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> Timestamp {
        Timestamp::from_days(self.days.load(Ordering::SeqCst))
    }
}
