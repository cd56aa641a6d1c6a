//! Core types for the Habit Flux engine
//!
//! This module defines the data structures that flow through each stage of the
//! derivation: raw entries, computed days, scores, streaks and grouped values.

use crate::error::HabitError;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Whether a habit is tracked as yes/no or as a measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitKind {
    #[default]
    Boolean,
    Numeric,
}

impl HabitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitKind::Boolean => "boolean",
            HabitKind::Numeric => "numeric",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, HabitKind::Numeric)
    }

    /// Value of a day for which nothing is known
    pub fn empty_value(&self) -> DayValue {
        match self {
            HabitKind::Boolean => DayValue::Unknown,
            HabitKind::Numeric => DayValue::Quantity(0),
        }
    }
}

/// Target rate: `numerator` qualifying days per `denominator`-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FrequencyFields")]
pub struct Frequency {
    numerator: u32,
    denominator: u32,
}

#[derive(Deserialize)]
struct FrequencyFields {
    numerator: u32,
    denominator: u32,
}

impl TryFrom<FrequencyFields> for Frequency {
    type Error = HabitError;

    fn try_from(fields: FrequencyFields) -> Result<Self, Self::Error> {
        Frequency::new(fields.numerator, fields.denominator)
    }
}

impl Frequency {
    pub const DAILY: Frequency = Frequency { numerator: 1, denominator: 1 };
    pub const WEEKLY: Frequency = Frequency { numerator: 1, denominator: 7 };
    pub const TWO_TIMES_PER_WEEK: Frequency = Frequency { numerator: 2, denominator: 7 };
    pub const THREE_TIMES_PER_WEEK: Frequency = Frequency { numerator: 3, denominator: 7 };

    pub fn new(numerator: u32, denominator: u32) -> Result<Self, HabitError> {
        let invalid = |reason| HabitError::InvalidFrequency {
            numerator,
            denominator,
            reason,
        };
        if numerator == 0 || denominator == 0 {
            return Err(invalid("numerator and denominator must be positive"));
        }
        if numerator > denominator {
            return Err(invalid("numerator must not exceed denominator"));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Value of a user-recorded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    /// Explicit failure
    No,
    /// Explicit success
    Yes,
    /// Explicit skip; the day neither counts for nor against the habit
    Skip,
    /// Measured quantity, fixed point (x1000)
    Quantity(i64),
}

impl RawValue {
    /// Integer code used by the CSV contract
    pub fn code(&self) -> i64 {
        match self {
            RawValue::No => DayValue::NO,
            RawValue::Yes => DayValue::YES_MANUAL,
            RawValue::Skip => DayValue::SKIP,
            RawValue::Quantity(q) => *q,
        }
    }

    /// Decode an integer code for a habit of the given kind
    pub fn from_code(code: i64, kind: HabitKind) -> Result<Self, HabitError> {
        match kind {
            HabitKind::Numeric => Ok(RawValue::Quantity(code)),
            HabitKind::Boolean => match code {
                DayValue::NO => Ok(RawValue::No),
                DayValue::YES_MANUAL => Ok(RawValue::Yes),
                DayValue::SKIP => Ok(RawValue::Skip),
                other => Err(HabitError::InvalidValue(format!(
                    "{} is not a valid boolean entry code (expected 0, 2 or 3)",
                    other
                ))),
            },
        }
    }

    /// Whether this value can be recorded for a habit of the given kind
    pub fn matches(&self, kind: HabitKind) -> bool {
        match self {
            RawValue::Quantity(_) => kind == HabitKind::Numeric,
            _ => kind == HabitKind::Boolean,
        }
    }

    /// Explicit success, or a positive quantity
    pub fn is_successful(&self) -> bool {
        match self {
            RawValue::Yes => true,
            RawValue::Quantity(q) => *q > 0,
            _ => false,
        }
    }
}

/// A user-recorded event for one day, owned by the repetition store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub timestamp: Timestamp,
    pub value: RawValue,
}

impl RawEntry {
    pub fn new(timestamp: Timestamp, value: RawValue) -> Self {
        Self { timestamp, value }
    }
}

/// Completion status of a single day in the dense series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayValue {
    /// Nothing recorded and no implicit credit
    Unknown,
    /// Explicit failure
    No,
    /// Credited by a frequency interval without an entry of its own
    YesAuto,
    /// Explicit success
    YesManual,
    /// Explicit skip
    Skip,
    /// Measured quantity (numeric habits), fixed point (x1000)
    Quantity(i64),
}

impl DayValue {
    pub const UNKNOWN: i64 = -1;
    pub const NO: i64 = 0;
    pub const YES_AUTO: i64 = 1;
    pub const YES_MANUAL: i64 = 2;
    pub const SKIP: i64 = 3;

    /// Integer code used by the CSV contract
    pub fn code(&self) -> i64 {
        match self {
            DayValue::Unknown => Self::UNKNOWN,
            DayValue::No => Self::NO,
            DayValue::YesAuto => Self::YES_AUTO,
            DayValue::YesManual => Self::YES_MANUAL,
            DayValue::Skip => Self::SKIP,
            DayValue::Quantity(q) => *q,
        }
    }

    /// Decode an integer code for a habit of the given kind
    pub fn from_code(code: i64, kind: HabitKind) -> Result<Self, HabitError> {
        match kind {
            HabitKind::Numeric => Ok(DayValue::Quantity(code)),
            HabitKind::Boolean => match code {
                Self::UNKNOWN => Ok(DayValue::Unknown),
                Self::NO => Ok(DayValue::No),
                Self::YES_AUTO => Ok(DayValue::YesAuto),
                Self::YES_MANUAL => Ok(DayValue::YesManual),
                Self::SKIP => Ok(DayValue::Skip),
                other => Err(HabitError::InvalidValue(format!(
                    "{} is not a valid day code (expected -1..=3)",
                    other
                ))),
            },
        }
    }

    /// Successful day: explicit or implicit credit
    pub fn is_checked(&self) -> bool {
        matches!(self, DayValue::YesManual | DayValue::YesAuto)
    }

    /// Quantity for numeric days, zero otherwise
    pub fn quantity(&self) -> i64 {
        match self {
            DayValue::Quantity(q) => *q,
            _ => 0,
        }
    }
}

impl From<RawValue> for DayValue {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::No => DayValue::No,
            RawValue::Yes => DayValue::YesManual,
            RawValue::Skip => DayValue::Skip,
            RawValue::Quantity(q) => DayValue::Quantity(q),
        }
    }
}

/// One day of the dense completion series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedDay {
    pub timestamp: Timestamp,
    pub value: DayValue,
}

impl ComputedDay {
    pub fn new(timestamp: Timestamp, value: DayValue) -> Self {
        Self { timestamp, value }
    }
}

/// Smoothed performance of a habit on a given day, in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Score {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Combine the previous score with today's completion percentage.
    ///
    /// The decay multiplier is `0.5 ^ (sqrt(frequency) / 13)`: daily habits
    /// converge faster than weekly ones. For `previous` and `percentage` in
    /// `[0, 1]` the result stays in `[0, 1]`.
    pub fn compute(frequency: f64, previous: f64, percentage: f64) -> f64 {
        let multiplier = 0.5_f64.powf(frequency.sqrt() / 13.0);
        previous * multiplier + percentage * (1.0 - multiplier)
    }
}

/// Maximal inclusive run of consecutive successful days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Streak {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Streak {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Number of days, both endpoints included
    pub fn length(&self) -> i64 {
        self.start.days_until(self.end) + 1
    }

    /// Order by end day, then by start day
    pub fn compare_newer(&self, other: &Streak) -> Ordering {
        self.end
            .cmp(&other.end)
            .then_with(|| self.start.cmp(&other.start))
    }

    /// Order by length, ties broken by [`Streak::compare_newer`]
    pub fn compare_longer(&self, other: &Streak) -> Ordering {
        self.length()
            .cmp(&other.length())
            .then_with(|| self.compare_newer(other))
    }
}

/// Sum of a completion series over one calendar period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedValue {
    /// First day of the period
    pub timestamp: Timestamp,
    pub value: i64,
}

/// Mean score over one calendar period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupedScore {
    /// First day of the period
    pub timestamp: Timestamp,
    pub value: f64,
}
