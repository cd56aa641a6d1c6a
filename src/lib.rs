//! Habit Flux - derivation engine for habit tracking
//!
//! Flux turns sparse, user-recorded habit entries into dense derived series
//! through a deterministic pipeline: credit intervals → completion series →
//! smoothed scores → streaks. Every derived series is cached lazily and
//! invalidated from the day of each edit onwards.
//!
//! ## Modules
//!
//! - **Completions**: per-day status under a target frequency (`3 times per week`)
//! - **Scores**: exponentially smoothed habit strength in `[0, 1]`
//! - **Streaks**: maximal runs of successful days
//! - **Grouping**: weekly, monthly, quarterly and yearly aggregates

pub mod cache;
pub mod completion;
pub mod config;
pub mod csv;
pub mod error;
pub mod grouping;
pub mod habit;
pub mod score;
pub mod store;
pub mod streak;
pub mod timestamp;
pub mod types;

pub use config::{HabitConfig, TargetType};
pub use error::HabitError;
pub use habit::Habit;
pub use store::{MemoryRepetitionStore, RepetitionStore};
pub use timestamp::{Clock, FixedClock, SystemClock, Timestamp, TruncateField};

pub use types::{
    ComputedDay, DayValue, Frequency, GroupedScore, GroupedValue, HabitKind, RawEntry, RawValue,
    Score, Streak,
};

/// Crate version
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name reported by the CLI
pub const PRODUCER_NAME: &str = "habit-flux";
