//! Habit aggregate
//!
//! A [`Habit`] owns the repetition store and the three derived lists
//! (completions, scores, streaks) behind one lock. Reads may rebuild caches,
//! so they take the lock too. Every mutation invalidates all derived lists
//! from the mutated day onwards.

use crate::cache::{ComputeContext, Invalidate};
use crate::completion::CompletionList;
use crate::config::HabitConfig;
use crate::error::HabitError;
use crate::grouping;
use crate::score::ScoreList;
use crate::store::{MemoryRepetitionStore, RepetitionStore};
use crate::streak::StreakList;
use crate::timestamp::{Clock, SystemClock, Timestamp, TruncateField};
use crate::types::{
    ComputedDay, DayValue, GroupedScore, GroupedValue, RawEntry, RawValue, Score, Streak,
};
use chrono::Weekday;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use uuid::Uuid;

/// Derived lists of one habit
#[derive(Debug, Default)]
struct Derived {
    completions: CompletionList,
    scores: ScoreList,
    streaks: StreakList,
}

impl Invalidate for Derived {
    fn invalidate_newer_than(&mut self, timestamp: Timestamp) {
        self.completions.invalidate_newer_than(timestamp);
        self.scores.invalidate_newer_than(timestamp);
        self.streaks.invalidate_newer_than(timestamp);
    }
}

struct HabitState<S> {
    store: S,
    derived: Derived,
}

/// A tracked habit: raw entries plus lazily derived completions, scores and
/// streaks.
///
/// `Habit` is `Send + Sync`; different habits never share state.
pub struct Habit<S: RepetitionStore = MemoryRepetitionStore> {
    id: Uuid,
    config: HabitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<HabitState<S>>,
}

impl Habit<MemoryRepetitionStore> {
    /// Create a habit backed by an empty in-memory store
    pub fn new(config: HabitConfig) -> Result<Self, HabitError> {
        Self::with_store(config, MemoryRepetitionStore::new())
    }

    /// Restore a habit from entries previously saved with [`Habit::save_entries`]
    pub fn load_entries(config: HabitConfig, json: &str) -> Result<Self, HabitError> {
        let store: MemoryRepetitionStore = serde_json::from_str(json)?;
        if let Some(entry) = store.all().iter().find(|e| !e.value.matches(config.kind)) {
            return Err(mismatch(&config, entry));
        }
        Self::with_store(config, store)
    }

    /// Save all raw entries to JSON
    pub fn save_entries(&self) -> Result<String, HabitError> {
        Ok(serde_json::to_string(&self.lock().store)?)
    }
}

fn mismatch(config: &HabitConfig, entry: &RawEntry) -> HabitError {
    HabitError::InvalidValue(format!(
        "{:?} on {} cannot be recorded for a {} habit",
        entry.value,
        entry.timestamp,
        config.kind.as_str()
    ))
}

impl<S: RepetitionStore> Habit<S> {
    /// Create a habit over an existing repetition store
    pub fn with_store(config: HabitConfig, store: S) -> Result<Self, HabitError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            clock: Arc::new(SystemClock),
            state: Mutex::new(HabitState {
                store,
                derived: Derived::default(),
            }),
        })
    }

    /// Use a different source of "today"
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &HabitConfig {
        &self.config
    }

    pub fn today(&self) -> Timestamp {
        self.clock.today()
    }

    // Caches are rebuilt from the store, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HabitState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read against the derived lists under the habit lock
    fn read<R>(&self, f: impl FnOnce(&ComputeContext<'_>, &mut Derived) -> R) -> R {
        let today = self.clock.today();
        let mut guard = self.lock();
        let HabitState { store, derived } = &mut *guard;
        let ctx = ComputeContext::new(&*store, &self.config, today);
        f(&ctx, derived)
    }

    fn check_kind(&self, entry: &RawEntry) -> Result<(), HabitError> {
        if entry.value.matches(self.config.kind) {
            Ok(())
        } else {
            Err(mismatch(&self.config, entry))
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Insert or replace the entry for a day
    pub fn record(&self, entry: RawEntry) -> Result<(), HabitError> {
        self.check_kind(&entry)?;
        let mut state = self.lock();
        state.store.put(entry);
        state.derived.invalidate_newer_than(entry.timestamp);
        debug!(
            habit_id = %self.id,
            timestamp = %entry.timestamp,
            value = entry.value.code(),
            "recorded entry"
        );
        Ok(())
    }

    /// Convenience for [`Habit::record`]
    pub fn record_value(&self, timestamp: Timestamp, value: RawValue) -> Result<(), HabitError> {
        self.record(RawEntry::new(timestamp, value))
    }

    /// Insert many entries, invalidating once at the oldest touched day.
    ///
    /// Nothing is written if any entry has the wrong kind.
    pub fn record_batch(
        &self,
        entries: impl IntoIterator<Item = RawEntry>,
    ) -> Result<usize, HabitError> {
        let entries: Vec<RawEntry> = entries.into_iter().collect();
        for entry in &entries {
            self.check_kind(entry)?;
        }
        let Some(oldest) = entries.iter().map(|e| e.timestamp).min() else {
            return Ok(0);
        };

        let mut state = self.lock();
        for entry in &entries {
            state.store.put(*entry);
        }
        state.derived.invalidate_newer_than(oldest);
        debug!(
            habit_id = %self.id,
            entries = entries.len(),
            from = %oldest,
            "recorded batch"
        );
        Ok(entries.len())
    }

    /// Remove the entry for a day
    pub fn remove(&self, timestamp: Timestamp) -> Option<RawEntry> {
        let mut state = self.lock();
        let removed = state.store.remove(timestamp)?;
        state.derived.invalidate_newer_than(timestamp);
        debug!(habit_id = %self.id, timestamp = %timestamp, "removed entry");
        Some(removed)
    }

    /// Forget derived values at or after `timestamp`.
    ///
    /// Needed only when the store is changed behind the habit's back.
    pub fn invalidate_newer_than(&self, timestamp: Timestamp) {
        trace!(habit_id = %self.id, timestamp = %timestamp, "invalidating");
        self.lock().derived.invalidate_newer_than(timestamp);
    }

    /// Every raw entry, oldest first
    pub fn entries(&self) -> Vec<RawEntry> {
        self.lock().store.all()
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Dense days in `[from, to]`, newest first
    pub fn computed_days(&self, from: Timestamp, to: Timestamp) -> Vec<ComputedDay> {
        self.read(|ctx, d| d.completions.by_interval(ctx, from, to))
    }

    /// Day codes in `[from, to]`, newest first
    pub fn computed_values(&self, from: Timestamp, to: Timestamp) -> Vec<i64> {
        self.read(|ctx, d| d.completions.values(ctx, from, to))
    }

    /// Every day from today back to the oldest computed day
    pub fn all_computed_days(&self) -> Vec<ComputedDay> {
        self.read(|ctx, d| d.completions.all(ctx))
    }

    pub fn all_computed_values(&self) -> Vec<i64> {
        self.read(|ctx, d| d.completions.all_values(ctx))
    }

    pub fn computed_value(&self, timestamp: Timestamp) -> DayValue {
        self.read(|ctx, d| d.completions.value(ctx, timestamp))
    }

    pub fn today_value(&self) -> DayValue {
        self.read(|ctx, d| d.completions.today_value(ctx))
    }

    pub fn this_week_value(&self, first_weekday: Weekday) -> i64 {
        self.read(|ctx, d| d.completions.this_week_value(ctx, first_weekday))
    }

    pub fn this_month_value(&self) -> i64 {
        self.read(|ctx, d| d.completions.this_month_value(ctx))
    }

    pub fn this_quarter_value(&self) -> i64 {
        self.read(|ctx, d| d.completions.this_quarter_value(ctx))
    }

    pub fn this_year_value(&self) -> i64 {
        self.read(|ctx, d| d.completions.this_year_value(ctx))
    }

    /// Per-period sums, newest first; `max_groups == 0` means all
    pub fn group_by(
        &self,
        field: TruncateField,
        first_weekday: Weekday,
        max_groups: usize,
    ) -> Vec<GroupedValue> {
        self.read(|ctx, d| d.completions.group_by(ctx, field, first_weekday, max_groups))
    }

    /// Number of skipped days per period, newest first
    pub fn skipped_days(
        &self,
        field: TruncateField,
        first_weekday: Weekday,
    ) -> Vec<GroupedValue> {
        let days = self.all_computed_days();
        grouping::count_skipped(&days, field, first_weekday)
    }

    /// Successful entries per month and weekday (Monday first)
    pub fn weekday_frequency(&self) -> BTreeMap<Timestamp, [i64; 7]> {
        grouping::weekday_frequency(&self.entries(), self.config.kind)
    }

    /// Write the completion series as `<date>,<code>` lines, newest first
    pub fn write_csv<W: Write>(&self, sink: &mut W) -> Result<(), HabitError> {
        self.read(|ctx, d| d.completions.write_csv(ctx, sink))
    }

    // ------------------------------------------------------------------
    // Scores
    // ------------------------------------------------------------------

    pub fn score(&self, timestamp: Timestamp) -> f64 {
        self.read(|ctx, d| d.scores.value(ctx, &mut d.completions, timestamp))
    }

    pub fn today_score(&self) -> f64 {
        self.read(|ctx, d| d.scores.today_value(ctx, &mut d.completions))
    }

    /// Scores in `[from, to]`, newest first
    pub fn scores(&self, from: Timestamp, to: Timestamp) -> Vec<Score> {
        self.read(|ctx, d| d.scores.by_interval(ctx, &mut d.completions, from, to))
    }

    pub fn score_values(&self, from: Timestamp, to: Timestamp) -> Vec<f64> {
        self.read(|ctx, d| d.scores.values(ctx, &mut d.completions, from, to))
    }

    pub fn all_scores(&self) -> Vec<Score> {
        self.read(|ctx, d| d.scores.all(ctx, &mut d.completions))
    }

    /// Mean score per period, newest first
    pub fn score_group_by(
        &self,
        field: TruncateField,
        first_weekday: Weekday,
    ) -> Vec<GroupedScore> {
        self.read(|ctx, d| d.scores.group_by(ctx, &mut d.completions, field, first_weekday))
    }

    /// Drop every cached score
    pub fn recompute_scores(&self) {
        self.lock().derived.scores.recompute();
    }

    /// Write the score series as `<date>,<score>` lines, newest first
    pub fn write_scores_csv<W: Write>(&self, sink: &mut W) -> Result<(), HabitError> {
        self.read(|ctx, d| d.scores.write_csv(ctx, &mut d.completions, sink))
    }

    // ------------------------------------------------------------------
    // Streaks
    // ------------------------------------------------------------------

    /// Every streak, newest first
    pub fn streaks(&self) -> Vec<Streak> {
        self.read(|ctx, d| d.streaks.all(ctx, &mut d.completions))
    }

    /// The `limit` longest streaks, newest first
    pub fn best_streaks(&self, limit: usize) -> Vec<Streak> {
        self.read(|ctx, d| d.streaks.best(ctx, &mut d.completions, limit))
    }

    /// Most recent streak, if any
    pub fn newest_streak(&self) -> Option<Streak> {
        self.read(|ctx, d| {
            d.streaks.rebuild(ctx, &mut d.completions);
            d.streaks.newest_computed()
        })
    }
}
