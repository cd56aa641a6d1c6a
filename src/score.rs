//! Score engine
//!
//! Exponentially smoothed habit strength. Each day combines the previous
//! score with the completion percentage of a rolling window that is as wide
//! as the frequency denominator:
//! - Boolean habits count explicit successes in the window
//! - Numeric habits sum quantities and compare against the target
//!
//! Scores are cached densely from the oldest entry and only ever extended
//! towards today, so the value of a day never depends on query order.

use crate::cache::{ComputeContext, DayCache, Invalidate};
use crate::completion::CompletionList;
use crate::config::{HabitConfig, TargetType};
use crate::csv;
use crate::error::HabitError;
use crate::grouping;
use crate::timestamp::{Timestamp, TruncateField};
use crate::types::{DayValue, GroupedScore, HabitKind, Score};
use chrono::Weekday;
use std::io::Write;
use tracing::{debug, trace};

/// Rolling-window parameters derived from a habit's configuration
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    numerator: f64,
    width: usize,
    frequency: f64,
}

impl Window {
    fn for_config(config: &HabitConfig) -> Self {
        let frequency = config.frequency.to_f64();
        let mut numerator = config.frequency.numerator();
        let mut width = config.frequency.denominator();
        // Non-daily boolean habits use a doubled window to absorb irregular schedules
        if !config.is_numeric() && frequency < 1.0 {
            numerator *= 2;
            width *= 2;
        }
        Self {
            numerator: numerator as f64,
            width: width as usize,
            frequency,
        }
    }
}

/// Score of a habit before any entry
pub fn initial_score(config: &HabitConfig) -> f64 {
    if config.is_numeric() && config.target_type == TargetType::AtMost {
        1.0
    } else {
        0.0
    }
}

/// Oldest entry on or before today; scoring starts there
fn first_scored_day(ctx: &ComputeContext<'_>) -> Option<Timestamp> {
    ctx.store
        .oldest()
        .map(|entry| entry.timestamp)
        .filter(|timestamp| !timestamp.is_newer_than(ctx.today))
}

/// Amount a day adds to the rolling sum
fn contribution(value: DayValue, kind: HabitKind) -> f64 {
    match kind {
        HabitKind::Numeric => value.quantity().max(0) as f64,
        HabitKind::Boolean => {
            if value == DayValue::YesManual {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Completion percentage of a window, in `[0, 1]`
fn percentage(config: &HabitConfig, window: &Window, rolling_sum: f64) -> f64 {
    if !config.is_numeric() {
        return (rolling_sum / window.numerator).min(1.0);
    }
    let total = rolling_sum / 1000.0;
    let target = config.target_value;
    match config.target_type {
        TargetType::AtLeast if target > 0.0 => (total / target).min(1.0),
        TargetType::AtLeast => 1.0,
        TargetType::AtMost if target > 0.0 => (1.0 - (total - target) / target).clamp(0.0, 1.0),
        TargetType::AtMost => {
            if total > 0.0 {
                0.0
            } else {
                1.0
            }
        }
    }
}

/// Dense score series of one habit
#[derive(Debug, Clone, Default)]
pub struct ScoreList {
    cache: DayCache<f64>,
}

impl ScoreList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure every day in `[from, to]` up to today has a cached score.
    ///
    /// The cache always starts at the oldest entry on or before today and is
    /// extended towards today from the newest cached score. Days before that
    /// entry hold the initial score and are never cached.
    pub fn compute(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        from: Timestamp,
        to: Timestamp,
    ) {
        // The clock may have moved back since the last compute
        self.cache.truncate_from(ctx.today.plus(1));

        let Some(start) = first_scored_day(ctx) else {
            self.cache.clear();
            return;
        };
        let to = Timestamp::oldest(to, ctx.today);
        if from.is_newer_than(to) || to.is_older_than(start) {
            return;
        }
        if self.cache.oldest().is_some_and(|oldest| oldest != start) {
            self.cache.clear();
        }

        match self.cache.newest_value() {
            None => {
                let initial = initial_score(ctx.config);
                let scores = self.compute_range(ctx, completions, start, to, initial);
                self.cache.replace(start, scores);
            }
            Some((newest, newest_score)) if to.is_newer_than(newest) => {
                let scores = self.compute_range(ctx, completions, newest.plus(1), to, newest_score);
                self.cache.extend_newer(newest.plus(1), scores);
            }
            Some(_) => {}
        }
    }

    /// Scores for `[from, to]`, oldest first, seeded with `previous`
    fn compute_range(
        &self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        from: Timestamp,
        to: Timestamp,
        previous: f64,
    ) -> Vec<f64> {
        let window = Window::for_config(ctx.config);
        let kind = ctx.config.kind;
        let lead = window.width as i64 - 1;
        let values = completions.dense(ctx, from.minus(lead), to);

        let mut rolling_sum: f64 = values[..lead as usize]
            .iter()
            .map(|value| contribution(*value, kind))
            .sum();
        let mut previous = previous;
        let mut scores = Vec::with_capacity(values.len() - lead as usize);

        for (index, value) in values.iter().enumerate().skip(lead as usize) {
            rolling_sum += contribution(*value, kind);
            if *value != DayValue::Skip {
                let pct = percentage(ctx.config, &window, rolling_sum);
                previous = Score::compute(window.frequency, previous, pct);
            }
            scores.push(previous);
            rolling_sum -= contribution(values[index - lead as usize], kind);
        }

        debug!(from = %from, to = %to, days = scores.len(), "computed scores");
        scores
    }

    /// Score of a single day; the initial score before the first entry and
    /// after today
    pub fn value(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        timestamp: Timestamp,
    ) -> f64 {
        let scored = first_scored_day(ctx).is_some_and(|start| {
            !timestamp.is_older_than(start) && !timestamp.is_newer_than(ctx.today)
        });
        if !scored {
            return initial_score(ctx.config);
        }
        self.compute(ctx, completions, timestamp, timestamp);
        match self.cache.get(timestamp) {
            Some(score) => score,
            None => panic!("score cache has no value for {timestamp} right after computing it"),
        }
    }

    pub fn today_value(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
    ) -> f64 {
        self.value(ctx, completions, ctx.today)
    }

    /// Scores for `[from, to]` clipped to today, newest first.
    ///
    /// One score per day; days before the first entry carry the initial score.
    pub fn by_interval(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        from: Timestamp,
        to: Timestamp,
    ) -> Vec<Score> {
        let to = Timestamp::oldest(to, ctx.today);
        if from.is_newer_than(to) || ctx.store.oldest().is_none() {
            return Vec::new();
        }
        self.compute(ctx, completions, from, to);

        let mut scores: Vec<Score> = self
            .cache
            .range_newest_first(from, to)
            .into_iter()
            .map(|(timestamp, value)| Score::new(timestamp, value))
            .collect();
        let initial = initial_score(ctx.config);
        let mut current = scores.last().map_or(to, |score| score.timestamp.minus(1));
        while !current.is_older_than(from) {
            scores.push(Score::new(current, initial));
            current = current.minus(1);
        }
        scores
    }

    pub fn values(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        from: Timestamp,
        to: Timestamp,
    ) -> Vec<f64> {
        self.by_interval(ctx, completions, from, to)
            .iter()
            .map(|score| score.value)
            .collect()
    }

    /// Every score from today back to the oldest raw entry
    pub fn all(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
    ) -> Vec<Score> {
        match first_scored_day(ctx) {
            Some(start) => self.by_interval(ctx, completions, start, ctx.today),
            None => Vec::new(),
        }
    }

    /// Mean score per period, newest first
    pub fn group_by(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        field: TruncateField,
        first_weekday: Weekday,
    ) -> Vec<GroupedScore> {
        let scores = self.all(ctx, completions);
        grouping::average_by(&scores, field, first_weekday)
    }

    /// Drop every cached score
    pub fn recompute(&mut self) {
        trace!("dropping score cache");
        self.cache.clear();
    }

    /// Write `<date>,<score>` lines from today back to the oldest entry
    pub fn write_csv<W: Write>(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        sink: &mut W,
    ) -> Result<(), HabitError> {
        let scores = self.all(ctx, completions);
        csv::write_scores_csv(&scores, sink)
    }
}

impl Invalidate for ScoreList {
    fn invalidate_newer_than(&mut self, timestamp: Timestamp) {
        self.cache.truncate_from(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRepetitionStore, RepetitionStore};
    use crate::types::{Frequency, RawEntry, RawValue};

    const TOLERANCE: f64 = 1e-9;

    fn day(n: i64) -> Timestamp {
        Timestamp::from_days(n)
    }

    fn yes_on(days: impl IntoIterator<Item = i64>) -> MemoryRepetitionStore {
        days.into_iter()
            .map(|n| RawEntry::new(day(n), RawValue::Yes))
            .collect()
    }

    /// Scores of a fresh list, oldest first
    fn fresh_scores(
        store: &MemoryRepetitionStore,
        config: &HabitConfig,
        today: Timestamp,
    ) -> Vec<f64> {
        let ctx = ComputeContext::new(store, config, today);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        let mut values = scores.values(&ctx, &mut completions, day(0), today);
        values.reverse();
        values
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < TOLERANCE, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_daily_habit_recurrence() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([0, 1, 3]);
        let scores = fresh_scores(&store, &config, day(4));

        let m = 0.5_f64.powf(1.0 / 13.0);
        let s0 = 1.0 - m;
        let s1 = s0 * m + (1.0 - m);
        let s2 = s1 * m;
        let s3 = s2 * m + (1.0 - m);
        let s4 = s3 * m;
        assert_close(&scores, &[s0, s1, s2, s3, s4]);
    }

    #[test]
    fn test_weekly_habit_uses_doubled_window() {
        let config = HabitConfig::boolean(Frequency::WEEKLY);
        let store = yes_on([0]);
        let scores = fresh_scores(&store, &config, day(15));

        // One success in a 14-day window with numerator 2 gives 50%
        let f = 1.0_f64 / 7.0;
        let m = 0.5_f64.powf(f.sqrt() / 13.0);
        let mut expected = Vec::new();
        let mut previous = 0.0;
        for n in 0..=15 {
            let pct = if n < 14 { 0.5 } else { 0.0 };
            previous = previous * m + pct * (1.0 - m);
            expected.push(previous);
        }
        assert_close(&scores, &expected);
    }

    #[test]
    fn test_skip_carries_previous_score() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store: MemoryRepetitionStore = [
            RawEntry::new(day(0), RawValue::Yes),
            RawEntry::new(day(1), RawValue::Skip),
            RawEntry::new(day(2), RawValue::Skip),
        ]
        .into_iter()
        .collect();
        let scores = fresh_scores(&store, &config, day(3));
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], scores[0]);
        assert_eq!(scores[2], scores[0]);
        assert!(scores[3] < scores[0]);
    }

    #[test]
    fn test_scores_are_bounded_and_converge() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on(0..1000);
        let scores = fresh_scores(&store, &config, day(999));
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!((scores[999] - 1.0).abs() < 1e-6);
        assert!(scores.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_numeric_at_least() {
        let config = HabitConfig::numeric(Frequency::DAILY, 8.0, TargetType::AtLeast);
        let store: MemoryRepetitionStore = [
            RawEntry::new(day(0), RawValue::Quantity(10_000)),
            RawEntry::new(day(1), RawValue::Quantity(4_000)),
        ]
        .into_iter()
        .collect();
        let scores = fresh_scores(&store, &config, day(1));
        let m = 0.5_f64.powf(1.0 / 13.0);
        let s0 = 1.0 - m;
        let s1 = s0 * m + 0.5 * (1.0 - m);
        assert_close(&scores, &[s0, s1]);
    }

    #[test]
    fn test_numeric_at_most_starts_full() {
        let config = HabitConfig::numeric(Frequency::DAILY, 2.0, TargetType::AtMost);
        let store: MemoryRepetitionStore = [
            RawEntry::new(day(0), RawValue::Quantity(1_000)),
            RawEntry::new(day(1), RawValue::Quantity(3_000)),
            RawEntry::new(day(2), RawValue::Quantity(5_000)),
        ]
        .into_iter()
        .collect();
        let scores = fresh_scores(&store, &config, day(2));
        let m = 0.5_f64.powf(1.0 / 13.0);
        let s0 = 1.0;
        let s1 = s0 * m + 0.5 * (1.0 - m);
        let s2 = s1 * m;
        assert_close(&scores, &[s0, s1, s2]);
    }

    #[test]
    fn test_numeric_zero_target() {
        let at_least = HabitConfig::numeric(Frequency::DAILY, 0.0, TargetType::AtLeast);
        let at_most = HabitConfig::numeric(Frequency::DAILY, 0.0, TargetType::AtMost);
        let store: MemoryRepetitionStore = [RawEntry::new(day(0), RawValue::Quantity(1_000))]
            .into_iter()
            .collect();
        let m = 0.5_f64.powf(1.0 / 13.0);
        assert_close(&fresh_scores(&store, &at_least, day(0)), &[1.0 - m]);
        assert_close(&fresh_scores(&store, &at_most, day(0)), &[m]);
    }

    #[test]
    fn test_incremental_matches_full_pass() {
        let config = HabitConfig::boolean(Frequency::THREE_TIMES_PER_WEEK);
        let store = yes_on([0, 2, 3, 9, 10, 12, 20, 21, 22, 30]);
        let today = day(40);
        let full = fresh_scores(&store, &config, today);

        let ctx = ComputeContext::new(&store, &config, today);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        // Grow the cache one day at a time
        for n in 0..=40 {
            scores.value(&ctx, &mut completions, day(n));
        }
        let mut incremental = scores.values(&ctx, &mut completions, day(0), today);
        incremental.reverse();
        assert_close(&incremental, &full);
    }

    #[test]
    fn test_invalidate_then_recompute_is_idempotent() {
        let config = HabitConfig::boolean(Frequency::TWO_TIMES_PER_WEEK);
        let store = yes_on([0, 1, 5, 6, 8]);
        let today = day(12);
        let ctx = ComputeContext::new(&store, &config, today);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        let before = scores.all(&ctx, &mut completions);

        scores.invalidate_newer_than(day(6));
        assert_eq!(scores.all(&ctx, &mut completions), before);

        scores.recompute();
        assert_eq!(scores.all(&ctx, &mut completions), before);
    }

    #[test]
    fn test_new_entry_changes_scores_after_invalidation() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let mut store = yes_on([0, 1]);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        let before = {
            let ctx = ComputeContext::new(&store, &config, day(5));
            scores.value(&ctx, &mut completions, day(5))
        };

        store.put(RawEntry::new(day(4), RawValue::Yes));
        completions.invalidate_newer_than(day(4));
        scores.invalidate_newer_than(day(4));

        let ctx = ComputeContext::new(&store, &config, day(5));
        let after = scores.value(&ctx, &mut completions, day(5));
        assert!(after > before);
        let fresh = fresh_scores(&store, &config, day(5));
        assert_eq!(scores.value(&ctx, &mut completions, day(1)), fresh[1]);
    }

    #[test]
    fn test_prefix_and_no_holes() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([10, 11]);
        let ctx = ComputeContext::new(&store, &config, day(15));
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();

        scores.value(&ctx, &mut completions, day(12));
        scores.value(&ctx, &mut completions, day(3));
        scores.value(&ctx, &mut completions, day(15));

        let all = scores.by_interval(&ctx, &mut completions, day(3), day(15));
        assert_eq!(all.len(), 13);
        for pair in all.windows(2) {
            assert_eq!(pair[0].timestamp.days() - 1, pair[1].timestamp.days());
        }
        // Days before the first entry keep the initial score
        assert_eq!(scores.value(&ctx, &mut completions, day(5)), 0.0);
    }

    #[test]
    fn test_query_order_does_not_change_scores() {
        // A zero target is met on every day, including days before the entry
        let config = HabitConfig::numeric(Frequency::DAILY, 0.0, TargetType::AtLeast);
        let store: MemoryRepetitionStore = [RawEntry::new(day(10), RawValue::Quantity(1_000))]
            .into_iter()
            .collect();
        let ctx = ComputeContext::new(&store, &config, day(12));

        let mut completions = CompletionList::new();
        let mut newest_first = ScoreList::new();
        let a10 = newest_first.value(&ctx, &mut completions, day(10));
        let a5 = newest_first.value(&ctx, &mut completions, day(5));

        let mut completions = CompletionList::new();
        let mut oldest_first = ScoreList::new();
        let b5 = oldest_first.value(&ctx, &mut completions, day(5));
        let b10 = oldest_first.value(&ctx, &mut completions, day(10));

        assert_eq!(a10, b10);
        assert_eq!(a5, b5);
        assert_eq!(b5, 0.0);
        assert_eq!(
            newest_first.values(&ctx, &mut completions, day(0), day(12)),
            oldest_first.values(&ctx, &mut completions, day(0), day(12))
        );
    }

    #[test]
    fn test_days_after_today_are_not_cached() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([0, 5]);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();

        let ctx = ComputeContext::new(&store, &config, day(3));
        assert_eq!(scores.value(&ctx, &mut completions, day(6)), 0.0);
        assert_eq!(scores.by_interval(&ctx, &mut completions, day(0), day(10)).len(), 4);

        let ctx = ComputeContext::new(&store, &config, day(6));
        let fresh = fresh_scores(&store, &config, day(6));
        assert_eq!(scores.value(&ctx, &mut completions, day(6)), fresh[6]);
        assert_eq!(scores.value(&ctx, &mut completions, day(5)), fresh[5]);
    }

    #[test]
    fn test_clock_moving_back_drops_newer_scores() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([0, 1, 5, 6]);
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();

        let ctx = ComputeContext::new(&store, &config, day(8));
        scores.all(&ctx, &mut completions);

        let ctx = ComputeContext::new(&store, &config, day(3));
        assert_eq!(scores.all(&ctx, &mut completions).len(), 4);
        assert_eq!(scores.value(&ctx, &mut completions, day(6)), 0.0);

        let ctx = ComputeContext::new(&store, &config, day(8));
        let mut again = scores.values(&ctx, &mut completions, day(0), day(8));
        again.reverse();
        assert_eq!(again, fresh_scores(&store, &config, day(8)));
    }

    #[test]
    fn test_future_entries_are_not_scored() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([10]);
        let ctx = ComputeContext::new(&store, &config, day(5));
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        assert!(scores.all(&ctx, &mut completions).is_empty());
        assert_eq!(scores.today_value(&ctx, &mut completions), 0.0);
        assert_eq!(
            scores.values(&ctx, &mut completions, day(4), day(20)),
            vec![0.0, 0.0]
        );
    }

    #[test]
    fn test_empty_habit() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = MemoryRepetitionStore::new();
        let ctx = ComputeContext::new(&store, &config, day(5));
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();
        assert_eq!(scores.today_value(&ctx, &mut completions), 0.0);
        assert!(scores.all(&ctx, &mut completions).is_empty());
        assert!(scores.by_interval(&ctx, &mut completions, day(5), day(0)).is_empty());
        assert!(store.oldest().is_none());
    }

    #[test]
    fn test_group_by_and_csv() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on([0, 1]);
        let ctx = ComputeContext::new(&store, &config, day(2));
        let mut completions = CompletionList::new();
        let mut scores = ScoreList::new();

        let all = scores.all(&ctx, &mut completions);
        let months = scores.group_by(&ctx, &mut completions, TruncateField::Month, Weekday::Mon);
        assert_eq!(months.len(), 1);
        let mean = all.iter().map(|s| s.value).sum::<f64>() / 3.0;
        assert!((months[0].value - mean).abs() < TOLERANCE);

        let mut out = Vec::new();
        scores.write_csv(&ctx, &mut completions, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("1970-01-03,{:.4}", all[0].value));
        assert!(lines[2].starts_with("1970-01-01,0.05"));
    }
}
