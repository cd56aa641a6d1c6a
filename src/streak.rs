//! Streak extractor
//!
//! Maximal runs of successful days. Rebuilding resumes at the start of the
//! newest cached streak, since only that streak can still grow.

use crate::cache::{ComputeContext, Invalidate};
use crate::completion::CompletionList;
use crate::timestamp::Timestamp;
use crate::types::{ComputedDay, DayValue, HabitKind, Streak};
use tracing::debug;

/// Whether a day starts or extends a streak. Unlike
/// [`DayValue::is_checked`], a positive quantity counts.
fn counts_for_streak(value: DayValue) -> bool {
    match value {
        DayValue::Quantity(q) => q > 0,
        other => other.is_checked(),
    }
}

/// Whether a day ends a running streak: any unchecked day, or a quantity
/// that is not positive. Skips neither extend nor break one.
fn is_breaker(value: DayValue) -> bool {
    match value {
        DayValue::Unknown | DayValue::No => true,
        DayValue::Quantity(q) => q <= 0,
        _ => false,
    }
}

/// Split a dense series (oldest first) into streaks, oldest first.
///
/// For numeric habits the last successful day advances on every day, so a
/// numeric streak ends on the zero day that broke it.
pub fn values_to_streaks(days: &[ComputedDay], kind: HabitKind) -> Vec<Streak> {
    let mut streaks = Vec::new();
    let mut start: Option<Timestamp> = None;
    let mut last_successful: Option<Timestamp> = None;

    for day in days {
        let checked = counts_for_streak(day.value);
        if kind.is_numeric() || checked {
            last_successful = Some(day.timestamp);
        }
        if is_breaker(day.value) {
            if let (Some(begin), Some(end)) = (start.take(), last_successful) {
                streaks.push(Streak::new(begin, end));
            }
        }
        if start.is_none() && checked {
            start = Some(day.timestamp);
        }
    }
    if let (Some(begin), Some(end)) = (start, last_successful) {
        streaks.push(Streak::new(begin, end));
    }
    streaks
}

/// Cached streaks of one habit, oldest first
#[derive(Debug, Clone, Default)]
pub struct StreakList {
    streaks: Vec<Streak>,
}

impl StreakList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent cached streak
    pub fn newest_computed(&self) -> Option<Streak> {
        self.streaks.last().copied()
    }

    /// Recompute from the newest cached streak (or the oldest success) to today
    pub fn rebuild(&mut self, ctx: &ComputeContext<'_>, completions: &mut CompletionList) {
        self.streaks.retain(|streak| !streak.start.is_newer_than(ctx.today));
        let beginning = match self.newest_computed() {
            Some(streak) => streak.start,
            None => match ctx.store.oldest_successful() {
                Some(entry) => entry.timestamp,
                None => return,
            },
        };
        if beginning.is_newer_than(ctx.today) {
            return;
        }

        let mut days = completions.by_interval(ctx, beginning, ctx.today);
        days.reverse();
        let fresh = values_to_streaks(&days, ctx.config.kind);
        debug!(from = %beginning, streaks = fresh.len(), "rebuilt streaks");

        self.streaks.pop();
        self.streaks.extend(fresh);
    }

    /// Every streak, newest first
    pub fn all(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
    ) -> Vec<Streak> {
        self.rebuild(ctx, completions);
        let mut streaks = self.streaks.clone();
        streaks.sort_by(|a, b| b.compare_newer(a));
        streaks
    }

    /// The `limit` longest streaks (ties go to the newer one), newest first
    pub fn best(
        &mut self,
        ctx: &ComputeContext<'_>,
        completions: &mut CompletionList,
        limit: usize,
    ) -> Vec<Streak> {
        let mut streaks = self.all(ctx, completions);
        streaks.sort_by(|a, b| b.compare_longer(a));
        streaks.truncate(limit);
        streaks.sort_by(|a, b| b.compare_newer(a));
        streaks
    }
}

impl Invalidate for StreakList {
    /// Drop every streak that ends on or after `timestamp`
    fn invalidate_newer_than(&mut self, timestamp: Timestamp) {
        self.streaks.retain(|streak| streak.end.is_older_than(timestamp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HabitConfig, TargetType};
    use crate::store::{MemoryRepetitionStore, RepetitionStore};
    use crate::types::{Frequency, RawEntry, RawValue};
    use pretty_assertions::assert_eq;

    fn day(n: i64) -> Timestamp {
        Timestamp::from_days(n)
    }

    fn streak(start: i64, end: i64) -> Streak {
        Streak::new(day(start), day(end))
    }

    fn series(values: &[DayValue]) -> Vec<ComputedDay> {
        values
            .iter()
            .enumerate()
            .map(|(n, value)| ComputedDay::new(day(n as i64), *value))
            .collect()
    }

    fn yes_on(days: &[i64]) -> MemoryRepetitionStore {
        days.iter()
            .map(|n| RawEntry::new(day(*n), RawValue::Yes))
            .collect()
    }

    #[test]
    fn test_values_to_streaks_boolean() {
        use DayValue::*;
        let days = series(&[
            YesManual, YesAuto, Skip, YesManual, No, Unknown, YesManual, Skip, Unknown, YesAuto,
        ]);
        assert_eq!(
            values_to_streaks(&days, HabitKind::Boolean),
            vec![streak(0, 3), streak(6, 6), streak(9, 9)]
        );
    }

    #[test]
    fn test_values_to_streaks_leading_skips_do_not_start() {
        use DayValue::*;
        let days = series(&[Skip, Unknown, Skip, YesManual, Skip]);
        assert_eq!(values_to_streaks(&days, HabitKind::Boolean), vec![streak(3, 3)]);
        assert!(values_to_streaks(&[], HabitKind::Boolean).is_empty());
    }

    #[test]
    fn test_values_to_streaks_numeric_quirk() {
        use DayValue::*;
        let days = series(&[
            Quantity(500),
            Quantity(300),
            Quantity(0),
            Quantity(0),
            Quantity(200),
        ]);
        // The breaking zero day is recorded as the end of the streak
        assert_eq!(
            values_to_streaks(&days, HabitKind::Numeric),
            vec![streak(0, 2), streak(4, 4)]
        );
    }

    #[test]
    fn test_values_to_streaks_negative_quantity_breaks() {
        use DayValue::*;
        let days = series(&[Quantity(1_000), Quantity(-500), Quantity(2_000), Quantity(3_000)]);
        assert_eq!(
            values_to_streaks(&days, HabitKind::Numeric),
            vec![streak(0, 1), streak(2, 3)]
        );
    }

    #[test]
    fn test_all_and_best() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on(&[0, 1, 2, 5, 6, 10, 11, 12, 20]);
        let ctx = ComputeContext::new(&store, &config, day(20));
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();

        assert_eq!(
            list.all(&ctx, &mut completions),
            vec![streak(20, 20), streak(10, 12), streak(5, 6), streak(0, 2)]
        );
        // Equal lengths prefer the newer streak
        assert_eq!(
            list.best(&ctx, &mut completions, 2),
            vec![streak(10, 12), streak(0, 2)]
        );
        assert!(list.best(&ctx, &mut completions, 0).is_empty());
        assert_eq!(list.newest_computed(), Some(streak(20, 20)));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on(&[0, 1, 3, 4, 5]);
        let ctx = ComputeContext::new(&store, &config, day(5));
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();

        let first = list.all(&ctx, &mut completions);
        let second = list.all(&ctx, &mut completions);
        assert_eq!(first, second);
        assert_eq!(first, vec![streak(3, 5), streak(0, 1)]);
    }

    #[test]
    fn test_newest_streak_grows_with_today() {
        let config = HabitConfig::boolean(Frequency::THREE_TIMES_PER_WEEK);
        let store = yes_on(&[0, 1, 2]);
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();

        let ctx = ComputeContext::new(&store, &config, day(3));
        assert_eq!(list.all(&ctx, &mut completions), vec![streak(0, 3)]);

        let ctx = ComputeContext::new(&store, &config, day(10));
        assert_eq!(list.all(&ctx, &mut completions), vec![streak(0, 6)]);
    }

    #[test]
    fn test_invalidation_after_edit() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let mut store = yes_on(&[0, 1, 2, 3, 6, 7]);
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();
        {
            let ctx = ComputeContext::new(&store, &config, day(8));
            assert_eq!(
                list.all(&ctx, &mut completions),
                vec![streak(6, 7), streak(0, 3)]
            );
        }

        store.put(RawEntry::new(day(2), RawValue::No));
        completions.invalidate_newer_than(day(2));
        list.invalidate_newer_than(day(2));
        assert!(list.newest_computed().is_none());

        let ctx = ComputeContext::new(&store, &config, day(8));
        assert_eq!(
            list.all(&ctx, &mut completions),
            vec![streak(6, 7), streak(3, 3), streak(0, 1)]
        );
    }

    #[test]
    fn test_no_successes_means_no_streaks() {
        let config = HabitConfig::numeric(Frequency::DAILY, 1.0, TargetType::AtLeast);
        let store: MemoryRepetitionStore = [RawEntry::new(day(0), RawValue::Quantity(0))]
            .into_iter()
            .collect();
        let ctx = ComputeContext::new(&store, &config, day(3));
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();
        assert!(store.oldest_successful().is_none());
        assert!(list.all(&ctx, &mut completions).is_empty());
    }

    #[test]
    fn test_clock_moving_back_drops_newer_streaks() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on(&[0, 1, 2, 6, 7]);
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();

        let ctx = ComputeContext::new(&store, &config, day(8));
        assert_eq!(
            list.all(&ctx, &mut completions),
            vec![streak(6, 7), streak(0, 2)]
        );

        let ctx = ComputeContext::new(&store, &config, day(4));
        assert_eq!(list.all(&ctx, &mut completions), vec![streak(0, 2)]);
    }

    #[test]
    fn test_future_beginning_is_ignored() {
        let config = HabitConfig::boolean(Frequency::DAILY);
        let store = yes_on(&[10]);
        let ctx = ComputeContext::new(&store, &config, day(5));
        let mut completions = CompletionList::new();
        let mut list = StreakList::new();
        assert!(list.all(&ctx, &mut completions).is_empty());
    }
}
