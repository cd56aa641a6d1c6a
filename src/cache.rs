//! Lazy derived-series caches
//!
//! Each derived series (completions, scores) is held in a [`DayCache`]: one
//! value per day over a contiguous range. The cache can only be replaced,
//! grow at its newest end and shrink from its newest end, so it never has
//! holes. An append that would leave a gap is a programming error and panics.
//!
//! Mutating a raw entry calls [`Invalidate::invalidate_newer_than`] on every
//! derived list; the next read recomputes lazily from the repetition store.

use crate::config::HabitConfig;
use crate::store::RepetitionStore;
use crate::timestamp::Timestamp;
use std::collections::VecDeque;

/// Inputs shared by every derived computation
#[derive(Clone, Copy)]
pub struct ComputeContext<'a> {
    pub store: &'a dyn RepetitionStore,
    pub config: &'a HabitConfig,
    pub today: Timestamp,
}

impl<'a> ComputeContext<'a> {
    pub fn new(store: &'a dyn RepetitionStore, config: &'a HabitConfig, today: Timestamp) -> Self {
        Self {
            store,
            config,
            today,
        }
    }
}

/// Cache truncation hook shared by the derived lists
pub trait Invalidate {
    /// Forget every cached day at or after `timestamp`
    fn invalidate_newer_than(&mut self, timestamp: Timestamp);
}

/// Contiguous per-day cache, stored oldest first
#[derive(Debug, Clone)]
pub struct DayCache<T> {
    oldest: Option<Timestamp>,
    values: VecDeque<T>,
}

impl<T> Default for DayCache<T> {
    fn default() -> Self {
        Self {
            oldest: None,
            values: VecDeque::new(),
        }
    }
}

impl<T: Copy> DayCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn oldest(&self) -> Option<Timestamp> {
        self.oldest.filter(|_| !self.values.is_empty())
    }

    pub fn newest(&self) -> Option<Timestamp> {
        self.oldest().map(|oldest| oldest.plus(self.values.len() as i64 - 1))
    }

    /// Cached value for a day, if that day is inside the cached range
    pub fn get(&self, timestamp: Timestamp) -> Option<T> {
        let offset = self.oldest()?.days_until(timestamp);
        usize::try_from(offset)
            .ok()
            .and_then(|offset| self.values.get(offset))
            .copied()
    }

    pub fn newest_value(&self) -> Option<(Timestamp, T)> {
        Some((self.newest()?, *self.values.back()?))
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.oldest = None;
    }

    /// Replace the whole cache with `values`, the first of which is `oldest`
    pub fn replace(&mut self, oldest: Timestamp, values: Vec<T>) {
        self.values = values.into();
        self.oldest = Some(oldest);
    }

    /// Append `values` (oldest first) starting at day `from`.
    ///
    /// `from` must be the day right after the newest cached day.
    pub fn extend_newer(&mut self, from: Timestamp, values: Vec<T>) {
        if values.is_empty() {
            return;
        }
        match self.newest() {
            None => self.replace(from, values),
            Some(newest) => {
                assert_eq!(
                    newest.plus(1),
                    from,
                    "day cache would get a hole: newest cached day is {newest}, extension starts at {from}"
                );
                self.values.extend(values);
            }
        }
    }

    /// Drop every day at or after `cutoff`
    pub fn truncate_from(&mut self, cutoff: Timestamp) {
        let Some(oldest) = self.oldest() else {
            return;
        };
        let keep = oldest.days_until(cutoff);
        if keep <= 0 {
            self.clear();
        } else {
            self.values.truncate(keep as usize);
        }
    }

    /// Cached days within `[from, to]`, newest first
    pub fn range_newest_first(&self, from: Timestamp, to: Timestamp) -> Vec<(Timestamp, T)> {
        let (Some(oldest), Some(newest)) = (self.oldest(), self.newest()) else {
            return Vec::new();
        };
        let from = Timestamp::newest(from, oldest);
        let to = Timestamp::oldest(to, newest);
        if from.is_newer_than(to) {
            return Vec::new();
        }
        let first = oldest.days_until(from) as usize;
        let last = oldest.days_until(to) as usize;
        self.values
            .range(first..=last)
            .rev()
            .zip(0..)
            .map(|(value, back)| (to.minus(back), *value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(n: i64) -> Timestamp {
        Timestamp::from_days(n)
    }

    #[test]
    fn test_empty_cache() {
        let cache: DayCache<i32> = DayCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.oldest(), None);
        assert_eq!(cache.newest(), None);
        assert_eq!(cache.get(day(0)), None);
        assert!(cache.range_newest_first(day(0), day(10)).is_empty());
    }

    #[test]
    fn test_replace_and_get() {
        let mut cache = DayCache::new();
        cache.replace(day(10), vec![1, 2, 3]);
        assert_eq!(cache.oldest(), Some(day(10)));
        assert_eq!(cache.newest(), Some(day(12)));
        assert_eq!(cache.get(day(11)), Some(2));
        assert_eq!(cache.get(day(9)), None);
        assert_eq!(cache.get(day(13)), None);
        assert_eq!(cache.newest_value(), Some((day(12), 3)));
    }

    #[test]
    fn test_extend_newer() {
        let mut cache = DayCache::new();
        cache.extend_newer(day(5), vec![50, 60]);
        cache.extend_newer(day(7), vec![70]);
        cache.extend_newer(day(8), Vec::new());
        assert_eq!(cache.oldest(), Some(day(5)));
        assert_eq!(cache.newest(), Some(day(7)));
        assert_eq!(
            cache.range_newest_first(day(0), day(100)),
            vec![(day(7), 70), (day(6), 60), (day(5), 50)]
        );
    }

    #[test]
    #[should_panic(expected = "hole")]
    fn test_extend_newer_with_gap_panics() {
        let mut cache = DayCache::new();
        cache.replace(day(0), vec![1, 2]);
        cache.extend_newer(day(5), vec![3]);
    }

    #[test]
    fn test_truncate_from() {
        let mut cache = DayCache::new();
        cache.replace(day(0), vec![0, 1, 2, 3, 4]);

        cache.truncate_from(day(10));
        assert_eq!(cache.len(), 5);

        cache.truncate_from(day(3));
        assert_eq!(cache.newest(), Some(day(2)));

        cache.truncate_from(day(0));
        assert!(cache.is_empty());
        assert_eq!(cache.oldest(), None);
    }

    #[test]
    fn test_range_is_clipped_to_cached_days() {
        let mut cache = DayCache::new();
        cache.replace(day(0), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            cache.range_newest_first(day(3), day(10)),
            vec![(day(4), 4), (day(3), 3)]
        );
        assert_eq!(cache.range_newest_first(day(1), day(1)), vec![(day(1), 1)]);
        assert!(cache.range_newest_first(day(3), day(2)).is_empty());
        assert!(cache.range_newest_first(day(6), day(9)).is_empty());
        assert!(cache.range_newest_first(day(-5), day(-1)).is_empty());
    }
}
