//! Completion materializer
//!
//! Turns sparse raw entries into a dense per-day completion series:
//! - Boolean habits: clusters of successes that meet the frequency target
//!   credit a whole window of days (`YesAuto`)
//! - Numeric habits: each day carries its recorded quantity, zero otherwise
//!
//! Credit windows can slide arbitrarily far back when snapped, so the series
//! is always rebuilt in full once it is stale.

use crate::cache::{ComputeContext, DayCache, Invalidate};
use crate::csv;
use crate::error::HabitError;
use crate::grouping;
use crate::timestamp::{Timestamp, TruncateField};
use crate::types::{ComputedDay, DayValue, Frequency, GroupedValue, RawEntry, RawValue};
use chrono::Weekday;
use std::io::Write;
use tracing::debug;

/// Window of days credited together because a cluster of successes met the
/// frequency target inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditInterval {
    pub begin: Timestamp,
    /// Newest entry of the cluster; never moved by snapping
    pub center: Timestamp,
    pub end: Timestamp,
}

impl CreditInterval {
    pub fn new(begin: Timestamp, center: Timestamp, end: Timestamp) -> Self {
        Self { begin, center, end }
    }

    pub fn length(&self) -> i64 {
        self.begin.days_until(self.end) + 1
    }
}

/// Build credit intervals from raw entries (oldest first).
///
/// Only explicit successes take part. Every run of `numerator` consecutive
/// successes spanning fewer than `denominator` days yields an interval that
/// starts at the run's first day and lasts `denominator` days. The result is
/// oldest first.
pub fn build_intervals(frequency: Frequency, entries: &[RawEntry]) -> Vec<CreditInterval> {
    let successes: Vec<Timestamp> = entries
        .iter()
        .filter(|entry| entry.value == RawValue::Yes)
        .map(|entry| entry.timestamp)
        .collect();
    let num = frequency.numerator() as usize;
    let den = frequency.denominator() as i64;

    successes
        .windows(num)
        .filter_map(|window| {
            let (first, last) = (window[0], window[num - 1]);
            (first.days_until(last) < den)
                .then(|| CreditInterval::new(first, last, first.plus(den - 1)))
        })
        .collect()
}

/// Slide overlapping intervals (oldest first) back in time.
///
/// The newest interval stays put. Walking towards the past, an interval that
/// touches or overlaps its newer neighbour moves back by the overlap plus one
/// day, but never so far that its end precedes its center.
pub fn snap_intervals_together(intervals: &mut [CreditInterval]) {
    for i in (0..intervals.len().saturating_sub(1)).rev() {
        let next = intervals[i + 1];
        let curr = &mut intervals[i];
        let gap = next.begin.days_until(curr.end);
        if gap >= 0 {
            let shift = curr.center.days_until(curr.end).min(gap + 1);
            curr.begin = curr.begin.minus(shift);
            curr.end = curr.end.minus(shift);
        }
    }
}

/// Materialize a boolean series from raw entries and snapped intervals.
///
/// The series runs from the oldest entry or interval begin up to `today`,
/// oldest first. Raw entries always override implicit credit. Returns `None`
/// when nothing falls on or before `today`.
pub fn build_days_from_intervals(
    entries: &[RawEntry],
    intervals: &[CreditInterval],
    today: Timestamp,
) -> Option<(Timestamp, Vec<DayValue>)> {
    let oldest_entry = entries.iter().map(|entry| entry.timestamp).min()?;
    let from = intervals
        .iter()
        .map(|interval| interval.begin)
        .fold(oldest_entry, Timestamp::oldest);
    if from.is_newer_than(today) {
        return None;
    }

    let mut days = vec![DayValue::Unknown; (from.days_until(today) + 1) as usize];
    let offset = |timestamp: Timestamp| from.days_until(timestamp) as usize;

    for interval in intervals {
        let end = Timestamp::oldest(interval.end, today);
        let mut current = interval.begin;
        while !current.is_newer_than(end) {
            days[offset(current)] = DayValue::YesAuto;
            current = current.plus(1);
        }
    }
    for entry in entries.iter().filter(|e| !e.timestamp.is_newer_than(today)) {
        days[offset(entry.timestamp)] = entry.value.into();
    }
    Some((from, days))
}

/// Materialize a numeric series: recorded quantities, zero elsewhere.
pub fn build_numeric_days(
    entries: &[RawEntry],
    today: Timestamp,
) -> Option<(Timestamp, Vec<DayValue>)> {
    let from = entries.iter().map(|entry| entry.timestamp).min()?;
    if from.is_newer_than(today) {
        return None;
    }
    let mut days = vec![DayValue::Quantity(0); (from.days_until(today) + 1) as usize];
    for entry in entries.iter().filter(|e| !e.timestamp.is_newer_than(today)) {
        days[from.days_until(entry.timestamp) as usize] = entry.value.into();
    }
    Some((from, days))
}

/// Dense completion series of one habit, cached oldest to today
#[derive(Debug, Clone, Default)]
pub struct CompletionList {
    cache: DayCache<DayValue>,
}

impl CompletionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the series unless it already ends today
    pub fn compute(&mut self, ctx: &ComputeContext<'_>) {
        if self.cache.newest() == Some(ctx.today) {
            return;
        }
        self.recompute(ctx);
    }

    fn recompute(&mut self, ctx: &ComputeContext<'_>) {
        self.cache.clear();
        let entries: Vec<RawEntry> = ctx
            .store
            .all()
            .into_iter()
            .filter(|entry| !entry.timestamp.is_newer_than(ctx.today))
            .collect();
        let built = if ctx.config.is_numeric() {
            build_numeric_days(&entries, ctx.today)
        } else {
            let mut intervals = build_intervals(ctx.config.frequency, &entries);
            snap_intervals_together(&mut intervals);
            debug!(
                entries = entries.len(),
                intervals = intervals.len(),
                "built credit intervals"
            );
            build_days_from_intervals(&entries, &intervals, ctx.today)
        };
        if let Some((from, days)) = built {
            debug!(from = %from, days = days.len(), "materialized completion series");
            self.cache.replace(from, days);
        }
    }

    /// Dense values for `[from, to]`, oldest first.
    ///
    /// Days outside the materialized series read as the kind's empty value.
    pub(crate) fn dense(
        &mut self,
        ctx: &ComputeContext<'_>,
        from: Timestamp,
        to: Timestamp,
    ) -> Vec<DayValue> {
        if from.is_newer_than(to) {
            return Vec::new();
        }
        self.compute(ctx);
        let empty = ctx.config.kind.empty_value();
        (0..=from.days_until(to))
            .map(|offset| self.cache.get(from.plus(offset)).unwrap_or(empty))
            .collect()
    }

    /// Dense days for `[from, to]`, newest first.
    ///
    /// Empty when the habit has no entries or the range is inverted.
    pub fn by_interval(
        &mut self,
        ctx: &ComputeContext<'_>,
        from: Timestamp,
        to: Timestamp,
    ) -> Vec<ComputedDay> {
        if ctx.store.oldest().is_none() {
            return Vec::new();
        }
        let mut days: Vec<ComputedDay> = self
            .dense(ctx, from, to)
            .into_iter()
            .enumerate()
            .map(|(offset, value)| ComputedDay::new(from.plus(offset as i64), value))
            .collect();
        days.reverse();
        days
    }

    /// Day codes for `[from, to]`, newest first
    pub fn values(&mut self, ctx: &ComputeContext<'_>, from: Timestamp, to: Timestamp) -> Vec<i64> {
        self.by_interval(ctx, from, to)
            .iter()
            .map(|day| day.value.code())
            .collect()
    }

    /// Every day from today back to the oldest materialized day
    pub fn all(&mut self, ctx: &ComputeContext<'_>) -> Vec<ComputedDay> {
        self.compute(ctx);
        match self.cache.oldest() {
            Some(oldest) => self.by_interval(ctx, oldest, ctx.today),
            None => Vec::new(),
        }
    }

    pub fn all_values(&mut self, ctx: &ComputeContext<'_>) -> Vec<i64> {
        self.all(ctx).iter().map(|day| day.value.code()).collect()
    }

    /// Value of a single day
    pub fn value(&mut self, ctx: &ComputeContext<'_>, timestamp: Timestamp) -> DayValue {
        self.dense(ctx, timestamp, timestamp)
            .first()
            .copied()
            .unwrap_or_else(|| ctx.config.kind.empty_value())
    }

    pub fn today_value(&mut self, ctx: &ComputeContext<'_>) -> DayValue {
        self.value(ctx, ctx.today)
    }

    /// Sum of the current week
    pub fn this_week_value(&mut self, ctx: &ComputeContext<'_>, first_weekday: Weekday) -> i64 {
        self.current_period_value(ctx, TruncateField::Week, first_weekday)
    }

    pub fn this_month_value(&mut self, ctx: &ComputeContext<'_>) -> i64 {
        self.current_period_value(ctx, TruncateField::Month, Weekday::Mon)
    }

    pub fn this_quarter_value(&mut self, ctx: &ComputeContext<'_>) -> i64 {
        self.current_period_value(ctx, TruncateField::Quarter, Weekday::Mon)
    }

    pub fn this_year_value(&mut self, ctx: &ComputeContext<'_>) -> i64 {
        self.current_period_value(ctx, TruncateField::Year, Weekday::Mon)
    }

    fn current_period_value(
        &mut self,
        ctx: &ComputeContext<'_>,
        field: TruncateField,
        first_weekday: Weekday,
    ) -> i64 {
        self.group_by(ctx, field, first_weekday, 1)
            .first()
            .map_or(0, |group| group.value)
    }

    /// Per-period sums, newest first
    pub fn group_by(
        &mut self,
        ctx: &ComputeContext<'_>,
        field: TruncateField,
        first_weekday: Weekday,
        max_groups: usize,
    ) -> Vec<GroupedValue> {
        let days = self.all(ctx);
        grouping::group_by(&days, ctx.config.kind, field, first_weekday, max_groups)
    }

    /// Write the full series as `<date>,<code>` lines, newest first
    pub fn write_csv<W: Write>(
        &mut self,
        ctx: &ComputeContext<'_>,
        sink: &mut W,
    ) -> Result<(), HabitError> {
        let days = self.all(ctx);
        csv::write_csv(&days, sink)
    }
}

impl Invalidate for CompletionList {
    fn invalidate_newer_than(&mut self, timestamp: Timestamp) {
        self.cache.truncate_from(timestamp);
    }
}
