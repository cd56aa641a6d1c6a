//! Period grouping
//!
//! Buckets dense day series by calendar period. Inputs are newest first, as
//! returned by the derived lists, so a bucket closes as soon as the truncated
//! timestamp changes.

use crate::timestamp::{Timestamp, TruncateField};
use crate::types::{
    ComputedDay, DayValue, GroupedScore, GroupedValue, HabitKind, RawEntry, RawValue, Score,
};
use chrono::{Datelike, Weekday};
use std::collections::BTreeMap;

/// Weight of one explicit success in boolean sums
pub const CHECK_WEIGHT: i64 = 1000;

/// Fold a newest-first series into per-period accumulators.
///
/// A `max_groups` of zero means no limit.
fn fold_periods<T, A>(
    items: impl IntoIterator<Item = (Timestamp, T)>,
    field: TruncateField,
    first_weekday: Weekday,
    max_groups: usize,
    mut add: impl FnMut(&mut A, T),
) -> Vec<(Timestamp, A)>
where
    A: Default,
{
    let mut groups: Vec<(Timestamp, A)> = Vec::new();
    for (timestamp, item) in items {
        let bucket = timestamp.truncate(field, first_weekday);
        let is_new = groups.last().map_or(true, |(current, _)| *current != bucket);
        if is_new {
            if max_groups > 0 && groups.len() == max_groups {
                break;
            }
            groups.push((bucket, A::default()));
        }
        if let Some((_, acc)) = groups.last_mut() {
            add(acc, item);
        }
    }
    groups
}

/// Contribution of a single day to a period sum
pub fn day_weight(value: DayValue, kind: HabitKind) -> i64 {
    match kind {
        HabitKind::Numeric => value.quantity().max(0),
        HabitKind::Boolean => {
            if value == DayValue::YesManual {
                CHECK_WEIGHT
            } else {
                0
            }
        }
    }
}

/// Sum a newest-first completion series per period.
///
/// Numeric habits sum positive quantities. Boolean habits add
/// [`CHECK_WEIGHT`] per explicit success, so implicit credit and skips count
/// for nothing.
pub fn group_by(
    days: &[ComputedDay],
    kind: HabitKind,
    field: TruncateField,
    first_weekday: Weekday,
    max_groups: usize,
) -> Vec<GroupedValue> {
    fold_periods(
        days.iter().map(|day| (day.timestamp, day.value)),
        field,
        first_weekday,
        max_groups,
        |sum: &mut i64, value| *sum += day_weight(value, kind),
    )
    .into_iter()
    .map(|(timestamp, value)| GroupedValue { timestamp, value })
    .collect()
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u32,
}

/// Mean score per period, newest first
pub fn average_by(
    scores: &[Score],
    field: TruncateField,
    first_weekday: Weekday,
) -> Vec<GroupedScore> {
    fold_periods(
        scores.iter().map(|score| (score.timestamp, score.value)),
        field,
        first_weekday,
        0,
        |mean: &mut Mean, value| {
            mean.sum += value;
            mean.count += 1;
        },
    )
    .into_iter()
    .map(|(timestamp, mean)| GroupedScore {
        timestamp,
        value: if mean.count == 0 {
            0.0
        } else {
            mean.sum / mean.count as f64
        },
    })
    .collect()
}

/// Number of skipped days per period, newest first
pub fn count_skipped(
    days: &[ComputedDay],
    field: TruncateField,
    first_weekday: Weekday,
) -> Vec<GroupedValue> {
    fold_periods(
        days.iter().map(|day| (day.timestamp, day.value)),
        field,
        first_weekday,
        0,
        |count: &mut i64, value| {
            if value == DayValue::Skip {
                *count += 1;
            }
        },
    )
    .into_iter()
    .map(|(timestamp, value)| GroupedValue { timestamp, value })
    .collect()
}

/// Successful raw entries per month, split by weekday.
///
/// Keys are the first day of each month. Slots are Monday first. Boolean
/// habits count explicit successes; numeric habits sum quantities.
pub fn weekday_frequency(entries: &[RawEntry], kind: HabitKind) -> BTreeMap<Timestamp, [i64; 7]> {
    let mut map: BTreeMap<Timestamp, [i64; 7]> = BTreeMap::new();
    for entry in entries {
        let month = entry.timestamp.truncate(TruncateField::Month, Weekday::Mon);
        let slot = entry.timestamp.to_date().weekday().num_days_from_monday() as usize;
        let counts = map.entry(month).or_insert([0; 7]);
        match (kind, entry.value) {
            (HabitKind::Numeric, value) => counts[slot] += DayValue::from(value).quantity(),
            (HabitKind::Boolean, RawValue::Yes) => counts[slot] += 1,
            _ => {}
        }
    }
    map
}
