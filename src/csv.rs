//! CSV export and import
//!
//! One headerless record per day, `<YYYY-MM-DD>,<value>`, newest first.
//! Completion series carry integer day codes; score series carry four
//! decimals. Reading and writing go through the `csv` crate.

use crate::error::HabitError;
use crate::timestamp::Timestamp;
use crate::types::{ComputedDay, DayValue, HabitKind, RawEntry, RawValue, Score};
use std::io::Write;

/// A parsed `<date>,<integer>` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvRecord {
    /// One-based line number in the input
    pub line: usize,
    pub timestamp: Timestamp,
    pub code: i64,
}

fn writer<W: Write>(sink: W) -> ::csv::Writer<W> {
    ::csv::WriterBuilder::new().has_headers(false).from_writer(sink)
}

/// Write a dense completion series
pub fn write_csv<W: Write>(days: &[ComputedDay], sink: &mut W) -> Result<(), HabitError> {
    let mut wtr = writer(sink);
    for day in days {
        wtr.serialize((day.timestamp, day.value.code()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a dense score series
pub fn write_scores_csv<W: Write>(scores: &[Score], sink: &mut W) -> Result<(), HabitError> {
    let mut wtr = writer(sink);
    for score in scores {
        wtr.serialize((score.timestamp, format!("{:.4}", score.value)))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse `<date>,<integer>` lines. Blank lines are ignored.
pub fn parse_csv(input: &str) -> Result<Vec<CsvRecord>, HabitError> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(input.as_bytes());

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, |pos| pos.line() as usize);
        let csv_error = |message: String| HabitError::Csv { line, message };

        if record.len() != 2 {
            return Err(csv_error(format!(
                "expected '<date>,<value>', got {} fields",
                record.len()
            )));
        }
        let timestamp: Timestamp = record[0]
            .parse()
            .map_err(|e: HabitError| csv_error(e.to_string()))?;
        let code: i64 = record[1]
            .parse()
            .map_err(|_| csv_error(format!("'{}' is not an integer", &record[1])))?;
        records.push(CsvRecord {
            line,
            timestamp,
            code,
        });
    }
    Ok(records)
}

/// Parse a dense series written by [`write_csv`]
pub fn parse_days(input: &str, kind: HabitKind) -> Result<Vec<ComputedDay>, HabitError> {
    parse_csv(input)?
        .into_iter()
        .map(|record| {
            Ok(ComputedDay::new(
                record.timestamp,
                DayValue::from_code(record.code, kind)?,
            ))
        })
        .collect()
}

/// Parse raw entries (`0` no, `2` yes, `3` skip, or a quantity)
pub fn parse_entries(input: &str, kind: HabitKind) -> Result<Vec<RawEntry>, HabitError> {
    parse_csv(input)?
        .into_iter()
        .map(|record| {
            RawValue::from_code(record.code, kind)
                .map(|value| RawEntry::new(record.timestamp, value))
                .map_err(|e| HabitError::Csv {
                    line: record.line,
                    message: e.to_string(),
                })
        })
        .collect()
}
