//! Error types for Habit Flux

use thiserror::Error;

/// Errors that can occur while configuring a habit or exchanging its data.
///
/// Empty ranges and habits without entries are not errors; they produce
/// empty results.
#[derive(Debug, Error)]
pub enum HabitError {
    #[error("Invalid frequency {numerator}/{denominator}: {reason}")]
    InvalidFrequency {
        numerator: u32,
        denominator: u32,
        reason: &'static str,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::csv::Error> for HabitError {
    fn from(err: ::csv::Error) -> Self {
        let line = err.position().map_or(0, |pos| pos.line() as usize);
        let message = err.to_string();
        match err.into_kind() {
            ::csv::ErrorKind::Io(e) => HabitError::Io(e),
            _ => HabitError::Csv { line, message },
        }
    }
}
