//! Habits CLI - Command-line interface for Habit Flux
//!
//! Commands:
//! - checkmarks: Print the dense completion series as CSV
//! - scores: Print the score series as CSV
//! - streaks: Print streaks (or the best N) as JSON
//! - summary: Print an overview of a habit
//! - validate: Check a config and entry file without deriving anything

use chrono::Weekday;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use habit_flux::csv::{parse_csv, parse_entries};
use habit_flux::{
    FixedClock, Habit, HabitConfig, HabitError, RawValue, Streak, Timestamp, TruncateField,
    FLUX_VERSION, PRODUCER_NAME,
};

/// Habits - derive completions, scores and streaks from habit entries
#[derive(Parser)]
#[command(name = "habits")]
#[command(version = FLUX_VERSION)]
#[command(about = "Derive completions, scores and streaks from habit entries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every command
#[derive(Args)]
struct HabitArgs {
    /// Habit config JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// Entry CSV file with `<YYYY-MM-DD>,<code>` lines (use - for stdin)
    #[arg(short, long)]
    entries: PathBuf,

    /// Treat this date as today instead of the system date
    #[arg(long)]
    today: Option<Timestamp>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dense completion series, newest first
    Checkmarks {
        #[command(flatten)]
        habit: HabitArgs,
    },

    /// Print the score series, newest first
    Scores {
        #[command(flatten)]
        habit: HabitArgs,
    },

    /// Print streaks as JSON, newest first
    Streaks {
        #[command(flatten)]
        habit: HabitArgs,

        /// Only print the N longest streaks
        #[arg(long)]
        best: Option<usize>,
    },

    /// Print an overview of the habit
    Summary {
        #[command(flatten)]
        habit: HabitArgs,

        /// First day of the week for weekly totals
        #[arg(long, default_value = "mon")]
        first_weekday: Weekday,

        /// Output as JSON even on a terminal
        #[arg(long)]
        json: bool,
    },

    /// Validate the config and entry file
    Validate {
        #[command(flatten)]
        habit: HabitArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), HabitsCliError> {
    match cli.command {
        Commands::Checkmarks { habit } => cmd_checkmarks(&habit),
        Commands::Scores { habit } => cmd_scores(&habit),
        Commands::Streaks { habit, best } => cmd_streaks(&habit, best),
        Commands::Summary {
            habit,
            first_weekday,
            json,
        } => cmd_summary(&habit, first_weekday, json),
        Commands::Validate { habit, json } => cmd_validate(&habit, json),
    }
}

fn read_input(path: &Path) -> Result<String, HabitsCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_config(path: &Path) -> Result<HabitConfig, HabitsCliError> {
    let json = read_input(path)?;
    Ok(HabitConfig::from_json(&json)?)
}

/// Build a habit from the config and entry files
fn load_habit(args: &HabitArgs) -> Result<Habit, HabitsCliError> {
    let config = load_config(&args.config)?;
    let entries = parse_entries(&read_input(&args.entries)?, config.kind)?;

    let mut habit = Habit::new(config)?;
    if let Some(today) = args.today {
        habit = habit.with_clock(Arc::new(FixedClock::new(today)));
    }
    let recorded = habit.record_batch(entries)?;
    info!(habit_id = %habit.id(), entries = recorded, "loaded habit");
    Ok(habit)
}

fn cmd_checkmarks(args: &HabitArgs) -> Result<(), HabitsCliError> {
    let habit = load_habit(args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    habit.write_csv(&mut out)?;
    out.flush()?;
    Ok(())
}

fn cmd_scores(args: &HabitArgs) -> Result<(), HabitsCliError> {
    let habit = load_habit(args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    habit.write_scores_csv(&mut out)?;
    out.flush()?;
    Ok(())
}

fn cmd_streaks(args: &HabitArgs, best: Option<usize>) -> Result<(), HabitsCliError> {
    let habit = load_habit(args)?;
    let streaks = match best {
        Some(limit) => habit.best_streaks(limit),
        None => habit.streaks(),
    };
    let report: Vec<StreakReport> = streaks.iter().map(StreakReport::from).collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_summary(args: &HabitArgs, first_weekday: Weekday, json: bool) -> Result<(), HabitsCliError> {
    let habit = load_habit(args)?;
    let config = habit.config();
    let month_start = habit.today().truncate(TruncateField::Month, first_weekday);

    let report = SummaryReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        name: config.name.clone(),
        kind: config.kind.as_str().to_string(),
        frequency: config.frequency.to_string(),
        today: habit.today().to_string(),
        entries: habit.entries().len(),
        today_value: habit.today_value().code(),
        score: habit.today_score(),
        this_week: habit.this_week_value(first_weekday),
        this_month: habit.this_month_value(),
        this_quarter: habit.this_quarter_value(),
        this_year: habit.this_year_value(),
        skipped_this_month: habit
            .skipped_days(TruncateField::Month, first_weekday)
            .first()
            .filter(|group| group.timestamp == month_start)
            .map(|group| group.value)
            .unwrap_or(0),
        current_streak: habit.newest_streak().map(|s| StreakReport::from(&s)),
        best_streak: habit.best_streaks(1).first().map(StreakReport::from),
    };

    if json || !atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Habit Summary");
    println!("=============");
    if !report.name.is_empty() {
        println!("Name:       {}", report.name);
    }
    println!("Kind:       {}", report.kind);
    println!("Frequency:  {}", report.frequency);
    println!("Today:      {} (value {})", report.today, report.today_value);
    println!("Entries:    {}", report.entries);
    println!("Score:      {:.1}%", report.score * 100.0);
    println!("\nTotals:");
    println!("  This week:    {}", report.this_week);
    println!("  This month:   {}", report.this_month);
    println!("  This quarter: {}", report.this_quarter);
    println!("  This year:    {}", report.this_year);
    println!("  Skipped days this month: {}", report.skipped_this_month);
    println!("\nStreaks:");
    for (label, streak) in [("Current", &report.current_streak), ("Best", &report.best_streak)] {
        match streak {
            Some(s) => println!("  {:<8} {} days ({} to {})", label, s.length, s.start, s.end),
            None => println!("  {:<8} none", label),
        }
    }
    Ok(())
}

fn cmd_validate(args: &HabitArgs, json: bool) -> Result<(), HabitsCliError> {
    let config = load_config(&args.config)?;
    let records = parse_csv(&read_input(&args.entries)?)?;
    let mut errors = Vec::new();
    let mut seen = BTreeMap::new();
    for record in &records {
        if let Err(e) = RawValue::from_code(record.code, config.kind) {
            errors.push(ValidationErrorDetail {
                line: record.line,
                error: e.to_string(),
            });
        }
        if let Some(first) = seen.insert(record.timestamp, record.line) {
            errors.push(ValidationErrorDetail {
                line: record.line,
                error: format!(
                    "duplicate entry for {} (first on line {})",
                    record.timestamp, first
                ),
            });
        }
    }

    let report = ValidationReport {
        kind: config.kind.as_str().to_string(),
        frequency: config.frequency.to_string(),
        total_entries: records.len(),
        invalid_entries: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Habit:           {} ({})", report.kind, report.frequency);
        println!("Total entries:   {}", report.total_entries);
        println!("Invalid entries: {}", report.invalid_entries);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_entries > 0 {
        Err(HabitsCliError::ValidationFailed(report.invalid_entries))
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum HabitsCliError {
    Io(io::Error),
    Habit(HabitError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for HabitsCliError {
    fn from(e: io::Error) -> Self {
        HabitsCliError::Io(e)
    }
}

impl From<HabitError> for HabitsCliError {
    fn from(e: HabitError) -> Self {
        HabitsCliError::Habit(e)
    }
}

impl From<serde_json::Error> for HabitsCliError {
    fn from(e: serde_json::Error) -> Self {
        HabitsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HabitsCliError> for CliError {
    fn from(e: HabitsCliError) -> Self {
        match e {
            HabitsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HabitsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            HabitsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} entries failed validation", count),
                hint: Some("Fix the listed lines and retry".to_string()),
            },
            HabitsCliError::Habit(e) => {
                let (code, hint) = match &e {
                    HabitError::InvalidFrequency { .. } => (
                        "INVALID_FREQUENCY",
                        Some("Use 1 <= numerator <= denominator"),
                    ),
                    HabitError::InvalidValue(_) => (
                        "INVALID_VALUE",
                        Some("Boolean entries use 0 (no), 2 (yes) or 3 (skip)"),
                    ),
                    HabitError::Csv { .. } => (
                        "CSV_ERROR",
                        Some("Run 'habits validate' for details"),
                    ),
                    HabitError::DateParse(_) => {
                        ("DATE_PARSE_ERROR", Some("Dates use the YYYY-MM-DD format"))
                    }
                    HabitError::Config(_) => ("CONFIG_ERROR", Some("Check the habit config file")),
                    HabitError::Json(_) => ("JSON_ERROR", Some("Check JSON syntax")),
                    HabitError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct StreakReport {
    start: String,
    end: String,
    length: i64,
}

impl From<&Streak> for StreakReport {
    fn from(streak: &Streak) -> Self {
        Self {
            start: streak.start.to_string(),
            end: streak.end.to_string(),
            length: streak.length(),
        }
    }
}

#[derive(serde::Serialize)]
struct SummaryReport {
    producer: String,
    version: String,
    name: String,
    kind: String,
    frequency: String,
    today: String,
    entries: usize,
    today_value: i64,
    score: f64,
    this_week: i64,
    this_month: i64,
    this_quarter: i64,
    this_year: i64,
    skipped_this_month: i64,
    current_streak: Option<StreakReport>,
    best_streak: Option<StreakReport>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    kind: String,
    frequency: String,
    total_entries: usize,
    invalid_entries: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}
