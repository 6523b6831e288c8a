// src/main.rs
//
// CLI wiring for the attendance core. All file I/O and operator-facing
// output lives here; the modules underneath are pure over their inputs.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod classify;
mod consolidate;
mod error;
mod extract;
mod ledger;
mod schedule;

mod extract_tests;

use error::AttendanceError;
use schedule::{Calendar, DayType, ScheduleSet};

// --- Configuration & Constants ---

const DEFAULT_LEDGER_DIR: &str = "daily_attendance_master";

#[derive(Debug, Clone)]
struct AppConfig {
    /// Where the per-day master report CSVs live.
    ledger_dir: PathBuf,
}

fn load_app_config() -> AppConfig {
    AppConfig {
        ledger_dir: env::var("LEDGER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_DIR)),
    }
}

// --- CLI ---

#[derive(Parser, Debug)]
#[command(
    name = "attendance-core",
    version,
    about = "Classifies late arrivals against the bell schedule and consolidates daily absences"
)]
struct Cli {
    /// Bell schedule config file (JSON). Defaults to the built-in tables.
    #[arg(long, global = true)]
    schedules: Option<PathBuf>,

    /// Monday-Thursday calendar in effect: normal or enrichment.
    #[arg(long, global = true, default_value = "normal")]
    calendar: Calendar,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract late arrivals for one period from a sign-in export and merge
    /// them into the day's master report.
    LateArrivals {
        /// Sign-in history export (CSV).
        #[arg(long)]
        signins: PathBuf,

        /// Day type: M, T, W, H, F or S.
        #[arg(long)]
        day_type: DayType,

        /// Target period id (e.g. AMA, P1).
        #[arg(long)]
        period: String,
    },

    /// Flag students for full-day absence escalation from a per-period
    /// attendance code matrix.
    Consolidate {
        /// Meeting attendance export (CSV).
        #[arg(long)]
        matrix: PathBuf,

        /// Day type whose period columns are relevant.
        #[arg(long, default_value = "M")]
        day_type: DayType,

        /// Minimum total absences required to flag a student.
        #[arg(long, default_value_t = 2)]
        min_absences: u32,

        /// Custom absence/presence code sets (JSON).
        #[arg(long)]
        codes: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;

    let cli = Cli::parse();
    let schedule_set = load_schedule_set(cli.schedules.as_deref(), cli.calendar)?;

    match cli.command {
        Command::LateArrivals {
            signins,
            day_type,
            period,
        } => run_late_arrivals(&schedule_set, day_type, &period, &signins),
        Command::Consolidate {
            matrix,
            day_type,
            min_absences,
            codes,
        } => run_consolidate(&schedule_set, day_type, min_absences, codes.as_deref(), &matrix),
    }
}

fn load_schedule_set(path: Option<&Path>, calendar: Calendar) -> Result<ScheduleSet> {
    match path {
        Some(path) => ScheduleSet::from_json_file(path, calendar)
            .with_context(|| format!("Loading schedule config from {}", path.display())),
        None => ScheduleSet::built_in(calendar).context("Validating built-in bell tables"),
    }
}

// --- Late arrivals ---

fn run_late_arrivals(
    schedules: &ScheduleSet,
    day_type: DayType,
    period_id: &str,
    signins: &Path,
) -> Result<()> {
    let config = load_app_config();
    let schedule = schedules.schedule(day_type);

    let window = classify::arrival_window(schedule, period_id)?;
    let plan = classify::MarkingPlan::build(
        schedule,
        period_id,
        classify::LATE_CODE,
        classify::ABSENT_CODE,
    )?;
    info!(
        "Arrival window for {} on {} ({} calendar): {} - {}",
        period_id,
        day_type,
        schedules.calendar(),
        window.start.format("%I:%M %p"),
        window.end.format("%I:%M %p"),
    );

    let file = File::open(signins)
        .with_context(|| format!("Opening sign-in export {}", signins.display()))?;
    let rows = extract::read_sign_in_rows(file)?;
    let (records, summary) = extract::extract(&rows, window);
    info!(
        "Extraction: {} row(s) scanned, {} arrival(s) kept, {} outside window, \
         {} without timestamps, {} with unusable ids, {} repeat sign-ins collapsed",
        summary.total_rows,
        summary.included,
        summary.out_of_window,
        summary.missing_timestamp,
        summary.bad_id,
        summary.duplicates_collapsed,
    );

    let now = Local::now().naive_local();
    let mut daily = ledger::DailyLedger::load_or_new(&config.ledger_dir, now.date())?;
    let outcome = daily.merge(&records, period_id, now);
    let path = daily.save(&config.ledger_dir)?;
    info!(
        "Master report {} updated: {} new entries, {} already present",
        path.display(),
        outcome.inserted,
        outcome.already_present,
    );

    for instruction in &plan.instructions {
        let names: Vec<&str> = instruction
            .periods
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        info!(
            "Writer instruction: apply '{}' to {}",
            instruction.code,
            names.join(", ")
        );
    }

    // Paste list for the attendance system's student multi-select.
    for record in &records {
        println!("{}", record.student_id);
    }
    Ok(())
}

// --- Consolidation ---

fn run_consolidate(
    schedules: &ScheduleSet,
    day_type: DayType,
    min_absences: u32,
    codes: Option<&Path>,
    matrix_path: &Path,
) -> Result<()> {
    let policy = match codes {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Reading code policy from {}", path.display()))?;
            let file: consolidate::CodePolicyFile =
                serde_json::from_str(&raw).map_err(AttendanceError::from)?;
            consolidate::CodePolicy::from_file(file, min_absences)?
        }
        None => consolidate::CodePolicy::with_default_codes(min_absences)?,
    };

    let schedule = schedules.schedule(day_type);
    let file = File::open(matrix_path)
        .with_context(|| format!("Opening attendance matrix {}", matrix_path.display()))?;
    let matrix = consolidate::AttendanceMatrix::from_csv(file, schedule)?;
    if matrix.skipped_blank_ids() > 0 {
        warn!(
            "Skipped {} matrix row(s) with a blank student number",
            matrix.skipped_blank_ids()
        );
    }

    let result = consolidate::consolidate(&matrix, &policy);
    info!(
        "Consolidation: {} student(s) scanned, {} flagged (>= {} absences, no presence codes)",
        result.students_scanned,
        result.flagged.len(),
        policy.min_absences(),
    );

    for student in &result.flagged {
        info!(
            "  {}: {} absence(s), no presence codes today",
            student.student_id, student.absence_count
        );
        println!("{}", student.student_id);
    }
    Ok(())
}
