// src/extract.rs
//
// Turns raw sign-in report rows into canonical arrival records: window
// filtering, student id normalization, and per-student deduplication.
// Malformed rows are counted and skipped, never fatal for the batch.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use tracing::{debug, warn};

use crate::classify::ArrivalWindow;
use crate::error::AttendanceError;

// --- Raw rows ---

/// One row of the sign-in history export, as it comes off the CSV. Values
/// stay raw strings here; parsing and normalization happen in `extract`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInRow {
    #[serde(rename = "Date/Time", default)]
    pub date_time: String,
    #[serde(rename = "ID Number", default)]
    pub id_number: String,
    #[serde(rename = "First Name", default)]
    pub first_name: String,
    #[serde(rename = "Last Name", default)]
    pub last_name: String,
}

/// Reads sign-in rows from a CSV export. The export must carry the
/// `Date/Time` and `ID Number` columns; their absence means the whole file
/// has the wrong shape and the run fails fast.
pub fn read_sign_in_rows(reader: impl io::Read) -> Result<Vec<SignInRow>, AttendanceError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for required in ["Date/Time", "ID Number"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AttendanceError::Schema {
                column: required.to_string(),
                input: "sign-in report".to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for record in csv_reader.deserialize() {
        let row: SignInRow = record?;
        rows.push(row);
    }
    Ok(rows)
}

// --- Timestamp parsing ---

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses the export's `Date/Time` cell. The sign-in system has shipped both
/// US-style and ISO-style stamps, so several formats are tolerated.
pub fn parse_sign_in_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

// --- Student id normalization ---

// Spreadsheet exports turn numeric ids into floats ("123.0"). The integer
// part is the real id; leading zeros are not significant.
static NUMERIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\.\d+)?$").expect("valid numeric id regex"));
static ALPHANUMERIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("valid alphanumeric id regex"));

/// Canonicalizes a raw student identifier, or `None` if it cannot be made
/// canonical (empty, punctuation soup, etc.).
pub fn normalize_student_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(caps) = NUMERIC_ID_RE.captures(trimmed) {
        let digits = caps.get(1)?.as_str().trim_start_matches('0');
        let canonical = if digits.is_empty() { "0" } else { digits };
        return Some(canonical.to_string());
    }
    if ALPHANUMERIC_ID_RE.is_match(trimmed) {
        return Some(trimmed.to_string());
    }
    None
}

// --- Extraction ---

/// A student's first physical arrival inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalRecord {
    pub student_id: String,
    pub arrived_at: NaiveDateTime,
    pub first_name: String,
    pub last_name: String,
}

/// Row-level accounting for one extraction pass, reported alongside the
/// records so an all-rows-rejected run is distinguishable from a quiet day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub total_rows: usize,
    pub included: usize,
    pub out_of_window: usize,
    pub missing_timestamp: usize,
    pub bad_id: usize,
    pub duplicates_collapsed: usize,
}

/// Filters rows to the arrival window, normalizes ids, and keeps the
/// earliest sign-in per student. Output is sorted by student id so identical
/// input always yields identical output, whatever the row order was.
pub fn extract(rows: &[SignInRow], window: ArrivalWindow) -> (Vec<ArrivalRecord>, ExtractionSummary) {
    let mut summary = ExtractionSummary::default();
    let mut by_id: HashMap<String, ArrivalRecord> = HashMap::new();

    for row in rows {
        summary.total_rows += 1;

        let Some(arrived_at) = parse_sign_in_timestamp(&row.date_time) else {
            summary.missing_timestamp += 1;
            continue;
        };
        if !window.contains(arrived_at.time()) {
            summary.out_of_window += 1;
            continue;
        }
        let Some(student_id) = normalize_student_id(&row.id_number) else {
            summary.bad_id += 1;
            debug!("Dropping in-window row with unusable id {:?}", row.id_number);
            continue;
        };

        let record = ArrivalRecord {
            student_id: student_id.clone(),
            arrived_at,
            first_name: row.first_name.trim().to_string(),
            last_name: row.last_name.trim().to_string(),
        };

        match by_id.entry(student_id) {
            Entry::Vacant(slot) => {
                summary.included += 1;
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                // Repeat sign-in; only the first arrival matters.
                summary.duplicates_collapsed += 1;
                if record.arrived_at < slot.get().arrived_at {
                    slot.insert(record);
                }
            }
        }
    }

    if summary.included == 0 && summary.total_rows > 0 {
        warn!(
            "No usable sign-ins between {} and {}: {} row(s) scanned, {} outside the window, \
             {} without a timestamp, {} with unusable ids",
            window.start.format("%I:%M %p"),
            window.end.format("%I:%M %p"),
            summary.total_rows,
            summary.out_of_window,
            summary.missing_timestamp,
            summary.bad_id,
        );
    }

    let mut records: Vec<ArrivalRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| a.student_id.cmp(&b.student_id));
    (records, summary)
}
