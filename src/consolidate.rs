// src/consolidate.rs
//
// Full-day absence consolidation: scans each student's per-period attendance
// codes and flags the ones with enough absences and no presence signal at
// all. A single presence code anywhere in the day vetoes the flag - a
// student who showed up late is late, not a full-day absence.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use tracing::{debug, warn};

use crate::error::AttendanceError;
use crate::schedule::Schedule;

// Code vocabulary of the attendance system. Blank counts as presence by
// policy: an untouched cell means "nothing recorded", not "absent".
pub const DEFAULT_ABSENCE_CODES: [&str; 5] = ["A", "AU", "AB", "ABS", "X"];
pub const DEFAULT_PRESENCE_CODES: [&str; 7] = ["T", "UL", "LE", "INA", "S", "E", ""];

const STUDENT_NUMBER_COLUMN: &str = "Student Number";

// --- Policy ---

/// The configurable decision rule: which codes count as absence, which count
/// as presence, and how many absences it takes to flag a student.
#[derive(Debug, Clone)]
pub struct CodePolicy {
    absence_codes: HashSet<String>,
    presence_codes: HashSet<String>,
    min_absences: u32,
}

/// On-disk form of a custom code policy (JSON).
#[derive(Debug, Deserialize)]
pub struct CodePolicyFile {
    pub absence_codes: Vec<String>,
    pub presence_codes: Vec<String>,
}

impl CodePolicy {
    pub fn new(
        absence_codes: impl IntoIterator<Item = impl Into<String>>,
        presence_codes: impl IntoIterator<Item = impl Into<String>>,
        min_absences: u32,
    ) -> Result<Self, AttendanceError> {
        if min_absences < 1 {
            return Err(AttendanceError::configuration(
                "Minimum absence threshold must be at least 1",
            ));
        }
        let absence_codes: HashSet<String> = absence_codes
            .into_iter()
            .map(|c| {
                let code: String = c.into();
                code.trim().to_ascii_uppercase()
            })
            .collect();
        let presence_codes: HashSet<String> = presence_codes
            .into_iter()
            .map(|c| {
                let code: String = c.into();
                code.trim().to_ascii_uppercase()
            })
            .collect();
        if absence_codes.is_empty() {
            return Err(AttendanceError::configuration(
                "Absence code set must not be empty",
            ));
        }
        Ok(CodePolicy {
            absence_codes,
            presence_codes,
            min_absences,
        })
    }

    /// The stock vocabulary with a caller-supplied threshold.
    pub fn with_default_codes(min_absences: u32) -> Result<Self, AttendanceError> {
        CodePolicy::new(DEFAULT_ABSENCE_CODES, DEFAULT_PRESENCE_CODES, min_absences)
    }

    pub fn from_file(file: CodePolicyFile, min_absences: u32) -> Result<Self, AttendanceError> {
        CodePolicy::new(file.absence_codes, file.presence_codes, min_absences)
    }

    pub fn min_absences(&self) -> u32 {
        self.min_absences
    }

    fn is_absence(&self, token: &str) -> bool {
        self.absence_codes.contains(token)
    }

    fn is_presence(&self, token: &str) -> bool {
        self.presence_codes.contains(token)
    }
}

// --- Matrix ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub student_id: String,
    /// Period column header -> raw code cell. A missing column reads as
    /// blank.
    pub codes: HashMap<String, String>,
}

/// A day's per-period attendance codes for many students, restricted to the
/// period columns the schedule declares relevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceMatrix {
    period_columns: Vec<String>,
    rows: Vec<MatrixRow>,
    skipped_blank_ids: usize,
}

impl AttendanceMatrix {
    pub fn new(period_columns: Vec<String>, rows: Vec<MatrixRow>) -> Self {
        AttendanceMatrix {
            period_columns,
            rows,
            skipped_blank_ids: 0,
        }
    }

    /// Parses the attendance-system export. The `Student Number` column is
    /// required; period columns are matched against the schedule's column
    /// tokens ("AMA", "1".."5", "PMA") and scanned in schedule order.
    /// Unrecognized columns are ignored.
    pub fn from_csv(
        reader: impl io::Read,
        schedule: &Schedule,
    ) -> Result<Self, AttendanceError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let student_col = headers
            .iter()
            .position(|h| h == STUDENT_NUMBER_COLUMN)
            .ok_or_else(|| AttendanceError::Schema {
                column: STUDENT_NUMBER_COLUMN.to_string(),
                input: "attendance matrix".to_string(),
            })?;

        let aliases = schedule.column_aliases();
        let mut period_columns: Vec<(usize, String, usize)> = headers
            .iter()
            .enumerate()
            .filter_map(|(col, header)| {
                aliases
                    .get(header)
                    .map(|&period_idx| (period_idx, header.to_string(), col))
            })
            .collect();
        // Scan order is schedule order, whatever order the export used.
        period_columns.sort_by_key(|(period_idx, _, _)| *period_idx);

        if period_columns.is_empty() {
            warn!(
                "No recognized period columns in the attendance matrix \
                 (expected tokens like 'AMA', '1'..'5', 'PMA'); nothing to consolidate"
            );
        }

        let mut rows = Vec::new();
        let mut skipped_blank_ids = 0;
        for record in csv_reader.records() {
            let record = record?;
            let student_id = record.get(student_col).unwrap_or("").trim().to_string();
            if student_id.is_empty() {
                skipped_blank_ids += 1;
                continue;
            }
            let codes = period_columns
                .iter()
                .map(|(_, header, col)| {
                    (
                        header.clone(),
                        record.get(*col).unwrap_or("").to_string(),
                    )
                })
                .collect();
            rows.push(MatrixRow { student_id, codes });
        }

        Ok(AttendanceMatrix {
            period_columns: period_columns
                .into_iter()
                .map(|(_, header, _)| header)
                .collect(),
            rows,
            skipped_blank_ids,
        })
    }

    pub fn period_columns(&self) -> &[String] {
        &self.period_columns
    }

    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    pub fn skipped_blank_ids(&self) -> usize {
        self.skipped_blank_ids
    }
}

// --- Consolidation ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedStudent {
    pub student_id: String,
    /// How many of the day's relevant periods carried an absence code.
    pub absence_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationResult {
    /// Students to escalate, sorted by id. Each one reached the absence
    /// threshold without a single presence code that day.
    pub flagged: Vec<FlaggedStudent>,
    pub students_scanned: usize,
}

/// Classifies every student in the matrix. Per student: count absence codes
/// across the relevant periods, remember whether any presence code appeared,
/// and flag when the count reaches the threshold with no presence seen.
/// Tokens in neither set affect neither counter.
pub fn consolidate(matrix: &AttendanceMatrix, policy: &CodePolicy) -> ConsolidationResult {
    let mut flagged: BTreeMap<String, u32> = BTreeMap::new();
    let mut students_scanned = 0;

    for row in matrix.rows() {
        students_scanned += 1;

        let mut absence_count: u32 = 0;
        let mut seen_presence = false;
        for column in matrix.period_columns() {
            let token = row
                .codes
                .get(column)
                .map(|cell| cell.trim().to_ascii_uppercase())
                .unwrap_or_default();
            if policy.is_absence(&token) {
                absence_count += 1;
            } else if policy.is_presence(&token) {
                seen_presence = true;
            }
        }

        if absence_count >= policy.min_absences() && !seen_presence {
            debug!(
                "Student {} flagged: {} absence(s), no presence codes",
                row.student_id, absence_count
            );
            flagged.entry(row.student_id.clone()).or_insert(absence_count);
        }
    }

    ConsolidationResult {
        flagged: flagged
            .into_iter()
            .map(|(student_id, absence_count)| FlaggedStudent {
                student_id,
                absence_count,
            })
            .collect(),
        students_scanned,
    }
}
