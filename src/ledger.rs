// src/ledger.rs
//
// The cumulative per-day master report of processed arrivals. Keyed by
// (student id, period id); the merge is first-write-wins and purely additive
// within a day, so re-running a period's extraction is a no-op.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::AttendanceError;
use crate::extract::ArrivalRecord;

/// Ledger timestamps are written as "2025-05-01 09:30:00".
mod stamp {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(stamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&stamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(s.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

/// One processed arrival. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "ID Number")]
    pub student_id: String,
    #[serde(rename = "Full Name")]
    pub full_name: String,
    #[serde(rename = "Marked Period")]
    pub period_id: String,
    #[serde(rename = "Arrival Time", with = "stamp")]
    pub arrived_at: NaiveDateTime,
    #[serde(rename = "Timestamp Processed", with = "stamp")]
    pub processed_at: NaiveDateTime,
}

/// Display name policy: first and last name joined when both are present,
/// otherwise an empty string. No guessing from partial names.
pub fn full_name(first_name: &str, last_name: &str) -> String {
    let first = first_name.trim();
    let last = last_name.trim();
    if first.is_empty() || last.is_empty() {
        String::new()
    } else {
        format!("{} {}", first, last)
    }
}

/// Counts from one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub already_present: usize,
}

/// One calendar day's master report. A fresh ledger (or ledger file) starts
/// each day; nothing rolls over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLedger {
    day: NaiveDate,
    entries: BTreeMap<(String, String), LedgerEntry>,
}

impl DailyLedger {
    pub fn new(day: NaiveDate) -> Self {
        DailyLedger {
            day,
            entries: BTreeMap::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn get(&self, student_id: &str, period_id: &str) -> Option<&LedgerEntry> {
        self.entries
            .get(&(student_id.to_string(), period_id.to_string()))
    }

    /// Merges freshly extracted arrivals for one period into the ledger.
    /// First write wins: a (student, period) key that already has an entry is
    /// left untouched, which makes repeat runs idempotent.
    pub fn merge(
        &mut self,
        records: &[ArrivalRecord],
        period_id: &str,
        processed_at: NaiveDateTime,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for record in records {
            let key = (record.student_id.clone(), period_id.to_string());
            if self.entries.contains_key(&key) {
                outcome.already_present += 1;
                continue;
            }
            self.entries.insert(
                key,
                LedgerEntry {
                    student_id: record.student_id.clone(),
                    full_name: full_name(&record.first_name, &record.last_name),
                    period_id: period_id.to_string(),
                    arrived_at: record.arrived_at,
                    processed_at,
                },
            );
            outcome.inserted += 1;
        }
        outcome
    }

    // --- Persistence ---

    pub fn file_name(day: NaiveDate) -> String {
        format!("daily_attendance_master_{}.csv", day.format("%Y-%m-%d"))
    }

    pub fn path_for(dir: &Path, day: NaiveDate) -> PathBuf {
        dir.join(Self::file_name(day))
    }

    /// Loads the day's ledger file if it exists, otherwise starts a new
    /// ledger. A malformed file is an error, not an empty ledger: silently
    /// starting over would break the first-write-wins guarantee.
    pub fn load_or_new(dir: &Path, day: NaiveDate) -> Result<Self, AttendanceError> {
        let path = Self::path_for(dir, day);
        if !path.exists() {
            return Ok(DailyLedger::new(day));
        }

        let mut csv_reader = csv::Reader::from_reader(File::open(&path)?);
        let mut ledger = DailyLedger::new(day);
        for record in csv_reader.deserialize() {
            let entry: LedgerEntry = record?;
            let key = (entry.student_id.clone(), entry.period_id.clone());
            ledger.entries.entry(key).or_insert(entry);
        }
        info!(
            "Loaded existing master report {} ({} entries)",
            path.display(),
            ledger.len()
        );
        Ok(ledger)
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, AttendanceError> {
        fs::create_dir_all(dir)?;
        let path = Self::path_for(dir, self.day);
        let mut writer = csv::Writer::from_writer(File::create(&path)?);
        for entry in self.entries.values() {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        Ok(path)
    }
}
