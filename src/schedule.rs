// src/schedule.rs
//
// Bell schedule model: ordered period tables per day-type, validated once at
// startup and immutable afterwards. The tables mirror the school's published
// bell schedule; Monday-Thursday runs either the Normal or the Enrichment
// calendar, chosen per session.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::error::AttendanceError;

// --- Wall-clock (de)serialization ---

/// Period boundaries are written as "08:30 AM" in schedule config files,
/// matching the format the sign-in system uses.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%I:%M %p";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(s.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

// --- Day types and calendars ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayType {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    /// Testing days, assemblies, etc. A single all-day advisory block.
    SpecialDay,
}

impl DayType {
    pub fn label(&self) -> &'static str {
        match self {
            DayType::Monday => "Monday",
            DayType::Tuesday => "Tuesday",
            DayType::Wednesday => "Wednesday",
            DayType::Thursday => "Thursday",
            DayType::Friday => "Friday",
            DayType::SpecialDay => "Special Day",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DayType {
    type Err = String;

    // Accepts the single-letter keys the operators are used to ("M", "T",
    // "W", "H", "F", "S") as well as full names. Anything else is rejected
    // here rather than defaulting to a schedule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MONDAY" => Ok(DayType::Monday),
            "T" | "TUESDAY" => Ok(DayType::Tuesday),
            "W" | "WEDNESDAY" => Ok(DayType::Wednesday),
            "H" | "THURSDAY" => Ok(DayType::Thursday),
            "F" | "FRIDAY" => Ok(DayType::Friday),
            "S" | "SPECIAL" | "SPECIAL-DAY" => Ok(DayType::SpecialDay),
            other => Err(format!(
                "Unrecognized day type '{}' (expected M, T, W, H, F or S)",
                other
            )),
        }
    }
}

/// Which Monday-Thursday bell table is in effect for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calendar {
    Normal,
    Enrichment,
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Normal => f.write_str("Normal"),
            Calendar::Enrichment => f.write_str("Enrichment"),
        }
    }
}

impl FromStr for Calendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Calendar::Normal),
            "enrichment" => Ok(Calendar::Enrichment),
            other => Err(format!(
                "Unrecognized calendar '{}' (expected 'normal' or 'enrichment')",
                other
            )),
        }
    }
}

// --- Periods and schedules ---

/// One named block of the school day.
///
/// `code_group` is the token the downstream attendance writer uses to address
/// this period's code fields (e.g. "cb1" for Period 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub name: String,
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
    #[serde(with = "clock_time")]
    pub end: NaiveTime,
    pub code_group: String,
}

/// The ordered period list for one day-type. Validated on construction and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    label: String,
    periods: Vec<Period>,
    // Matrix column token -> index into `periods`. Built once; duplicate
    // tokens are rejected at construction time.
    column_aliases: HashMap<String, usize>,
}

impl Schedule {
    pub fn new(label: impl Into<String>, periods: Vec<Period>) -> Result<Self, AttendanceError> {
        let label = label.into();

        if periods.is_empty() {
            return Err(AttendanceError::configuration(format!(
                "Schedule '{}' has no periods",
                label
            )));
        }

        let mut seen_ids = HashSet::new();
        for period in &periods {
            if period.id.trim().is_empty() {
                return Err(AttendanceError::configuration(format!(
                    "Schedule '{}' contains a period with an empty id",
                    label
                )));
            }
            if period.start >= period.end {
                return Err(AttendanceError::configuration(format!(
                    "Period '{}' in schedule '{}' has zero or negative duration ({} - {})",
                    period.id,
                    label,
                    period.start.format("%I:%M %p"),
                    period.end.format("%I:%M %p"),
                )));
            }
            if !seen_ids.insert(period.id.clone()) {
                return Err(AttendanceError::configuration(format!(
                    "Duplicate period id '{}' in schedule '{}'",
                    period.id, label
                )));
            }
        }

        for pair in periods.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(AttendanceError::configuration(format!(
                    "Periods '{}' and '{}' in schedule '{}' overlap or are out of order",
                    pair[0].id, pair[1].id, label
                )));
            }
        }

        let mut column_aliases = HashMap::new();
        for (idx, period) in periods.iter().enumerate() {
            for alias in column_aliases_for(&period.id) {
                if column_aliases.insert(alias.clone(), idx).is_some() {
                    return Err(AttendanceError::configuration(format!(
                        "Period column token '{}' maps to more than one period in schedule '{}'",
                        alias, label
                    )));
                }
            }
        }

        Ok(Schedule {
            label,
            periods,
            column_aliases,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn position(&self, period_id: &str) -> Option<usize> {
        self.periods.iter().position(|p| p.id == period_id)
    }

    pub fn period(&self, period_id: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == period_id)
    }

    /// Matrix column token -> index of the period it addresses.
    pub fn column_aliases(&self) -> &HashMap<String, usize> {
        &self.column_aliases
    }
}

/// Column tokens the attendance-system export uses for a period. Numbered
/// periods ("P1".."P5") appear as bare digits in export headers; advisory
/// periods ("AMA", "PMA") keep their id.
fn column_aliases_for(period_id: &str) -> Vec<String> {
    let mut aliases = vec![period_id.to_string()];
    if let Some(rest) = period_id.strip_prefix('P') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            aliases.push(rest.to_string());
        }
    }
    aliases
}

// --- Schedule sets ---

/// All bell tables for one session: a shared Monday-Thursday table (Normal or
/// Enrichment), the Friday table and the Special Day table.
#[derive(Debug, Clone)]
pub struct ScheduleSet {
    calendar: Calendar,
    monday_thursday: Schedule,
    friday: Schedule,
    special_day: Schedule,
}

impl ScheduleSet {
    pub fn new(
        calendar: Calendar,
        monday_thursday: Schedule,
        friday: Schedule,
        special_day: Schedule,
    ) -> Self {
        ScheduleSet {
            calendar,
            monday_thursday,
            friday,
            special_day,
        }
    }

    /// The compiled-in bell tables, as published for the current school year.
    pub fn built_in(calendar: Calendar) -> Result<Self, AttendanceError> {
        let monday_thursday = match calendar {
            Calendar::Normal => Schedule::new(
                "Monday-Thursday (Normal)",
                monday_thursday_normal_periods(),
            )?,
            Calendar::Enrichment => Schedule::new(
                "Monday-Thursday (Enrichment)",
                monday_thursday_enrichment_periods(),
            )?,
        };
        let friday = Schedule::new("Friday", friday_periods())?;
        let special_day = Schedule::new("Special Day", special_day_periods())?;
        Ok(ScheduleSet::new(
            calendar,
            monday_thursday,
            friday,
            special_day,
        ))
    }

    /// Loads bell tables from a JSON config file. Every table the chosen
    /// calendar needs must be present; a missing table is a configuration
    /// error, never a silent substitution of the built-in one.
    pub fn from_json_file(path: &Path, calendar: Calendar) -> Result<Self, AttendanceError> {
        let raw = fs::read_to_string(path)?;
        let file: ScheduleFile = serde_json::from_str(&raw)?;

        let (mth_key, mth_periods) = match calendar {
            Calendar::Normal => ("monday_thursday_normal", file.monday_thursday_normal),
            Calendar::Enrichment => (
                "monday_thursday_enrichment",
                file.monday_thursday_enrichment,
            ),
        };

        let monday_thursday = Schedule::new(
            format!("Monday-Thursday ({})", calendar),
            require_table(mth_periods, mth_key, path)?,
        )?;
        let friday = Schedule::new("Friday", require_table(file.friday, "friday", path)?)?;
        let special_day = Schedule::new(
            "Special Day",
            require_table(file.special_day, "special_day", path)?,
        )?;

        info!(
            "Loaded bell schedule config from {} ({} calendar)",
            path.display(),
            calendar
        );
        Ok(ScheduleSet::new(
            calendar,
            monday_thursday,
            friday,
            special_day,
        ))
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn schedule(&self, day: DayType) -> &Schedule {
        match day {
            DayType::Monday | DayType::Tuesday | DayType::Wednesday | DayType::Thursday => {
                &self.monday_thursday
            }
            DayType::Friday => &self.friday,
            DayType::SpecialDay => &self.special_day,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleFile {
    monday_thursday_normal: Option<Vec<Period>>,
    monday_thursday_enrichment: Option<Vec<Period>>,
    friday: Option<Vec<Period>>,
    special_day: Option<Vec<Period>>,
}

fn require_table(
    table: Option<Vec<Period>>,
    key: &str,
    path: &Path,
) -> Result<Vec<Period>, AttendanceError> {
    table.ok_or_else(|| {
        AttendanceError::configuration(format!(
            "Schedule config {} is missing the '{}' table",
            path.display(),
            key
        ))
    })
}

// --- Built-in bell tables ---

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time literal")
}

fn period(id: &str, name: &str, start: NaiveTime, end: NaiveTime, code_group: &str) -> Period {
    Period {
        id: id.to_string(),
        name: name.to_string(),
        start,
        end,
        code_group: code_group.to_string(),
    }
}

fn monday_thursday_normal_periods() -> Vec<Period> {
    vec![
        period("AMA", "AM Advisory (Normal)", hm(8, 30), hm(9, 5), "cb7"),
        period("P1", "Period 1 (Normal)", hm(9, 10), hm(10, 12), "cb1"),
        period("P2", "Period 2 (Normal)", hm(10, 17), hm(11, 19), "cb2"),
        period("P3", "Period 3 (Normal)", hm(11, 24), hm(13, 1), "cb3"),
        period("P4", "Period 4 (Normal)", hm(13, 6), hm(14, 8), "cb4"),
        period("P5", "Period 5 (Normal)", hm(14, 13), hm(15, 15), "cb5"),
        period("PMA", "PM Advisory (Normal)", hm(15, 20), hm(15, 30), "cb8"),
    ]
}

fn monday_thursday_enrichment_periods() -> Vec<Period> {
    // AMA stays the same as the Normal calendar.
    vec![
        period("AMA", "AM Advisory (Enrichment)", hm(8, 30), hm(9, 5), "cb7"),
        period("P1", "Period 1 (Enrichment)", hm(9, 10), hm(10, 5), "cb1"),
        period("P2", "Period 2 (Enrichment)", hm(10, 10), hm(11, 5), "cb2"),
        period("P3", "Period 3 (Enrichment)", hm(11, 10), hm(12, 40), "cb3"),
        period("P4", "Period 4 (Enrichment)", hm(12, 45), hm(13, 40), "cb4"),
        period("P5", "Period 5 (Enrichment)", hm(13, 45), hm(14, 40), "cb5"),
        period("PMA", "PM Advisory (Enrichment)", hm(14, 45), hm(15, 30), "cb8"),
    ]
}

fn friday_periods() -> Vec<Period> {
    vec![
        period("AMA", "AM Advisory (Fri)", hm(8, 30), hm(8, 40), "cb7"),
        period("P1", "Period 1 (Fri)", hm(8, 45), hm(9, 26), "cb1"),
        period("P2", "Period 2 (Fri)", hm(9, 31), hm(10, 12), "cb2"),
        period("P3", "Period 3 (Fri)", hm(10, 17), hm(10, 58), "cb3"),
        period("P4", "Period 4 (Fri)", hm(11, 3), hm(11, 44), "cb4"),
        period("P5", "Period 5 (Fri)", hm(11, 49), hm(12, 30), "cb5"),
        period("PMA", "PM Advisory (Fri)", hm(12, 35), hm(13, 30), "cb8"),
    ]
}

fn special_day_periods() -> Vec<Period> {
    vec![period(
        "AMA",
        "AM Advisory (Special Day)",
        hm(8, 0),
        hm(16, 0),
        "cb7",
    )]
}
