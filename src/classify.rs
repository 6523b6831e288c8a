// src/classify.rs
//
// Period classification: which sign-in window feeds a target period, which
// earlier periods a late arrival is inferred absent for, and the resulting
// instruction set for the attendance writer.

use chrono::NaiveTime;

use crate::error::AttendanceError;
use crate::schedule::{Period, Schedule};

/// Attendance code applied to the period a late student arrived during.
pub const LATE_CODE: &str = "UL";
/// Attendance code applied to the periods a late student missed entirely.
pub const ABSENT_CODE: &str = "AU";

/// The wall-clock range whose sign-ins count as "arriving for" one period.
/// Both bounds are inclusive: sign-in systems log exactly on boundary minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ArrivalWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

fn period_position(schedule: &Schedule, period_id: &str) -> Result<usize, AttendanceError> {
    schedule
        .position(period_id)
        .ok_or_else(|| AttendanceError::PeriodNotFound {
            schedule: schedule.label().to_string(),
            period_id: period_id.to_string(),
        })
}

/// The sign-in window for a target period: from the end of the previous
/// period (or the period's own start, for the first period of the day) up to
/// the target period's end. A student signing in inside this window arrived
/// during the target period and is late for it, not absent.
pub fn arrival_window(
    schedule: &Schedule,
    target_period_id: &str,
) -> Result<ArrivalWindow, AttendanceError> {
    let idx = period_position(schedule, target_period_id)?;
    let periods = schedule.periods();
    let start = if idx == 0 {
        periods[idx].start
    } else {
        periods[idx - 1].end
    };
    Ok(ArrivalWindow {
        start,
        end: periods[idx].end,
    })
}

/// All periods strictly before the target period, in schedule order. These
/// are the periods a student arriving during the target period missed.
pub fn periods_to_mark_absent<'a>(
    schedule: &'a Schedule,
    target_period_id: &str,
) -> Result<&'a [Period], AttendanceError> {
    let idx = period_position(schedule, target_period_id)?;
    Ok(&schedule.periods()[..idx])
}

/// One "apply this code to these periods" step for the attendance writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInstruction {
    pub code: String,
    pub periods: Vec<Period>,
}

/// The full writer instruction set for one late-arrival run: missed periods
/// get the absent code first, then the target period gets the late code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingPlan {
    pub instructions: Vec<CodeInstruction>,
}

impl MarkingPlan {
    pub fn build(
        schedule: &Schedule,
        target_period_id: &str,
        late_code: &str,
        absent_code: &str,
    ) -> Result<Self, AttendanceError> {
        let idx = period_position(schedule, target_period_id)?;
        let periods = schedule.periods();

        let mut instructions = Vec::new();
        if idx > 0 {
            instructions.push(CodeInstruction {
                code: absent_code.to_string(),
                periods: periods[..idx].to_vec(),
            });
        }
        instructions.push(CodeInstruction {
            code: late_code.to_string(),
            periods: vec![periods[idx].clone()],
        });

        Ok(MarkingPlan { instructions })
    }
}
