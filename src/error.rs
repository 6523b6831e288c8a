// src/error.rs

use thiserror::Error;

/// Crate-wide error type.
///
/// The split matters: `Configuration`, `PeriodNotFound` and `Schema` are
/// fatal for the invocation (the shape of the data is wrong), while
/// individual malformed rows are tolerated and counted by the extraction
/// and consolidation passes instead of surfacing here.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Invalid schedule configuration: {reason}")]
    Configuration { reason: String },

    #[error("Period '{period_id}' not found in the '{schedule}' schedule")]
    PeriodNotFound { schedule: String, period_id: String },

    #[error("Required column '{column}' missing from {input}")]
    Schema { column: String, input: String },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl AttendanceError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        AttendanceError::Configuration {
            reason: reason.into(),
        }
    }
}
