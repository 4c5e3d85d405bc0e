//! Job status vocabulary and normalized status reports.
//!
//! Both backend styles describe a job with the same four status strings.
//! Every progress channel (event stream, change subscription, status poll)
//! is normalized into a [`StatusReport`] before it reaches the reducer in
//! [`crate::progress`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

/// Job accepted but not yet picked up by a worker.
pub const JOB_STATUS_PENDING: &str = "pending";
/// Job is being translated.
pub const JOB_STATUS_PROCESSING: &str = "processing";
/// Translation finished; the result can be downloaded.
pub const JOB_STATUS_COMPLETE: &str = "complete";
/// Translation failed on the backend.
pub const JOB_STATUS_ERROR: &str = "error";

/// All status strings the backend may report.
pub const VALID_JOB_STATUSES: &[&str] = &[
    JOB_STATUS_PENDING,
    JOB_STATUS_PROCESSING,
    JOB_STATUS_COMPLETE,
    JOB_STATUS_ERROR,
];

/// Backend-side status of a translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    /// Wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => JOB_STATUS_PENDING,
            JobStatus::Processing => JOB_STATUS_PROCESSING,
            JobStatus::Complete => JOB_STATUS_COMPLETE,
            JobStatus::Error => JOB_STATUS_ERROR,
        }
    }

    /// `complete` and `error` end the job.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            JOB_STATUS_PENDING => Ok(JobStatus::Pending),
            JOB_STATUS_PROCESSING => Ok(JobStatus::Processing),
            JOB_STATUS_COMPLETE => Ok(JobStatus::Complete),
            JOB_STATUS_ERROR => Ok(JobStatus::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown job status: '{other}'. Valid statuses: {}",
                VALID_JOB_STATUSES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusReport
// ---------------------------------------------------------------------------

/// One progress observation for a job, from any channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: JobStatus,
    /// Completion percentage in `0..=100`, if the channel reported one.
    pub percent: Option<u8>,
    /// Human-readable progress text.
    pub message: Option<String>,
    /// Failure detail; only meaningful when `status` is `error`.
    pub error: Option<String>,
    /// Backend timestamp of the row this report was read from, if any.
    pub updated_at: Option<Timestamp>,
}

impl StatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            percent: None,
            message: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent.min(100));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_updated_at(mut self, at: Timestamp) -> Self {
        self.updated_at = Some(at);
        self
    }
}

// ---------------------------------------------------------------------------
// Percentage helpers
// ---------------------------------------------------------------------------

/// Percentage for a `current / total` counter pair.
///
/// Rounds to the nearest integer and clamps to `0..=100`. A non-positive
/// `total` means the backend has not counted the work yet and yields 0.
pub fn percent_of(current: i64, total: i64) -> u8 {
    if total <= 0 {
        return 0;
    }
    let pct = (current as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Normalize a backend-reported percentage (possibly fractional or out of
/// range) into `0..=100`. NaN maps to 0.
pub fn normalize_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
