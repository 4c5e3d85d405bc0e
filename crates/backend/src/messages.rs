//! Wire types for both backend styles and their normalization into
//! [`StatusReport`]s.
//!
//! The two backends drifted apart on field names (`progress_percentage`
//! vs `percentage`, `error_message` vs `error`); the serde aliases and the
//! `into_report` conversions absorb that so the tracker sees one shape.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use tabula_core::job::{normalize_percent, percent_of, JobStatus, StatusReport};
use tabula_core::types::Timestamp;

use crate::error::BackendError;

/// Response to a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Backend-assigned job identifier.
    pub task_id: String,
}

/// Error object returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// JSON body of a cloud submission (file inlined as base64).
#[derive(Debug, Serialize)]
pub struct CloudSubmitRequest<'a> {
    pub filename: &'a str,
    pub file: String,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
}

/// JSON body of the cloud processing trigger.
#[derive(Debug, Serialize)]
pub struct ProcessJobRequest<'a> {
    pub job_id: &'a str,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

// ---------------------------------------------------------------------------
// Stream variant
// ---------------------------------------------------------------------------

/// One server-sent progress event from the task backend.
///
/// Either a progress snapshot (`current`, `total`, `message`, `status`) or
/// a bare `{"error": ...}` when the backend lost track of the task.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub current: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamEvent {
    pub fn into_report(self) -> Result<StatusReport, BackendError> {
        if let Some(error) = self.error {
            return Ok(StatusReport::new(JobStatus::Error).with_error(error));
        }
        let status = match self.status.as_deref() {
            None => JobStatus::Processing,
            Some(s) => s
                .parse::<JobStatus>()
                .map_err(|e| BackendError::Decode(e.to_string()))?,
        };
        let mut report = StatusReport::new(status).with_percent(percent_of(self.current, self.total));
        if let Some(message) = self.message {
            // The task backend puts the failure reason in `message`.
            if status == JobStatus::Error {
                report = report.with_error(message.clone());
            }
            report = report.with_message(message);
        }
        Ok(report)
    }
}

/// Parse the `data:` payload of one progress event.
pub fn parse_stream_event(data: &str) -> Result<StatusReport, BackendError> {
    serde_json::from_str::<StreamEvent>(data)?.into_report()
}

// ---------------------------------------------------------------------------
// Poll / change-record variant
// ---------------------------------------------------------------------------

/// A job row as returned by the status endpoint or carried by a change
/// notification.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    #[serde(default, alias = "percentage")]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<Timestamp>,
}

impl StatusRecord {
    pub fn into_report(self) -> StatusReport {
        StatusReport {
            status: self.status,
            percent: self.progress_percentage.map(normalize_percent),
            message: self.progress_message.or(self.message),
            error: self.error_message.or(self.error),
            updated_at: self.updated_at,
        }
    }
}

/// Parse a status endpoint body.
pub fn parse_status_record(body: &str) -> Result<StatusReport, BackendError> {
    Ok(serde_json::from_str::<StatusRecord>(body)?.into_report())
}

/// Parse a timestamp as written by the backend or the database.
///
/// Accepts RFC 3339 and offset-less ISO timestamps (taken as UTC).
/// Anything else is treated as absent rather than failing the record.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
