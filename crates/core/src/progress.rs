//! Job progress state machine and the reducer shared by every progress
//! channel.
//!
//! The tracker owns exactly one [`JobProgress`] per job. Updates from the
//! event stream, the change subscription and the status poll all go through
//! [`JobProgress::apply`], which is idempotent and order-tolerant:
//!
//! - the displayed percentage never decreases while the job is live,
//! - the first terminal status wins and every later update is ignored,
//! - the job status itself never regresses (`processing` is not undone by a
//!   stale `pending`).

use serde::Serialize;

use crate::job::{JobStatus, StatusReport};
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Message constants
// ---------------------------------------------------------------------------

/// Shown right after submission, before any channel reports.
pub const MSG_STARTING: &str = "Starting translation...";
/// Substituted when a live update carries no message.
pub const MSG_PROCESSING: &str = "Processing...";
/// Substituted when the backend reports `error` without any detail.
pub const MSG_TRANSLATION_FAILED: &str = "Translation failed";
/// The progress stream dropped before a terminal status.
pub const MSG_CONNECTION_LOST: &str = "Connection to server lost";
/// The poll loop hit its attempt cap.
pub const MSG_TIMED_OUT: &str = "Translation timed out. Please try again.";

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Why a tracked job ended in [`TrackerPhase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The progress stream or subscription dropped unexpectedly.
    ConnectivityLost,
    /// The backend itself reported `status = error`.
    Application,
    /// The poll attempt cap was reached while the job was still live.
    TimedOut,
}

/// Client-side lifecycle of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "kind")]
pub enum TrackerPhase {
    /// No active job.
    Idle,
    /// The backend accepted the job; no channel is open yet.
    Submitted,
    /// At least one progress channel is live.
    Tracking,
    Succeeded,
    Failed(FailureKind),
    Cancelled,
}

impl TrackerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrackerPhase::Succeeded | TrackerPhase::Failed(_) | TrackerPhase::Cancelled
        )
    }
}

/// Result of feeding one [`StatusReport`] into [`JobProgress::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The job is not being tracked (idle, not started, or already terminal).
    Ignored,
    /// Live update that changed neither the percentage nor the message.
    Unchanged,
    /// Live update that changed what should be displayed.
    Progressed,
    /// The job reached `complete`.
    Completed,
    /// The job reached `error`; carries the message to display.
    Failed(String),
}

// ---------------------------------------------------------------------------
// JobProgress
// ---------------------------------------------------------------------------

/// Canonical, UI-visible state of the tracked job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: Option<JobId>,
    pub phase: TrackerPhase,
    /// Last backend status seen; never regresses.
    pub status: Option<JobStatus>,
    /// Displayed percentage, non-decreasing while tracking.
    pub percent: u8,
    pub message: Option<String>,
    /// Failure detail, present only once the phase is `Failed`.
    pub error: Option<String>,
    pub updated_at: Option<Timestamp>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            job_id: None,
            phase: TrackerPhase::Idle,
            status: None,
            percent: 0,
            message: None,
            error: None,
            updated_at: None,
        }
    }
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Message to render, falling back to the generic progress text.
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or(MSG_PROCESSING)
    }

    /// Start a fresh job in the `Submitted` phase, discarding any previous
    /// job's fields.
    pub fn begin(&mut self, job_id: impl Into<JobId>) {
        *self = Self {
            job_id: Some(job_id.into()),
            phase: TrackerPhase::Submitted,
            status: Some(JobStatus::Pending),
            message: Some(MSG_STARTING.to_string()),
            ..Self::default()
        };
    }

    /// `Submitted -> Tracking`. Returns `false` from any other phase.
    pub fn start_tracking(&mut self) -> bool {
        if self.phase != TrackerPhase::Submitted {
            return false;
        }
        self.phase = TrackerPhase::Tracking;
        true
    }

    /// Merge one status report into the tracked state.
    pub fn apply(&mut self, report: &StatusReport) -> Applied {
        if self.phase != TrackerPhase::Tracking {
            return Applied::Ignored;
        }

        let before = (self.percent, self.message.clone());

        if let Some(pct) = report.percent {
            self.percent = self.percent.max(pct.min(100));
        }
        self.message = Some(
            report
                .message
                .clone()
                .unwrap_or_else(|| MSG_PROCESSING.to_string()),
        );
        self.status = Some(match self.status {
            Some(current) if status_rank(current) > status_rank(report.status) => current,
            _ => report.status,
        });
        if report.updated_at.is_some() && report.updated_at > self.updated_at {
            self.updated_at = report.updated_at;
        }

        match report.status {
            JobStatus::Complete => {
                self.percent = 100;
                self.phase = TrackerPhase::Succeeded;
                Applied::Completed
            }
            JobStatus::Error => {
                // Progress text is never a failure reason.
                let detail = report
                    .error
                    .clone()
                    .unwrap_or_else(|| MSG_TRANSLATION_FAILED.to_string());
                self.error = Some(detail.clone());
                self.phase = TrackerPhase::Failed(FailureKind::Application);
                Applied::Failed(detail)
            }
            JobStatus::Pending | JobStatus::Processing => {
                if before == (self.percent, self.message.clone()) {
                    Applied::Unchanged
                } else {
                    Applied::Progressed
                }
            }
        }
    }

    /// Fail a live job for a client-side reason (connectivity, timeout).
    ///
    /// Returns `false` when the job is idle or already terminal.
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> bool {
        if !self.is_live() {
            return false;
        }
        self.error = Some(message.into());
        self.phase = TrackerPhase::Failed(kind);
        true
    }

    /// Move a live job to `Cancelled`.
    ///
    /// Returns `false` (and changes nothing) from `Idle` or a terminal phase.
    pub fn cancel(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.phase = TrackerPhase::Cancelled;
        true
    }

    /// Drop the job entirely and return to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, TrackerPhase::Submitted | TrackerPhase::Tracking)
    }
}

fn status_rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Processing => 1,
        JobStatus::Complete | JobStatus::Error => 2,
    }
}
