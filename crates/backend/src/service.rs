//! Capability traits the job tracker depends on.
//!
//! A backend style implements [`TranslationService`] plus the progress
//! capability it offers: [`EventStreamFeed`] for a push stream, or
//! [`StatusFeed`] for a poll endpoint with a change subscription.

use async_trait::async_trait;

use tabula_core::job::StatusReport;
use tabula_core::submission::OutboundSubmission;
use tabula_core::types::JobId;

use crate::error::BackendError;
use crate::feed::UpdateFeed;

/// Job submission and result retrieval.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Send a validated submission; returns the backend-assigned job id.
    async fn submit(&self, submission: &OutboundSubmission) -> Result<JobId, BackendError>;

    /// Ask the backend to start working on an accepted job.
    ///
    /// Backends that start on submission keep the default no-op.
    async fn start_processing(&self, _job_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    /// Download the translated spreadsheet.
    async fn fetch_result(&self, job_id: &str) -> Result<Vec<u8>, BackendError>;
}

/// A single long-lived connection delivering a job's progress in order.
#[async_trait]
pub trait EventStreamFeed: Send + Sync {
    async fn open_progress(&self, job_id: &str) -> Result<UpdateFeed, BackendError>;
}

/// Direct status queries plus a best-effort change subscription.
#[async_trait]
pub trait StatusFeed: Send + Sync {
    async fn poll_status(&self, job_id: &str) -> Result<StatusReport, BackendError>;

    /// Open a change-notification subscription. Delivery is not guaranteed.
    async fn subscribe(&self, job_id: &str) -> Result<UpdateFeed, BackendError>;
}
