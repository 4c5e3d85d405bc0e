use tabula_core::error::CoreError;

/// Errors returned by [`JobTracker`](crate::JobTracker) operations.
///
/// How a tracked job ended is not an error; see [`Outcome`](crate::Outcome).
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Rejected locally or by the backend at submit time.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The result could not be downloaded, or the job has not succeeded.
    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("No active job")]
    NoActiveJob,
}

impl TrackerError {
    /// Message for the presentation surface, without the error-kind prefix.
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::SubmissionFailed(msg) | TrackerError::RetrievalFailed(msg) => msg.clone(),
            TrackerError::NoActiveJob => self.to_string(),
        }
    }
}

impl From<CoreError> for TrackerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => TrackerError::SubmissionFailed(msg),
        }
    }
}
