//! [`JobTracker`]: submit one translation job at a time and follow it to
//! a terminal outcome.
//!
//! State is published through a [`watch`] channel. Every transition, from
//! the tracking task or from [`JobTracker::cancel`], is a single
//! `send_if_modified` on that channel, so whichever terminal write lands
//! first wins and the other side sees a no-op.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use tabula_backend::TranslationService;
use tabula_core::naming::translated_file_name;
use tabula_core::progress::{FailureKind, JobProgress, TrackerPhase, MSG_TRANSLATION_FAILED};
use tabula_core::submission::Submission;
use tabula_core::types::JobId;

use crate::error::TrackerError;
use crate::source::{ProgressSource, Reconciler};
use crate::view::ProgressView;

/// How a tracked job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed { kind: FailureKind, message: String },
    Cancelled,
}

impl Outcome {
    /// The outcome recorded in `progress`, or `None` while the job is live
    /// or there is no job.
    pub fn from_progress(progress: &JobProgress) -> Option<Self> {
        match progress.phase {
            TrackerPhase::Succeeded => Some(Outcome::Succeeded),
            TrackerPhase::Failed(kind) => Some(Outcome::Failed {
                kind,
                message: progress
                    .error
                    .clone()
                    .unwrap_or_else(|| MSG_TRANSLATION_FAILED.to_string()),
            }),
            TrackerPhase::Cancelled => Some(Outcome::Cancelled),
            TrackerPhase::Idle | TrackerPhase::Submitted | TrackerPhase::Tracking => None,
        }
    }
}

/// A job accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    job_id: JobId,
    original_name: String,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Name of the file that was submitted.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

/// A downloaded translation, named `translated_<base>.xlsx`.
#[derive(Clone, PartialEq, Eq)]
pub struct TranslatedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for TranslatedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatedFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Bookkeeping for the running tracking task.
struct ActiveJob {
    /// Stops the tracking task and the processing trigger.
    cancel: CancellationToken,
    /// Cancelled by the tracking task on exit, after its channels closed.
    finished: CancellationToken,
}

/// Submits translation jobs and tracks one of them at a time.
pub struct JobTracker {
    service: Arc<dyn TranslationService>,
    source: ProgressSource,
    view: Arc<dyn ProgressView>,
    state: Arc<watch::Sender<JobProgress>>,
    active: Mutex<Option<ActiveJob>>,
}

impl JobTracker {
    pub fn new(
        service: Arc<dyn TranslationService>,
        source: ProgressSource,
        view: Arc<dyn ProgressView>,
    ) -> Self {
        let (state, _) = watch::channel(JobProgress::new());
        Self {
            service,
            source,
            view,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    /// Current state of the tracked job.
    pub fn snapshot(&self) -> JobProgress {
        self.state.borrow().clone()
    }

    /// Receive every state change.
    pub fn watch(&self) -> watch::Receiver<JobProgress> {
        self.state.subscribe()
    }

    /// Validate and send a submission.
    ///
    /// Any job still being tracked is cancelled first. Local validation
    /// failures never reach the network. Tracking is not started; call
    /// [`track`](Self::track) with the returned handle.
    pub async fn submit(&self, submission: Submission) -> Result<JobHandle, TrackerError> {
        self.cancel().await;

        let outbound = submission.into_outbound()?;
        let job_id = self.service.submit(&outbound).await.map_err(|e| {
            tracing::warn!(filename = %outbound.filename, error = %e, "Submission rejected");
            TrackerError::SubmissionFailed(e.user_message())
        })?;

        self.state.send_modify(|progress| progress.begin(job_id.clone()));
        tracing::info!(
            job_id = %job_id,
            filename = %outbound.filename,
            source_lang = %outbound.source_lang,
            target_lang = %outbound.target_lang,
            "Job submitted",
        );

        Ok(JobHandle {
            job_id,
            original_name: outbound.filename,
        })
    }

    /// Start the tracking task for a submitted job and return immediately.
    ///
    /// Also asks the backend to start processing, in the background; a
    /// failed trigger is only logged since the progress channels report
    /// the job's real fate.
    pub async fn track(&self, handle: &JobHandle) -> Result<(), TrackerError> {
        let mut active = self.active.lock().await;

        let started = self.state.send_if_modified(|progress| {
            progress.job_id.as_deref() == Some(handle.job_id()) && progress.start_tracking()
        });
        if !started {
            return Err(TrackerError::NoActiveJob);
        }

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let trigger_id = handle.job_id.clone();
        let trigger_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = trigger_cancel.cancelled() => {}
                triggered = service.start_processing(&trigger_id) => {
                    if let Err(e) = triggered {
                        tracing::warn!(job_id = %trigger_id, error = %e, "Processing trigger failed");
                    }
                }
            }
        });

        let reconciler = Reconciler {
            job_id: handle.job_id.clone(),
            state: Arc::clone(&self.state),
            view: Arc::clone(&self.view),
            cancel: cancel.clone(),
        };
        let source = self.source.clone();
        let done = finished.clone();
        tokio::spawn(async move {
            let _done = done.drop_guard();
            tracing::info!(job_id = %reconciler.job_id, ?source, "Tracking started");
            let outcome = source.run(&reconciler).await;
            tracing::info!(job_id = %reconciler.job_id, ?outcome, "Tracking finished");
        });

        *active = Some(ActiveJob { cancel, finished });
        Ok(())
    }

    /// Wait for the tracked job to end.
    ///
    /// Returns the recorded outcome straight away when the job has already
    /// ended; fails with [`TrackerError::NoActiveJob`] when nothing is
    /// being tracked.
    pub async fn wait(&self) -> Result<Outcome, TrackerError> {
        let finished = self
            .active
            .lock()
            .await
            .as_ref()
            .map(|job| job.finished.clone());
        if let Some(finished) = finished {
            finished.cancelled().await;
        }
        Outcome::from_progress(&self.state.borrow()).ok_or(TrackerError::NoActiveJob)
    }

    /// Cancel the current job.
    ///
    /// Closes every open channel and stops polling before returning. The
    /// view is not called. Returns `false` when there was no live job.
    pub async fn cancel(&self) -> bool {
        let active = self.active.lock().await.take();
        let cancelled = self.state.send_if_modified(|progress| progress.cancel());

        if let Some(job) = active {
            job.cancel.cancel();
            job.finished.cancelled().await;
        }
        if cancelled {
            tracing::info!(job_id = ?self.state.borrow().job_id, "Job cancelled");
        }
        cancelled
    }

    /// Download the translated file of a job that succeeded.
    pub async fn fetch_result(&self, handle: &JobHandle) -> Result<TranslatedFile, TrackerError> {
        let ready = {
            let progress = self.state.borrow();
            progress.job_id.as_deref() == Some(handle.job_id())
                && progress.phase == TrackerPhase::Succeeded
        };
        if !ready {
            return Err(TrackerError::RetrievalFailed(
                "Translation is not complete".to_string(),
            ));
        }

        let bytes = self.service.fetch_result(handle.job_id()).await.map_err(|e| {
            tracing::warn!(job_id = %handle.job_id, error = %e, "Download failed");
            TrackerError::RetrievalFailed(e.user_message())
        })?;
        tracing::info!(job_id = %handle.job_id, size = bytes.len(), "Result downloaded");

        Ok(TranslatedFile {
            file_name: translated_file_name(&handle.original_name),
            bytes,
        })
    }

    /// Cancel anything in flight and forget the job.
    pub async fn reset(&self) {
        self.cancel().await;
        self.state.send_modify(JobProgress::reset);
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        if let Some(job) = self.active.get_mut().take() {
            job.cancel.cancel();
        }
    }
}
