//! In-memory doubles for the tracker's collaborators.
//!
//! Progress channels are backed by mpsc receivers so each test decides
//! exactly when (and whether) an update arrives. Every feed carries a
//! teardown token the test can inspect after the job ends.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tabula_backend::{BackendError, EventStreamFeed, StatusFeed, TranslationService, UpdateFeed};
use tabula_core::job::{JobStatus, StatusReport};
use tabula_core::submission::{OutboundSubmission, Submission};
use tabula_core::types::JobId;
use tabula_tracker::ProgressView;

pub type ReportTx = mpsc::UnboundedSender<Result<StatusReport, BackendError>>;
type ReportRx = mpsc::UnboundedReceiver<Result<StatusReport, BackendError>>;

pub fn processing(percent: u8, message: &str) -> StatusReport {
    StatusReport::new(JobStatus::Processing)
        .with_percent(percent)
        .with_message(message)
}

pub fn complete(message: &str) -> StatusReport {
    StatusReport::new(JobStatus::Complete)
        .with_percent(100)
        .with_message(message)
}

pub fn failed(error: &str) -> StatusReport {
    StatusReport::new(JobStatus::Error).with_error(error)
}

pub fn submission(source: &str, target: &str) -> Submission {
    Submission::new("budget.xls", b"workbook".to_vec(), source, target)
}

fn feed_from(rx: ReportRx, teardown: CancellationToken) -> UpdateFeed {
    let updates = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    UpdateFeed::new(updates).with_teardown(teardown)
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeService {
    pub submitted: Mutex<Vec<OutboundSubmission>>,
    pub reject_with: Mutex<Option<String>>,
    pub processing_triggers: AtomicU32,
    pub download_fails: Mutex<Option<String>>,
    next_id: AtomicU32,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationService for FakeService {
    async fn submit(&self, submission: &OutboundSubmission) -> Result<JobId, BackendError> {
        self.submitted.lock().unwrap().push(submission.clone());
        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(BackendError::Api {
                status: 400,
                message,
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn start_processing(&self, _job_id: &str) -> Result<(), BackendError> {
        self.processing_triggers.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Api {
            status: 500,
            message: "worker busy".to_string(),
        })
    }

    async fn fetch_result(&self, _job_id: &str) -> Result<Vec<u8>, BackendError> {
        match self.download_fails.lock().unwrap().clone() {
            Some(message) => Err(BackendError::Api {
                status: 404,
                message,
            }),
            None => Ok(b"translated".to_vec()),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy A double
// ---------------------------------------------------------------------------

pub struct ScriptedStream {
    rx: Mutex<Option<ReportRx>>,
    pub teardown: CancellationToken,
}

impl ScriptedStream {
    pub fn new() -> (Arc<Self>, ReportTx) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            teardown: CancellationToken::new(),
        });
        (stream, tx)
    }
}

#[async_trait]
impl EventStreamFeed for ScriptedStream {
    async fn open_progress(&self, _job_id: &str) -> Result<UpdateFeed, BackendError> {
        match self.rx.lock().unwrap().take() {
            Some(rx) => Ok(feed_from(rx, self.teardown.clone())),
            None => Err(BackendError::Api {
                status: 404,
                message: "Task not found".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy B double
// ---------------------------------------------------------------------------

pub struct ScriptedStatus {
    /// Poll responses in order; once exhausted, `fallback` repeats.
    polls: Mutex<VecDeque<Result<StatusReport, BackendError>>>,
    fallback: StatusReport,
    pub poll_count: AtomicU32,
    subscription: Mutex<Option<ReportRx>>,
    /// `subscribe` never completes.
    stall_subscription: bool,
    /// This many upcoming polls never answer.
    stalled_polls: AtomicU32,
    pub teardown: CancellationToken,
}

impl ScriptedStatus {
    /// A status feed with a working subscription.
    pub fn new(
        polls: Vec<Result<StatusReport, BackendError>>,
        fallback: StatusReport,
    ) -> (Arc<Self>, ReportTx) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Arc::new(Self {
            polls: Mutex::new(polls.into()),
            fallback,
            poll_count: AtomicU32::new(0),
            subscription: Mutex::new(Some(rx)),
            stall_subscription: false,
            stalled_polls: AtomicU32::new(0),
            teardown: CancellationToken::new(),
        });
        (feed, tx)
    }

    /// A status feed whose subscription cannot be opened.
    pub fn poll_only(polls: Vec<Result<StatusReport, BackendError>>, fallback: StatusReport) -> Arc<Self> {
        Arc::new(Self {
            polls: Mutex::new(polls.into()),
            fallback,
            poll_count: AtomicU32::new(0),
            subscription: Mutex::new(None),
            stall_subscription: false,
            stalled_polls: AtomicU32::new(0),
            teardown: CancellationToken::new(),
        })
    }

    /// A status feed whose subscription handshake never finishes.
    pub fn stalled_subscription(
        polls: Vec<Result<StatusReport, BackendError>>,
        fallback: StatusReport,
    ) -> Arc<Self> {
        Arc::new(Self {
            polls: Mutex::new(polls.into()),
            fallback,
            poll_count: AtomicU32::new(0),
            subscription: Mutex::new(None),
            stall_subscription: true,
            stalled_polls: AtomicU32::new(0),
            teardown: CancellationToken::new(),
        })
    }

    /// Make the next `count` polls hang without answering.
    pub fn stall_polls(&self, count: u32) {
        self.stalled_polls.store(count, Ordering::SeqCst);
    }

    pub fn polls(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusFeed for ScriptedStatus {
    async fn poll_status(&self, _job_id: &str) -> Result<StatusReport, BackendError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let stalled = self
            .stalled_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            std::future::pending::<()>().await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    async fn subscribe(&self, _job_id: &str) -> Result<UpdateFeed, BackendError> {
        if self.stall_subscription {
            std::future::pending::<()>().await;
        }
        match self.subscription.lock().unwrap().take() {
            Some(rx) => Ok(feed_from(rx, self.teardown.clone())),
            None => Err(BackendError::Realtime("realtime is not configured".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    Progress(u8, String),
    Success,
    Failure(String),
}

#[derive(Default)]
pub struct RecordingView {
    calls: Mutex<Vec<ViewCall>>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ViewCall::Progress(percent, _) => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl ProgressView for RecordingView {
    fn render_progress(&self, percent: u8, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(ViewCall::Progress(percent, message.to_string()));
    }

    fn render_success(&self) {
        self.calls.lock().unwrap().push(ViewCall::Success);
    }

    fn render_failure(&self, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(ViewCall::Failure(message.to_string()));
    }
}
