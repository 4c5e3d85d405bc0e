//! Progress sources and the tracking loops that drive them.
//!
//! Both strategies end in the same place: every report is handed to
//! [`Reconciler::handle_update`], which applies it to the shared
//! [`JobProgress`] and renders the result. The loops only decide where
//! reports come from and when the channels give up.
//!
//! - [`ProgressSource::Stream`]: one ordered event stream. A dropped
//!   connection is terminal.
//! - [`ProgressSource::Hybrid`]: a change subscription raced against a
//!   bounded status poll. The subscription is best-effort and opens in the
//!   background while polling runs; the poll is authoritative and times the
//!   job out after its attempt cap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tabula_backend::{BackendError, EventStreamFeed, StatusFeed, UpdateFeed};
use tabula_core::job::StatusReport;
use tabula_core::progress::{
    Applied, FailureKind, JobProgress, MSG_CONNECTION_LOST, MSG_TIMED_OUT,
};
use tabula_core::types::JobId;

use crate::tracker::Outcome;
use crate::view::ProgressView;

/// Spacing between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls (responses or errors) allowed before a live job times out.
pub const MAX_POLL_ATTEMPTS: u32 = 120;

/// A status request still unanswered after this long counts as a failed
/// attempt.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll settings for [`ProgressSource::Hybrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub poll_timeout: Duration,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
            poll_timeout: POLL_TIMEOUT,
        }
    }
}

/// Where a tracked job's progress comes from.
#[derive(Clone)]
pub enum ProgressSource {
    Stream(Arc<dyn EventStreamFeed>),
    Hybrid {
        feed: Arc<dyn StatusFeed>,
        config: HybridConfig,
    },
}

impl ProgressSource {
    pub fn stream(feed: Arc<dyn EventStreamFeed>) -> Self {
        ProgressSource::Stream(feed)
    }

    /// Hybrid source with the default 1 s x 120 poll budget.
    pub fn hybrid(feed: Arc<dyn StatusFeed>) -> Self {
        Self::hybrid_with(feed, HybridConfig::default())
    }

    pub fn hybrid_with(feed: Arc<dyn StatusFeed>, config: HybridConfig) -> Self {
        ProgressSource::Hybrid { feed, config }
    }

    /// Drive the job to a terminal outcome or until cancelled.
    pub(crate) async fn run(&self, ctx: &Reconciler) -> Outcome {
        match self {
            ProgressSource::Stream(feed) => run_stream(ctx, feed.as_ref()).await,
            ProgressSource::Hybrid { feed, config } => run_hybrid(ctx, feed.as_ref(), *config).await,
        }
    }
}

impl fmt::Debug for ProgressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressSource::Stream(_) => f.write_str("ProgressSource::Stream"),
            ProgressSource::Hybrid { config, .. } => f
                .debug_struct("ProgressSource::Hybrid")
                .field("config", config)
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Everything the tracking task needs to turn reports into state and
/// view calls.
pub(crate) struct Reconciler {
    pub(crate) job_id: JobId,
    pub(crate) state: Arc<watch::Sender<JobProgress>>,
    pub(crate) view: Arc<dyn ProgressView>,
    pub(crate) cancel: CancellationToken,
}

impl Reconciler {
    /// Apply one report. Returns the outcome once the job is terminal.
    ///
    /// The view is only called when this report changed the published
    /// state, so duplicates from two channels render once. Progress is
    /// re-checked against cancellation right before rendering.
    fn handle_update(&self, report: &StatusReport, channel: &'static str) -> Option<Outcome> {
        let mut applied = Applied::Ignored;
        let mut rendered = (0, String::new());
        self.state.send_if_modified(|progress| {
            applied = progress.apply(report);
            rendered = (progress.percent, progress.display_message().to_string());
            !matches!(applied, Applied::Ignored | Applied::Unchanged)
        });

        match applied {
            Applied::Ignored => self.settled(),
            Applied::Unchanged => None,
            Applied::Progressed => {
                if self.cancel.is_cancelled() || self.settled().is_some() {
                    return self.settled();
                }
                tracing::debug!(
                    job_id = %self.job_id,
                    channel,
                    percent = rendered.0,
                    message = %rendered.1,
                    "Progress update",
                );
                self.view.render_progress(rendered.0, &rendered.1);
                None
            }
            Applied::Completed => {
                tracing::info!(job_id = %self.job_id, channel, "Translation complete");
                self.view.render_progress(rendered.0, &rendered.1);
                self.view.render_success();
                Some(Outcome::Succeeded)
            }
            Applied::Failed(message) => {
                tracing::info!(job_id = %self.job_id, channel, error = %message, "Translation failed");
                self.view.render_failure(&message);
                Some(Outcome::Failed {
                    kind: FailureKind::Application,
                    message,
                })
            }
        }
    }

    /// Fail the job for a client-side reason, unless something else
    /// already ended it.
    fn fail(&self, kind: FailureKind, message: &str) -> Outcome {
        let won = self
            .state
            .send_if_modified(|progress| progress.fail(kind, message));
        if !won {
            return self.settled().unwrap_or(Outcome::Cancelled);
        }
        tracing::warn!(job_id = %self.job_id, ?kind, error = %message, "Tracking failed");
        self.view.render_failure(message);
        Outcome::Failed {
            kind,
            message: message.to_string(),
        }
    }

    /// Outcome already recorded in the shared state, if any.
    fn settled(&self) -> Option<Outcome> {
        Outcome::from_progress(&self.state.borrow())
    }
}

// ---------------------------------------------------------------------------
// Strategy A: event stream
// ---------------------------------------------------------------------------

async fn run_stream(ctx: &Reconciler, feed: &dyn EventStreamFeed) -> Outcome {
    let opened = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Outcome::Cancelled,
        opened = feed.open_progress(&ctx.job_id) => opened,
    };
    let mut updates = match opened {
        Ok(updates) => updates,
        Err(e) => {
            tracing::error!(job_id = %ctx.job_id, error = %e, "Failed to open progress stream");
            return ctx.fail(FailureKind::ConnectivityLost, MSG_CONNECTION_LOST);
        }
    };

    let outcome = loop {
        let item = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break Outcome::Cancelled,
            item = updates.next() => item,
        };
        match item {
            Some(Ok(report)) => {
                if let Some(outcome) = ctx.handle_update(&report, "stream") {
                    break outcome;
                }
            }
            Some(Err(BackendError::Decode(detail))) => {
                break ctx.fail(
                    FailureKind::Application,
                    &format!("Invalid progress event: {detail}"),
                );
            }
            Some(Err(e)) => {
                tracing::warn!(job_id = %ctx.job_id, error = %e, "Progress stream dropped");
                break ctx.fail(FailureKind::ConnectivityLost, MSG_CONNECTION_LOST);
            }
            None => {
                tracing::warn!(job_id = %ctx.job_id, "Progress stream ended before a final status");
                break ctx.fail(FailureKind::ConnectivityLost, MSG_CONNECTION_LOST);
            }
        }
    };

    updates.close();
    outcome
}

// ---------------------------------------------------------------------------
// Strategy B: subscription + poll
// ---------------------------------------------------------------------------

async fn run_hybrid(ctx: &Reconciler, feed: &dyn StatusFeed, config: HybridConfig) -> Outcome {
    let mut opening: Option<BoxFuture<'_, Result<UpdateFeed, BackendError>>> =
        Some(feed.subscribe(&ctx.job_id));
    let mut subscription: Option<UpdateFeed> = None;

    let poll = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(poll);
    let mut attempts: u32 = 0;

    let outcome = loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break Outcome::Cancelled,
            opened = finish_opening(&mut opening) => {
                opening = None;
                match opened {
                    Ok(updates) => subscription = Some(updates),
                    Err(e) => {
                        tracing::warn!(job_id = %ctx.job_id, error = %e, "Change subscription unavailable, polling only");
                    }
                }
            }
            item = next_change(&mut subscription) => match item {
                Some(Ok(report)) => {
                    if let Some(outcome) = ctx.handle_update(&report, "subscription") {
                        break outcome;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(job_id = %ctx.job_id, error = %e, "Change subscription dropped, polling only");
                    subscription = None;
                }
                None => {
                    tracing::warn!(job_id = %ctx.job_id, "Change subscription ended, polling only");
                    subscription = None;
                }
            },
            _ = &mut poll => {
                if attempts >= config.max_poll_attempts {
                    break ctx.fail(FailureKind::TimedOut, MSG_TIMED_OUT);
                }
                attempts += 1;

                let polled = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => break Outcome::Cancelled,
                    polled = tokio::time::timeout(config.poll_timeout, feed.poll_status(&ctx.job_id)) => polled,
                };
                match polled {
                    Ok(Ok(report)) => {
                        if let Some(outcome) = ctx.handle_update(&report, "poll") {
                            break outcome;
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(job_id = %ctx.job_id, attempt = attempts, error = %e, "Status poll failed");
                    }
                    Err(_) => {
                        tracing::warn!(
                            job_id = %ctx.job_id,
                            attempt = attempts,
                            timeout = ?config.poll_timeout,
                            "Status poll timed out",
                        );
                    }
                }
                poll.as_mut().reset(Instant::now() + config.poll_interval);
            }
        }
    };

    drop(opening);
    if let Some(updates) = subscription.take() {
        updates.close();
    }
    outcome
}

/// Resolves once the subscription handshake finishes; pends forever when
/// there is none in flight.
async fn finish_opening(
    opening: &mut Option<BoxFuture<'_, Result<UpdateFeed, BackendError>>>,
) -> Result<UpdateFeed, BackendError> {
    match opening {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

/// Next item from the subscription; pends forever once it is gone so the
/// poll branch keeps running.
async fn next_change(
    subscription: &mut Option<UpdateFeed>,
) -> Option<Result<StatusReport, BackendError>> {
    match subscription {
        Some(updates) => updates.next().await,
        None => std::future::pending().await,
    }
}
