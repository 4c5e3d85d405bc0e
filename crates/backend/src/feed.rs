//! [`UpdateFeed`]: a progress channel that owns its own teardown.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};

use tabula_core::job::StatusReport;

use crate::error::BackendError;

/// A live stream of status reports for one job.
///
/// Dropping the feed (or calling [`close`](Self::close)) releases the
/// underlying resource: the HTTP body for an event stream, or the realtime
/// channel, whose background task leaves the topic and closes the socket
/// when its teardown token fires.
pub struct UpdateFeed {
    inner: BoxStream<'static, Result<StatusReport, BackendError>>,
    teardown: Option<DropGuard>,
}

impl UpdateFeed {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StatusReport, BackendError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            teardown: None,
        }
    }

    /// Cancel `token` when this feed is dropped or closed.
    pub fn with_teardown(mut self, token: CancellationToken) -> Self {
        self.teardown = Some(token.drop_guard());
        self
    }

    /// Release the channel now.
    pub fn close(self) {
        drop(self);
    }
}

impl Stream for UpdateFeed {
    type Item = Result<StatusReport, BackendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for UpdateFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateFeed")
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}
