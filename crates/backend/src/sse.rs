//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only the `data` field matters for progress events; `event`, `id` and
//! `retry` are accepted and ignored. Lines may end in LF or CRLF and may be
//! split across arbitrary chunk boundaries, including inside a multi-byte
//! UTF-8 sequence.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use tabula_core::job::StatusReport;

use crate::error::BackendError;
use crate::messages::parse_stream_event;

/// Accumulates raw body chunks and yields complete event payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes after the last complete line.
    partial: Vec<u8>,
    /// `data` lines of the event being assembled.
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(payload) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(payload);
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Turn an event-stream body into a stream of progress reports.
///
/// A transport error is yielded once and ends the stream. An event that
/// fails to parse is yielded as an error item; the caller decides whether
/// that is fatal.
pub fn decode_progress_stream<S, B, E>(
    body: S,
) -> impl Stream<Item = Result<StatusReport, BackendError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BackendError> + Send + 'static,
{
    struct State<S> {
        body: S,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    let state = State {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(data) = st.pending.pop_front() {
                return Some((parse_stream_event(&data), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e.into()), st));
                }
                None => return None,
            }
        }
    })
}
