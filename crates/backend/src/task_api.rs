//! REST client for the synchronous task backend.
//!
//! Submission is a multipart upload; progress arrives as server-sent
//! events on `GET /progress/{task_id}`; the result is fetched from
//! `GET /download/{task_id}`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};

use tabula_core::submission::OutboundSubmission;
use tabula_core::types::JobId;

use crate::error::BackendError;
use crate::feed::UpdateFeed;
use crate::http::{ensure_success, parse_json, read_bytes, spreadsheet_mime};
use crate::messages::{HealthResponse, SubmitResponse};
use crate::service::{EventStreamFeed, TranslationService};
use crate::sse::decode_progress_stream;

/// HTTP client for one task backend instance.
#[derive(Debug, Clone)]
pub struct TaskApi {
    client: reqwest::Client,
    base_url: String,
}

impl TaskApi {
    /// * `base_url` - e.g. `http://127.0.0.1:5000` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        parse_json(response).await
    }

    /// `GET /languages`: code -> display name.
    pub async fn languages(&self) -> Result<BTreeMap<String, String>, BackendError> {
        let response = self
            .client
            .get(format!("{}/languages", self.base_url))
            .send()
            .await?;
        parse_json(response).await
    }
}

#[async_trait]
impl TranslationService for TaskApi {
    async fn submit(&self, submission: &OutboundSubmission) -> Result<JobId, BackendError> {
        let part = Part::bytes(submission.bytes.clone())
            .file_name(submission.filename.clone())
            .mime_str(spreadsheet_mime(&submission.filename))?;
        let form = Form::new()
            .part("file", part)
            .text("source_lang", submission.source_lang.clone())
            .text("target_lang", submission.target_lang.clone());

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let body: SubmitResponse = parse_json(response).await?;
        tracing::info!(
            task_id = %body.task_id,
            filename = %submission.filename,
            "Translation task accepted",
        );
        Ok(body.task_id)
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(format!("{}/download/{}", self.base_url, job_id))
            .send()
            .await?;
        read_bytes(response).await
    }
}

#[async_trait]
impl EventStreamFeed for TaskApi {
    async fn open_progress(&self, job_id: &str) -> Result<UpdateFeed, BackendError> {
        let response = self
            .client
            .get(format!("{}/progress/{}", self.base_url, job_id))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = ensure_success(response).await?;

        tracing::debug!(task_id = %job_id, "Progress stream opened");
        let body = Box::pin(response.bytes_stream());
        Ok(UpdateFeed::new(decode_progress_stream(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = TaskApi::new("http://localhost:5000/");
        assert_eq!(api.base_url(), "http://localhost:5000");
    }
}
