//! Client for the serverless cloud backend.
//!
//! The cloud backend accepts the spreadsheet inline as base64 JSON, only
//! starts work when `POST /api/process_job` is called, and exposes job
//! state through `GET /api/status` plus realtime row-change notifications.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use tabula_core::job::StatusReport;
use tabula_core::submission::OutboundSubmission;
use tabula_core::types::JobId;

use crate::error::BackendError;
use crate::feed::UpdateFeed;
use crate::http::{ensure_success, parse_json, read_bytes};
use crate::messages::{parse_status_record, CloudSubmitRequest, ProcessJobRequest, SubmitResponse};
use crate::realtime::RealtimeClient;
use crate::service::{StatusFeed, TranslationService};

#[derive(Debug, Clone)]
pub struct CloudApi {
    client: reqwest::Client,
    base_url: String,
    realtime: Option<RealtimeClient>,
}

impl CloudApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            realtime: None,
        }
    }

    /// Enable change subscriptions. Without this, [`StatusFeed::subscribe`]
    /// fails and the tracker falls back to polling alone.
    pub fn with_realtime(mut self, realtime: RealtimeClient) -> Self {
        self.realtime = Some(realtime);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

#[async_trait]
impl TranslationService for CloudApi {
    async fn submit(&self, submission: &OutboundSubmission) -> Result<JobId, BackendError> {
        let request = CloudSubmitRequest {
            filename: &submission.filename,
            file: STANDARD.encode(&submission.bytes),
            source_lang: &submission.source_lang,
            target_lang: &submission.target_lang,
        };
        let response = self
            .client
            .post(self.endpoint("translate"))
            .json(&request)
            .send()
            .await?;

        let body: SubmitResponse = parse_json(response).await?;
        tracing::info!(
            job_id = %body.task_id,
            filename = %submission.filename,
            size = submission.bytes.len(),
            "Cloud translation job created",
        );
        Ok(body.task_id)
    }

    async fn start_processing(&self, job_id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint("process_job"))
            .json(&ProcessJobRequest { job_id })
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::debug!(job_id, "Processing triggered");
        Ok(())
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(self.endpoint("download"))
            .query(&[("job_id", job_id)])
            .send()
            .await?;
        read_bytes(response).await
    }
}

#[async_trait]
impl StatusFeed for CloudApi {
    async fn poll_status(&self, job_id: &str) -> Result<StatusReport, BackendError> {
        let response = self
            .client
            .get(self.endpoint("status"))
            .query(&[("job_id", job_id)])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        parse_status_record(&body)
    }

    async fn subscribe(&self, job_id: &str) -> Result<UpdateFeed, BackendError> {
        match &self.realtime {
            Some(realtime) => realtime.subscribe(job_id).await,
            None => Err(BackendError::Realtime("realtime is not configured".to_string())),
        }
    }
}
