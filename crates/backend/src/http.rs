//! Response helpers shared by the REST adapters.

use crate::error::BackendError;
use crate::messages::ErrorBody;

/// MIME type for legacy `.xls` workbooks.
pub const MIME_XLS: &str = "application/vnd.ms-excel";
/// MIME type for OOXML `.xlsx` workbooks.
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// MIME type to declare when uploading `filename`.
pub fn spreadsheet_mime(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".xls") {
        MIME_XLS
    } else {
        MIME_XLSX
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Prefers the `error` field of a JSON object, then the raw body, then
/// `fallback` for an empty body.
pub fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(ErrorBody {
        error: Some(message),
    }) = serde_json::from_str::<ErrorBody>(body)
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`BackendError::Api`] carrying the backend's
/// message on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let fallback = status.canonical_reason().unwrap_or("request failed");
    Err(BackendError::Api {
        status: status.as_u16(),
        message: error_message(&body, fallback),
    })
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let response = ensure_success(response).await?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Read a successful response body as raw bytes.
pub(crate) async fn read_bytes(response: reqwest::Response) -> Result<Vec<u8>, BackendError> {
    let response = ensure_success(response).await?;
    Ok(response.bytes().await?.to_vec())
}
