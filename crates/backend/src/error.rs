/// Errors from the backend adapter layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The `error` field of a JSON body, or the raw body.
        message: String,
    },

    /// A response or event did not match the expected shape.
    #[error("Malformed backend payload: {0}")]
    Decode(String),

    /// The realtime change subscription failed or was closed by the server.
    #[error("Realtime subscription error: {0}")]
    Realtime(String),
}

impl BackendError {
    /// Text suitable for showing to a user.
    ///
    /// Backend rejections surface the backend's own message; everything
    /// else falls back to the error's display form.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}
