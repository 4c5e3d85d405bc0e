//! Backend selection, read from the command line or the environment.
//!
//! | Env Var                | Default                 |
//! |------------------------|-------------------------|
//! | `TABULA_BACKEND_URL`   | `http://127.0.0.1:5000` |
//! | `TABULA_BACKEND_STYLE` | `task`                  |
//! | `TABULA_REALTIME_URL`  | unset (cloud only)      |
//! | `TABULA_REALTIME_KEY`  | unset (cloud only)      |

use std::sync::Arc;

use clap::{Args, ValueEnum};

use tabula_backend::cloud_api::CloudApi;
use tabula_backend::realtime::RealtimeClient;
use tabula_backend::task_api::TaskApi;
use tabula_core::submission::{CLOUD_MAX_UPLOAD_BYTES, TASK_MAX_UPLOAD_BYTES};
use tabula_tracker::{JobTracker, ProgressSource, ProgressView};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Which backend protocol to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendStyle {
    /// Multipart upload, server-sent progress events.
    Task,
    /// Base64 JSON upload, status polling plus realtime change events.
    Cloud,
}

impl BackendStyle {
    pub fn max_upload_bytes(self) -> u64 {
        match self {
            BackendStyle::Task => TASK_MAX_UPLOAD_BYTES,
            BackendStyle::Cloud => CLOUD_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Backend base URL.
    #[arg(long, env = "TABULA_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    #[arg(long, env = "TABULA_BACKEND_STYLE", value_enum, default_value_t = BackendStyle::Task)]
    pub backend_style: BackendStyle,

    /// Realtime WebSocket base, e.g. `wss://<project>.supabase.co/realtime/v1`.
    #[arg(long, env = "TABULA_REALTIME_URL")]
    pub realtime_url: Option<String>,

    /// Key presented to the realtime endpoint.
    #[arg(long, env = "TABULA_REALTIME_KEY", hide_env_values = true)]
    pub realtime_key: Option<String>,
}

impl BackendArgs {
    /// Realtime settings, when both the URL and the key are present.
    pub fn realtime(&self) -> Option<RealtimeClient> {
        match (&self.realtime_url, &self.realtime_key) {
            (Some(url), Some(key)) => Some(RealtimeClient::new(url.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Wire the backend adapter and its progress source into a tracker.
    pub fn build_tracker(&self, view: Arc<dyn ProgressView>) -> JobTracker {
        match self.backend_style {
            BackendStyle::Task => {
                let api = Arc::new(TaskApi::new(self.backend_url.as_str()));
                JobTracker::new(api.clone(), ProgressSource::stream(api), view)
            }
            BackendStyle::Cloud => {
                let mut api = CloudApi::new(self.backend_url.as_str());
                match self.realtime() {
                    Some(realtime) => api = api.with_realtime(realtime),
                    None => tracing::warn!(
                        "TABULA_REALTIME_URL / TABULA_REALTIME_KEY not set, progress will be polled only"
                    ),
                }
                let api = Arc::new(api);
                JobTracker::new(api.clone(), ProgressSource::hybrid(api), view)
            }
        }
    }
}
