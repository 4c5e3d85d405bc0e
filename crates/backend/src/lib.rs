//! Backend Service adapters for the spreadsheet translation client.
//!
//! Two backend styles are supported:
//!
//! - [`TaskApi`](task_api::TaskApi): a synchronous task server that streams
//!   progress as server-sent events.
//! - [`CloudApi`](cloud_api::CloudApi): a serverless API backed by a jobs
//!   table, polled over HTTP and observed through a realtime change
//!   subscription ([`RealtimeClient`](realtime::RealtimeClient)).
//!
//! The tracker only sees the capability traits in [`service`], so either
//! style (or a test double) can be injected.

pub mod cloud_api;
pub mod error;
pub mod feed;
pub mod http;
pub mod messages;
pub mod realtime;
pub mod service;
pub mod sse;
pub mod task_api;

pub use error::BackendError;
pub use feed::UpdateFeed;
pub use service::{EventStreamFeed, StatusFeed, TranslationService};
