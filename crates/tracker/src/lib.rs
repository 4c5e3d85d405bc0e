//! Job tracking for spreadsheet translations.
//!
//! [`JobTracker`](tracker::JobTracker) submits a job through an injected
//! [`TranslationService`](tabula_backend::TranslationService), then runs a
//! single tracking task that feeds every progress channel of the selected
//! [`ProgressSource`](source::ProgressSource) into the shared reducer
//! ([`tabula_core::progress::JobProgress::apply`]) until the job ends.

pub mod error;
pub mod source;
pub mod tracker;
pub mod view;

pub use error::TrackerError;
pub use source::{HybridConfig, ProgressSource};
pub use tracker::{JobHandle, JobTracker, Outcome, TranslatedFile};
pub use view::ProgressView;
