//! Domain logic for spreadsheet translation jobs.
//!
//! Pure, I/O-free building blocks shared by the backend adapters and the
//! job tracker: status vocabulary, the progress reducer, submission
//! validation and download naming.

pub mod error;
pub mod job;
pub mod languages;
pub mod naming;
pub mod progress;
pub mod submission;
pub mod types;
