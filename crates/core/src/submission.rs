//! Translation submissions: language policy and upload validation.
//!
//! A [`Submission`] is what the upload surface hands over. Before anything
//! touches the network it is validated and turned into an
//! [`OutboundSubmission`], which carries the language codes the backend
//! actually expects.

use std::fmt;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Language constants
// ---------------------------------------------------------------------------

/// Sentinel source language meaning "let the backend figure it out".
pub const AUTO_DETECT: &str = "auto";

/// Source code sent in place of [`AUTO_DETECT`]. The backends do not accept
/// the sentinel and expect a concrete code.
pub const DEFAULT_SOURCE_LANG: &str = "fr";

// ---------------------------------------------------------------------------
// Upload limits
// ---------------------------------------------------------------------------

/// Accepted spreadsheet extensions (lowercase, without the dot).
pub const VALID_EXTENSIONS: &[&str] = &["xls", "xlsx"];

/// Request body limit of the synchronous task backend (16 MiB).
pub const TASK_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Request body limit of the cloud backend (4.5 MiB).
pub const CLOUD_MAX_UPLOAD_BYTES: u64 = 4_718_592;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// A spreadsheet plus the language pair requested by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Submission {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub source_lang: String,
    pub target_lang: String,
}

/// A validated submission, ready to be sent.
///
/// `source_lang` never holds [`AUTO_DETECT`].
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundSubmission {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub source_lang: String,
    pub target_lang: String,
}

impl Submission {
    pub fn new(
        filename: impl Into<String>,
        bytes: Vec<u8>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    /// Validate the language pair and substitute the auto-detect sentinel.
    pub fn into_outbound(self) -> Result<OutboundSubmission, CoreError> {
        if self.filename.trim().is_empty() {
            return Err(CoreError::Validation("No file selected".to_string()));
        }
        validate_languages(&self.source_lang, &self.target_lang)?;
        let source_lang = outbound_source_lang(&self.source_lang).to_string();
        Ok(OutboundSubmission {
            filename: self.filename,
            bytes: self.bytes,
            source_lang,
            target_lang: self.target_lang,
        })
    }
}

// The file body can be megabytes; keep it out of logs and panics.
impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .finish()
    }
}

impl fmt::Debug for OutboundSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundSubmission")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

/// Source and target must both be set and must differ, unless the source
/// is [`AUTO_DETECT`].
pub fn validate_languages(source: &str, target: &str) -> Result<(), CoreError> {
    if source.trim().is_empty() || target.trim().is_empty() {
        return Err(CoreError::Validation(
            "Source and target languages must be set".to_string(),
        ));
    }
    if target == AUTO_DETECT {
        return Err(CoreError::Validation(
            "Target language cannot be auto-detected".to_string(),
        ));
    }
    if source == target && source != AUTO_DETECT {
        return Err(CoreError::Validation(
            "Source and target languages must be different".to_string(),
        ));
    }
    Ok(())
}

/// Source code to put on the wire for a user-selected source.
pub fn outbound_source_lang(source: &str) -> &str {
    if source == AUTO_DETECT {
        DEFAULT_SOURCE_LANG
    } else {
        source
    }
}

/// Check that a file looks like a spreadsheet and fits the backend's body
/// limit.
pub fn validate_spreadsheet(filename: &str, size: u64, max_bytes: u64) -> Result<(), CoreError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !VALID_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::Validation(
            "Please upload a valid Excel file (.xls or .xlsx)".to_string(),
        ));
    }
    if size > max_bytes {
        return Err(CoreError::Validation(format!(
            "File size must be less than {}",
            crate::naming::format_file_size(max_bytes)
        )));
    }
    Ok(())
}
