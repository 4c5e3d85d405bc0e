//! Languages advertised by the translation backends.
//!
//! The backend is authoritative; this table is only used to list choices
//! and to warn about codes that are probably typos.

use crate::submission::AUTO_DETECT;

/// `(code, display name)` pairs, in the order the backend lists them.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh-CN", "Chinese (Simplified)"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
];

/// Display name for a language code, if it is a known one.
pub fn language_name(code: &str) -> Option<&'static str> {
    if code == AUTO_DETECT {
        return Some("Auto-detect");
    }
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

pub fn is_known_language(code: &str) -> bool {
    language_name(code).is_some()
}
