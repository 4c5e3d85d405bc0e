//! File naming and size formatting for translated spreadsheets.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix of every downloaded result.
pub const TRANSLATED_PREFIX: &str = "translated_";

/// Results are always written in the OOXML format, whatever was uploaded.
pub const OUTPUT_EXTENSION: &str = "xlsx";

const SIZE_UNITS: &[&str] = &["Bytes", "KB", "MB"];

fn extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Last ".ext" where ext contains neither a dot nor a path separator.
    RE.get_or_init(|| Regex::new(r"\.[^/.]+$").expect("static regex is valid"))
}

/// Strip the last extension from a file name.
///
/// `"book.v2.xls"` -> `"book.v2"`, `"notes"` -> `"notes"`.
pub fn base_name(filename: &str) -> &str {
    match extension_re().find(filename) {
        Some(m) => &filename[..m.start()],
        None => filename,
    }
}

/// Download name for a translated copy of `original`.
///
/// The original extension is dropped and `.xlsx` is always appended.
pub fn translated_file_name(original: &str) -> String {
    format!(
        "{TRANSLATED_PREFIX}{}.{OUTPUT_EXTENSION}",
        base_name(original)
    )
}

/// Human-readable size with at most two decimals, e.g. `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[unit])
}
