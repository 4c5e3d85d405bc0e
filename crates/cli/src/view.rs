//! Single-line terminal progress display on stderr.

use std::io::Write;

use tabula_tracker::ProgressView;

const BAR_WIDTH: usize = 30;
/// Return to column 0 and clear the line.
const CLEAR_LINE: &str = "\r\x1b[2K";

#[derive(Debug, Default)]
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        Self
    }
}

/// `[#######-----------]` for `percent` of `width` cells.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = usize::from(percent.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

impl ProgressView for TerminalView {
    fn render_progress(&self, percent: u8, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "{CLEAR_LINE}{} {percent:>3}% {message}",
            progress_bar(percent, BAR_WIDTH)
        );
        let _ = err.flush();
    }

    fn render_success(&self) {
        eprintln!("{CLEAR_LINE}{} 100% Translation complete", progress_bar(100, BAR_WIDTH));
    }

    fn render_failure(&self, message: &str) {
        eprintln!("{CLEAR_LINE}Translation failed: {message}");
    }
}
