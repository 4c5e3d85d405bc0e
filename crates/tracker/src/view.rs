/// Presentation surface driven by the tracker.
///
/// Calls come only from the tracking task, one at a time. Success and
/// failure are never rendered once the job was cancelled. A progress render
/// that already passed its cancellation check may still land while
/// [`JobTracker::cancel`](crate::JobTracker::cancel) runs on another
/// thread. Implementations hold no tracking logic.
pub trait ProgressView: Send + Sync {
    fn render_progress(&self, percent: u8, message: &str);

    fn render_success(&self);

    fn render_failure(&self, message: &str);
}
