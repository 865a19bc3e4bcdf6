use std::sync::Arc;

pub type SharedUi = Arc<dyn Ui>;

/// Sink for everything the user sees. The binary installs a console
/// implementation; tests install a recording one. All calls happen on the
/// task driving the application context, never from background threads.
pub trait Ui: Send + Sync {
    /// One-shot status message (the toast of the original surface).
    fn show_message(&self, text: &str);

    fn score_changed(&self, score: i64);

    /// Elapsed whole seconds of the active recording session, once per second.
    fn timer_tick(&self, elapsed_secs: u64);

    fn recording_changed(&self, recording: bool);

    /// Ask the user to confirm a destructive action.
    fn confirm(&self, prompt: &str) -> bool;

    /// Present document content for editing. `None` means the user cancelled.
    fn prompt_edit(&self, name: &str, content: &str) -> Option<String>;
}

/// The platform's generic share mechanism: hand over a document handle and
/// its MIME type, the platform does the rest.
pub trait ShareTarget: Send + Sync {
    fn share(&self, handle: &crate::storage::DocHandle, name: &str, mime: &str)
        -> anyhow::Result<()>;
}

pub fn format_elapsed(elapsed_secs: u64) -> String {
    format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}
