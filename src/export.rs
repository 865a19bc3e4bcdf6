use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use log::{error, info, warn};

use crate::{
    permissions::StorageAccess,
    recorder::SessionDump,
    storage::{DocHandle, Storage, CSV_MIME},
    ui::SharedUi,
};

/// Sentinel marking the first line of a document as a remark rather than data.
pub const REMARK_PREFIX: &str = "#REMARK:";

/// Human-readable form of the remark line shown in the edit view.
pub const REMARK_DISPLAY_PREFIX: &str = "Remark: ";

/// Column header of the exported records, kept byte-for-byte compatible with
/// files produced by the original app.
pub const CSV_HEADER: &str = "相对时间(毫秒),分数,操作类型,时间(秒)";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn file_name_for(now: DateTime<Local>) -> String {
    format!("score_records_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Serializes a session: optional sentinel remark line, the column header,
/// then one row per event with the wall-clock stamp derived from the session
/// start plus the event offset.
pub fn render_csv(events: &[crate::recorder::Event], remark: &str, started_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    if !remark.is_empty() {
        out.push_str(REMARK_PREFIX);
        out.push_str(remark);
        out.push('\n');
    }

    out.push_str(CSV_HEADER);
    out.push('\n');

    for event in events {
        let stamp = (started_at + Duration::milliseconds(event.offset_ms as i64))
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT);
        out.push_str(&format!(
            "{},{},{},{}\n",
            event.offset_ms,
            event.score,
            event.action.as_str(),
            stamp
        ));
    }

    out
}

/// Rewrites a raw document for the edit view: a sentinel first line becomes
/// the human-readable remark line, everything else is untouched.
pub fn to_display_form(raw: &str) -> String {
    match raw.split_once('\n') {
        Some((first, rest)) => match first.strip_prefix(REMARK_PREFIX) {
            Some(remark) => format!("{REMARK_DISPLAY_PREFIX}{remark}\n{rest}"),
            None => raw.to_string(),
        },
        None => match raw.strip_prefix(REMARK_PREFIX) {
            Some(remark) => format!("{REMARK_DISPLAY_PREFIX}{remark}"),
            None => raw.to_string(),
        },
    }
}

/// Inverse of [`to_display_form`]: converts an edited remark line back to the
/// sentinel form before the document is written. Round-tripping a document
/// through display and storage form leaves the remark text unchanged.
pub fn to_storage_form(display: &str) -> String {
    match display.split_once('\n') {
        Some((first, rest)) => match first.strip_prefix(REMARK_DISPLAY_PREFIX) {
            Some(remark) => format!("{REMARK_PREFIX}{remark}\n{rest}"),
            None => display.to_string(),
        },
        None => match display.strip_prefix(REMARK_DISPLAY_PREFIX) {
            Some(remark) => format!("{REMARK_PREFIX}{remark}"),
            None => display.to_string(),
        },
    }
}

pub struct Exporter {
    storage: Storage,
    access: Arc<dyn StorageAccess>,
    ui: SharedUi,
}

impl Exporter {
    pub fn new(storage: Storage, access: Arc<dyn StorageAccess>, ui: SharedUi) -> Self {
        Self {
            storage,
            access,
            ui,
        }
    }

    /// Writes one finished session to a new document. At-most-once: every
    /// failure is surfaced and terminal, nothing is retried, and the caller
    /// has already cleared the event sequence.
    pub async fn export(&self, dump: SessionDump, remark: &str) -> Option<DocHandle> {
        if dump.events.is_empty() {
            self.ui.show_message("No events to save");
            return None;
        }

        if let Err(err) = self.access.ensure_granted() {
            warn!("export blocked: {err:#}");
            self.ui.show_message(&format!("Cannot save records: {err}"));
            return None;
        }

        let name = file_name_for(Local::now());
        let content = render_csv(&dump.events, remark, dump.started_at);

        let handle = match self.storage.create_document(name.clone(), CSV_MIME).await {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to create record document: {err:#}");
                self.ui.show_message("Could not create the record file");
                return None;
            }
        };

        if let Err(err) = self.storage.write_document(handle.clone(), content).await {
            error!("failed to write record document: {err:#}");
            self.ui.show_message(&format!("Save failed: {err}"));
            return None;
        }

        info!(
            "session {} exported as {name} ({} events)",
            dump.session_id,
            dump.events.len()
        );
        self.ui.show_message(&format!("Records saved to {name}"));
        Some(handle)
    }
}
