use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::catalog::ExportedDocument;

/// Remarks longer than this many characters collapse to two lines behind an
/// expand toggle.
pub const REMARK_EXPAND_THRESHOLD: usize = 40;

pub const COLLAPSED_REMARK_LINES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Share,
    Edit,
    Delete,
}

/// Plain view model for one catalog row; the frontend renders it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub name: String,
    pub date_text: String,
    pub size_text: String,
    pub remark_text: String,
    pub remark_visible: bool,
    pub expandable: bool,
    pub expanded: bool,
    /// `None` renders every line; `Some(n)` clamps the remark to `n` lines.
    pub max_lines: Option<usize>,
}

/// Maps catalog rows to view models and tracks per-position expand state.
/// The state is keyed by row position and cleared on every list reload, so
/// toggles never survive a refresh.
pub struct Presenter {
    expand_state: HashMap<usize, bool>,
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            expand_state: HashMap::new(),
        }
    }

    /// Called whenever the backing list is reloaded.
    pub fn reset(&mut self) {
        self.expand_state.clear();
    }

    pub fn toggle_expand(&mut self, index: usize) {
        let entry = self.expand_state.entry(index).or_insert(false);
        *entry = !*entry;
    }

    pub fn render(&self, index: usize, doc: &ExportedDocument) -> RowView {
        let remark = doc.remark.clone().unwrap_or_default();
        let expandable = remark.chars().count() > REMARK_EXPAND_THRESHOLD;
        let expanded = expandable && self.expand_state.get(&index).copied().unwrap_or(false);
        let max_lines = if expandable && !expanded {
            Some(COLLAPSED_REMARK_LINES)
        } else {
            None
        };

        RowView {
            name: doc.name.clone(),
            date_text: format_date(doc.modified),
            size_text: format_size(doc.size_bytes),
            remark_visible: !remark.is_empty(),
            remark_text: remark,
            expandable,
            expanded,
            max_lines,
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_date(modified: DateTime<Utc>) -> String {
    modified
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()) as i32;
    let exp = exp.clamp(1, 6);
    let prefix = b"KMGTPE"[(exp - 1) as usize] as char;
    format!("{:.2} {}B", bytes as f64 / 1024f64.powi(exp), prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocHandle;

    fn doc(remark: Option<&str>) -> ExportedDocument {
        ExportedDocument {
            name: "score_records_20250301_090507.csv".into(),
            modified: Utc::now(),
            size_bytes: 512,
            handle: DocHandle::new("score_records_20250301_090507.csv"),
            remark: remark.map(str::to_string),
        }
    }

    #[test]
    fn forty_characters_show_no_expand_affordance() {
        let presenter = Presenter::new();
        let row = presenter.render(0, &doc(Some(&"x".repeat(40))));
        assert!(!row.expandable);
        assert_eq!(row.max_lines, None);
        assert!(row.remark_visible);
    }

    #[test]
    fn forty_one_characters_collapse_to_two_lines() {
        let presenter = Presenter::new();
        let row = presenter.render(0, &doc(Some(&"x".repeat(41))));
        assert!(row.expandable);
        assert!(!row.expanded);
        assert_eq!(row.max_lines, Some(COLLAPSED_REMARK_LINES));
    }

    #[test]
    fn toggling_expands_and_collapses_a_row() {
        let mut presenter = Presenter::new();
        let long = doc(Some(&"x".repeat(50)));

        presenter.toggle_expand(2);
        let row = presenter.render(2, &long);
        assert!(row.expanded);
        assert_eq!(row.max_lines, None);

        presenter.toggle_expand(2);
        assert!(!presenter.render(2, &long).expanded);
    }

    #[test]
    fn reload_clears_expand_state() {
        let mut presenter = Presenter::new();
        let long = doc(Some(&"x".repeat(50)));

        presenter.toggle_expand(0);
        assert!(presenter.render(0, &long).expanded);

        presenter.reset();
        assert!(!presenter.render(0, &long).expanded);
    }

    #[test]
    fn missing_remark_hides_the_remark_field() {
        let presenter = Presenter::new();
        let row = presenter.render(0, &doc(None));
        assert!(!row.remark_visible);
        assert!(!row.expandable);
        assert_eq!(row.remark_text, "");
    }

    #[test]
    fn sizes_render_like_the_file_list() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
