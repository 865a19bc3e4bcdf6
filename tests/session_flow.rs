//! End-to-end flows through the application context: record, export, list,
//! edit, delete, and the permission gate.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};

use score_recorder::{
    permissions::StorageAccess,
    presenter::RowAction,
    records_dir,
    storage::DocHandle,
    ui::{ShareTarget, Ui},
    AppContext,
};

#[derive(Clone, Copy)]
enum EditMode {
    Cancel,
    KeepAsIs,
}

struct TestUi {
    messages: Mutex<Vec<String>>,
    scores: Mutex<Vec<i64>>,
    recording_flips: Mutex<Vec<bool>>,
    displayed_edits: Mutex<Vec<String>>,
    confirm_answer: AtomicBool,
    edit_mode: Mutex<EditMode>,
}

impl TestUi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            scores: Mutex::new(Vec::new()),
            recording_flips: Mutex::new(Vec::new()),
            displayed_edits: Mutex::new(Vec::new()),
            confirm_answer: AtomicBool::new(true),
            edit_mode: Mutex::new(EditMode::KeepAsIs),
        })
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn saw_message(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl Ui for TestUi {
    fn show_message(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }

    fn score_changed(&self, score: i64) {
        self.scores.lock().unwrap().push(score);
    }

    fn timer_tick(&self, _elapsed_secs: u64) {}

    fn recording_changed(&self, recording: bool) {
        self.recording_flips.lock().unwrap().push(recording);
    }

    fn confirm(&self, _prompt: &str) -> bool {
        self.confirm_answer.load(Ordering::Relaxed)
    }

    fn prompt_edit(&self, _name: &str, content: &str) -> Option<String> {
        self.displayed_edits
            .lock()
            .unwrap()
            .push(content.to_string());
        match *self.edit_mode.lock().unwrap() {
            EditMode::Cancel => None,
            EditMode::KeepAsIs => Some(content.to_string()),
        }
    }
}

struct NullShare;

impl ShareTarget for NullShare {
    fn share(&self, _handle: &DocHandle, _name: &str, _mime: &str) -> Result<()> {
        Ok(())
    }
}

struct DeniedAccess;

impl StorageAccess for DeniedAccess {
    fn ensure_granted(&self) -> Result<()> {
        Err(anyhow!("storage access denied"))
    }
}

fn app(dir: &Path) -> (AppContext, Arc<TestUi>) {
    let ui = TestUi::new();
    let app = AppContext::with_fs_defaults(dir, ui.clone(), Arc::new(NullShare)).unwrap();
    (app, ui)
}

fn exported_files(dir: &Path) -> Vec<PathBuf> {
    let records = records_dir(dir);
    if !records.exists() {
        return Vec::new();
    }
    let mut files: Vec<_> = fs::read_dir(records)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

async fn settle_debounce() {
    tokio::time::sleep(Duration::from_millis(110)).await;
}

#[tokio::test]
async fn a_session_exports_start_mutations_and_end() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _ui) = app(dir.path());

    app.set_remark("abc");
    app.start_recording().await;
    app.increase().await.unwrap();
    settle_debounce().await;
    app.increase().await.unwrap();
    settle_debounce().await;
    app.decrease().await.unwrap();
    app.end_recording().await;

    let files = exported_files(dir.path());
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(&files[0]).unwrap();
    let lines: Vec<_> = content.lines().collect();

    assert_eq!(lines[0], "#REMARK:abc");
    assert_eq!(lines[1], "相对时间(毫秒),分数,操作类型,时间(秒)");
    // start marker + 3 mutations + end marker
    assert_eq!(lines.len(), 2 + 5);
    assert!(lines[2].contains(",START_RECORD,"));
    assert!(lines[3].contains(",1,INCREASE,"));
    assert!(lines[4].contains(",2,INCREASE,"));
    assert!(lines[5].contains(",1,DECREASE,"));
    assert!(lines[6].contains(",1,END_RECORD,"));

    let offsets: Vec<u64> = lines[2..]
        .iter()
        .map(|l| l.split(',').next().unwrap().parse().unwrap())
        .collect();
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn boundary_requests_outside_a_session_are_noops() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _ui) = app(dir.path());

    app.end_recording().await;
    assert!(exported_files(dir.path()).is_empty());

    app.start_recording().await;
    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;

    let files = exported_files(dir.path());
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(&files[0]).unwrap();
    // One start marker only: the second start was swallowed.
    assert_eq!(content.matches("START_RECORD").count(), 1);
}

#[tokio::test]
async fn score_survives_restart_and_never_goes_negative() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut app, _ui) = app(dir.path());
        app.decrease().await.unwrap();
        assert_eq!(app.score(), 0);
        app.increase().await.unwrap();
        settle_debounce().await;
        app.increase().await.unwrap();
        assert_eq!(app.score(), 2);
    }

    let (app, _ui) = app(dir.path());
    assert_eq!(app.score(), 2);
}

#[tokio::test]
async fn listed_documents_carry_eager_remarks() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _ui) = app(dir.path());

    app.set_remark("abc");
    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;

    app.reload_documents().await;
    let documents = app.documents();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].remark.as_deref(), Some("abc"));

    let rows = app.rows();
    assert!(rows[0].remark_visible);
    assert_eq!(rows[0].remark_text, "abc");
}

#[tokio::test]
async fn an_edit_cycle_keeps_the_remark_text() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, ui) = app(dir.path());

    app.set_remark("abc");
    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;

    let before = fs::read_to_string(&exported_files(dir.path())[0]).unwrap();

    app.reload_documents().await;
    app.row_action(0, RowAction::Edit).await.unwrap();

    let displayed = ui.displayed_edits.lock().unwrap().clone();
    assert!(displayed[0].starts_with("Remark: abc\n"));

    let after = fs::read_to_string(&exported_files(dir.path())[0]).unwrap();
    assert_eq!(before, after);
    assert!(ui.saw_message("Record updated"));
}

#[tokio::test]
async fn cancelled_edits_leave_the_document_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, ui) = app(dir.path());

    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;
    let before = fs::read_to_string(&exported_files(dir.path())[0]).unwrap();

    *ui.edit_mode.lock().unwrap() = EditMode::Cancel;
    app.reload_documents().await;
    app.row_action(0, RowAction::Edit).await.unwrap();

    let after = fs::read_to_string(&exported_files(dir.path())[0]).unwrap();
    assert_eq!(before, after);
    assert!(!ui.saw_message("Record updated"));
}

#[tokio::test]
async fn confirmed_deletes_remove_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, ui) = app(dir.path());

    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;

    app.reload_documents().await;
    assert_eq!(app.documents().len(), 1);

    // Declined confirmation leaves the list unchanged.
    ui.confirm_answer.store(false, Ordering::Relaxed);
    app.row_action(0, RowAction::Delete).await.unwrap();
    assert_eq!(app.documents().len(), 1);

    ui.confirm_answer.store(true, Ordering::Relaxed);
    app.row_action(0, RowAction::Delete).await.unwrap();
    assert!(app.documents().is_empty());
    assert!(exported_files(dir.path()).is_empty());
    assert!(ui.saw_message("Record deleted"));
}

#[tokio::test]
async fn denied_storage_access_aborts_export_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let ui = TestUi::new();
    let mut app = AppContext::new(
        dir.path(),
        ui.clone(),
        Arc::new(NullShare),
        Arc::new(DeniedAccess),
    )
    .unwrap();

    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;

    assert!(exported_files(dir.path()).is_empty());
    assert!(ui.saw_message("Cannot save records"));
    // The pending sequence was still cleared: a fresh session starts clean.
    assert!(!app.is_recording().await);

    app.reload_documents().await;
    assert!(app.documents().is_empty());
    assert!(ui.saw_message("Cannot list records"));
}

#[tokio::test]
async fn sharing_reports_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, ui) = app(dir.path());

    app.start_recording().await;
    app.increase().await.unwrap();
    app.end_recording().await;
    app.reload_documents().await;

    app.row_action(0, RowAction::Share).await.unwrap();
    assert!(!ui.saw_message("Share failed"));

    app.row_action(9, RowAction::Share).await.unwrap();
    assert!(ui.saw_message("No such record"));
}
