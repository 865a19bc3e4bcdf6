pub mod catalog;
pub mod export;
pub mod permissions;
pub mod presenter;
pub mod recorder;
pub mod score;
pub mod settings;
pub mod storage;
pub mod ui;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use log::warn;

use catalog::{ExportedDocument, FileCatalog};
use export::Exporter;
use permissions::{FsAccess, StorageAccess};
use presenter::{Presenter, RowAction, RowView};
use recorder::{ActionTag, RecorderController};
use score::{Mutation, ScoreStore};
use settings::SettingsStore;
use storage::{FsBroker, Storage, CSV_MIME, RECORDS_FOLDER};
use ui::{ShareTarget, SharedUi};

pub fn records_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("Documents").join(RECORDS_FOLDER)
}

/// Everything the app mutates, with one owner and one driving task. Replaces
/// the scattered globals of the original surface (current score, current
/// remark, remark cache) with explicitly scoped state created at startup.
pub struct AppContext {
    score: ScoreStore,
    recorder: RecorderController,
    exporter: Exporter,
    catalog: FileCatalog,
    presenter: Presenter,
    documents: Vec<ExportedDocument>,
    current_remark: String,
    storage: Storage,
    access: Arc<dyn StorageAccess>,
    share: Arc<dyn ShareTarget>,
    ui: SharedUi,
}

impl AppContext {
    pub fn new(
        data_dir: &Path,
        ui: SharedUi,
        share: Arc<dyn ShareTarget>,
        access: Arc<dyn StorageAccess>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
        let storage = Storage::new(FsBroker::new(records_dir(data_dir)))?;

        let score = ScoreStore::new(settings);
        let recorder = RecorderController::new(ui.clone());
        let exporter = Exporter::new(storage.clone(), access.clone(), ui.clone());
        let catalog = FileCatalog::new(storage.clone());

        ui.score_changed(score.score());

        Ok(Self {
            score,
            recorder,
            exporter,
            catalog,
            presenter: Presenter::new(),
            documents: Vec::new(),
            current_remark: String::new(),
            storage,
            access,
            share,
            ui,
        })
    }

    /// Filesystem-backed context rooted at `data_dir`, as used by the binary.
    pub fn with_fs_defaults(
        data_dir: &Path,
        ui: SharedUi,
        share: Arc<dyn ShareTarget>,
    ) -> Result<Self> {
        let access = Arc::new(FsAccess::new(records_dir(data_dir)));
        Self::new(data_dir, ui, share, access)
    }

    pub fn score(&self) -> i64 {
        self.score.score()
    }

    pub fn current_remark(&self) -> &str {
        &self.current_remark
    }

    pub async fn is_recording(&self) -> bool {
        self.recorder.is_recording().await
    }

    pub async fn increase(&mut self) -> Result<()> {
        let outcome = self.score.increase()?;
        self.after_mutation(ActionTag::Increase, outcome).await;
        Ok(())
    }

    pub async fn decrease(&mut self) -> Result<()> {
        let outcome = self.score.decrease()?;
        self.after_mutation(ActionTag::Decrease, outcome).await;
        Ok(())
    }

    pub async fn reset(&mut self) -> Result<()> {
        let outcome = self.score.reset()?;
        self.after_mutation(ActionTag::Reset, outcome).await;
        Ok(())
    }

    async fn after_mutation(&mut self, action: ActionTag, outcome: Mutation) {
        if let Mutation::Applied { score } = outcome {
            self.ui.score_changed(score);
            self.recorder.record_mutation(action, score).await;
        }
    }

    pub fn set_remark(&mut self, remark: &str) {
        self.current_remark = remark.trim().to_string();
        self.ui.show_message("Remark updated");
    }

    pub async fn start_recording(&mut self) {
        if self.recorder.is_recording().await {
            return;
        }
        if self.current_remark.is_empty() {
            self.ui
                .show_message("No remark set; the record will carry no description");
        }
        if self.recorder.start(self.score.score()).await {
            self.ui.show_message("Recording started");
        }
    }

    /// Ends the session and exports it. The event sequence is cleared by the
    /// recorder before the export outcome is known; the remark is kept for
    /// the next session (original behavior).
    pub async fn end_recording(&mut self) {
        let Some(dump) = self.recorder.end().await else {
            return;
        };
        self.exporter.export(dump, &self.current_remark).await;
    }

    /// Re-queries the catalog. Query failures surface a message and leave an
    /// empty list; they never crash the listing flow.
    pub async fn reload_documents(&mut self) -> &[ExportedDocument] {
        if let Err(err) = self.access.ensure_granted() {
            warn!("listing blocked: {err:#}");
            self.ui.show_message(&format!("Cannot list records: {err}"));
            self.documents.clear();
            self.presenter.reset();
            return &self.documents;
        }

        match self.catalog.refresh().await {
            Ok(documents) => self.documents = documents,
            Err(err) => {
                warn!("failed to load document list: {err:#}");
                self.ui.show_message("Could not load the record list");
                self.documents.clear();
            }
        }
        self.presenter.reset();
        &self.documents
    }

    pub fn documents(&self) -> &[ExportedDocument] {
        &self.documents
    }

    pub fn rows(&self) -> Vec<RowView> {
        self.documents
            .iter()
            .enumerate()
            .map(|(index, doc)| self.presenter.render(index, doc))
            .collect()
    }

    pub fn toggle_expand(&mut self, index: usize) {
        self.presenter.toggle_expand(index);
    }

    /// Fills in a row's remark on demand (tapping an empty remark field).
    pub async fn load_remark(&mut self, index: usize) -> Option<String> {
        let handle = {
            let doc = self.documents.get(index)?;
            if let Some(remark) = &doc.remark {
                return Some(remark.clone());
            }
            doc.handle.clone()
        };

        let remark = self.catalog.remark(handle).await;
        if let Some(doc) = self.documents.get_mut(index) {
            doc.remark = Some(remark.clone());
        }
        Some(remark)
    }

    pub async fn row_action(&mut self, index: usize, action: RowAction) -> Result<()> {
        let Some(doc) = self.documents.get(index).cloned() else {
            self.ui.show_message("No such record");
            return Ok(());
        };

        match action {
            RowAction::Share => self.share_document(&doc),
            RowAction::Delete => self.delete_document(doc).await,
            RowAction::Edit => self.edit_document(doc).await,
        }
        Ok(())
    }

    fn share_document(&self, doc: &ExportedDocument) {
        if let Err(err) = self.share.share(&doc.handle, &doc.name, CSV_MIME) {
            warn!("share failed: {err:#}");
            self.ui.show_message(&format!("Share failed: {err}"));
        }
    }

    async fn delete_document(&mut self, doc: ExportedDocument) {
        if !self.ui.confirm(&format!("Delete {}?", doc.name)) {
            return;
        }
        if let Err(err) = self.access.ensure_granted() {
            self.ui.show_message(&format!("Cannot delete: {err}"));
            return;
        }

        match self.catalog.delete(doc.handle).await {
            Ok(true) => {
                self.ui.show_message("Record deleted");
                self.reload_documents().await;
            }
            Ok(false) => self.ui.show_message("Delete failed"),
            Err(err) => {
                warn!("delete failed: {err:#}");
                self.ui.show_message(&format!("Delete failed: {err}"));
            }
        }
    }

    /// Edit flow: full read off the driving thread, sentinel line shown in
    /// its human-readable form, the saved text converted back and written
    /// over the same handle. A read-edit-save-read cycle leaves the remark
    /// text unchanged.
    async fn edit_document(&mut self, doc: ExportedDocument) {
        if let Err(err) = self.access.ensure_granted() {
            self.ui.show_message(&format!("Cannot edit: {err}"));
            return;
        }

        let raw = match self.storage.read_document(doc.handle.clone()).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read {} for editing: {err:#}", doc.name);
                self.ui.show_message("Could not read the record");
                return;
            }
        };

        let Some(edited) = self.ui.prompt_edit(&doc.name, &export::to_display_form(&raw))
        else {
            return;
        };

        let content = export::to_storage_form(&edited);
        match self.storage.write_document(doc.handle, content).await {
            Ok(()) => {
                self.ui.show_message("Record updated");
                self.reload_documents().await;
            }
            Err(err) => {
                warn!("failed to save edited record: {err:#}");
                self.ui.show_message(&format!("Save failed: {err}"));
            }
        }
    }
}
