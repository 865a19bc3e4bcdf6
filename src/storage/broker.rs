use std::{
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const RECORDS_FOLDER: &str = "ScoreRecords";
pub const CSV_MIME: &str = "text/csv";

/// Opaque reference to a stored document. For the filesystem broker this is
/// the file name inside the records folder, but callers never rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocHandle(String);

impl DocHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub handle: DocHandle,
}

/// Contract of the platform document store: insert a metadata record and get
/// a handle, stream bytes through the handle, query the records folder, and
/// delete by handle. Implementations are driven from a single worker thread,
/// hence `&mut self`.
pub trait StorageBroker: Send {
    /// Prepare the backing store. Called once before any other operation.
    fn open(&mut self) -> Result<()>;

    fn create(&mut self, name: &str, mime: &str) -> Result<DocHandle>;

    fn write(&mut self, handle: &DocHandle, content: &str) -> Result<()>;

    fn read(&mut self, handle: &DocHandle) -> Result<String>;

    /// First line of the document, without the trailing newline. `None` for
    /// an empty document.
    fn first_line(&mut self, handle: &DocHandle) -> Result<Option<String>>;

    /// All documents in the records folder, modified-time descending.
    fn query(&mut self) -> Result<Vec<DocumentMeta>>;

    /// Returns `false` when the handle does not name a stored document.
    fn delete(&mut self, handle: &DocHandle) -> Result<bool>;
}

/// Filesystem-backed broker rooted at `<data-dir>/Documents/ScoreRecords`.
pub struct FsBroker {
    root: PathBuf,
    reads: Arc<AtomicU64>,
}

impl FsBroker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of read operations against the backing store. Shared so tests
    /// can keep observing it after the broker moves onto the worker thread.
    pub fn reads_counter(&self) -> Arc<AtomicU64> {
        self.reads.clone()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, handle: &DocHandle) -> Result<PathBuf> {
        let name = handle.as_str();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(anyhow!("invalid document handle '{name}'"));
        }
        Ok(self.root.join(name))
    }
}

impl StorageBroker for FsBroker {
    fn open(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create records folder {}", self.root.display()))
    }

    fn create(&mut self, name: &str, mime: &str) -> Result<DocHandle> {
        if mime != CSV_MIME {
            return Err(anyhow!("unsupported MIME type '{mime}'"));
        }
        let handle = DocHandle::new(name);
        let path = self.path_for(&handle)?;
        if path.exists() {
            return Err(anyhow!("document '{name}' already exists"));
        }
        fs::write(&path, "")
            .with_context(|| format!("failed to insert document record for {name}"))?;
        Ok(handle)
    }

    fn write(&mut self, handle: &DocHandle, content: &str) -> Result<()> {
        let path = self.path_for(handle)?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write document {}", handle.as_str()))
    }

    fn read(&mut self, handle: &DocHandle) -> Result<String> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(handle)?;
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read document {}", handle.as_str()))
    }

    fn first_line(&mut self, handle: &DocHandle) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(handle)?;
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open document {}", handle.as_str()))?;
        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .with_context(|| format!("failed to read document {}", handle.as_str()))?;
        if line.is_empty() {
            return Ok(None);
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Ok(Some(line))
    }

    fn query(&mut self) -> Result<Vec<DocumentMeta>> {
        let mut rows = Vec::new();
        if !self.root.exists() {
            return Ok(rows);
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to query {}", self.root.display()))?;

        for entry in entries {
            let entry = entry.context("failed to read directory entry")?;
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(err) => {
                    // Treated as "no data" for this row; the listing never crashes.
                    log::warn!("skipping unreadable entry {:?}: {err}", entry.path());
                    continue;
                }
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    log::warn!("skipping document with non-UTF-8 name {raw:?}");
                    continue;
                }
            };
            let modified: DateTime<Utc> = meta
                .modified()
                .with_context(|| format!("missing modified time for {name}"))?
                .into();

            rows.push(DocumentMeta {
                handle: DocHandle::new(name.clone()),
                name,
                modified,
                size_bytes: meta.len(),
            });
        }

        rows.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.name.cmp(&a.name)));
        Ok(rows)
    }

    fn delete(&mut self, handle: &DocHandle) -> Result<bool> {
        let path = self.path_for(handle)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| {
                format!("failed to delete document {}", handle.as_str())
            }),
        }
    }
}
