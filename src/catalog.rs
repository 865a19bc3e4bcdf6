use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::{
    export::REMARK_PREFIX,
    storage::{DocHandle, Storage},
};

/// How many of the newest documents get their remark read eagerly during a
/// refresh; the rest populate on demand.
pub const EAGER_REMARK_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedDocument {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub handle: DocHandle,
    /// `None` until the remark has been extracted; `Some("")` is the cached
    /// "no remark" answer.
    pub remark: Option<String>,
}

/// Catalog of previously exported documents plus the remark cache. Only ever
/// mutated on the task driving the application, so no locking is needed; the
/// cache grows for the life of the process and is never re-read from storage.
pub struct FileCatalog {
    storage: Storage,
    remark_cache: HashMap<DocHandle, String>,
}

impl FileCatalog {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            remark_cache: HashMap::new(),
        }
    }

    /// Queries the broker and returns the documents newest first, with
    /// remarks filled in for the first [`EAGER_REMARK_COUNT`] entries and for
    /// anything already cached.
    pub async fn refresh(&mut self) -> Result<Vec<ExportedDocument>> {
        let mut rows = self.storage.query_documents().await?;
        rows.sort_by(|a, b| b.modified.cmp(&a.modified));

        let mut documents = Vec::with_capacity(rows.len());
        for (index, meta) in rows.into_iter().enumerate() {
            let remark = if index < EAGER_REMARK_COUNT {
                Some(self.remark(meta.handle.clone()).await)
            } else {
                self.remark_cache.get(&meta.handle).cloned()
            };
            documents.push(ExportedDocument {
                name: meta.name,
                modified: meta.modified,
                size_bytes: meta.size_bytes,
                handle: meta.handle,
                remark,
            });
        }

        Ok(documents)
    }

    /// First-line remark of a document. Cache hits (including the cached
    /// empty string) never touch storage; read failures are cached as "no
    /// remark" rather than propagated.
    pub async fn remark(&mut self, handle: DocHandle) -> String {
        if let Some(hit) = self.remark_cache.get(&handle) {
            return hit.clone();
        }

        let remark = match self.storage.first_line(handle.clone()).await {
            Ok(Some(line)) => line
                .strip_prefix(REMARK_PREFIX)
                .map(str::to_string)
                .unwrap_or_default(),
            Ok(None) => String::new(),
            Err(err) => {
                warn!("failed to read remark for {}: {err:#}", handle.as_str());
                String::new()
            }
        };

        self.remark_cache.insert(handle, remark.clone());
        remark
    }

    /// Deletes through the broker. A successful delete also drops the cache
    /// entry; a failed one leaves everything untouched.
    pub async fn delete(&mut self, handle: DocHandle) -> Result<bool> {
        let removed = self.storage.delete_document(handle.clone()).await?;
        if removed {
            self.remark_cache.remove(&handle);
        }
        Ok(removed)
    }
}
