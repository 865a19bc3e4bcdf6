use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// Broad storage-access grant. Every operation that touches the storage
/// broker checks this first and aborts with a user-visible message when
/// denied; nothing is retried behind the user's back.
pub trait StorageAccess: Send + Sync {
    fn ensure_granted(&self) -> Result<()>;
}

/// Filesystem grant: the records directory must exist (or be creatable)
/// and must be writable.
pub struct FsAccess {
    records_dir: PathBuf,
}

impl FsAccess {
    pub fn new(records_dir: PathBuf) -> Self {
        Self { records_dir }
    }
}

impl StorageAccess for FsAccess {
    fn ensure_granted(&self) -> Result<()> {
        std::fs::create_dir_all(&self.records_dir).with_context(|| {
            format!(
                "storage access denied: cannot create {}",
                self.records_dir.display()
            )
        })?;

        let meta = std::fs::metadata(&self.records_dir)
            .with_context(|| format!("cannot inspect {}", self.records_dir.display()))?;
        if meta.permissions().readonly() {
            return Err(anyhow!(
                "storage access denied: {} is read-only; grant write access in your system settings",
                self.records_dir.display()
            ));
        }

        Ok(())
    }
}
