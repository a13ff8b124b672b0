use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tempfile::NamedTempFile;

use super::MemStorage;
use crate::core::{Metric, MetricsError, Result};

/// Periodic file persistence for [`MemStorage`]. Holds a weak reference so
/// the snapshot loop never keeps a torn-down storage alive.
pub struct FileSnapshot {
    storage: Weak<MemStorage>,
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(storage: &Arc<MemStorage>, path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Arc::downgrade(storage),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes both maps to a JSON array and atomically replaces the
    /// target file (write to a temp file in the same directory, then
    /// rename). File mode is 0600.
    pub async fn save(&self) -> Result<()> {
        let Some(storage) = self.storage.upgrade() else {
            return Ok(());
        };
        let metrics = storage.export_metrics().await;
        let data = serde_json::to_vec_pretty(&metrics)
            .map_err(|err| MetricsError::Snapshot(format!("cannot encode snapshot: {err}")))?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
            .map_err(|err| MetricsError::Snapshot(format!("cannot create temp file: {err}")))?;
        std::fs::write(tmp.path(), &data)
            .map_err(|err| MetricsError::Snapshot(format!("cannot write snapshot: {err}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600)).map_err(
                |err| MetricsError::Snapshot(format!("cannot set snapshot permissions: {err}")),
            )?;
        }

        tmp.persist(&self.path)
            .map_err(|err| MetricsError::Snapshot(format!("cannot replace snapshot: {err}")))?;
        Ok(())
    }

    /// Decodes the snapshot file and loads it into storage. Callers treat
    /// failures as best-effort: a missing or corrupt file is logged, not
    /// fatal.
    pub async fn restore(&self) -> Result<()> {
        let Some(storage) = self.storage.upgrade() else {
            return Ok(());
        };
        let data = std::fs::read(&self.path)
            .map_err(|err| MetricsError::Snapshot(format!("cannot read snapshot: {err}")))?;
        let metrics: Vec<Metric> = serde_json::from_slice(&data)
            .map_err(|err| MetricsError::Snapshot(format!("cannot decode snapshot: {err}")))?;
        storage.import_metrics(metrics).await;
        Ok(())
    }
}
