use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::memory::{InMemoryStore, StoreSnapshot};

/// JSON image of an [`InMemoryStore`] on disk.
///
/// Every load-modify-save cycle holds an exclusive lock on a sibling
/// `.lock` file, and the snapshot is only rewritten when the operation
/// succeeded.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Read the snapshot, or an empty one if the file does not exist yet
    pub fn read(&self) -> Result<StoreSnapshot> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Snapshot {} is corrupted", self.path.display()))
    }

    /// Write through a temporary file so readers never see a torn snapshot
    pub fn write(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace snapshot {}", self.path.display()))?;
        debug!(path = %self.path.display(), deliveries = snapshot.deliveries.len(), "Snapshot written");
        Ok(())
    }

    fn open_lock_file(&self) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))
    }

    /// Run `op` against a store loaded from the snapshot and persist the
    /// store afterwards. Nothing is written when `op` fails.
    pub async fn update<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<InMemoryStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .write()
            .with_context(|| format!("Failed to lock snapshot {}", self.path.display()))?;

        let store = Arc::new(InMemoryStore::from_snapshot(self.read()?));
        let result = op(Arc::clone(&store)).await?;
        self.write(&store.snapshot().await)?;
        info!(path = %self.path.display(), "Snapshot updated");
        Ok(result)
    }

    /// Read-only access under a shared lock
    pub async fn inspect<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<InMemoryStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .read()
            .with_context(|| format!("Failed to lock snapshot {}", self.path.display()))?;

        let store = Arc::new(InMemoryStore::from_snapshot(self.read()?));
        op(store).await
    }
}
