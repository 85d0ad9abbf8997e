use crate::error::{RegistryError, Result};
use crate::memory::InMemoryRegistry;
use crate::registry::{RegistrySnapshot, SynonymRegistry};
use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct FlushState {
    inner: InMemoryRegistry,
    path: PathBuf,
    dirty: AtomicBool,
    closed: AtomicBool,
    wake: Notify,
}

/// Registry backed by a JSON file, flushed write-behind.
///
/// Writes land in memory immediately and mark the registry dirty; a background
/// task coalesces them and rewrites the file through a temp file + rename while
/// holding an advisory lock. A crash can lose the newest bindings but never
/// leaves a half-written file behind.
pub struct PersistentRegistry {
    state: Arc<FlushState>,
}

impl PersistentRegistry {
    /// Loads `path` (if present) and starts the flush task on the current runtime.
    pub async fn open(path: impl AsRef<Path>, flush_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path).await?.unwrap_or_default();
        log::info!(
            "Loaded synonym registry from {:?}: {} aliases, {} concepts",
            path,
            snapshot.len(),
            snapshot.concept_count()
        );

        let state = Arc::new(FlushState {
            inner: InMemoryRegistry::from_snapshot(snapshot),
            path,
            dirty: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            wake: Notify::new(),
        });

        tokio::spawn(flush_loop(Arc::clone(&state), flush_interval));
        Ok(Self { state })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::Acquire)
    }

    /// Writes pending changes now instead of waiting for the flush task.
    pub async fn flush(&self) -> Result<()> {
        flush_now(&self.state).await
    }

    fn mark_dirty(&self) {
        self.state.dirty.store(true, Ordering::Release);
        self.state.wake.notify_one();
    }
}

impl Drop for PersistentRegistry {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
        self.state.wake.notify_one();
    }
}

impl SynonymRegistry for PersistentRegistry {
    fn lookup(&self, alias: &str) -> Result<Option<String>> {
        self.state.inner.lookup(alias)
    }

    fn insert_if_absent(&self, alias: &str, concept_id: &str) -> Result<String> {
        let (id, inserted) = self.state.inner.bind(alias, concept_id)?;
        if inserted {
            self.mark_dirty();
        }
        Ok(id)
    }

    fn bind_all(&self, aliases: &[&str], concept_id: &str) -> Result<String> {
        let (id, inserted) = self.state.inner.bind_group(aliases, concept_id)?;
        if inserted {
            self.mark_dirty();
        }
        Ok(id)
    }

    fn concept_path(&self, concept_id: &str) -> Result<Option<Vec<String>>> {
        self.state.inner.concept_path(concept_id)
    }

    fn record_concept(&self, concept_id: &str, label: &str, path: &[String]) -> Result<()> {
        if self.state.inner.record(concept_id, label, path) {
            self.mark_dirty();
        }
        Ok(())
    }

    fn label_of(&self, concept_id: &str) -> Result<Option<String>> {
        self.state.inner.label_of(concept_id)
    }

    fn aliases_of(&self, concept_id: &str) -> Result<Vec<String>> {
        self.state.inner.aliases_of(concept_id)
    }

    fn snapshot(&self) -> RegistrySnapshot {
        self.state.inner.snapshot()
    }
}

async fn flush_loop(state: Arc<FlushState>, interval: Duration) {
    loop {
        state.wake.notified().await;
        if !state.closed.load(Ordering::Acquire) {
            // Coalesce a burst of registrations into one write.
            tokio::time::sleep(interval).await;
        }
        if let Err(err) = flush_now(&state).await {
            log::warn!("Registry flush to {:?} failed: {err}", state.path);
        }
        if state.closed.load(Ordering::Acquire) {
            break;
        }
    }
}

async fn flush_now(state: &FlushState) -> Result<()> {
    if !state.dirty.swap(false, Ordering::AcqRel) {
        return Ok(());
    }
    let snapshot = state.inner.snapshot();
    if let Err(err) = write_snapshot(&state.path, &snapshot).await {
        state.dirty.store(true, Ordering::Release);
        return Err(err);
    }
    log::debug!(
        "Flushed synonym registry to {:?} ({} aliases)",
        state.path,
        snapshot.len()
    );
    Ok(())
}

/// Reads a persisted snapshot; `Ok(None)` when the file does not exist.
pub async fn read_snapshot(path: &Path) -> Result<Option<RegistrySnapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let snapshot = serde_json::from_slice(&bytes).map_err(|err| RegistryError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok(Some(snapshot))
}

/// Atomically replaces `path` with `snapshot` under an exclusive lock file.
pub async fn write_snapshot(path: &Path, snapshot: &RegistrySnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        use std::fs::OpenOptions;

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| {
                RegistryError::Other(format!("open registry lock {}: {err}", lock_path.display()))
            })?;
        lock.lock_exclusive().map_err(|err| {
            RegistryError::Other(format!(
                "acquire registry lock {}: {err}",
                lock_path.display()
            ))
        })?;

        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &bytes).and_then(|()| std::fs::rename(&tmp, &path));
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        let _ = lock.unlock();
        result.map_err(Into::into)
    })
    .await
    .map_err(|err| RegistryError::Other(format!("join registry flush task: {err}")))?
}
