use parking_lot::RwLock;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{Intent, IntentFile};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read intents file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed intents file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Intent '{0}' already exists")]
    DuplicateTag(String),

    #[error("Failed to persist intents: {0}")]
    Persist(String),
}

/// JSON-file backed intent collection.
///
/// The file may be edited by hand while the server runs, so callers re-read
/// it through [`IntentStore::current`] before matching. Writes go through a
/// single mutex and replace the whole file atomically.
pub struct IntentStore {
    path: PathBuf,
    snapshot: RwLock<Arc<IntentFile>>,
    write_lock: Mutex<()>,
}

impl IntentStore {
    /// Open the store, failing if the file is missing or malformed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = read_intent_file(&path).await?;

        info!(
            "Loaded {} intents from {}",
            file.intents.len(),
            path.display()
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(file)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last successfully loaded content, without touching the disk
    pub fn snapshot(&self) -> Arc<IntentFile> {
        self.snapshot.read().clone()
    }

    /// Re-read the file and replace the in-memory snapshot
    pub async fn reload(&self) -> Result<Arc<IntentFile>, StoreError> {
        let file = Arc::new(read_intent_file(&self.path).await?);
        *self.snapshot.write() = file.clone();
        debug!("Reloaded {} intents", file.intents.len());
        Ok(file)
    }

    /// Fresh content for a routing request.
    /// A broken file at runtime keeps the last good snapshot in service.
    pub async fn current(&self) -> Arc<IntentFile> {
        match self.reload().await {
            Ok(file) => file,
            Err(e) => {
                warn!("Intent reload failed, using previous snapshot: {}", e);
                self.snapshot()
            }
        }
    }

    /// Append a new intent and rewrite the whole file
    pub async fn add_intent(&self, intent: Intent) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut file = (*self.reload().await?).clone();
        if file.find(&intent.tag).is_some() {
            return Err(StoreError::DuplicateTag(intent.tag));
        }

        let tag = intent.tag.clone();
        file.intents.push(intent);

        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Persist(e.to_string()))??;

        *self.snapshot.write() = Arc::new(file);
        info!("Intent '{}' added to {}", tag, self.path.display());
        Ok(())
    }
}

async fn read_intent_file(path: &Path) -> Result<IntentFile, StoreError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let persist_err = |e: std::io::Error| StoreError::Persist(e.to_string());

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;

    Ok(())
}
