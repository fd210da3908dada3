//! services/api/src/adapters/file_store.rs
//!
//! A durable, filesystem-backed implementation of the `DocumentStore` port.
//!
//! Layout under the root directory:
//!
//! ```text
//! materials/<id>.json   one file per material
//! history/<id>.json     one JSON array of history entries per material
//! ```
//!
//! Files are replaced atomically (write + fsync a temporary file, then rename)
//! and writers to the same key are serialized with an async mutex, so a reader
//! always sees the last completed write.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_material_core::domain::{HistoryEntry, StudyMaterial};
use study_material_core::ports::{DocumentStore, PortError, PortResult};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::memory_store::DEFAULT_HISTORY_LIMIT;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct FileStore {
    root: PathBuf,
    history_limit: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> PortResult<Self> {
        let root = root.into();
        for dir in ["materials", "history"] {
            tokio::fs::create_dir_all(root.join(dir))
                .await
                .map_err(io_error)?;
        }
        Ok(Self {
            root,
            history_limit: DEFAULT_HISTORY_LIMIT,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn material_path(&self, material_id: &str) -> PortResult<PathBuf> {
        Ok(self
            .root
            .join("materials")
            .join(format!("{}.json", safe_key(material_id)?)))
    }

    fn history_path(&self, material_id: &str) -> PortResult<PathBuf> {
        Ok(self
            .root
            .join("history")
            .join(format!("{}.json", safe_key(material_id)?)))
    }

    async fn lock_for(&self, key: String) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    async fn read_history(&self, path: &Path) -> PortResult<Vec<HistoryEntry>> {
        Ok(read_json(path).await?.unwrap_or_default())
    }
}

//=========================================================================================
// File Helpers
//=========================================================================================

/// Ids become file names, so only a conservative character set is accepted.
fn safe_key(id: &str) -> PortResult<&str> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(PortError::NotFound(format!("invalid material id '{}'", id)))
    }
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> PortResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| PortError::Corrupted(format!("{}: {}", path.display(), e)))
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PortResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));

    let mut file = tokio::fs::File::create(&tmp).await.map_err(io_error)?;
    file.write_all(&bytes).await.map_err(io_error)?;
    file.sync_all().await.map_err(io_error)?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(e));
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

async fn remove_if_present(path: &Path) -> PortResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(e)),
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for FileStore {
    async fn save(&self, material: &StudyMaterial) -> PortResult<()> {
        let path = self.material_path(&material.id)?;
        let lock = self.lock_for(format!("material:{}", material.id)).await;
        let _guard = lock.lock().await;
        write_json_atomic(&path, material).await
    }

    async fn save_if_version(&self, material: &StudyMaterial, expected_version: u64) -> PortResult<()> {
        let path = self.material_path(&material.id)?;
        let lock = self.lock_for(format!("material:{}", material.id)).await;
        let _guard = lock.lock().await;

        let stored: StudyMaterial = read_json(&path)
            .await?
            .ok_or_else(|| PortError::NotFound(material.id.clone()))?;
        if stored.version != expected_version {
            return Err(PortError::VersionConflict {
                id: material.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        write_json_atomic(&path, material).await
    }

    async fn load(&self, material_id: &str) -> PortResult<Option<StudyMaterial>> {
        let path = match self.material_path(material_id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };
        read_json(&path).await
    }

    async fn delete(&self, material_id: &str) -> PortResult<()> {
        let material_path = self.material_path(material_id)?;
        let history_path = self.history_path(material_id)?;
        let material_key = format!("material:{}", material_id);
        let history_key = format!("history:{}", material_id);
        let material_lock = self.lock_for(material_key.clone()).await;
        let history_lock = self.lock_for(history_key.clone()).await;
        let _material_guard = material_lock.lock().await;
        let _history_guard = history_lock.lock().await;

        remove_if_present(&material_path).await?;
        remove_if_present(&history_path).await?;

        // Deleted ids keep no lock entries behind.
        let mut locks = self.locks.lock().await;
        locks.remove(&material_key);
        locks.remove(&history_key);
        Ok(())
    }

    async fn list(&self, actor_id: Option<&str>) -> PortResult<Vec<StudyMaterial>> {
        let mut entries = tokio::fs::read_dir(self.root.join("materials"))
            .await
            .map_err(io_error)?;

        let mut materials = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<StudyMaterial>(&path).await {
                Ok(Some(material)) => {
                    if actor_id.map_or(true, |actor| material.owner_id.as_deref() == Some(actor)) {
                        materials.push(material);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable material file: {}", e),
            }
        }
        materials.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(materials)
    }

    async fn exists(&self, material_id: &str) -> PortResult<bool> {
        let path = match self.material_path(material_id) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        tokio::fs::try_exists(&path).await.map_err(io_error)
    }

    async fn save_history(&self, entry: &HistoryEntry) -> PortResult<()> {
        let path = self.history_path(&entry.material_id)?;
        let lock = self.lock_for(format!("history:{}", entry.material_id)).await;
        let _guard = lock.lock().await;

        let mut history = self.read_history(&path).await?;
        history.push(entry.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        write_json_atomic(&path, &history).await
    }

    async fn load_history(&self, material_id: &str) -> PortResult<Vec<HistoryEntry>> {
        let path = match self.history_path(material_id) {
            Ok(path) => path,
            Err(_) => return Ok(Vec::new()),
        };
        self.read_history(&path).await
    }
}
