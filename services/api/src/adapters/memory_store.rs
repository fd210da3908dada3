//! services/api/src/adapters/memory_store.rs
//!
//! An in-memory implementation of the `DocumentStore` port. Nothing survives a
//! restart; it backs tests and the `STORAGE_BACKEND=memory` mode.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use study_material_core::domain::{HistoryEntry, StudyMaterial};
use study_material_core::ports::{DocumentStore, PortError, PortResult};
use tokio::sync::RwLock;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Default)]
struct Inner {
    materials: HashMap<String, StudyMaterial>,
    history: HashMap<String, VecDeque<HistoryEntry>>,
}

/// A map-backed store. Every write takes the single write lock, which makes
/// `save_if_version` an atomic compare-and-swap.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    history_limit: usize,
    capacity: Option<usize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            capacity: None,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Limits how many distinct materials the store accepts.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn check_capacity(&self, inner: &Inner, material_id: &str) -> PortResult<()> {
        match self.capacity {
            Some(capacity)
                if !inner.materials.contains_key(material_id) && inner.materials.len() >= capacity =>
            {
                Err(PortError::QuotaExceeded(format!(
                    "store holds the maximum of {} materials",
                    capacity
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn save(&self, material: &StudyMaterial) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        self.check_capacity(&inner, &material.id)?;
        inner.materials.insert(material.id.clone(), material.clone());
        Ok(())
    }

    async fn save_if_version(&self, material: &StudyMaterial, expected_version: u64) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .materials
            .get(&material.id)
            .ok_or_else(|| PortError::NotFound(material.id.clone()))?;
        if stored.version != expected_version {
            return Err(PortError::VersionConflict {
                id: material.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        inner.materials.insert(material.id.clone(), material.clone());
        Ok(())
    }

    async fn load(&self, material_id: &str) -> PortResult<Option<StudyMaterial>> {
        Ok(self.inner.read().await.materials.get(material_id).cloned())
    }

    async fn delete(&self, material_id: &str) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        inner.materials.remove(material_id);
        inner.history.remove(material_id);
        Ok(())
    }

    async fn list(&self, actor_id: Option<&str>) -> PortResult<Vec<StudyMaterial>> {
        let inner = self.inner.read().await;
        let mut materials: Vec<StudyMaterial> = inner
            .materials
            .values()
            .filter(|m| actor_id.map_or(true, |actor| m.owner_id.as_deref() == Some(actor)))
            .cloned()
            .collect();
        materials.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(materials)
    }

    async fn exists(&self, material_id: &str) -> PortResult<bool> {
        Ok(self.inner.read().await.materials.contains_key(material_id))
    }

    async fn save_history(&self, entry: &HistoryEntry) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let log = inner.history.entry(entry.material_id.clone()).or_default();
        log.push_back(entry.clone());
        while log.len() > self.history_limit {
            log.pop_front();
        }
        Ok(())
    }

    async fn load_history(&self, material_id: &str) -> PortResult<Vec<HistoryEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(material_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default())
    }
}
