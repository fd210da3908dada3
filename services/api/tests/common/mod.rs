//! Store doubles shared by the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use study_api_lib::adapters::InMemoryStore;
use study_material_core::{DocumentStore, HistoryEntry, PortError, PortResult, StudyMaterial};

/// Delegates to an in-memory store, failing the first `failures` conditional
/// writes. With `ghost_write`, a failing call still lands the write.
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failures: usize,
    ghost_write: bool,
    conditional_saves: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore, failures: usize) -> Self {
        Self {
            inner,
            failures,
            ghost_write: false,
            conditional_saves: AtomicUsize::new(0),
        }
    }

    pub fn landing_writes(mut self) -> Self {
        self.ghost_write = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.conditional_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn save(&self, material: &StudyMaterial) -> PortResult<()> {
        self.inner.save(material).await
    }

    async fn save_if_version(&self, material: &StudyMaterial, expected_version: u64) -> PortResult<()> {
        let call = self.conditional_saves.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            if self.ghost_write {
                self.inner.save_if_version(material, expected_version).await?;
            }
            return Err(PortError::Unexpected("connection reset by peer".to_string()));
        }
        self.inner.save_if_version(material, expected_version).await
    }

    async fn load(&self, material_id: &str) -> PortResult<Option<StudyMaterial>> {
        self.inner.load(material_id).await
    }

    async fn delete(&self, material_id: &str) -> PortResult<()> {
        self.inner.delete(material_id).await
    }

    async fn list(&self, actor_id: Option<&str>) -> PortResult<Vec<StudyMaterial>> {
        self.inner.list(actor_id).await
    }

    async fn exists(&self, material_id: &str) -> PortResult<bool> {
        self.inner.exists(material_id).await
    }

    async fn save_history(&self, entry: &HistoryEntry) -> PortResult<()> {
        self.inner.save_history(entry).await
    }

    async fn load_history(&self, material_id: &str) -> PortResult<Vec<HistoryEntry>> {
        self.inner.load_history(material_id).await
    }
}

/// Lets another writer bump the stored version right before the first
/// conditional write.
pub struct RacingStore {
    pub inner: InMemoryStore,
    raced: AtomicBool,
}

impl RacingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            raced: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn save(&self, material: &StudyMaterial) -> PortResult<()> {
        self.inner.save(material).await
    }

    async fn save_if_version(&self, material: &StudyMaterial, expected_version: u64) -> PortResult<()> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            if let Some(mut other) = self.inner.load(&material.id).await? {
                other.title = "Renamed elsewhere".to_string();
                other.version += 1;
                self.inner.save(&other).await?;
            }
        }
        self.inner.save_if_version(material, expected_version).await
    }

    async fn load(&self, material_id: &str) -> PortResult<Option<StudyMaterial>> {
        self.inner.load(material_id).await
    }

    async fn delete(&self, material_id: &str) -> PortResult<()> {
        self.inner.delete(material_id).await
    }

    async fn list(&self, actor_id: Option<&str>) -> PortResult<Vec<StudyMaterial>> {
        self.inner.list(actor_id).await
    }

    async fn exists(&self, material_id: &str) -> PortResult<bool> {
        self.inner.exists(material_id).await
    }

    async fn save_history(&self, entry: &HistoryEntry) -> PortResult<()> {
        self.inner.save_history(entry).await
    }

    async fn load_history(&self, material_id: &str) -> PortResult<Vec<HistoryEntry>> {
        self.inner.load_history(material_id).await
    }
}
