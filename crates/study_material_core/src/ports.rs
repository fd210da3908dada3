//! crates/study_material_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific storage backends and export pipelines.

use async_trait::async_trait;

use crate::domain::{HistoryEntry, StudyMaterial};
use crate::export::{ExportOptions, ExportResult};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },
    #[error("Stored data is corrupted: {0}")]
    Corrupted(String),
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence of whole study materials and their append-only history logs.
///
/// Implementations must make `save` durable before returning, and `load` must
/// observe the most recently completed `save` for the same id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Unconditionally writes the material.
    async fn save(&self, material: &StudyMaterial) -> PortResult<()>;

    /// Writes the material only if the stored copy is still at `expected_version`.
    /// Fails with `PortError::VersionConflict` otherwise, and with `NotFound` when
    /// nothing is stored under the id.
    async fn save_if_version(&self, material: &StudyMaterial, expected_version: u64) -> PortResult<()>;

    async fn load(&self, material_id: &str) -> PortResult<Option<StudyMaterial>>;

    /// Removes the material and its history. Deleting a missing id is not an error.
    async fn delete(&self, material_id: &str) -> PortResult<()>;

    /// All materials, optionally only those owned by `actor_id`, most recently
    /// modified first.
    async fn list(&self, actor_id: Option<&str>) -> PortResult<Vec<StudyMaterial>>;

    async fn exists(&self, material_id: &str) -> PortResult<bool>;

    /// Appends an entry to the material's history, evicting the oldest entries
    /// beyond the store's retention cap.
    async fn save_history(&self, entry: &HistoryEntry) -> PortResult<()>;

    /// History of a material, oldest first. Unknown ids yield an empty list.
    async fn load_history(&self, material_id: &str) -> PortResult<Vec<HistoryEntry>>;
}

/// Turns a material into a downloadable artifact. Rendering lives outside the core.
#[async_trait]
pub trait MaterialExporter: Send + Sync {
    async fn export(&self, material: &StudyMaterial, options: &ExportOptions) -> PortResult<ExportResult>;
}
