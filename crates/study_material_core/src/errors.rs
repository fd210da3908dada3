//! crates/study_material_core/src/errors.rs
//!
//! The failure taxonomy of the modification engine. Every variant carries a
//! machine-readable code (`code()`) and a human-readable message (`Display`).

use crate::mutator::MutationError;
use crate::ports::PortError;
use crate::recovery::RecoveryResult;
use crate::validation::ValidationResult;

#[derive(Debug, thiserror::Error)]
pub enum ModificationError {
    #[error("Study material not found: {0}")]
    MaterialNotFound(String),

    #[error("Validation failed: {}", .0.summary())]
    ValidationFailed(ValidationResult),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Dependency conflict: {0}")]
    DependencyConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Material {material_id} was modified concurrently: expected version {expected}, found {found}")]
    ConcurrentModification {
        material_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Content corruption: {0}")]
    ContentCorruption(String),

    #[error("Export error: {0}")]
    Export(String),

    /// The mutator was handed an operation whose preconditions do not hold.
    /// Never retried.
    #[error("Invariant violated: {0}")]
    Invariant(#[from] MutationError),

    /// A failure that automated recovery could not resolve. `code()` reports the
    /// original failure's code.
    #[error("{source} ({})", .recovery.user_message)]
    Unrecovered {
        source: Box<ModificationError>,
        recovery: Box<RecoveryResult>,
    },
}

impl ModificationError {
    pub fn code(&self) -> &'static str {
        match self {
            ModificationError::MaterialNotFound(_) => "MATERIAL_NOT_FOUND",
            ModificationError::ValidationFailed(_) => "VALIDATION_FAILED",
            ModificationError::InvalidOperation(_) => "INVALID_OPERATION",
            ModificationError::DependencyConflict(_) => "DEPENDENCY_CONFLICT",
            ModificationError::Storage(_) => "STORAGE_ERROR",
            ModificationError::PermissionDenied(_) => "PERMISSION_DENIED",
            ModificationError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            ModificationError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            ModificationError::ContentCorruption(_) => "CONTENT_CORRUPTION",
            ModificationError::Export(_) => "EXPORT_ERROR",
            ModificationError::Invariant(_) => "INVARIANT_VIOLATION",
            ModificationError::Unrecovered { source, .. } => source.code(),
        }
    }

    /// The failure beneath any recovery wrapper.
    pub fn root(&self) -> &ModificationError {
        match self {
            ModificationError::Unrecovered { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        match self.root() {
            ModificationError::ValidationFailed(result) => Some(result),
            _ => None,
        }
    }

    pub fn recovery(&self) -> Option<&RecoveryResult> {
        match self {
            ModificationError::Unrecovered { recovery, .. } => Some(recovery),
            _ => None,
        }
    }
}

impl From<PortError> for ModificationError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(id) => ModificationError::MaterialNotFound(id),
            PortError::Unexpected(message) => ModificationError::Storage(message),
            PortError::Unauthorized => {
                ModificationError::PermissionDenied("store rejected the request".to_string())
            }
            PortError::VersionConflict { id, expected, found } => {
                ModificationError::ConcurrentModification {
                    material_id: id,
                    expected,
                    found,
                }
            }
            PortError::Corrupted(message) => ModificationError::ContentCorruption(message),
            PortError::QuotaExceeded(message) => ModificationError::QuotaExceeded(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_errors_map_to_taxonomy() {
        let conflict: ModificationError = PortError::VersionConflict {
            id: "m1".to_string(),
            expected: 3,
            found: 4,
        }
        .into();
        assert_eq!(conflict.code(), "CONCURRENT_MODIFICATION");

        let storage: ModificationError = PortError::Unexpected("disk full".to_string()).into();
        assert_eq!(storage.code(), "STORAGE_ERROR");
        assert_eq!(storage.to_string(), "Storage error: disk full");
    }
}
