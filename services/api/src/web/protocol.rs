//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between clients and the REST API, and the
//! mapping from engine failures to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use study_material_core::{
    HistoryEntry, ModificationError, NewSection, Operation, StudyMaterial, ValidationResult,
};
use utoipa::ToSchema;

//=========================================================================================
// Payloads Sent FROM the Client TO the Server
//=========================================================================================

/// Creates a study material. The caller's `x-actor-id` becomes its owner.
#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateMaterialRequest {
    pub title: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub sections: Vec<NewSection>,
}

/// Applies one operation to a material.
#[derive(Deserialize, Debug, ToSchema)]
pub struct ModifyRequest {
    #[schema(value_type = Object)]
    pub operation: Operation,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Dry-runs validation of one operation.
#[derive(Deserialize, Debug, ToSchema)]
pub struct ValidateRequest {
    #[schema(value_type = Object)]
    pub operation: Operation,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct MaterialResponse {
    #[schema(value_type = Object)]
    pub material: StudyMaterial,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MaterialSummary {
    pub id: String,
    pub title: String,
    pub version: u64,
    pub section_count: usize,
    pub image_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&StudyMaterial> for MaterialSummary {
    fn from(material: &StudyMaterial) -> Self {
        Self {
            id: material.id.clone(),
            title: material.title.clone(),
            version: material.version,
            section_count: material.sections.len(),
            image_count: material.images.len(),
            updated_at: material.updated_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MaterialListResponse {
    pub materials: Vec<MaterialSummary>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ValidationResponse {
    #[schema(value_type = Object)]
    pub validation: ValidationResult,
}

/// A history entry without its document snapshots.
#[derive(Serialize, Debug, ToSchema)]
pub struct HistoryItem {
    pub id: String,
    #[schema(value_type = Object)]
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub version_before: u64,
    pub version_after: u64,
}

impl From<&HistoryEntry> for HistoryItem {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            operation: entry.operation.clone(),
            timestamp: entry.timestamp,
            actor_id: entry.actor_id.clone(),
            session_id: entry.session_id.clone(),
            version_before: entry.previous_state.version,
            version_after: entry.new_state.version,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryItem>,
}

//=========================================================================================
// Errors
//=========================================================================================

/// Every failure carries a machine-readable code and a human-readable message.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub validation: Option<ValidationResult>,
    /// Manual recovery steps, when automated recovery did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

/// An error response ready to be returned from a handler.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl From<ModificationError> for ApiFailure {
    fn from(error: ModificationError) -> Self {
        let status = match error.root() {
            ModificationError::MaterialNotFound(_) => StatusCode::NOT_FOUND,
            ModificationError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ModificationError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            ModificationError::DependencyConflict(_)
            | ModificationError::ConcurrentModification { .. } => StatusCode::CONFLICT,
            ModificationError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ModificationError::QuotaExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
            ModificationError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ModificationError::ContentCorruption(_)
            | ModificationError::Export(_)
            | ModificationError::Invariant(_)
            | ModificationError::Unrecovered { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                code: error.code().to_string(),
                message: error.root().to_string(),
                validation: error.validation().cloned(),
                user_message: error.recovery().map(|r| r.user_message.clone()),
            },
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
