//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    ApiFailure, CreateMaterialRequest, ErrorBody, HistoryItem, HistoryResponse,
    MaterialListResponse, MaterialResponse, MaterialSummary, ModifyRequest, ValidateRequest,
    ValidationResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use study_material_core::{ModificationRequest, NewMaterial};
use tracing::error;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_material_handler,
        list_materials_handler,
        get_material_handler,
        delete_material_handler,
        modify_material_handler,
        validate_operation_handler,
        history_handler,
    ),
    components(
        schemas(
            CreateMaterialRequest,
            ModifyRequest,
            ValidateRequest,
            MaterialResponse,
            MaterialSummary,
            MaterialListResponse,
            ValidationResponse,
            HistoryItem,
            HistoryResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Study Material API", description = "Operation-based editing of study materials.")
    )
)]
pub struct ApiDoc;

/// Header carrying the caller's identity. Authentication happens upstream.
pub const ACTOR_HEADER: &str = "x-actor-id";

fn actor_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn log_failure(context: &str, failure: ApiFailure) -> ApiFailure {
    if failure.status.is_server_error() {
        error!("{} failed: {} ({})", context, failure.body.message, failure.body.code);
    }
    failure
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new, empty-history study material.
#[utoipa::path(
    post,
    path = "/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = MaterialResponse),
        (status = 400, description = "Bad request", body = ErrorBody),
        (status = 422, description = "An initial section was rejected", body = ErrorBody)
    ),
    params(
        ("x-actor-id" = Option<String>, Header, description = "Becomes the owner of the material.")
    )
)]
pub async fn create_material_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let material = app_state
        .service
        .create_material(NewMaterial {
            title: request.title,
            owner_id: actor_from(&headers),
            sections: request.sections,
        })
        .await
        .map_err(|e| log_failure("Create material", e.into()))?;
    Ok((StatusCode::CREATED, Json(MaterialResponse { material })))
}

/// List materials, most recently modified first. With `x-actor-id`, only that
/// actor's materials are listed.
#[utoipa::path(
    get,
    path = "/materials",
    responses(
        (status = 200, description = "Materials", body = MaterialListResponse)
    ),
    params(
        ("x-actor-id" = Option<String>, Header, description = "Restricts the list to this owner.")
    )
)]
pub async fn list_materials_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiFailure> {
    let actor = actor_from(&headers);
    let materials = app_state
        .service
        .list_materials(actor.as_deref())
        .await
        .map_err(|e| log_failure("List materials", e.into()))?;
    Ok(Json(MaterialListResponse {
        materials: materials.iter().map(MaterialSummary::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/materials/{id}",
    responses(
        (status = 200, description = "The material", body = MaterialResponse),
        (status = 404, description = "Unknown material", body = ErrorBody)
    ),
    params(("id" = String, Path, description = "Material id"))
)]
pub async fn get_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let material = app_state
        .service
        .get_material(&id)
        .await
        .map_err(|e| log_failure("Get material", e.into()))?;
    Ok(Json(MaterialResponse { material }))
}

#[utoipa::path(
    delete,
    path = "/materials/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown material", body = ErrorBody)
    ),
    params(("id" = String, Path, description = "Material id"))
)]
pub async fn delete_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    app_state
        .service
        .delete_material(&id)
        .await
        .map_err(|e| log_failure("Delete material", e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply one operation to a material.
#[utoipa::path(
    post,
    path = "/materials/{id}/operations",
    request_body = ModifyRequest,
    responses(
        (status = 200, description = "The updated material", body = MaterialResponse),
        (status = 404, description = "Unknown material", body = ErrorBody),
        (status = 409, description = "Concurrent modification", body = ErrorBody),
        (status = 422, description = "Operation rejected by validation", body = ErrorBody),
        (status = 503, description = "Persistence failed and could not be recovered", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "Material id"),
        ("x-actor-id" = Option<String>, Header, description = "Recorded in the history entry.")
    )
)]
pub async fn modify_material_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ModifyRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let modification = ModificationRequest {
        material_id: id,
        operation: request.operation,
        actor_id: actor_from(&headers),
        session_id: request.session_id,
    };
    let material = app_state
        .service
        .modify(modification)
        .await
        .map_err(|e| log_failure("Modify material", e.into()))?;
    Ok(Json(MaterialResponse { material }))
}

/// Validate an operation without applying it.
#[utoipa::path(
    post,
    path = "/materials/{id}/operations/validate",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ValidationResponse),
        (status = 404, description = "Unknown material", body = ErrorBody)
    ),
    params(("id" = String, Path, description = "Material id"))
)]
pub async fn validate_operation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ValidateRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let validation = app_state
        .service
        .validate_operation(&id, &request.operation)
        .await
        .map_err(|e| log_failure("Validate operation", e.into()))?;
    Ok(Json(ValidationResponse { validation }))
}

#[utoipa::path(
    get,
    path = "/materials/{id}/history",
    responses(
        (status = 200, description = "History, oldest first", body = HistoryResponse),
        (status = 404, description = "Unknown material", body = ErrorBody)
    ),
    params(("id" = String, Path, description = "Material id"))
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let history = app_state
        .service
        .history(&id)
        .await
        .map_err(|e| log_failure("Load history", e.into()))?;
    Ok(Json(HistoryResponse {
        entries: history.iter().map(HistoryItem::from).collect(),
    }))
}
