pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    create_material_handler, delete_material_handler, get_material_handler, history_handler,
    list_materials_handler, modify_material_handler, validate_operation_handler,
};
pub use state::AppState;

/// Builds the API router. Cross-cutting layers (CORS, docs) are added by the binary.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/materials",
            post(create_material_handler).get(list_materials_handler),
        )
        .route(
            "/materials/{id}",
            get(get_material_handler).delete(delete_material_handler),
        )
        .route("/materials/{id}/operations", post(modify_material_handler))
        .route(
            "/materials/{id}/operations/validate",
            post(validate_operation_handler),
        )
        .route("/materials/{id}/history", get(history_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(app_state)
}
