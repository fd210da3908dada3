//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how it is assembled from config.

use crate::adapters::{FileStore, InMemoryStore};
use crate::config::{Config, StorageBackend};
use crate::error::ApiError;
use std::sync::Arc;
use study_material_core::{DocumentStore, ModificationService, RecoveryHandler, Validator};
use tracing::info;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ModificationService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the engine around an already constructed store.
    pub fn with_store(config: Arc<Config>, store: Arc<dyn DocumentStore>) -> Self {
        let validator = Validator::new(config.limits);
        let recovery = RecoveryHandler::new(store.clone(), config.recovery);
        Self {
            service: Arc::new(ModificationService::new(store, validator, recovery)),
            config,
        }
    }

    /// Builds the store selected by `STORAGE_BACKEND` and wires the engine around it.
    pub async fn from_config(config: Arc<Config>) -> Result<Self, ApiError> {
        let store: Arc<dyn DocumentStore> = match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using the in-memory document store");
                let mut store = InMemoryStore::new().with_history_limit(config.history_limit);
                if let Some(capacity) = config.max_materials {
                    store = store.with_capacity(capacity);
                }
                Arc::new(store)
            }
            StorageBackend::File => {
                info!("Using the file document store at {}", config.data_dir.display());
                Arc::new(
                    FileStore::open(&config.data_dir)
                        .await?
                        .with_history_limit(config.history_limit),
                )
            }
        };
        Ok(Self::with_store(config, store))
    }
}
