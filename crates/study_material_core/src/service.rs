//! crates/study_material_core/src/service.rs
//!
//! The modification orchestrator: the single entry point through which study
//! materials change.
//!
//! ```text
//! load → integrity check → validate → mutate → version + 1 → save_if_version → history
//!                 ↘ recovery                                        ↘ recovery
//! ```
//!
//! Every step before the write is side-effect free. The write is a
//! compare-and-swap on the loaded version, so a concurrent writer surfaces as
//! `ConcurrentModification` instead of being silently overwritten. The history
//! append after a successful write is best effort: a failure is logged and the
//! document write stands.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{HistoryEntry, Section, StudyMaterial};
use crate::errors::ModificationError;
use crate::mutator;
use crate::operations::{ModificationRequest, NewSection, Operation};
use crate::ports::DocumentStore;
use crate::recovery::{RecoveryContext, RecoveryHandler};
use crate::validation::{ValidationResult, Validator};

/// Payload for creating a material.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NewMaterial {
    pub title: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub sections: Vec<NewSection>,
}

pub struct ModificationService {
    store: Arc<dyn DocumentStore>,
    validator: Validator,
    recovery: RecoveryHandler,
}

impl ModificationService {
    pub fn new(store: Arc<dyn DocumentStore>, validator: Validator, recovery: RecoveryHandler) -> Self {
        Self {
            store,
            validator,
            recovery,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    //=====================================================================================
    // Mutation
    //=====================================================================================

    #[instrument(
        skip(self, request),
        fields(material_id = %request.material_id, operation = request.operation.kind())
    )]
    pub async fn modify(&self, request: ModificationRequest) -> Result<StudyMaterial, ModificationError> {
        let stored = self.load_existing(&request.material_id).await?;
        let current = self.ensure_integrity(stored.clone(), &request).await?;

        let validation = self.validator.validate(&current, &request.operation);
        if !validation.warnings.is_empty() {
            debug!(warnings = validation.warnings.len(), "Operation has warnings");
        }
        if !validation.is_valid {
            info!("Rejected operation: {}", validation.summary());
            return Err(ModificationError::ValidationFailed(validation));
        }

        let now = Utc::now().max(stored.updated_at);
        let mut next = mutator::apply(&current, &request.operation, now).map_err(|e| {
            error!("Mutator precondition violated: {}", e);
            ModificationError::from(e)
        })?;
        next.version = stored.version + 1;
        next.updated_at = now;

        let saved = self.store.save_if_version(&next, stored.version).await;
        let persisted = match saved {
            Ok(()) => next,
            Err(port_error) => {
                let failure = ModificationError::from(port_error);
                warn!("Persisting version {} failed: {}", next.version, failure);
                let context = RecoveryContext {
                    material_id: request.material_id.clone(),
                    operation: Some(request.operation.clone()),
                    actor_id: request.actor_id.clone(),
                    session_id: request.session_id.clone(),
                    document_state: stored.clone(),
                    pending_state: Some(next),
                    attempt_number: 1,
                };
                let outcome = self.recovery.handle(&failure, context).await;
                match (outcome.success, outcome.recovered_document.clone()) {
                    (true, Some(recovered)) => recovered,
                    _ => {
                        return Err(ModificationError::Unrecovered {
                            source: Box::new(failure),
                            recovery: Box::new(outcome),
                        })
                    }
                }
            }
        };

        let entry = HistoryEntry::record(
            request.operation,
            request.actor_id,
            request.session_id,
            stored,
            persisted.clone(),
        );
        if let Err(e) = self.store.save_history(&entry).await {
            warn!(version = persisted.version, "History append failed: {}", e);
        }

        info!(version = persisted.version, "Material modified");
        Ok(persisted)
    }

    /// Runs validation only; nothing is written.
    pub async fn validate_operation(
        &self,
        material_id: &str,
        operation: &Operation,
    ) -> Result<ValidationResult, ModificationError> {
        let material = self.load_existing(material_id).await?;
        Ok(self.validator.validate(&material, operation))
    }

    async fn load_existing(&self, material_id: &str) -> Result<StudyMaterial, ModificationError> {
        self.store
            .load(material_id)
            .await?
            .ok_or_else(|| ModificationError::MaterialNotFound(material_id.to_string()))
    }

    /// Hands structurally damaged state to the recovery handler and continues with
    /// the repaired copy when recovery succeeds. The repair is not written here;
    /// it reaches the store with the operation's own versioned write, so a
    /// rejected operation leaves the damaged copy untouched.
    async fn ensure_integrity(
        &self,
        material: StudyMaterial,
        request: &ModificationRequest,
    ) -> Result<StudyMaterial, ModificationError> {
        let issues = material.integrity_issues();
        if issues.is_empty() {
            return Ok(material);
        }

        let description = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let failure = if issues.iter().all(|i| i.is_dependency_issue()) {
            ModificationError::DependencyConflict(description)
        } else {
            ModificationError::ContentCorruption(description)
        };
        warn!("Loaded material is damaged: {}", failure);

        let context = RecoveryContext {
            material_id: material.id.clone(),
            operation: Some(request.operation.clone()),
            actor_id: request.actor_id.clone(),
            session_id: request.session_id.clone(),
            document_state: material,
            pending_state: None,
            attempt_number: 1,
        };
        let outcome = self.recovery.handle(&failure, context).await;
        match (outcome.success, outcome.recovered_document.clone()) {
            (true, Some(repaired)) => Ok(repaired),
            _ => Err(ModificationError::Unrecovered {
                source: Box::new(failure),
                recovery: Box::new(outcome),
            }),
        }
    }

    //=====================================================================================
    // Lifecycle and Queries
    //=====================================================================================

    /// Creates a material at version 1. Initial sections keep the given order;
    /// links between them are added afterwards with edit operations, once their
    /// ids are known.
    pub async fn create_material(&self, new_material: NewMaterial) -> Result<StudyMaterial, ModificationError> {
        if new_material.title.trim().is_empty() {
            return Err(ModificationError::InvalidOperation(
                "a material needs a title".to_string(),
            ));
        }

        let mut material = StudyMaterial::new(new_material.title, new_material.owner_id);
        for (position, section) in new_material.sections.into_iter().enumerate() {
            let operation = Operation::AddSection {
                section,
                position: Some(position),
            };
            let validation = self.validator.validate(&material, &operation);
            if !validation.is_valid {
                return Err(ModificationError::ValidationFailed(validation));
            }
            if let Operation::AddSection { section, .. } = operation {
                material.sections.push(Section {
                    id: uuid::Uuid::new_v4().to_string(),
                    section_type: section.section_type,
                    content: section.content,
                    order: position,
                    editable: section.editable,
                    dependencies: section.dependencies,
                    parent_id: section.parent_id,
                });
            }
        }
        material.refresh_statistics();

        self.store.save(&material).await?;
        info!(material_id = %material.id, "Created material");
        Ok(material)
    }

    pub async fn get_material(&self, material_id: &str) -> Result<StudyMaterial, ModificationError> {
        self.load_existing(material_id).await
    }

    pub async fn list_materials(&self, actor_id: Option<&str>) -> Result<Vec<StudyMaterial>, ModificationError> {
        Ok(self.store.list(actor_id).await?)
    }

    pub async fn delete_material(&self, material_id: &str) -> Result<(), ModificationError> {
        if !self.store.exists(material_id).await? {
            return Err(ModificationError::MaterialNotFound(material_id.to_string()));
        }
        self.store.delete(material_id).await?;
        info!(material_id, "Deleted material");
        Ok(())
    }

    pub async fn history(&self, material_id: &str) -> Result<Vec<HistoryEntry>, ModificationError> {
        if !self.store.exists(material_id).await? {
            return Err(ModificationError::MaterialNotFound(material_id.to_string()));
        }
        Ok(self.store.load_history(material_id).await?)
    }
}
