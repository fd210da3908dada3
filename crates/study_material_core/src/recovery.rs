//! crates/study_material_core/src/recovery.rs
//!
//! Classifies failures, picks a ranked list of recovery strategies for each class
//! and runs the automated ones against the document store.
//!
//! Strategies run in descending priority. The first automated strategy with
//! priority >= `SUCCESS_PRIORITY` that completes counts as a successful recovery
//! and stops the run. Manual strategies are never executed; they are turned into
//! the message shown to the user. Recovery does not re-run validation.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::StudyMaterial;
use crate::errors::ModificationError;
use crate::operations::Operation;
use crate::ports::{DocumentStore, PortError, PortResult};

/// Lowest priority at which a completed automated strategy ends recovery.
pub const SUCCESS_PRIORITY: u8 = 8;

//=========================================================================================
// Classification
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    DependencyConflict,
    ContentCorruption,
    StorageError,
    ConcurrentModification,
    PermissionDenied,
    QuotaExceeded,
    ExportError,
    InvalidOperation,
}

/// Maps a failure to its recovery class.
pub fn classify(error: &ModificationError) -> ErrorKind {
    match error.root() {
        ModificationError::ValidationFailed(_) => ErrorKind::ValidationError,
        ModificationError::DependencyConflict(_) => ErrorKind::DependencyConflict,
        ModificationError::ContentCorruption(_) => ErrorKind::ContentCorruption,
        ModificationError::Storage(message) => classify_storage_message(message),
        ModificationError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
        ModificationError::PermissionDenied(_) => ErrorKind::PermissionDenied,
        ModificationError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
        ModificationError::Export(_) => ErrorKind::ExportError,
        ModificationError::MaterialNotFound(_)
        | ModificationError::InvalidOperation(_)
        | ModificationError::Invariant(_)
        | ModificationError::Unrecovered { .. } => ErrorKind::InvalidOperation,
    }
}

/// Storage backends report OS failures as text; a few of them deserve their own class.
fn classify_storage_message(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("quota") || message.contains("no space") {
        ErrorKind::QuotaExceeded
    } else if message.contains("permission denied") {
        ErrorKind::PermissionDenied
    } else {
        ErrorKind::StorageError
    }
}

//=========================================================================================
// Strategies
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Retry,
    Rollback,
    FixDependencies,
    ValidateContent,
    ReloadMaterial,
    ContactSupport,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Retry => "retry",
            StrategyKind::Rollback => "rollback",
            StrategyKind::FixDependencies => "fix_dependencies",
            StrategyKind::ValidateContent => "validate_content",
            StrategyKind::ReloadMaterial => "reload_material",
            StrategyKind::ContactSupport => "contact_support",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryStrategy {
    pub kind: StrategyKind,
    pub priority: u8,
    pub automated: bool,
    pub description: &'static str,
}

const fn auto(kind: StrategyKind, priority: u8, description: &'static str) -> RecoveryStrategy {
    RecoveryStrategy {
        kind,
        priority,
        automated: true,
        description,
    }
}

const fn manual(kind: StrategyKind, priority: u8, description: &'static str) -> RecoveryStrategy {
    RecoveryStrategy {
        kind,
        priority,
        automated: false,
        description,
    }
}

/// The fixed strategy menu of an error class, highest priority first.
pub fn strategies_for(kind: ErrorKind) -> Vec<RecoveryStrategy> {
    use StrategyKind::*;

    let mut strategies = match kind {
        ErrorKind::ValidationError => vec![
            manual(Retry, 6, "Correct the highlighted fields and submit the change again"),
            manual(ContactSupport, 2, "Contact support if the rules look wrong"),
        ],
        ErrorKind::DependencyConflict => vec![
            auto(FixDependencies, 9, "Remove references to sections that no longer exist"),
            auto(Rollback, 6, "Restore the last recorded version of the material"),
            manual(ContactSupport, 2, "Contact support if sections keep losing their links"),
        ],
        ErrorKind::ContentCorruption => vec![
            auto(ValidateContent, 9, "Repair missing identifiers, links and ordering"),
            auto(Rollback, 7, "Restore the last recorded version of the material"),
            manual(ContactSupport, 3, "Contact support with the material id"),
        ],
        ErrorKind::StorageError => vec![
            auto(Retry, 9, "Retry saving the material"),
            manual(Rollback, 6, "Restore the last saved version of the material and redo the change"),
            manual(ContactSupport, 2, "Contact support if saving keeps failing"),
        ],
        ErrorKind::ConcurrentModification => vec![
            auto(ReloadMaterial, 7, "Load the latest version of the material"),
            manual(Retry, 6, "Review the latest version and apply your change again"),
        ],
        ErrorKind::PermissionDenied => vec![manual(
            ContactSupport,
            5,
            "Ask the material owner or an administrator for access",
        )],
        ErrorKind::QuotaExceeded => vec![manual(
            ContactSupport,
            5,
            "Delete unused materials or contact support to raise the quota",
        )],
        ErrorKind::ExportError => vec![
            manual(Retry, 6, "Export again or pick another format"),
            manual(ContactSupport, 3, "Contact support if the export keeps failing"),
        ],
        ErrorKind::InvalidOperation => vec![
            auto(ReloadMaterial, 5, "Load the latest version of the material"),
            manual(ContactSupport, 3, "Contact support with the request details"),
        ],
    };
    strategies.sort_by(|a, b| b.priority.cmp(&a.priority));
    strategies
}

//=========================================================================================
// Context and Result
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Upper bound on automated save retries.
    pub max_attempts: u32,
    /// Base delay between retries; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Everything the handler knows about the failed request.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub material_id: String,
    pub operation: Option<Operation>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    /// The state the request started from, as loaded from the store.
    pub document_state: StudyMaterial,
    /// The state the request was trying to persist, if it got that far.
    pub pending_state: Option<StudyMaterial>,
    pub attempt_number: u32,
}

impl RecoveryContext {
    pub fn new(document_state: StudyMaterial) -> Self {
        Self {
            material_id: document_state.id.clone(),
            operation: None,
            actor_id: None,
            session_id: None,
            document_state,
            pending_state: None,
            attempt_number: 1,
        }
    }

    pub fn with_pending(mut self, pending_state: StudyMaterial) -> Self {
        self.pending_state = Some(pending_state);
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryAction {
    pub strategy: StrategyKind,
    pub priority: u8,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub error_kind: ErrorKind,
    /// On success, the state to continue from. It is already stored when an
    /// interrupted write was recovered, and only in memory when a stored copy was
    /// repaired. On failure, the best known good state, which is the pre-mutation
    /// document unless a low-priority strategy produced something newer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_document: Option<StudyMaterial>,
    pub applied_actions: Vec<RecoveryAction>,
    pub user_message: String,
}

//=========================================================================================
// The Handler
//=========================================================================================

pub struct RecoveryHandler {
    store: Arc<dyn DocumentStore>,
    config: RecoveryConfig,
}

impl RecoveryHandler {
    pub fn new(store: Arc<dyn DocumentStore>, config: RecoveryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub async fn handle(&self, error: &ModificationError, context: RecoveryContext) -> RecoveryResult {
        let error_kind = classify(error);
        let strategies = strategies_for(error_kind);
        info!(
            material_id = %context.material_id,
            attempt = context.attempt_number,
            ?error_kind,
            "Attempting recovery from: {}",
            error
        );

        let fatal = matches!(error.root(), ModificationError::Invariant(_));
        let mut applied_actions = Vec::new();
        let mut fallback = None;

        for strategy in strategies.iter().filter(|s| s.automated && !fatal) {
            match self.execute(strategy.kind, &context).await {
                Ok(material) => {
                    applied_actions.push(RecoveryAction {
                        strategy: strategy.kind,
                        priority: strategy.priority,
                        outcome: ActionOutcome::Succeeded,
                    });
                    if strategy.priority >= SUCCESS_PRIORITY {
                        info!(
                            material_id = %context.material_id,
                            strategy = strategy.kind.as_str(),
                            "Recovered automatically"
                        );
                        return RecoveryResult {
                            success: true,
                            error_kind,
                            recovered_document: Some(material),
                            applied_actions,
                            user_message: format!("Recovered automatically: {}", strategy.description),
                        };
                    }
                    fallback = Some(material);
                }
                Err(e) => {
                    warn!(
                        material_id = %context.material_id,
                        strategy = strategy.kind.as_str(),
                        "Recovery strategy failed: {}",
                        e
                    );
                    applied_actions.push(RecoveryAction {
                        strategy: strategy.kind,
                        priority: strategy.priority,
                        outcome: ActionOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        let steps: Vec<String> = strategies
            .iter()
            .filter(|s| !s.automated)
            .map(|s| format!("{}: {}", s.kind.as_str(), s.description))
            .collect();
        let user_message = if steps.is_empty() {
            "Automatic recovery did not succeed and no manual steps are available.".to_string()
        } else {
            format!(
                "Automatic recovery did not succeed. Suggested next steps: {}",
                steps.join("; ")
            )
        };

        RecoveryResult {
            success: false,
            error_kind,
            recovered_document: Some(fallback.unwrap_or(context.document_state)),
            applied_actions,
            user_message,
        }
    }

    async fn execute(&self, kind: StrategyKind, context: &RecoveryContext) -> PortResult<StudyMaterial> {
        match kind {
            StrategyKind::Retry => self.retry(context).await,
            StrategyKind::Rollback => self.rollback(context).await,
            StrategyKind::FixDependencies => {
                let mut material = working_state(context);
                let removed = strip_dangling_dependencies(&mut material);
                info!(material_id = %context.material_id, removed, "Stripped dangling dependencies");
                self.persist_repair(material, context).await
            }
            StrategyKind::ValidateContent => {
                let mut material = working_state(context);
                let repairs = repair_material(&mut material);
                info!(material_id = %context.material_id, ?repairs, "Repaired material content");
                self.persist_repair(material, context).await
            }
            StrategyKind::ReloadMaterial => self
                .store
                .load(&context.material_id)
                .await?
                .ok_or_else(|| PortError::NotFound(context.material_id.clone())),
            StrategyKind::ContactSupport => Err(PortError::Unexpected(
                "contact_support cannot be automated".to_string(),
            )),
        }
    }

    /// Re-attempts the interrupted write, or re-reads the material when no write
    /// was pending.
    async fn retry(&self, context: &RecoveryContext) -> PortResult<StudyMaterial> {
        let mut last_error = PortError::Unexpected("no retry attempted".to_string());
        for attempt in 1..=self.config.max_attempts {
            if !self.config.backoff.is_zero() {
                tokio::time::sleep(self.config.backoff * attempt).await;
            }

            let outcome = match &context.pending_state {
                Some(pending) => self.retry_save(pending, context.document_state.version).await,
                None => self
                    .store
                    .load(&context.material_id)
                    .await
                    .and_then(|m| m.ok_or_else(|| PortError::NotFound(context.material_id.clone()))),
            };

            match outcome {
                Ok(material) => {
                    info!(material_id = %context.material_id, attempt, "Retry succeeded");
                    return Ok(material);
                }
                Err(e) => {
                    warn!(
                        material_id = %context.material_id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        "Retry failed: {}",
                        e
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn retry_save(&self, pending: &StudyMaterial, expected_version: u64) -> PortResult<StudyMaterial> {
        match self.store.save_if_version(pending, expected_version).await {
            Ok(()) => Ok(pending.clone()),
            // An earlier attempt may have landed even though it reported failure.
            Err(PortError::VersionConflict { found, .. }) if found == pending.version => {
                match self.store.load(&pending.id).await? {
                    Some(stored) if stored == *pending => Ok(stored),
                    _ => Err(PortError::VersionConflict {
                        id: pending.id.clone(),
                        expected: expected_version,
                        found,
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// A repaired pending write goes through the interrupted compare-and-swap, so
    /// it lands as the next version. A repaired stored copy stays in memory: the
    /// caller's own versioned write carries it, together with a history entry.
    async fn persist_repair(&self, material: StudyMaterial, context: &RecoveryContext) -> PortResult<StudyMaterial> {
        if context.pending_state.is_some() {
            self.store
                .save_if_version(&material, context.document_state.version)
                .await?;
        }
        Ok(material)
    }

    /// Restores the newest history snapshot. The snapshot is written only over
    /// the stored copy it was read against, and never over a newer version.
    async fn rollback(&self, context: &RecoveryContext) -> PortResult<StudyMaterial> {
        let current = self
            .store
            .load(&context.material_id)
            .await?
            .ok_or_else(|| PortError::NotFound(context.material_id.clone()))?;
        let history = self.store.load_history(&context.material_id).await?;
        let target = history
            .last()
            .map(|entry| entry.new_state.clone())
            .ok_or_else(|| {
                PortError::Unexpected(format!("no snapshot recorded for {}", context.material_id))
            })?;

        if target.version < current.version {
            return Err(PortError::VersionConflict {
                id: context.material_id.clone(),
                expected: target.version,
                found: current.version,
            });
        }
        if !target.integrity_issues().is_empty() {
            return Err(PortError::Corrupted(format!(
                "snapshot of version {} is damaged",
                target.version
            )));
        }

        self.store.save_if_version(&target, current.version).await?;
        info!(
            material_id = %context.material_id,
            version = target.version,
            "Rolled back material"
        );
        Ok(target)
    }
}

fn working_state(context: &RecoveryContext) -> StudyMaterial {
    context
        .pending_state
        .clone()
        .unwrap_or_else(|| context.document_state.clone())
}

//=========================================================================================
// Self-healing Passes
//=========================================================================================

/// Removes dependency references to sections that do not exist, and self
/// references. Returns how many references were dropped. Idempotent.
pub fn strip_dangling_dependencies(material: &mut StudyMaterial) -> usize {
    let ids: HashSet<String> = material.sections.iter().map(|s| s.id.clone()).collect();
    let mut removed = 0;
    for section in &mut material.sections {
        let before = section.dependencies.len();
        let own_id = section.id.clone();
        section
            .dependencies
            .retain(|d| *d != own_id && ids.contains(d));
        removed += before - section.dependencies.len();
    }
    removed
}

/// Brings a structurally damaged material back in line with the section
/// invariants. Returns a description of every repair made.
pub fn repair_material(material: &mut StudyMaterial) -> Vec<String> {
    let mut repairs = Vec::new();

    let mut seen = HashSet::new();
    for section in &mut material.sections {
        if section.id.trim().is_empty() {
            section.id = Uuid::new_v4().to_string();
            repairs.push(format!("assigned id {} to a section without one", section.id));
        } else if seen.contains(&section.id) {
            let old = std::mem::replace(&mut section.id, Uuid::new_v4().to_string());
            repairs.push(format!("renamed duplicate section id {} to {}", old, section.id));
        }
        seen.insert(section.id.clone());
    }

    let dropped = strip_dangling_dependencies(material);
    if dropped > 0 {
        repairs.push(format!("dropped {} invalid dependency reference(s)", dropped));
    }

    for section in &mut material.sections {
        if let Some(parent) = &section.parent_id {
            if !seen.contains(parent) || *parent == section.id {
                repairs.push(format!("cleared invalid parent of section {}", section.id));
                section.parent_id = None;
            }
        }
    }

    let dense = material
        .sections
        .iter()
        .enumerate()
        .all(|(i, s)| s.order == i);
    material.renumber_sections();
    if !dense {
        repairs.push("renumbered section order".to_string());
    }
    material.refresh_statistics();
    repairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Section, SectionType};

    #[test]
    fn test_strategies_sorted_by_priority() {
        for kind in [
            ErrorKind::ValidationError,
            ErrorKind::DependencyConflict,
            ErrorKind::ContentCorruption,
            ErrorKind::StorageError,
            ErrorKind::ConcurrentModification,
            ErrorKind::PermissionDenied,
            ErrorKind::QuotaExceeded,
            ErrorKind::ExportError,
            ErrorKind::InvalidOperation,
        ] {
            let strategies = strategies_for(kind);
            assert!(!strategies.is_empty());
            assert!(strategies.windows(2).all(|w| w[0].priority >= w[1].priority));
        }
    }

    #[test]
    fn test_classify_storage_messages() {
        assert_eq!(
            classify(&ModificationError::Storage("disk unavailable".to_string())),
            ErrorKind::StorageError
        );
        assert_eq!(
            classify(&ModificationError::Storage("Permission denied (os error 13)".to_string())),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            classify(&ModificationError::Storage("No space left on device".to_string())),
            ErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify(&ModificationError::MaterialNotFound("m".to_string())),
            ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn test_strip_dangling_dependencies_is_idempotent() {
        let mut material = StudyMaterial::new("Links", None).with_sections(vec![
            Section::new(SectionType::Text, "a").with_id("a"),
            Section::new(SectionType::Text, "b")
                .with_id("b")
                .with_dependencies(["a", "gone", "b"]),
        ]);

        assert_eq!(strip_dangling_dependencies(&mut material), 2);
        assert_eq!(material.section("b").unwrap().dependencies, vec!["a".to_string()]);
        assert_eq!(strip_dangling_dependencies(&mut material), 0);
    }

    #[test]
    fn test_repair_material_restores_invariants() {
        let mut material: StudyMaterial = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "title": "Damaged",
            "version": 4,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "sections": [
                {"id": "a", "content": "first", "order": 3},
                {"content": "no id", "order": 7},
                {"id": "a", "order": 9, "dependencies": ["missing"], "parent_id": "nowhere"}
            ]
        }))
        .unwrap();
        assert!(!material.integrity_issues().is_empty());

        let repairs = repair_material(&mut material);
        assert!(!repairs.is_empty());
        assert!(material.integrity_issues().is_empty(), "{:?}", material.integrity_issues());
        let orders: Vec<usize> = material.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(material.sections[0].content, "first");
        assert!(material.sections[2].parent_id.is_none());
        assert_eq!(material.metadata.section_count, 3);
    }
}
