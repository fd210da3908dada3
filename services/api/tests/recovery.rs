//! The recovery handler's store-writing strategies, exercised directly.

mod common;

use common::{FlakyStore, RacingStore};
use std::sync::Arc;
use std::time::Duration;
use study_api_lib::adapters::InMemoryStore;
use study_material_core::recovery::{ActionOutcome, RecoveryAction};
use study_material_core::{
    DocumentStore, HistoryEntry, ModificationError, Operation, RecoveryConfig, RecoveryContext,
    RecoveryHandler, Section, SectionType, StrategyKind, StudyMaterial,
};

fn handler_over(store: Arc<dyn DocumentStore>) -> RecoveryHandler {
    RecoveryHandler::new(
        store,
        RecoveryConfig {
            max_attempts: 3,
            backoff: Duration::ZERO,
        },
    )
}

fn clean_material() -> StudyMaterial {
    StudyMaterial::new("Acoustics", None).with_sections(vec![
        Section::new(SectionType::Heading, "Sound").with_id("s1"),
        Section::new(SectionType::Text, "Sound is a pressure wave.").with_id("s2"),
    ])
}

fn damaged(material: &StudyMaterial) -> StudyMaterial {
    let mut copy = material.clone();
    copy.sections[1].id = "s1".to_string();
    copy
}

fn next_version(material: &StudyMaterial) -> StudyMaterial {
    let mut next = material.clone();
    next.version += 1;
    next
}

fn snapshot_entry(before: &StudyMaterial, after: &StudyMaterial) -> HistoryEntry {
    HistoryEntry::record(
        Operation::RemoveImage {
            image_id: "img".to_string(),
        },
        None,
        None,
        before.clone(),
        after.clone(),
    )
}

fn corruption() -> ModificationError {
    ModificationError::ContentCorruption("unreadable section list".to_string())
}

fn outcome_of(actions: &[RecoveryAction], strategy: StrategyKind) -> &ActionOutcome {
    &actions
        .iter()
        .find(|a| a.strategy == strategy)
        .unwrap()
        .outcome
}

#[tokio::test]
async fn test_rollback_restores_the_latest_snapshot() {
    let good = clean_material();
    let broken = damaged(&good);
    let inner = InMemoryStore::new();
    inner.save(&broken).await.unwrap();
    inner.save_history(&snapshot_entry(&good, &good)).await.unwrap();
    // The repaired pending write fails once; the rollback write goes through.
    let store = Arc::new(FlakyStore::new(inner, 1));
    let handler = handler_over(store.clone());

    let context = RecoveryContext::new(broken.clone()).with_pending(next_version(&broken));
    let result = handler.handle(&corruption(), context).await;

    assert!(!result.success);
    assert_eq!(
        outcome_of(&result.applied_actions, StrategyKind::ValidateContent),
        &ActionOutcome::Failed {
            reason: "An unexpected error occurred: connection reset by peer".to_string()
        }
    );
    assert_eq!(
        outcome_of(&result.applied_actions, StrategyKind::Rollback),
        &ActionOutcome::Succeeded
    );
    assert_eq!(store.load(&good.id).await.unwrap(), Some(good.clone()));
    assert_eq!(result.recovered_document, Some(good));
}

#[tokio::test]
async fn test_rollback_without_history_writes_nothing() {
    let broken = damaged(&clean_material());
    let inner = InMemoryStore::new();
    inner.save(&broken).await.unwrap();
    let store = Arc::new(FlakyStore::new(inner, 1));
    let handler = handler_over(store.clone());

    let context = RecoveryContext::new(broken.clone()).with_pending(next_version(&broken));
    let result = handler.handle(&corruption(), context).await;

    assert!(!result.success);
    assert!(matches!(
        outcome_of(&result.applied_actions, StrategyKind::Rollback),
        ActionOutcome::Failed { .. }
    ));
    assert_eq!(store.calls(), 1);
    assert_eq!(store.load(&broken.id).await.unwrap(), Some(broken.clone()));
    assert_eq!(result.recovered_document, Some(broken));
}

#[tokio::test]
async fn test_rollback_refuses_to_move_behind_a_concurrent_writer() {
    let good = clean_material();
    let broken = damaged(&good);
    let inner = InMemoryStore::new();
    inner.save(&broken).await.unwrap();
    inner.save_history(&snapshot_entry(&good, &good)).await.unwrap();
    // Another writer moves the material to version 2 before the repair lands.
    let store = Arc::new(RacingStore::new(inner));
    let handler = handler_over(store.clone());

    let context = RecoveryContext::new(broken.clone()).with_pending(next_version(&broken));
    let result = handler.handle(&corruption(), context).await;

    assert!(!result.success);
    assert!(matches!(
        outcome_of(&result.applied_actions, StrategyKind::ValidateContent),
        ActionOutcome::Failed { .. }
    ));
    assert!(matches!(
        outcome_of(&result.applied_actions, StrategyKind::Rollback),
        ActionOutcome::Failed { .. }
    ));
    let stored = store.load(&good.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Renamed elsewhere");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_repair_of_a_stored_copy_is_not_written() {
    let mut broken = clean_material();
    broken.sections[1].dependencies = vec!["ghost".to_string()];
    let store = Arc::new(InMemoryStore::new());
    store.save(&broken).await.unwrap();
    let handler = handler_over(store.clone());

    let result = handler
        .handle(
            &ModificationError::DependencyConflict("dangling reference".to_string()),
            RecoveryContext::new(broken.clone()),
        )
        .await;

    assert!(result.success);
    let repaired = result.recovered_document.unwrap();
    assert!(repaired.section("s2").unwrap().dependencies.is_empty());
    assert_eq!(repaired.version, broken.version);
    assert_eq!(store.load(&broken.id).await.unwrap(), Some(broken));
}
