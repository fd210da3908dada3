//! crates/study_material_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! A `StudyMaterial` is the versioned aggregate root; sections and images only
//! exist inside one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::operations::Operation;

//=========================================================================================
// Sections
//=========================================================================================

/// The closed set of content block kinds a section can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    #[default]
    Text,
    Equation,
    Example,
    List,
    Heading,
}

/// An ordered, typed content block within a study material.
///
/// Every field except `id` falls back to a default when missing from stored JSON,
/// so that partially damaged documents still load and can be repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub section_type: SectionType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Section {
    /// Creates an editable section with a fresh identifier and no dependencies.
    pub fn new(section_type: SectionType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            section_type,
            content: content.into(),
            order: 0,
            editable: true,
            dependencies: Vec::new(),
            parent_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn locked(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn depends_on(&self, section_id: &str) -> bool {
        self.dependencies.iter().any(|d| d == section_id)
    }
}

//=========================================================================================
// Images
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Generated,
    Original,
    Recreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Svg,
    Png,
    Jpg,
}

/// Describes where an image came from. `parameters` is an opaque payload owned by
/// the image generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageSource {
    pub generator: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegenerationOptions {
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub content_hints: Vec<String>,
    #[serde(default)]
    pub context_hints: Vec<String>,
}

/// A generated or original visual asset attached to a study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(rename = "type")]
    pub image_type: ImageType,
    pub source: ImageSource,
    /// Encoded payload: SVG markup or base64 for raster formats.
    pub data: String,
    pub metadata: ImageMetadata,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regeneration_options: Option<RegenerationOptions>,
}

//=========================================================================================
// The Aggregate Root
//=========================================================================================

/// Free-form statistics kept alongside the document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialMetadata {
    #[serde(default)]
    pub section_count: usize,
    #[serde(default)]
    pub formula_count: usize,
    #[serde(default)]
    pub example_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preservation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The versioned document being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub metadata: MaterialMetadata,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyMaterial {
    /// Creates an empty material at version 1.
    pub fn new(title: impl Into<String>, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            owner_id,
            sections: Vec::new(),
            images: Vec::new(),
            metadata: MaterialMetadata::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends sections in the given order, renumbering them and refreshing statistics.
    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self.renumber_sections();
        self.refresh_statistics();
        self
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == section_id)
    }

    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }

    pub fn image(&self, image_id: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.id == image_id)
    }

    pub fn image_mut(&mut self, image_id: &str) -> Option<&mut Image> {
        self.images.iter_mut().find(|i| i.id == image_id)
    }

    /// Sections that list `section_id` among their dependencies.
    pub fn dependents_of(&self, section_id: &str) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|s| s.id != section_id && s.depends_on(section_id))
            .collect()
    }

    /// Section ids in their current `order`.
    pub fn ordered_section_ids(&self) -> Vec<String> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections.into_iter().map(|s| s.id.clone()).collect()
    }

    /// Sorts sections by their `order` field and rewrites it as a dense `0..N-1` run.
    pub fn renumber_sections(&mut self) {
        self.sections.sort_by_key(|s| s.order);
        self.reindex_in_place();
    }

    /// Rewrites `order` from the current vector position.
    pub(crate) fn reindex_in_place(&mut self) {
        for (index, section) in self.sections.iter_mut().enumerate() {
            section.order = index;
        }
    }

    pub fn refresh_statistics(&mut self) {
        self.metadata.section_count = self.sections.len();
        self.metadata.formula_count = self
            .sections
            .iter()
            .filter(|s| s.section_type == SectionType::Equation)
            .count();
        self.metadata.example_count = self
            .sections
            .iter()
            .filter(|s| s.section_type == SectionType::Example)
            .count();
    }

    /// Lists every structural problem in the stored state. An empty list means the
    /// document satisfies all section invariants.
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.id.trim().is_empty() {
                issues.push(IntegrityIssue::MissingSectionId);
            } else if !seen.insert(section.id.as_str()) {
                issues.push(IntegrityIssue::DuplicateSectionId(section.id.clone()));
            }
        }

        let mut orders: Vec<usize> = self.sections.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, o)| i != *o) {
            issues.push(IntegrityIssue::NonDenseOrder);
        }

        for section in &self.sections {
            for dependency in &section.dependencies {
                if dependency == &section.id {
                    issues.push(IntegrityIssue::SelfDependency(section.id.clone()));
                } else if !seen.contains(dependency.as_str()) {
                    issues.push(IntegrityIssue::DanglingDependency {
                        section_id: section.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        issues
    }
}

/// A violated section invariant found in a loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    MissingSectionId,
    DuplicateSectionId(String),
    NonDenseOrder,
    SelfDependency(String),
    DanglingDependency { section_id: String, dependency: String },
}

impl IntegrityIssue {
    pub fn is_dependency_issue(&self) -> bool {
        matches!(self, IntegrityIssue::DanglingDependency { .. })
    }
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::MissingSectionId => write!(f, "section without identifier"),
            IntegrityIssue::DuplicateSectionId(id) => write!(f, "duplicate section id {}", id),
            IntegrityIssue::NonDenseOrder => write!(f, "section order is not a dense sequence"),
            IntegrityIssue::SelfDependency(id) => write!(f, "section {} depends on itself", id),
            IntegrityIssue::DanglingDependency { section_id, dependency } => write!(
                f,
                "section {} depends on missing section {}",
                section_id, dependency
            ),
        }
    }
}

//=========================================================================================
// History
//=========================================================================================

/// An audit record of one applied mutation, with before/after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub material_id: String,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub previous_state: StudyMaterial,
    pub new_state: StudyMaterial,
}

impl HistoryEntry {
    pub fn record(
        operation: Operation,
        actor_id: Option<String>,
        session_id: Option<String>,
        previous_state: StudyMaterial,
        new_state: StudyMaterial,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            material_id: new_state.id.clone(),
            operation,
            timestamp: new_state.updated_at,
            actor_id,
            session_id,
            previous_state,
            new_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sections_renumbers_and_counts() {
        let material = StudyMaterial::new("Calculus", None).with_sections(vec![
            Section::new(SectionType::Heading, "Limits"),
            Section::new(SectionType::Equation, "\\lim_{x \\to 0} x"),
            Section::new(SectionType::Example, "Compute the limit"),
        ]);

        let orders: Vec<usize> = material.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(material.metadata.section_count, 3);
        assert_eq!(material.metadata.formula_count, 1);
        assert_eq!(material.metadata.example_count, 1);
        assert_eq!(material.version, 1);
    }

    #[test]
    fn test_integrity_issues_detects_damage() {
        let mut material = StudyMaterial::new("Broken", None).with_sections(vec![
            Section::new(SectionType::Text, "a").with_id("a"),
            Section::new(SectionType::Text, "b")
                .with_id("b")
                .with_dependencies(["ghost", "b"]),
        ]);
        material.sections[1].order = 5;

        let issues = material.integrity_issues();
        assert!(issues.contains(&IntegrityIssue::NonDenseOrder));
        assert!(issues.contains(&IntegrityIssue::SelfDependency("b".to_string())));
        assert!(issues.iter().any(|i| i.is_dependency_issue()));
    }

    #[test]
    fn test_section_defaults_when_fields_missing() {
        let section: Section = serde_json::from_str(r#"{"id": "s1"}"#).unwrap();
        assert_eq!(section.section_type, SectionType::Text);
        assert!(section.editable);
        assert!(section.dependencies.is_empty());
    }
}
