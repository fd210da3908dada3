//! crates/study_material_core/src/validation.rs
//!
//! Checks a proposed operation against the current state of a study material.
//! Validation never mutates anything and never performs I/O. Four passes run in
//! order (structural, state, dependency, business rules) and their issues are
//! concatenated into a single `ValidationResult`. A structurally malformed
//! operation skips the state and dependency passes.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::dependency_graph::DependencyGraph;
use crate::domain::{SectionType, StudyMaterial};
use crate::operations::{NewSection, Operation, SectionChanges};

//=========================================================================================
// Result Types
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable reason attached to every validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingPosition,
    MissingTargetId,
    MissingSectionOrder,
    MissingImageData,
    EmptyChanges,
    SectionNotFound,
    ImageNotFound,
    SectionNotEditable,
    ImageNotEditable,
    InvalidParent,
    PositionOutOfRange,
    SectionCountMismatch,
    DuplicateSectionIds,
    UnknownSectionId,
    UnknownStylePreset,
    DependencyConflict,
    InvalidDependencies,
    SelfDependency,
    DependencyOrderViolation,
    CircularDependency,
    TooManySections,
    TooManyImages,
    ContentTooLong,
    UnbalancedBraces,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::MissingPosition => "MISSING_POSITION",
            ValidationCode::MissingTargetId => "MISSING_TARGET_ID",
            ValidationCode::MissingSectionOrder => "MISSING_SECTION_ORDER",
            ValidationCode::MissingImageData => "MISSING_IMAGE_DATA",
            ValidationCode::EmptyChanges => "EMPTY_CHANGES",
            ValidationCode::SectionNotFound => "SECTION_NOT_FOUND",
            ValidationCode::ImageNotFound => "IMAGE_NOT_FOUND",
            ValidationCode::SectionNotEditable => "SECTION_NOT_EDITABLE",
            ValidationCode::ImageNotEditable => "IMAGE_NOT_EDITABLE",
            ValidationCode::InvalidParent => "INVALID_PARENT",
            ValidationCode::PositionOutOfRange => "POSITION_OUT_OF_RANGE",
            ValidationCode::SectionCountMismatch => "SECTION_COUNT_MISMATCH",
            ValidationCode::DuplicateSectionIds => "DUPLICATE_SECTION_IDS",
            ValidationCode::UnknownSectionId => "UNKNOWN_SECTION_ID",
            ValidationCode::UnknownStylePreset => "UNKNOWN_STYLE_PRESET",
            ValidationCode::DependencyConflict => "DEPENDENCY_CONFLICT",
            ValidationCode::InvalidDependencies => "INVALID_DEPENDENCIES",
            ValidationCode::SelfDependency => "SELF_DEPENDENCY",
            ValidationCode::DependencyOrderViolation => "DEPENDENCY_ORDER_VIOLATION",
            ValidationCode::CircularDependency => "CIRCULAR_DEPENDENCY",
            ValidationCode::TooManySections => "TOO_MANY_SECTIONS",
            ValidationCode::TooManyImages => "TOO_MANY_IMAGES",
            ValidationCode::ContentTooLong => "CONTENT_TOO_LONG",
            ValidationCode::UnbalancedBraces => "UNBALANCED_BRACES",
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn error(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            field: None,
            suggestion: None,
        }
    }

    fn warning(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    fn on(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of validating one operation. Warnings never block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        let is_valid = !errors.iter().any(|e| e.severity == Severity::Error);
        Self {
            is_valid,
            errors,
            warnings,
        }
    }

    pub fn has_error(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: ValidationCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    pub fn error_codes(&self) -> Vec<ValidationCode> {
        self.errors.iter().map(|e| e.code).collect()
    }

    /// One-line summary of the blocking errors, for logs and error messages.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

//=========================================================================================
// The Validator
//=========================================================================================

/// Business-rule ceilings applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_sections: usize,
    pub max_images: usize,
    /// Soft ceiling, in characters. Exceeding it only produces a warning.
    pub max_content_length: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_sections: 100,
            max_images: 50,
            max_content_length: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn validate(&self, material: &StudyMaterial, operation: &Operation) -> ValidationResult {
        let mut issues = structural_issues(operation);
        // State and dependency checks need a well-formed target; business rules do not.
        if !issues.iter().any(|i| i.severity == Severity::Error) {
            issues.extend(state_issues(material, operation));
            issues.extend(dependency_issues(material, operation));
        }
        issues.extend(self.business_issues(material, operation));
        ValidationResult::from_issues(issues)
    }

    fn business_issues(&self, material: &StudyMaterial, operation: &Operation) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        match operation {
            Operation::AddSection { section, .. } => {
                if material.sections.len() >= self.limits.max_sections {
                    issues.push(
                        ValidationIssue::error(
                            ValidationCode::TooManySections,
                            format!(
                                "Material already has the maximum of {} sections",
                                self.limits.max_sections
                            ),
                        )
                        .suggest("Remove or merge existing sections first"),
                    );
                }
                self.check_content(&section.content, section.section_type, &mut issues);
            }
            Operation::EditSection { section_id, changes } => {
                if changes.content.is_some() || changes.section_type.is_some() {
                    if let Some(existing) = material.section(section_id) {
                        let content = changes.content.as_deref().unwrap_or(&existing.content);
                        let section_type = changes.section_type.unwrap_or(existing.section_type);
                        self.check_content(content, section_type, &mut issues);
                    }
                }
            }
            Operation::AddImage { .. } => {
                if material.images.len() >= self.limits.max_images {
                    issues.push(ValidationIssue::error(
                        ValidationCode::TooManyImages,
                        format!(
                            "Material already has the maximum of {} images",
                            self.limits.max_images
                        ),
                    ));
                }
            }
            Operation::RemoveSection { .. }
            | Operation::ReorderSections { .. }
            | Operation::RemoveImage { .. }
            | Operation::RegenerateImage { .. } => {}
        }
        issues
    }

    fn check_content(&self, content: &str, section_type: SectionType, issues: &mut Vec<ValidationIssue>) {
        let length = content.chars().count();
        if length > self.limits.max_content_length {
            issues.push(
                ValidationIssue::warning(
                    ValidationCode::ContentTooLong,
                    format!(
                        "Content is {} characters, above the recommended {}",
                        length, self.limits.max_content_length
                    ),
                )
                .on("content")
                .suggest("Split the content into several sections"),
            );
        }
        if section_type == SectionType::Equation {
            issues.extend(brace_issues(content));
        }
    }
}

//=========================================================================================
// Structural Pass
//=========================================================================================

fn structural_issues(operation: &Operation) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut require_target = |id: &str, field: &str| {
        if id.trim().is_empty() {
            issues.push(
                ValidationIssue::error(
                    ValidationCode::MissingTargetId,
                    format!("{} requires a target identifier", operation.kind()),
                )
                .on(field),
            );
        }
    };

    match operation {
        Operation::RemoveSection { section_id } => require_target(section_id, "section_id"),
        Operation::EditSection { section_id, .. } => require_target(section_id, "section_id"),
        Operation::RemoveImage { image_id } => require_target(image_id, "image_id"),
        Operation::RegenerateImage { image_id, .. } => require_target(image_id, "image_id"),
        Operation::AddSection { .. }
        | Operation::ReorderSections { .. }
        | Operation::AddImage { .. } => {}
    }

    match operation {
        Operation::AddSection { position: None, .. } => issues.push(
            ValidationIssue::error(ValidationCode::MissingPosition, "add_section requires a position")
                .on("position")
                .suggest("Use 0 to insert at the start or the section count to append"),
        ),
        Operation::EditSection { changes, .. } if changes.is_empty() => issues.push(
            ValidationIssue::warning(ValidationCode::EmptyChanges, "No fields to change").on("changes"),
        ),
        Operation::ReorderSections { section_ids } if section_ids.is_empty() => issues.push(
            ValidationIssue::error(
                ValidationCode::MissingSectionOrder,
                "reorder_sections requires the full list of section ids",
            )
            .on("section_ids"),
        ),
        Operation::AddImage { image, .. } if image.data.trim().is_empty() => issues.push(
            ValidationIssue::error(ValidationCode::MissingImageData, "Image data is empty").on("image.data"),
        ),
        _ => {}
    }
    issues
}

//=========================================================================================
// State Pass
//=========================================================================================

fn state_issues(material: &StudyMaterial, operation: &Operation) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match operation {
        Operation::AddSection { section, position } => {
            if let Some(position) = position {
                if *position > material.sections.len() {
                    issues.push(out_of_range("position", *position, material.sections.len()));
                }
            }
            if let Some(parent_id) = &section.parent_id {
                if material.section(parent_id).is_none() {
                    issues.push(invalid_parent(parent_id));
                }
            }
        }
        Operation::RemoveSection { section_id } => match material.section(section_id) {
            None => issues.push(section_not_found(section_id)),
            Some(section) if !section.editable => issues.push(section_not_editable(section_id)),
            Some(_) => {}
        },
        Operation::EditSection { section_id, changes } => match material.section(section_id) {
            None => issues.push(section_not_found(section_id)),
            Some(section) => {
                if !section.editable && !only_unlocks(changes) {
                    issues.push(section_not_editable(section_id));
                }
                if let Some(parent_id) = &changes.parent_id {
                    if parent_id == section_id || material.section(parent_id).is_none() {
                        issues.push(invalid_parent(parent_id));
                    }
                }
            }
        },
        Operation::ReorderSections { section_ids } => {
            if section_ids.len() != material.sections.len() {
                issues.push(
                    ValidationIssue::error(
                        ValidationCode::SectionCountMismatch,
                        format!(
                            "Expected {} section ids, got {}",
                            material.sections.len(),
                            section_ids.len()
                        ),
                    )
                    .on("section_ids")
                    .suggest("Include every section id exactly once"),
                );
            }
            let mut seen = HashSet::new();
            let duplicates: Vec<&str> = section_ids
                .iter()
                .filter(|id| !seen.insert(id.as_str()))
                .map(String::as_str)
                .collect();
            if !duplicates.is_empty() {
                issues.push(
                    ValidationIssue::error(
                        ValidationCode::DuplicateSectionIds,
                        format!("Duplicate section ids: {}", duplicates.join(", ")),
                    )
                    .on("section_ids"),
                );
            }
            let unknown: Vec<&str> = section_ids
                .iter()
                .filter(|id| material.section(id).is_none())
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                issues.push(
                    ValidationIssue::error(
                        ValidationCode::UnknownSectionId,
                        format!("Unknown section ids: {}", unknown.join(", ")),
                    )
                    .on("section_ids"),
                );
            }
        }
        Operation::AddImage { position, .. } => {
            if let Some(position) = position {
                if *position > material.images.len() {
                    issues.push(out_of_range("position", *position, material.images.len()));
                }
            }
        }
        Operation::RemoveImage { image_id } => match material.image(image_id) {
            None => issues.push(image_not_found(image_id)),
            Some(image) if !image.editable => issues.push(image_not_editable(image_id)),
            Some(_) => {}
        },
        Operation::RegenerateImage { image_id, request } => match material.image(image_id) {
            None => issues.push(image_not_found(image_id)),
            Some(image) if !image.editable => issues.push(image_not_editable(image_id)),
            Some(image) => {
                let styles = image
                    .regeneration_options
                    .as_ref()
                    .map(|o| o.styles.as_slice())
                    .unwrap_or_default();
                if let Some(style) = &request.style {
                    if !styles.is_empty() && !styles.contains(style) {
                        issues.push(
                            ValidationIssue::warning(
                                ValidationCode::UnknownStylePreset,
                                format!("Style '{}' is not one of the image's presets", style),
                            )
                            .on("request.style")
                            .suggest(format!("Available presets: {}", styles.join(", "))),
                        );
                    }
                }
            }
        },
    }
    issues
}

fn only_unlocks(changes: &SectionChanges) -> bool {
    changes.editable == Some(true)
        && changes.content.is_none()
        && changes.section_type.is_none()
        && changes.dependencies.is_none()
        && changes.parent_id.is_none()
}

fn out_of_range(field: &str, position: usize, len: usize) -> ValidationIssue {
    ValidationIssue::warning(
        ValidationCode::PositionOutOfRange,
        format!("Position {} is outside 0..={}", position, len),
    )
    .on(field)
    .suggest(format!("The position will be clamped to {}", len))
}

fn section_not_found(section_id: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::SectionNotFound,
        format!("Section {} does not exist", section_id),
    )
    .on("section_id")
}

fn section_not_editable(section_id: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::SectionNotEditable,
        format!("Section {} is not editable", section_id),
    )
    .on("section_id")
}

fn image_not_found(image_id: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::ImageNotFound,
        format!("Image {} does not exist", image_id),
    )
    .on("image_id")
}

fn image_not_editable(image_id: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::ImageNotEditable,
        format!("Image {} is not editable", image_id),
    )
    .on("image_id")
}

fn invalid_parent(parent_id: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::InvalidParent,
        format!("Parent section {} is not valid", parent_id),
    )
    .on("parent_id")
}

//=========================================================================================
// Dependency Pass
//=========================================================================================

fn dependency_issues(material: &StudyMaterial, operation: &Operation) -> Vec<ValidationIssue> {
    match operation {
        Operation::RemoveSection { section_id } => {
            let dependents: Vec<&str> = material
                .dependents_of(section_id)
                .into_iter()
                .map(|s| s.id.as_str())
                .collect();
            if dependents.is_empty() {
                return Vec::new();
            }
            vec![ValidationIssue::error(
                ValidationCode::DependencyConflict,
                format!(
                    "Section {} is required by: {}",
                    section_id,
                    dependents.join(", ")
                ),
            )
            .on("section_id")
            .suggest("Remove the dependency from those sections first")]
        }
        Operation::AddSection { section, position } => {
            add_section_dependency_issues(material, section, position.unwrap_or(0))
        }
        Operation::EditSection { section_id, changes } => match &changes.dependencies {
            Some(dependencies) => edit_dependency_issues(material, section_id, dependencies),
            None => Vec::new(),
        },
        Operation::ReorderSections { section_ids } => reorder_dependency_issues(material, section_ids),
        Operation::AddImage { .. } | Operation::RemoveImage { .. } | Operation::RegenerateImage { .. } => {
            Vec::new()
        }
    }
}

fn missing_dependencies<'a>(material: &StudyMaterial, dependencies: &'a [String]) -> Vec<&'a str> {
    dependencies
        .iter()
        .filter(|d| material.section(d).is_none())
        .map(String::as_str)
        .collect()
}

fn invalid_dependencies(missing: &[&str]) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::InvalidDependencies,
        format!("Dependencies do not exist: {}", missing.join(", ")),
    )
    .on("dependencies")
}

fn order_violation(section: &str, dependency: &str) -> ValidationIssue {
    ValidationIssue::error(
        ValidationCode::DependencyOrderViolation,
        format!("Section {} would come before its dependency {}", section, dependency),
    )
    .suggest(format!("Place {} after {}", section, dependency))
}

fn add_section_dependency_issues(
    material: &StudyMaterial,
    section: &NewSection,
    position: usize,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let missing = missing_dependencies(material, &section.dependencies);
    if !missing.is_empty() {
        issues.push(invalid_dependencies(&missing));
    }

    let position = position.min(material.sections.len());
    for dependency in &section.dependencies {
        if let Some(existing) = material.section(dependency) {
            if existing.order >= position {
                issues.push(order_violation("the new section", dependency).on("position"));
            }
        }
    }
    issues
}

fn edit_dependency_issues(
    material: &StudyMaterial,
    section_id: &str,
    dependencies: &[String],
) -> Vec<ValidationIssue> {
    let Some(section) = material.section(section_id) else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    if dependencies.iter().any(|d| d == section_id) {
        issues.push(
            ValidationIssue::error(
                ValidationCode::SelfDependency,
                format!("Section {} cannot depend on itself", section_id),
            )
            .on("changes.dependencies"),
        );
    }

    let missing = missing_dependencies(material, dependencies);
    if !missing.is_empty() {
        issues.push(invalid_dependencies(&missing).on("changes.dependencies"));
    }

    let mut graph = DependencyGraph::from_sections(&material.sections);
    graph.set_dependencies(
        section_id,
        dependencies.iter().filter(|d| *d != section_id).cloned(),
    );
    if let Some(cycle) = graph.find_cycle() {
        issues.push(
            ValidationIssue::error(
                ValidationCode::CircularDependency,
                format!("Dependencies would form a cycle: {}", cycle.join(" -> ")),
            )
            .on("changes.dependencies"),
        );
    }

    for dependency in dependencies.iter().filter(|d| *d != section_id) {
        if let Some(existing) = material.section(dependency) {
            if existing.order >= section.order {
                issues.push(order_violation(section_id, dependency).on("changes.dependencies"));
            }
        }
    }
    issues
}

fn reorder_dependency_issues(material: &StudyMaterial, section_ids: &[String]) -> Vec<ValidationIssue> {
    let positions: HashMap<&str, usize> = section_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();

    let mut issues = Vec::new();
    for (index, id) in section_ids.iter().enumerate() {
        let Some(section) = material.section(id) else {
            continue;
        };
        for dependency in &section.dependencies {
            if let Some(dependency_index) = positions.get(dependency.as_str()) {
                if *dependency_index > index {
                    issues.push(order_violation(id, dependency).on("section_ids"));
                }
            }
        }
    }
    issues
}

//=========================================================================================
// Equation Checks
//=========================================================================================

/// A closing brace without an opener is an error; an unclosed opener is a warning.
/// Escaped braces (`\{`, `\}`) are literal and ignored.
fn brace_issues(content: &str) -> Vec<ValidationIssue> {
    let mut depth: usize = 0;
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return vec![ValidationIssue::error(
                        ValidationCode::UnbalancedBraces,
                        "Equation has a closing brace without a matching opening brace",
                    )
                    .on("content")];
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return vec![ValidationIssue::warning(
            ValidationCode::UnbalancedBraces,
            format!("Equation has {} unclosed brace(s)", depth),
        )
        .on("content")
        .suggest("Close every '{' with a matching '}'")];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Section, SectionType};
    use crate::operations::{NewSection, SectionChanges};

    fn material_ab() -> StudyMaterial {
        StudyMaterial::new("Deps", None).with_sections(vec![
            Section::new(SectionType::Text, "A").with_id("a"),
            Section::new(SectionType::Text, "B")
                .with_id("b")
                .with_dependencies(["a"]),
        ])
    }

    #[test]
    fn test_remove_section_with_dependents_is_conflict() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::RemoveSection {
                section_id: "a".to_string(),
            },
        );
        assert!(!result.is_valid);
        assert_eq!(result.error_codes(), vec![ValidationCode::DependencyConflict]);
    }

    #[test]
    fn test_remove_leaf_section_is_valid() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::RemoveSection {
                section_id: "b".to_string(),
            },
        );
        assert!(result.is_valid, "{}", result.summary());
    }

    #[test]
    fn test_add_section_requires_position() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Text, "x"),
                position: None,
            },
        );
        assert!(result.has_error(ValidationCode::MissingPosition));
    }

    #[test]
    fn test_malformed_add_still_reports_content_problems() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Equation, "x}").depending_on(["ghost"]),
                position: None,
            },
        );
        assert_eq!(
            result.error_codes(),
            vec![ValidationCode::MissingPosition, ValidationCode::UnbalancedBraces]
        );
    }

    #[test]
    fn test_add_section_with_missing_dependency() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Text, "x").depending_on(["ghost"]),
                position: Some(2),
            },
        );
        assert!(result.has_error(ValidationCode::InvalidDependencies));
    }

    #[test]
    fn test_add_section_before_its_dependency() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Text, "x").depending_on(["b"]),
                position: Some(1),
            },
        );
        assert!(result.has_error(ValidationCode::DependencyOrderViolation));
    }

    #[test]
    fn test_out_of_range_position_is_only_a_warning() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Text, "x"),
                position: Some(42),
            },
        );
        assert!(result.is_valid);
        assert!(result.has_warning(ValidationCode::PositionOutOfRange));
    }

    #[test]
    fn test_reorder_missing_and_duplicate_ids() {
        let validator = Validator::default();
        let material = material_ab();

        let missing = validator.validate(
            &material,
            &Operation::ReorderSections {
                section_ids: vec!["a".to_string()],
            },
        );
        assert!(missing.has_error(ValidationCode::SectionCountMismatch));

        let duplicated = validator.validate(
            &material,
            &Operation::ReorderSections {
                section_ids: vec!["a".to_string(), "a".to_string()],
            },
        );
        assert!(duplicated.has_error(ValidationCode::DuplicateSectionIds));
    }

    #[test]
    fn test_reorder_before_dependency_is_rejected() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::ReorderSections {
                section_ids: vec!["b".to_string(), "a".to_string()],
            },
        );
        assert!(result.has_error(ValidationCode::DependencyOrderViolation));
    }

    #[test]
    fn test_edit_dependencies_rejects_cycle() {
        let material = StudyMaterial::new("Cycle", None).with_sections(vec![
            Section::new(SectionType::Text, "A").with_id("a"),
            Section::new(SectionType::Text, "B")
                .with_id("b")
                .with_dependencies(["a"]),
            Section::new(SectionType::Text, "C")
                .with_id("c")
                .with_dependencies(["b"]),
        ]);
        let result = Validator::default().validate(
            &material,
            &Operation::EditSection {
                section_id: "a".to_string(),
                changes: SectionChanges {
                    dependencies: Some(vec!["c".to_string()]),
                    ..SectionChanges::default()
                },
            },
        );
        assert!(result.has_error(ValidationCode::CircularDependency));
    }

    #[test]
    fn test_edit_self_dependency() {
        let result = Validator::default().validate(
            &material_ab(),
            &Operation::EditSection {
                section_id: "b".to_string(),
                changes: SectionChanges {
                    dependencies: Some(vec!["b".to_string()]),
                    ..SectionChanges::default()
                },
            },
        );
        assert!(result.has_error(ValidationCode::SelfDependency));
    }

    #[test]
    fn test_edit_locked_section() {
        let material = StudyMaterial::new("Locked", None)
            .with_sections(vec![Section::new(SectionType::Text, "A").with_id("a").locked()]);
        let validator = Validator::default();

        let edit = validator.validate(
            &material,
            &Operation::EditSection {
                section_id: "a".to_string(),
                changes: SectionChanges::content("changed"),
            },
        );
        assert!(edit.has_error(ValidationCode::SectionNotEditable));

        let unlock = validator.validate(
            &material,
            &Operation::EditSection {
                section_id: "a".to_string(),
                changes: SectionChanges {
                    editable: Some(true),
                    ..SectionChanges::default()
                },
            },
        );
        assert!(unlock.is_valid);
    }

    #[test]
    fn test_section_ceiling_and_long_content() {
        let validator = Validator::new(ValidationLimits {
            max_sections: 2,
            max_images: 50,
            max_content_length: 5,
        });
        let result = validator.validate(
            &material_ab(),
            &Operation::AddSection {
                section: NewSection::new(SectionType::Text, "way too long"),
                position: Some(2),
            },
        );
        assert!(result.has_error(ValidationCode::TooManySections));
        assert!(result.has_warning(ValidationCode::ContentTooLong));
    }

    #[test]
    fn test_equation_braces() {
        assert!(brace_issues("\\frac{a}{b}").is_empty());
        assert!(brace_issues("\\{ x \\}").is_empty());
        assert_eq!(brace_issues("x}")[0].severity, Severity::Error);
        assert_eq!(brace_issues("{x")[0].severity, Severity::Warning);
    }
}
