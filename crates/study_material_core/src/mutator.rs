//! crates/study_material_core/src/mutator.rs
//!
//! Pure transformations, one per operation kind. Each takes the current material
//! and returns a new value; the input is never modified.
//!
//! The mutator trusts the validator: a missing target is a broken precondition
//! and comes back as `MutationError::TargetNotFound`, never as a recoverable
//! failure. Version and `updated_at` are the orchestrator's business.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Image, Section, StudyMaterial};
use crate::operations::{NewImage, NewSection, Operation, RegenerationRequest, SectionChanges};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("{kind} target not found: {id}")]
    TargetNotFound { kind: &'static str, id: String },
}

/// Applies `operation` to a copy of `material`.
pub fn apply(
    material: &StudyMaterial,
    operation: &Operation,
    now: DateTime<Utc>,
) -> Result<StudyMaterial, MutationError> {
    match operation {
        Operation::AddSection { section, position } => {
            Ok(add_section(material, section, position.unwrap_or(material.sections.len())))
        }
        Operation::RemoveSection { section_id } => remove_section(material, section_id),
        Operation::EditSection { section_id, changes } => edit_section(material, section_id, changes),
        Operation::ReorderSections { section_ids } => reorder_sections(material, section_ids),
        Operation::AddImage { image, position } => {
            Ok(add_image(material, image, position.unwrap_or(material.images.len())))
        }
        Operation::RemoveImage { image_id } => remove_image(material, image_id),
        Operation::RegenerateImage { image_id, request } => {
            regenerate_image(material, image_id, request, now)
        }
    }
}

pub fn add_section(material: &StudyMaterial, new_section: &NewSection, position: usize) -> StudyMaterial {
    let mut next = material.clone();
    let section = Section {
        id: Uuid::new_v4().to_string(),
        section_type: new_section.section_type,
        content: new_section.content.clone(),
        order: 0,
        editable: new_section.editable,
        dependencies: new_section.dependencies.clone(),
        parent_id: new_section.parent_id.clone(),
    };

    next.renumber_sections();
    let position = position.min(next.sections.len());
    next.sections.insert(position, section);
    next.reindex_in_place();
    next.refresh_statistics();
    next
}

/// Drops the section and strips its id from every remaining dependency list.
pub fn remove_section(material: &StudyMaterial, section_id: &str) -> Result<StudyMaterial, MutationError> {
    let index = material
        .section_index(section_id)
        .ok_or_else(|| not_found("section", section_id))?;

    let mut next = material.clone();
    next.sections.remove(index);
    for section in &mut next.sections {
        section.dependencies.retain(|d| d != section_id);
        if section.parent_id.as_deref() == Some(section_id) {
            section.parent_id = None;
        }
    }
    next.renumber_sections();
    next.refresh_statistics();
    Ok(next)
}

pub fn edit_section(
    material: &StudyMaterial,
    section_id: &str,
    changes: &SectionChanges,
) -> Result<StudyMaterial, MutationError> {
    let mut next = material.clone();
    let section = next
        .section_mut(section_id)
        .ok_or_else(|| not_found("section", section_id))?;

    if let Some(content) = &changes.content {
        section.content = content.clone();
    }
    if let Some(section_type) = changes.section_type {
        section.section_type = section_type;
    }
    if let Some(editable) = changes.editable {
        section.editable = editable;
    }
    if let Some(dependencies) = &changes.dependencies {
        section.dependencies = dependencies.clone();
    }
    if let Some(parent_id) = &changes.parent_id {
        section.parent_id = Some(parent_id.clone());
    }

    next.refresh_statistics();
    Ok(next)
}

/// Assigns each listed section the order of its position in `section_ids`.
pub fn reorder_sections(material: &StudyMaterial, section_ids: &[String]) -> Result<StudyMaterial, MutationError> {
    let mut next = material.clone();
    for (order, id) in section_ids.iter().enumerate() {
        let section = next.section_mut(id).ok_or_else(|| not_found("section", id))?;
        section.order = order;
    }
    next.renumber_sections();
    Ok(next)
}

pub fn add_image(material: &StudyMaterial, new_image: &NewImage, position: usize) -> StudyMaterial {
    let mut next = material.clone();
    let image = Image {
        id: Uuid::new_v4().to_string(),
        image_type: new_image.image_type,
        source: new_image.source.clone(),
        data: new_image.data.clone(),
        metadata: new_image.metadata.clone(),
        editable: new_image.editable,
        regeneration_options: new_image.regeneration_options.clone(),
    };
    let position = position.min(next.images.len());
    next.images.insert(position, image);
    next
}

pub fn remove_image(material: &StudyMaterial, image_id: &str) -> Result<StudyMaterial, MutationError> {
    let mut next = material.clone();
    let index = next
        .images
        .iter()
        .position(|i| i.id == image_id)
        .ok_or_else(|| not_found("image", image_id))?;
    next.images.remove(index);
    Ok(next)
}

/// Records a regeneration request. The pixel data is left alone: producing it is
/// the image generator's job.
pub fn regenerate_image(
    material: &StudyMaterial,
    image_id: &str,
    request: &RegenerationRequest,
    now: DateTime<Utc>,
) -> Result<StudyMaterial, MutationError> {
    let mut next = material.clone();
    let image = next
        .image_mut(image_id)
        .ok_or_else(|| not_found("image", image_id))?;

    image.metadata.generated_at = now;
    let mut parameters = request.parameters.clone();
    if let Some(style) = &request.style {
        if parameters.is_null() {
            parameters = serde_json::json!({});
        }
        if let Some(map) = parameters.as_object_mut() {
            map.insert("style".to_string(), serde_json::Value::String(style.clone()));
        }
    }
    image.source.parameters = parameters;
    if let Some(prompt) = &request.prompt {
        image.source.prompt = Some(prompt.clone());
    }
    Ok(next)
}

fn not_found(kind: &'static str, id: &str) -> MutationError {
    MutationError::TargetNotFound {
        kind,
        id: id.to_string(),
    }
}
