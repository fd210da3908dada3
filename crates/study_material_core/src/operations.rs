//! crates/study_material_core/src/operations.rs
//!
//! Edit operations and the request envelope that carries one into the engine.
//! Operations are immutable values: they describe a change, they are never part
//! of document state except inside history entries.

use serde::{Deserialize, Serialize};

use crate::domain::{ImageMetadata, ImageSource, ImageType, RegenerationOptions, SectionType};

/// One requested change to a study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert a new section at `position` (clamped to the valid range).
    AddSection {
        section: NewSection,
        #[serde(default)]
        position: Option<usize>,
    },

    RemoveSection { section_id: String },

    /// Shallow merge of the provided fields into an existing section.
    EditSection {
        section_id: String,
        changes: SectionChanges,
    },

    /// Full ordering of the document's current section ids.
    ReorderSections { section_ids: Vec<String> },

    AddImage {
        image: NewImage,
        #[serde(default)]
        position: Option<usize>,
    },

    RemoveImage { image_id: String },

    RegenerateImage {
        image_id: String,
        #[serde(default)]
        request: RegenerationRequest,
    },
}

impl Operation {
    /// Stable snake_case name of the operation kind, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::AddSection { .. } => "add_section",
            Operation::RemoveSection { .. } => "remove_section",
            Operation::EditSection { .. } => "edit_section",
            Operation::ReorderSections { .. } => "reorder_sections",
            Operation::AddImage { .. } => "add_image",
            Operation::RemoveImage { .. } => "remove_image",
            Operation::RegenerateImage { .. } => "regenerate_image",
        }
    }

    /// The id of the section or image the operation targets, if it targets one.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Operation::RemoveSection { section_id } | Operation::EditSection { section_id, .. } => {
                Some(section_id)
            }
            Operation::RemoveImage { image_id } | Operation::RegenerateImage { image_id, .. } => {
                Some(image_id)
            }
            Operation::AddSection { .. }
            | Operation::ReorderSections { .. }
            | Operation::AddImage { .. } => None,
        }
    }
}

/// Payload of an add-section operation. The engine assigns the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSection {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub content: String,
    #[serde(default = "default_editable")]
    pub editable: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl NewSection {
    pub fn new(section_type: SectionType, content: impl Into<String>) -> Self {
        Self {
            section_type,
            content: content.into(),
            editable: true,
            dependencies: Vec::new(),
            parent_id: None,
        }
    }

    pub fn depending_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

fn default_editable() -> bool {
    true
}

/// Field changes for an edit-section operation. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl SectionChanges {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.section_type.is_none()
            && self.editable.is_none()
            && self.dependencies.is_none()
            && self.parent_id.is_none()
    }
}

/// Payload of an add-image operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImage {
    #[serde(rename = "type")]
    pub image_type: ImageType,
    pub source: ImageSource,
    pub data: String,
    pub metadata: ImageMetadata,
    #[serde(default = "default_editable")]
    pub editable: bool,
    #[serde(default)]
    pub regeneration_options: Option<RegenerationOptions>,
}

/// Parameters for regenerating an image. The pixel data itself is produced by an
/// external generator; the engine only records what was asked for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Envelope for one mutation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationRequest {
    pub material_id: String,
    pub operation: Operation,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ModificationRequest {
    pub fn new(material_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            material_id: material_id.into(),
            operation,
            actor_id: None,
            session_id: None,
        }
    }

    pub fn by_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}
