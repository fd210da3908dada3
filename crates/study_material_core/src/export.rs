//! crates/study_material_core/src/export.rs
//!
//! Value types exchanged with an external exporter (see `ports::MaterialExporter`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StudyMaterial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Html,
    Markdown,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    #[serde(default = "default_true")]
    pub include_images: bool,
    #[serde(default)]
    pub include_metadata: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExportContent {
    Text(String),
    Binary(Vec<u8>),
}

impl ExportContent {
    pub fn byte_size(&self) -> usize {
        match self {
            ExportContent::Text(text) => text.len(),
            ExportContent::Binary(bytes) => bytes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub section_count: usize,
    pub image_count: usize,
    pub byte_size: usize,
}

impl ExportMetadata {
    /// Describes an export of `material` whose rendered output is `content`.
    pub fn describe(material: &StudyMaterial, content: &ExportContent, exported_at: DateTime<Utc>) -> Self {
        Self {
            exported_at,
            section_count: material.sections.len(),
            image_count: material.images.len(),
            byte_size: content.byte_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub content: ExportContent,
    /// Derived from the material title; sanitizing it is the exporter's concern.
    pub filename: String,
    pub format: ExportFormat,
    pub metadata: ExportMetadata,
}
