pub mod dependency_graph;
pub mod domain;
pub mod errors;
pub mod export;
pub mod mutator;
pub mod operations;
pub mod ports;
pub mod recovery;
pub mod service;
pub mod validation;

pub use domain::{
    HistoryEntry, Image, ImageFormat, ImageMetadata, ImageSource, ImageType, IntegrityIssue,
    MaterialMetadata, RegenerationOptions, Section, SectionType, StudyMaterial,
};
pub use errors::ModificationError;
pub use export::{ExportContent, ExportFormat, ExportMetadata, ExportOptions, ExportResult};
pub use operations::{
    ModificationRequest, NewImage, NewSection, Operation, RegenerationRequest, SectionChanges,
};
pub use ports::{DocumentStore, MaterialExporter, PortError, PortResult};
pub use recovery::{
    ErrorKind, RecoveryConfig, RecoveryContext, RecoveryHandler, RecoveryResult, StrategyKind,
};
pub use service::{ModificationService, NewMaterial};
pub use validation::{
    Severity, ValidationCode, ValidationIssue, ValidationLimits, ValidationResult, Validator,
};
