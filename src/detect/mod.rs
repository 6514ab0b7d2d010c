//! Detectors that run over analyzed files.
//!
//! - `entities`: persistence entities inferred from ORM constructs
//! - `layers`: architectural layer per file, and upward dependencies
//! - `services`: service boundaries from manifests and directory layout
//!
//! All detectors consume [`FileAnalysis`](crate::analysis::FileAnalysis)
//! records. Only the entity detector goes back to source, and only for
//! files that pass its candidacy check.

pub mod entities;
pub mod known;
mod layers;
pub mod manifest;
mod services;
mod types;

pub use entities::{
    default_table_name, follows_naming_convention, is_candidate, EntityDetector, OrmRegistry,
    SignalKind, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use layers::{classify_file, find_layer_violations, LayerClassifier};
pub use manifest::{Manifest, ManifestKind, RepoLayout};
pub use services::{detect_services, service_for_path};
pub use types::{
    score, Entity, EntityField, Layer, LayerAnalysis, LayerViolation, OrmFramework, Relationship,
    RelationshipKind, Service, ServiceType, Signal,
};
