//! Core types for detection results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::SourceLocation;

/// A named piece of evidence and the weight it contributes to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub name: String,
    pub weight: f64,
}

impl Signal {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Sum signal weights, clamped to [0, 1].
pub fn score(signals: &[Signal]) -> f64 {
    signals.iter().map(|s| s.weight).sum::<f64>().clamp(0.0, 1.0)
}

/// Object-relational mapping frameworks recognized by the entity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrmFramework {
    #[serde(rename = "typeorm")]
    TypeOrm,
    MikroOrm,
    SequelizeTypescript,
    Sequelize,
    Mongoose,
    #[serde(rename = "sqlalchemy")]
    SqlAlchemy,
    Django,
    #[serde(rename = "sqlmodel")]
    SqlModel,
    Peewee,
    Jpa,
    Gorm,
}

impl OrmFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrmFramework::TypeOrm => "typeorm",
            OrmFramework::MikroOrm => "mikro-orm",
            OrmFramework::SequelizeTypescript => "sequelize-typescript",
            OrmFramework::Sequelize => "sequelize",
            OrmFramework::Mongoose => "mongoose",
            OrmFramework::SqlAlchemy => "sqlalchemy",
            OrmFramework::Django => "django",
            OrmFramework::SqlModel => "sqlmodel",
            OrmFramework::Peewee => "peewee",
            OrmFramework::Jpa => "jpa",
            OrmFramework::Gorm => "gorm",
        }
    }
}

impl fmt::Display for OrmFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    #[serde(default)]
    pub is_nullable: bool,
}

impl EntityField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            is_primary_key: false,
            is_unique: false,
            is_nullable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub kind: RelationshipKind,
    /// Target entity, by name.
    pub target: String,
    /// Field on the owning entity that carries the relationship.
    pub field: String,
}

/// A persistence-layer entity inferred from ORM constructs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    /// Owning service, filled in once services are known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub table_name: String,
    pub framework: OrmFramework,
    pub fields: Vec<EntityField>,
    pub relationships: Vec<Relationship>,
    pub confidence: f64,
    pub detection_signals: Vec<Signal>,
    pub file_path: String,
    pub location: SourceLocation,
}

impl Entity {
    pub fn primary_keys(&self) -> impl Iterator<Item = &EntityField> {
        self.fields.iter().filter(|f| f.is_primary_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    ApiServer,
    Worker,
    Frontend,
    Library,
    Cli,
    Unknown,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ApiServer => "api-server",
            ServiceType::Worker => "worker",
            ServiceType::Frontend => "frontend",
            ServiceType::Library => "library",
            ServiceType::Cli => "cli",
            ServiceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable unit of the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub service_type: ServiceType,
    /// The framework that decided the classification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Service root, relative to the repository root (`""` for the root).
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    pub files: Vec<String>,
    /// Declared package dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Presentation,
    Business,
    Data,
    Infrastructure,
    External,
    Unknown,
}

impl Layer {
    /// Tie-break order when two layers receive the same vote.
    pub const PRIORITY: &'static [Layer] = &[
        Layer::Presentation,
        Layer::Business,
        Layer::Data,
        Layer::Infrastructure,
        Layer::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Presentation => "presentation",
            Layer::Business => "business",
            Layer::Data => "data",
            Layer::Infrastructure => "infrastructure",
            Layer::External => "external",
            Layer::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "presentation" => Ok(Layer::Presentation),
            "business" => Ok(Layer::Business),
            "data" => Ok(Layer::Data),
            "infrastructure" => Ok(Layer::Infrastructure),
            "external" => Ok(Layer::External),
            "unknown" => Ok(Layer::Unknown),
            _ => Err(format!("unknown layer: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerAnalysis {
    pub file_path: String,
    pub layer: Layer,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// A dependency edge pointing from a lower layer to a higher one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerViolation {
    pub source: String,
    pub target: String,
    pub source_layer: Layer,
    pub target_layer: Layer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamps() {
        let signals = vec![
            Signal::new("orm-import", 0.3),
            Signal::new("entity-decorator", 0.4),
            Signal::new("base-class", 0.4),
        ];
        assert_eq!(score(&signals), 1.0);
        assert_eq!(score(&[Signal::new("validation-base", -0.4)]), 0.0);
        assert!((score(&[Signal::new("a", 0.3), Signal::new("b", 0.2)]) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&RelationshipKind::OneToMany).unwrap(),
            "\"oneToMany\""
        );
        assert_eq!(serde_json::to_string(&ServiceType::ApiServer).unwrap(), "\"api-server\"");
        assert_eq!(serde_json::to_string(&OrmFramework::MikroOrm).unwrap(), "\"mikro-orm\"");
        assert_eq!(serde_json::to_string(&OrmFramework::TypeOrm).unwrap(), "\"typeorm\"");
        assert_eq!("Data".parse::<Layer>().unwrap(), Layer::Data);
    }
}
