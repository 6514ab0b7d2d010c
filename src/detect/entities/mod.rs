//! Persistence-entity detection.
//!
//! Detection runs in two phases per file:
//!
//! 1. **Candidacy** (`is_candidate`): cheap checks over the file's facts. A
//!    file qualifies when it imports a known ORM package or its path follows a
//!    model naming convention. Everything else is skipped without parsing.
//! 2. **Extraction**: the candidate source is re-parsed through the caller's
//!    `ParserRegistry` so the per-language detectors can see decorators,
//!    annotations, struct tags and call arguments that the canonical facts do
//!    not carry.
//!
//! Every structural hint found along the way is recorded as a weighted
//! `Signal`; the entity's confidence is the clamped sum, and drafts below the
//! acceptance threshold are dropped.

mod candidate;
mod go;
mod java;
pub mod naming;
mod python;
mod typescript;

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{FileAnalysis, SourceFile, SourceLocation};
use crate::detect::types::{score, Entity, EntityField, OrmFramework, Relationship, Signal};
use crate::error::AnalysisError;
use crate::parser::{Language, ParserRegistry};

pub use candidate::{follows_naming_convention, is_candidate, OrmRegistry};
pub use naming::default_table_name;

/// Default acceptance threshold for entity confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// The kinds of evidence that contribute to an entity's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    OrmImport,
    EntityMarker,
    OrmBaseClass,
    TableName,
    ColumnMarkers,
    PrimaryKey,
    Relationships,
    NamingConvention,
    ValidationBase,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::OrmImport => "orm-import",
            SignalKind::EntityMarker => "entity-marker",
            SignalKind::OrmBaseClass => "orm-base-class",
            SignalKind::TableName => "table-name",
            SignalKind::ColumnMarkers => "column-markers",
            SignalKind::PrimaryKey => "primary-key",
            SignalKind::Relationships => "relationships",
            SignalKind::NamingConvention => "naming-convention",
            SignalKind::ValidationBase => "validation-base",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            SignalKind::OrmImport => 0.3,
            SignalKind::EntityMarker => 0.4,
            SignalKind::OrmBaseClass => 0.4,
            SignalKind::TableName => 0.2,
            SignalKind::ColumnMarkers => 0.3,
            SignalKind::PrimaryKey => 0.1,
            SignalKind::Relationships => 0.1,
            SignalKind::NamingConvention => 0.1,
            SignalKind::ValidationBase => -0.4,
        }
    }

    pub fn signal(self) -> Signal {
        Signal::new(self.name(), self.weight())
    }

    /// Whether this kind alone shows that a declaration is ORM-mapped.
    fn is_structural(self) -> bool {
        matches!(
            self,
            SignalKind::EntityMarker
                | SignalKind::OrmBaseClass
                | SignalKind::TableName
                | SignalKind::ColumnMarkers
        )
    }
}

/// An entity as seen by a language detector, before scoring.
#[derive(Debug, Clone)]
pub(crate) struct EntityDraft {
    pub name: String,
    pub framework: Option<OrmFramework>,
    pub table_name: Option<String>,
    pub fields: Vec<EntityField>,
    pub relationships: Vec<Relationship>,
    pub signals: Vec<SignalKind>,
    pub location: SourceLocation,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            framework: None,
            table_name: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            signals: Vec::new(),
            location,
        }
    }

    pub fn mark(&mut self, kind: SignalKind) {
        if !self.signals.contains(&kind) {
            self.signals.push(kind);
        }
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        let table = table.into();
        if !table.is_empty() {
            self.table_name = Some(table);
            self.mark(SignalKind::TableName);
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    fn is_structural(&self) -> bool {
        self.signals.iter().any(|s| s.is_structural())
    }
}

/// Framework assumed when neither imports nor constructs name one.
fn default_framework(language: Language) -> OrmFramework {
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => OrmFramework::TypeOrm,
        Language::Python => OrmFramework::SqlAlchemy,
        Language::Java => OrmFramework::Jpa,
        Language::Go => OrmFramework::Gorm,
    }
}

/// Detects ORM entities in analyzed files.
pub struct EntityDetector<'r> {
    registry: &'r ParserRegistry,
    orms: OrmRegistry,
    threshold: f64,
}

impl<'r> EntityDetector<'r> {
    pub fn new(registry: &'r ParserRegistry) -> Self {
        Self {
            registry,
            orms: OrmRegistry::default(),
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Accept only entities scoring at least `threshold`.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_orm_registry(mut self, orms: OrmRegistry) -> Self {
        self.orms = orms;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Detect entities in one file.
    ///
    /// Non-candidates return an empty list without touching the parser.
    pub fn detect_file(
        &self,
        analysis: &FileAnalysis,
        source: &str,
    ) -> Result<Vec<Entity>, AnalysisError> {
        let Some(file_signals) = is_candidate(analysis, &self.orms) else {
            return Ok(Vec::new());
        };

        let parsed = self
            .registry
            .parse(analysis.language, &analysis.file_path, source)?;

        let drafts = match analysis.language {
            Language::TypeScript | Language::Tsx | Language::JavaScript => {
                typescript::detect(&parsed)
            }
            Language::Python => python::detect(&parsed),
            Language::Java => java::detect(&parsed),
            Language::Go => go::detect(&parsed),
        };

        let imported = self.orms.imported_frameworks(analysis);
        let mut entities = Vec::new();
        for draft in drafts {
            if !draft.is_structural() {
                continue;
            }
            let entity = self.finish(draft, analysis, &file_signals, &imported);
            if entity.confidence < self.threshold {
                debug!(
                    entity = %entity.name,
                    file = %analysis.file_path,
                    confidence = entity.confidence,
                    "rejected entity candidate"
                );
                continue;
            }
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Detect entities across every analyzed file.
    ///
    /// `sources` supplies the text of each analyzed file. Files that fail to
    /// re-parse are logged and skipped. Results are ordered by file, then by
    /// position.
    pub fn detect_all(&self, analyses: &[FileAnalysis], sources: &[SourceFile]) -> Vec<Entity> {
        let by_path: HashMap<&str, &SourceFile> =
            sources.iter().map(|s| (s.path.as_str(), s)).collect();

        let mut entities: Vec<Entity> = analyses
            .par_iter()
            .flat_map_iter(|analysis| {
                let Some(source) = by_path.get(analysis.file_path.as_str()) else {
                    return Vec::new();
                };
                match self.detect_file(analysis, &source.source) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(file = %analysis.file_path, error = %err, "skipping entity detection");
                        Vec::new()
                    }
                }
            })
            .collect();

        entities.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.location.start_line.cmp(&b.location.start_line))
        });
        info!(entities = entities.len(), "entity detection complete");
        entities
    }

    fn finish(
        &self,
        mut draft: EntityDraft,
        analysis: &FileAnalysis,
        file_signals: &[Signal],
        imported: &[OrmFramework],
    ) -> Entity {
        if draft.fields.iter().any(|f| f.is_primary_key) {
            draft.mark(SignalKind::PrimaryKey);
        }
        if !draft.relationships.is_empty() {
            draft.mark(SignalKind::Relationships);
        }

        let mut signals = file_signals.to_vec();
        signals.extend(draft.signals.iter().map(|k| k.signal()));

        let framework = draft
            .framework
            .or_else(|| imported.first().copied())
            .unwrap_or_else(|| default_framework(analysis.language));
        let table_name = draft
            .table_name
            .unwrap_or_else(|| default_table_name(&draft.name));

        Entity {
            confidence: score(&signals),
            name: draft.name,
            service: None,
            table_name,
            framework,
            fields: draft.fields,
            relationships: draft.relationships,
            detection_signals: signals,
            file_path: analysis.file_path.clone(),
            location: draft.location,
        }
    }
}

/// Shared test driver: analyze `source` at `path`, then detect entities.
#[cfg(test)]
pub(crate) fn detect_source(path: &str, source: &str, language: Language) -> Vec<Entity> {
    let registry = ParserRegistry::new().unwrap();
    let parsed = registry.parse(language, path, source).unwrap();
    let analysis = crate::analysis::analyze_parsed(&parsed);
    EntityDetector::new(&registry)
        .detect_file(&analysis, source)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::RelationshipKind;

    #[test]
    fn test_non_candidate_skipped() {
        let source = r#"
export class User {
  @Column() name: string;
}
"#;
        assert!(detect_source("src/user.ts", source, Language::TypeScript).is_empty());
    }

    #[test]
    fn test_decorated_class_under_orm_import() {
        let source = r#"
import { Column, PrimaryKey, OneToMany } from 'typeorm';

export class User {
  @PrimaryKey() id: number;
  @Column() name: string;
  @OneToMany(Task) tasks: Task[];
}
"#;
        let entities = detect_source("src/user.ts", source, Language::TypeScript);
        assert_eq!(entities.len(), 1);
        let user = &entities[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.table_name, "users");
        assert_eq!(user.relationships.len(), 1);
        assert_eq!(user.relationships[0].kind, RelationshipKind::OneToMany);
        assert_eq!(user.relationships[0].target, "Task");
        let pks: Vec<&str> = user.primary_keys().map(|f| f.name.as_str()).collect();
        assert_eq!(pks, vec!["id"]);
        assert!(user.confidence >= DEFAULT_CONFIDENCE_THRESHOLD);
        assert!(user
            .detection_signals
            .iter()
            .any(|s| s.name == SignalKind::OrmImport.name()));
    }

    #[test]
    fn test_threshold_rejects_weak_candidates() {
        let source = r#"
import { Column } from 'typeorm';

export class Note {
  @Column() body: string;
}
"#;
        let registry = ParserRegistry::new().unwrap();
        let parsed = registry.parse(Language::TypeScript, "src/note.ts", source).unwrap();
        let analysis = crate::analysis::analyze_parsed(&parsed);

        let lenient = EntityDetector::new(&registry);
        assert_eq!(lenient.detect_file(&analysis, source).unwrap().len(), 1);

        let strict = EntityDetector::new(&registry).with_threshold(0.9);
        assert!(strict.detect_file(&analysis, source).unwrap().is_empty());
    }

    #[test]
    fn test_validation_schema_rejected() {
        let source = r#"
from pydantic import BaseModel

class TaskCreate(BaseModel):
    title: str
"#;
        assert!(detect_source("app/schemas.py", source, Language::Python).is_empty());
    }

    #[test]
    fn test_detect_all_orders_by_file() {
        let registry = ParserRegistry::new().unwrap();
        let files = vec![
            SourceFile::new(
                "b/models.py",
                "from sqlalchemy import Column, Integer\nfrom .db import Base\n\nclass B(Base):\n    __tablename__ = 'b'\n    id = Column(Integer, primary_key=True)\n",
                Language::Python,
            ),
            SourceFile::new(
                "a/models.py",
                "from sqlalchemy import Column, Integer\nfrom .db import Base\n\nclass A(Base):\n    id = Column(Integer, primary_key=True)\n",
                Language::Python,
            ),
        ];
        let run = crate::analysis::FileAnalyzer::new(&registry)
            .analyze_all(&files)
            .unwrap();
        let entities = EntityDetector::new(&registry).detect_all(&run.analyses, &files);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(entities[1].table_name, "b");
        assert_eq!(entities[0].framework, OrmFramework::SqlAlchemy);
    }

    #[test]
    fn test_signal_weights() {
        assert_eq!(SignalKind::ValidationBase.weight(), -0.4);
        assert_eq!(SignalKind::EntityMarker.signal().name, "entity-marker");
    }
}
