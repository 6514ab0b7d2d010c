//! archscope - architecture models from source code.
//!
//! archscope parses a code base with tree-sitter and builds a structured,
//! language-agnostic model of its architecture: functions, classes, module
//! dependencies, persistence entities inferred from ORM code, architectural
//! layers and service boundaries. The model renders as Mermaid diagrams or
//! serializes to JSON.
//!
//! # Architecture
//!
//! - `parser`: supported languages and the caller-owned `ParserRegistry`
//! - `analysis`: per-language fact extraction into `FileAnalysis` records
//! - `graph`: import resolution, dependency edges, entry points, cycles
//! - `detect`: entity, layer and service detection
//! - `diagram`: Mermaid rendering
//! - `pipeline`: runs every stage and assembles an `ArchitectureModel`
//! - `config`: YAML configuration
//! - `report`: JSON and diagram output
//!
//! # Example
//!
//! ```no_run
//! use archscope::{ArchConfig, Pipeline, SourceFile, Language, RepoLayout};
//!
//! let config = ArchConfig::default();
//! let registry = config.parser_registry()?;
//! let files = vec![SourceFile::new("src/app.ts", "export function main() {}", Language::TypeScript)];
//! let model = Pipeline::new(&registry).run(&files, &RepoLayout::new("app"))?;
//! println!("{}", model.render(archscope::DiagramKind::Sequence, &config));
//! # Ok::<(), archscope::AnalysisError>(())
//! ```
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Add a `Language` variant, a
//! module exposing the five extractors, and one arm in
//! `analysis::extractors_for`.

pub mod analysis;
pub mod config;
pub mod detect;
pub mod diagram;
pub mod error;
pub mod graph;
pub mod parser;
pub mod pipeline;
pub mod report;

pub use analysis::{FileAnalysis, FileAnalyzer, SourceFile};
pub use config::ArchConfig;
pub use detect::{Entity, EntityDetector, Layer, LayerAnalysis, RepoLayout, Service, ServiceType};
pub use diagram::DiagramKind;
pub use error::{AnalysisError, ParseError};
pub use graph::{build_dependency_graph, find_entry_points, resolve_import, ModuleDependency};
pub use parser::{Language, ParsedFile, ParserRegistry};
pub use pipeline::{ArchitectureModel, Pipeline, PipelineStats};
