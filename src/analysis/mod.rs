//! Syntax-tree fact extraction.
//!
//! This module turns parsed source files into language-agnostic facts:
//! functions, classes, imports, exports and calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ SourceFile      │────▶│ ParserRegistry────▶│ ParsedFile    │
//! └─────────────────┘     └──────────────┘     └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ FileAnalysis │◀────│ ExtractorSet  │
//!                         │ (facts)      │     │ (per language)│
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Add a `Language` variant and its grammar in `parser`
//! 2. Create a module in `src/analysis/languages/` exposing the five
//!    `extract_*` functions
//! 3. Add one arm to `extractors::extractors_for`

mod analyzer;
pub mod extractors;
mod facts;
pub mod languages;
pub mod node;

pub use analyzer::{analyze_parsed, AnalysisRun, FileAnalyzer, SourceFile};
pub use extractors::{
    extract_classes, extract_exports, extract_functions, extract_imports, extractors_for,
    extractors_for_tag, ExtractorSet, LocalSymbols,
};
pub use facts::{
    module_matches, CallExpression, ClassDefinition, ClassKind, ExportStatement, FileAnalysis,
    FunctionDefinition, ImportBinding, ImportStatement, MethodDefinition, Parameter,
    PropertyDefinition, SourceLocation, Visibility, ANONYMOUS, MODULE_SCOPE,
};
