//! Per-file analysis: parse once, run every extractor, bundle the facts.
//!
//! Files are independent, so a batch is analyzed in parallel with rayon. The
//! only shared state is the `ParserRegistry`, which serializes per language.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::extractors::{extractors_for, LocalSymbols};
use crate::analysis::facts::FileAnalysis;
use crate::error::AnalysisError;
use crate::parser::{Language, ParsedFile, ParserRegistry};

/// One input file: path, full text, and language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub source: String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            language,
        }
    }

    /// Build from a textual language tag.
    ///
    /// Fails with `AnalysisError::UnsupportedLanguage` for unknown tags.
    pub fn with_tag(
        path: impl Into<String>,
        source: impl Into<String>,
        tag: &str,
    ) -> Result<Self, AnalysisError> {
        Ok(Self::new(path, source, tag.parse()?))
    }

    /// Read a file from disk, detecting its language from the extension.
    ///
    /// Returns `Ok(None)` for files in no supported language.
    pub fn read(root: &Path, relative: &str) -> Result<Option<Self>, AnalysisError> {
        let Some(language) = Language::from_path(relative) else {
            return Ok(None);
        };
        let full = root.join(relative);
        let source = std::fs::read_to_string(&full).map_err(|source| AnalysisError::Io {
            path: full.clone(),
            source,
        })?;
        Ok(Some(Self::new(relative, source, language)))
    }
}

/// Runs the extractor table for each file against a shared registry.
pub struct FileAnalyzer<'r> {
    registry: &'r ParserRegistry,
}

impl<'r> FileAnalyzer<'r> {
    pub fn new(registry: &'r ParserRegistry) -> Self {
        Self { registry }
    }

    /// Parse and extract facts from one file.
    pub fn analyze(&self, file: &SourceFile) -> Result<FileAnalysis, AnalysisError> {
        let parsed = self.registry.parse(file.language, &file.path, &file.source)?;
        let analysis = analyze_parsed(&parsed);
        debug!(
            path = %file.path,
            functions = analysis.functions.len(),
            classes = analysis.classes.len(),
            imports = analysis.imports.len(),
            calls = analysis.calls.len(),
            syntax_errors = analysis.has_syntax_errors,
            "extracted facts"
        );
        Ok(analysis)
    }

    /// Analyze a batch in parallel.
    ///
    /// Files that fail to parse are logged and skipped; an unsupported
    /// language is a configuration error and aborts the batch.
    pub fn analyze_all(&self, files: &[SourceFile]) -> Result<AnalysisRun, AnalysisError> {
        let results: Vec<Result<FileAnalysis, AnalysisError>> =
            files.par_iter().map(|f| self.analyze(f)).collect();

        let mut run = AnalysisRun {
            attempted: files.len(),
            ..Default::default()
        };
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(analysis) => run.analyses.push(analysis),
                Err(e) if e.is_recoverable() => {
                    warn!(path = %file.path, error = %e, "skipping file");
                    run.failed.push(file.path.clone());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            attempted = run.attempted,
            analyzed = run.analyses.len(),
            failed = run.failed.len(),
            "file analysis complete"
        );
        Ok(run)
    }
}

/// Run every extractor for the file's language over an existing tree.
pub fn analyze_parsed(parsed: &ParsedFile) -> FileAnalysis {
    let extractors = extractors_for(parsed.language);
    let functions = (extractors.functions)(parsed);
    let classes = (extractors.classes)(parsed);
    let imports = (extractors.imports)(parsed);
    let exports = (extractors.exports)(parsed);
    let symbols = LocalSymbols::new(&functions, &classes);
    let calls = (extractors.calls)(parsed, &symbols);

    FileAnalysis {
        file_path: parsed.path.clone(),
        language: parsed.language,
        functions,
        classes,
        imports,
        exports,
        calls,
        has_syntax_errors: parsed.has_errors(),
    }
}

/// Outcome of a batch analysis, in input order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub analyses: Vec<FileAnalysis>,
    pub attempted: usize,
    /// Paths of files skipped after a recoverable failure.
    pub failed: Vec<String>,
}

impl AnalysisRun {
    pub fn analyzed(&self) -> usize {
        self.analyses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_single_file() {
        let registry = ParserRegistry::new().unwrap();
        let analyzer = FileAnalyzer::new(&registry);
        let file = SourceFile::new(
            "src/user.ts",
            "import { Repo } from './repo';\nexport class User { save() { this.validate(); } validate() {} }\n",
            Language::TypeScript,
        );
        let analysis = analyzer.analyze(&file).unwrap();
        assert_eq!(analysis.file_path, "src/user.ts");
        assert_eq!(analysis.classes.len(), 1);
        assert_eq!(analysis.imports[0].source, "./repo");
        assert_eq!(analysis.calls[0].resolved_callee.as_deref(), Some("User.validate"));
        assert!(!analysis.has_syntax_errors);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = SourceFile::with_tag("a.rb", "puts 1", "ruby").unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let registry = ParserRegistry::new().unwrap();
        let analyzer = FileAnalyzer::new(&registry);
        let files: Vec<_> = (0..8)
            .map(|i| {
                SourceFile::new(
                    format!("pkg/f{}.py", i),
                    format!("def f{}():\n    pass\n", i),
                    Language::Python,
                )
            })
            .collect();
        let run = analyzer.analyze_all(&files).unwrap();
        assert_eq!(run.attempted, 8);
        assert_eq!(run.analyzed(), 8);
        assert!(run.failed.is_empty());
        for (i, analysis) in run.analyses.iter().enumerate() {
            assert_eq!(analysis.file_path, format!("pkg/f{}.py", i));
        }
    }

    #[test]
    fn test_unsupported_registry_language_aborts_batch() {
        let registry = ParserRegistry::with_languages(&[Language::Python]).unwrap();
        let analyzer = FileAnalyzer::new(&registry);
        let files = vec![SourceFile::new("main.go", "package main", Language::Go)];
        assert!(matches!(
            analyzer.analyze_all(&files),
            Err(AnalysisError::UnsupportedLanguage(_))
        ));
    }
}
