//! Error types for parsing and analysis.

use std::path::PathBuf;

use thiserror::Error;

use crate::parser::Language;

/// A source file could not be turned into a syntax tree.
///
/// Parse errors are per-file and recoverable: the pipeline logs the file and
/// moves on to the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse {language} source {path}: {cause}")]
pub struct ParseError {
    pub language: Language,
    pub path: String,
    pub cause: String,
}

impl ParseError {
    pub fn new(language: Language, path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            language,
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// Errors surfaced by the analysis core.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A language tag outside the supported set was requested.
    ///
    /// This is a caller configuration error and is never swallowed.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Whether this error only affects a single file and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalysisError::Parse(_) | AnalysisError::Io { .. })
    }
}

impl From<serde_yaml::Error> for AnalysisError {
    fn from(err: serde_yaml::Error) -> Self {
        AnalysisError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_language() {
        let err = ParseError::new(Language::Python, "app.py", "timed out");
        let msg = err.to_string();
        assert!(msg.contains("python"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_recoverability() {
        let parse: AnalysisError = ParseError::new(Language::Go, "main.go", "boom").into();
        assert!(parse.is_recoverable());
        assert!(!AnalysisError::UnsupportedLanguage("cobol".into()).is_recoverable());
    }
}
