//! Grammar-driven parsing of source text into concrete syntax trees.
//!
//! This module provides:
//! - `Language`: the closed set of supported source languages
//! - `ParserRegistry`: a caller-owned registry holding one tree-sitter parser
//!   per language, each guarded by its own lock
//! - `ParsedFile`: a syntax tree together with the source it was built from
//!
//! Parser construction is comparatively expensive, so a registry is built once
//! at startup and shared by reference between workers. A `tree_sitter::Parser`
//! is not `Sync`; concurrent callers parsing the same language serialize on
//! that language's lock while other languages proceed independently.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, ParseError};

/// A supported source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Java,
    Go,
}

impl Language {
    /// Every supported language, in registry order.
    pub const ALL: &'static [Language] = &[
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Go => "go",
        }
    }

    /// Detect a language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    /// Detect a language from a file path's extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
        Self::from_extension(ext)
    }

    /// Whether this language shares the JavaScript family grammar conventions.
    pub fn is_ecmascript(&self) -> bool {
        matches!(
            self,
            Language::TypeScript | Language::Tsx | Language::JavaScript
        )
    }

    pub(crate) fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "typescript" | "ts" => Ok(Language::TypeScript),
            "tsx" => Ok(Language::Tsx),
            "javascript" | "js" | "jsx" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "go" | "golang" => Ok(Language::Go),
            _ => Err(AnalysisError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// A parsed syntax tree and the source text it was built from.
pub struct ParsedFile {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub path: String,
    pub language: Language,
}

impl ParsedFile {
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Text of the named field child, if present.
    pub fn field_text(&self, node: tree_sitter::Node, field: &str) -> Option<&str> {
        node.child_by_field_name(field).map(|n| self.node_text(n))
    }

    /// Whether the tree contains ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

/// Caller-owned registry of tree-sitter parsers keyed by language.
pub struct ParserRegistry {
    parsers: HashMap<Language, Mutex<tree_sitter::Parser>>,
}

impl ParserRegistry {
    /// Build a registry covering every supported language.
    pub fn new() -> Result<Self, AnalysisError> {
        Self::with_languages(Language::ALL)
    }

    /// Build a registry restricted to the given languages.
    ///
    /// Parsing any other language through this registry fails with
    /// `AnalysisError::UnsupportedLanguage`.
    pub fn with_languages(languages: &[Language]) -> Result<Self, AnalysisError> {
        let mut parsers = HashMap::with_capacity(languages.len());
        for &language in languages {
            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&language.grammar())
                .map_err(|e| ParseError::new(language, "<registry>", e.to_string()))?;
            parsers.insert(language, Mutex::new(parser));
        }
        Ok(Self { parsers })
    }

    /// Abort any single parse that runs longer than `timeout`.
    ///
    /// A timed-out parse surfaces as a `ParseError` for that file.
    #[allow(deprecated)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let micros = timeout.as_micros().min(u64::MAX as u128) as u64;
        for parser in self.parsers.values_mut() {
            if let Ok(parser) = parser.get_mut() {
                parser.set_timeout_micros(micros);
            }
        }
        self
    }

    /// Whether this registry holds a parser for `language`.
    pub fn supports(&self, language: Language) -> bool {
        self.parsers.contains_key(&language)
    }

    /// Languages held by this registry, sorted.
    pub fn languages(&self) -> Vec<Language> {
        let mut langs: Vec<_> = self.parsers.keys().copied().collect();
        langs.sort();
        langs
    }

    /// Parse `source` as `language`.
    pub fn parse(
        &self,
        language: Language,
        path: &str,
        source: &str,
    ) -> Result<ParsedFile, AnalysisError> {
        let slot = self
            .parsers
            .get(&language)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage(language.to_string()))?;

        let tree = {
            let mut parser = slot
                .lock()
                .map_err(|_| ParseError::new(language, path, "parser lock poisoned"))?;
            let tree = parser.parse(source, None);
            if tree.is_none() {
                // A cancelled parse resumes on the next call unless reset.
                parser.reset();
            }
            tree
        };

        let tree = tree.ok_or_else(|| {
            ParseError::new(language, path, "parser produced no tree (timed out or cancelled)")
        })?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            path: path.to_string(),
            language,
        })
    }
}
