//! Analysis configuration.
//!
//! Every field is optional; an empty document yields [`ArchConfig::default`].
//!
//! ```yaml
//! entity_confidence_threshold: 0.6
//! include_private: true
//! sequence_max_depth: 4
//! extra_orm_packages:
//!   python: ["tortoise"]
//! layer_overrides:
//!   data: ["store"]
//! excluded_paths: ["**/fixtures/**"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detect::{Layer, OrmRegistry, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::diagram::{ClassDiagramOptions, SequenceDiagramOptions, DEFAULT_MAX_DEPTH};
use crate::error::AnalysisError;
use crate::parser::{Language, ParserRegistry};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchConfig {
    /// Entities scoring below this are omitted.
    pub entity_confidence_threshold: f64,
    /// Render private members in class diagrams.
    pub include_private: bool,
    /// Draw edges to supertypes outside the analyzed files.
    pub show_external_types: bool,
    pub sequence_max_depth: usize,
    /// Per-parse timeout in milliseconds; 0 disables it.
    pub parse_timeout_ms: u64,
    /// Packages treated as ORM imports, per language.
    pub extra_orm_packages: BTreeMap<Language, Vec<String>>,
    /// Extra directory names per layer.
    pub layer_overrides: BTreeMap<Layer, Vec<String>>,
    /// Glob patterns for files to leave out of the analysis.
    pub excluded_paths: Vec<String>,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            entity_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            include_private: false,
            show_external_types: false,
            sequence_max_depth: DEFAULT_MAX_DEPTH,
            parse_timeout_ms: 0,
            extra_orm_packages: BTreeMap::new(),
            layer_overrides: BTreeMap::new(),
            excluded_paths: Vec::new(),
        }
    }
}

impl ArchConfig {
    /// Parse and validate a configuration file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_yaml_str(content: &str) -> Result<Self, AnalysisError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ArchConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let threshold = self.entity_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalysisError::Config(format!(
                "entity_confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        for pattern in &self.excluded_paths {
            globset::Glob::new(pattern).map_err(|err| {
                AnalysisError::Config(format!("invalid excluded path '{}': {}", pattern, err))
            })?;
        }
        Ok(())
    }

    pub fn parse_timeout(&self) -> Option<Duration> {
        (self.parse_timeout_ms > 0).then(|| Duration::from_millis(self.parse_timeout_ms))
    }

    /// A registry for every supported language, with the configured timeout.
    pub fn parser_registry(&self) -> Result<ParserRegistry, AnalysisError> {
        let registry = ParserRegistry::new()?;
        Ok(match self.parse_timeout() {
            Some(timeout) => registry.with_timeout(timeout),
            None => registry,
        })
    }

    pub fn orm_registry(&self) -> OrmRegistry {
        self.extra_orm_packages
            .iter()
            .fold(OrmRegistry::new(), |registry, (language, packages)| {
                registry.with_extra_packages(*language, packages.iter().cloned())
            })
    }

    pub fn class_diagram_options(&self) -> ClassDiagramOptions {
        ClassDiagramOptions {
            include_private: self.include_private,
            show_external: self.show_external_types,
        }
    }

    pub fn sequence_diagram_options(&self) -> SequenceDiagramOptions {
        SequenceDiagramOptions {
            max_depth: self.sequence_max_depth,
        }
    }

    /// Whether `path` matches one of `excluded_paths`.
    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|pattern| {
            globset::Glob::new(pattern)
                .map(|glob| glob.compile_matcher().is_match(path))
                .unwrap_or(false)
        })
    }
}
