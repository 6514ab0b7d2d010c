//! Phase one: decide which files are worth re-parsing.

use std::collections::HashMap;

use crate::analysis::{module_matches, FileAnalysis};
use crate::detect::known::orm_for_import;
use crate::detect::types::{OrmFramework, Signal};
use crate::parser::Language;

use super::SignalKind;

/// Directory names that hold model declarations.
const MODEL_DIRECTORIES: &[&str] = &["models", "entities", "schemas", "model", "entity"];

/// File-name segments that mark a model file (`user.entity.ts`, `models.py`).
const MODEL_SEGMENTS: &[&str] = &["model", "models", "entity", "entities", "schema", "schemas"];

/// Known ORM packages per language, plus caller-supplied additions.
#[derive(Debug, Clone, Default)]
pub struct OrmRegistry {
    extra: HashMap<Language, Vec<String>>,
}

impl OrmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `packages` as ORM imports for `language`.
    ///
    /// TypeScript, TSX and JavaScript share one package table, so additions
    /// for any of them apply to all three.
    pub fn with_extra_packages<I, S>(mut self, language: Language, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages: Vec<String> = packages.into_iter().map(Into::into).collect();
        let family: &[Language] = if language.is_ecmascript() {
            &[Language::TypeScript, Language::Tsx, Language::JavaScript]
        } else {
            std::slice::from_ref(&language)
        };
        for lang in family {
            self.extra
                .entry(*lang)
                .or_default()
                .extend(packages.iter().cloned());
        }
        self
    }

    /// Whether `source` imports an ORM for `language`.
    pub fn is_orm_import(&self, language: Language, source: &str) -> bool {
        orm_for_import(language, source).is_some()
            || self
                .extra
                .get(&language)
                .map(|pkgs| pkgs.iter().any(|p| module_matches(source, p)))
                .unwrap_or(false)
    }

    /// Frameworks named by the file's imports, in import order, deduplicated.
    pub fn imported_frameworks(&self, analysis: &FileAnalysis) -> Vec<OrmFramework> {
        let mut found = Vec::new();
        for source in analysis.import_sources() {
            if let Some(fw) = orm_for_import(analysis.language, source) {
                if !found.contains(&fw) {
                    found.push(fw);
                }
            }
        }
        found
    }
}

/// Whether `path` sits in a model directory or carries a model file-name
/// segment.
pub fn follows_naming_convention(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let mut components: Vec<&str> = normalized.split('/').filter(|c| !c.is_empty()).collect();
    let Some(file_name) = components.pop() else {
        return false;
    };

    if components
        .iter()
        .any(|dir| MODEL_DIRECTORIES.contains(&dir.to_lowercase().as_str()))
    {
        return true;
    }

    let segments: Vec<&str> = file_name.split('.').collect();
    // The last segment is the extension.
    segments.len() > 1
        && segments[..segments.len() - 1]
            .iter()
            .any(|seg| MODEL_SEGMENTS.contains(&seg.to_lowercase().as_str()))
}

/// File-level signals when `analysis` is an entity candidate, `None`
/// otherwise.
pub fn is_candidate(analysis: &FileAnalysis, orms: &OrmRegistry) -> Option<Vec<Signal>> {
    let mut signals = Vec::new();
    if analysis
        .import_sources()
        .any(|source| orms.is_orm_import(analysis.language, source))
    {
        signals.push(SignalKind::OrmImport.signal());
    }
    if follows_naming_convention(&analysis.file_path) {
        signals.push(SignalKind::NamingConvention.signal());
    }
    if signals.is_empty() {
        None
    } else {
        Some(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ImportStatement, SourceLocation};

    fn analysis_with_import(path: &str, language: Language, source: &str) -> FileAnalysis {
        let mut analysis = FileAnalysis::empty(path, language);
        analysis.imports.push(ImportStatement {
            source: source.to_string(),
            bindings: vec![],
            location: SourceLocation {
                file_path: path.to_string(),
                start_line: 1,
                end_line: 1,
                start_column: 0,
                end_column: 1,
            },
        });
        analysis
    }

    #[test]
    fn test_naming_convention() {
        assert!(follows_naming_convention("src/models/user.ts"));
        assert!(follows_naming_convention("src/user.entity.ts"));
        assert!(follows_naming_convention("app/models.py"));
        assert!(follows_naming_convention("app/schemas.py"));
        assert!(follows_naming_convention("internal/entity/task.go"));
        assert!(!follows_naming_convention("src/user.ts"));
        assert!(!follows_naming_convention("src/remodel.ts"));
        assert!(!follows_naming_convention("models"));
    }

    #[test]
    fn test_candidate_by_import() {
        let orms = OrmRegistry::new();
        let analysis = analysis_with_import("src/user.ts", Language::TypeScript, "typeorm");
        let signals = is_candidate(&analysis, &orms).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].name, "orm-import");

        let plain = analysis_with_import("src/user.ts", Language::TypeScript, "express");
        assert!(is_candidate(&plain, &orms).is_none());
    }

    #[test]
    fn test_candidate_by_name_and_import() {
        let analysis =
            analysis_with_import("app/models.py", Language::Python, "sqlalchemy.orm");
        let signals = is_candidate(&analysis, &OrmRegistry::new()).unwrap();
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn test_extra_packages() {
        let orms = OrmRegistry::new().with_extra_packages(Language::Python, ["tortoise"]);
        assert!(orms.is_orm_import(Language::Python, "tortoise.models"));
        assert!(!orms.is_orm_import(Language::Go, "tortoise"));

        let js = OrmRegistry::new().with_extra_packages(Language::TypeScript, ["objection"]);
        assert!(js.is_orm_import(Language::JavaScript, "objection"));
    }

    #[test]
    fn test_imported_frameworks() {
        let analysis = analysis_with_import("src/a.ts", Language::TypeScript, "@mikro-orm/core");
        assert_eq!(
            OrmRegistry::new().imported_frameworks(&analysis),
            vec![OrmFramework::MikroOrm]
        );
    }
}
