//! Canonical fact structures extracted from syntax trees.
//!
//! These records are language-agnostic: every extractor, whatever grammar it
//! walks, emits the same shapes. Field names serialize in camelCase and form
//! a stable interchange surface for downstream tooling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::Language;

/// Location of a fact in its originating file.
///
/// Lines are 1-based, columns 0-based (tree-sitter byte columns).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl SourceLocation {
    /// Create a location from a tree-sitter node.
    pub fn from_node(file_path: &str, node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            file_path: file_path.to_string(),
            start_line: start.row + 1,
            end_line: end.row + 1,
            start_column: start.column,
            end_column: end.column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.start_line, self.start_column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            is_optional: false,
            default_value: None,
        }
    }
}

/// A function, free-standing or as the core of a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub name: String,
    /// `Class.method` for methods, the plain name otherwise.
    pub qualified_name: String,
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub is_exported: bool,
    pub is_async: bool,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
}

impl FunctionDefinition {
    /// Rebind this function as a member of `class_name`.
    pub fn qualify(mut self, class_name: &str) -> Self {
        self.qualified_name = format!("{}.{}", class_name, self.name);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }

    /// Parse a visibility keyword; unknown text is `None`.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.trim() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method: a function owned by a class, plus member modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDefinition {
    #[serde(flatten)]
    pub function: FunctionDefinition,
    pub visibility: Visibility,
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
}

impl MethodDefinition {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    #[serde(default)]
    pub is_optional: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Type,
}

impl ClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::Type => "type",
        }
    }
}

/// A class-like declaration: class, interface, enum, or type alias.
///
/// Supertypes and implemented interfaces are stored by name and resolved
/// lazily, so cyclic hierarchies never produce cyclic storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    #[serde(default)]
    pub is_exported: bool,
    pub methods: Vec<MethodDefinition>,
    pub properties: Vec<PropertyDefinition>,
    pub extends_from: Vec<String>,
    pub implements: Vec<String>,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>, kind: ClassKind, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            kind,
            is_abstract: false,
            is_exported: false,
            methods: Vec::new(),
            properties: Vec::new(),
            extends_from: Vec::new(),
            implements: Vec::new(),
            location,
            doc_comment: None,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods.iter().find(|m| m.function.name == name)
    }
}

/// One name bound by an import or export statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_namespace: bool,
}

impl ImportBinding {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            is_default: false,
            is_namespace: false,
        }
    }

    pub fn default_import(name: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::named(name)
        }
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            is_namespace: true,
            ..Self::named(name)
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// The name this binding is visible under locally.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatement {
    /// Module specifier as written (`./user`, `express`, `..models`).
    pub source: String,
    pub bindings: Vec<ImportBinding>,
    pub location: SourceLocation,
}

impl ImportStatement {
    /// Whether the specifier is relative to the importing file.
    pub fn is_relative(&self) -> bool {
        self.source.starts_with('.')
    }

    pub fn binding_names(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStatement {
    /// Re-export source (`export * from './x'`); `None` for local exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub bindings: Vec<ImportBinding>,
    pub location: SourceLocation,
}

/// A call site. Best-effort: dynamic dispatch is not resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExpression {
    /// Qualified name of the enclosing function, `<module>` at top level.
    pub caller: String,
    pub callee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_callee: Option<String>,
    pub arguments: Vec<String>,
    pub location: SourceLocation,
}

/// Caller name used for calls outside any function body.
pub const MODULE_SCOPE: &str = "<module>";

/// Name given to functions without a declared identifier.
pub const ANONYMOUS: &str = "anonymous";

/// All facts extracted from a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub file_path: String,
    pub language: Language,
    pub functions: Vec<FunctionDefinition>,
    pub classes: Vec<ClassDefinition>,
    pub imports: Vec<ImportStatement>,
    pub exports: Vec<ExportStatement>,
    #[serde(default)]
    pub calls: Vec<CallExpression>,
    #[serde(default)]
    pub has_syntax_errors: bool,
}

impl FileAnalysis {
    /// Create empty analysis for a file.
    pub fn empty(file_path: &str, language: Language) -> Self {
        Self {
            file_path: file_path.to_string(),
            language,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
            has_syntax_errors: false,
        }
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_class(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn exported_functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.functions.iter().filter(|f| f.is_exported)
    }

    /// Import module specifiers, in source order.
    pub fn import_sources(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(|i| i.source.as_str())
    }

    /// Whether this file imports from `package` or one of its submodules.
    pub fn imports_package(&self, package: &str) -> bool {
        self.import_sources()
            .any(|src| module_matches(src, package))
    }

    /// Whether anything in this file is exported.
    pub fn has_exports(&self) -> bool {
        !self.exports.is_empty()
            || self.functions.iter().any(|f| f.is_exported)
            || self.classes.iter().any(|c| c.is_exported)
    }
}

/// Whether module specifier `source` names `package` or a submodule of it.
///
/// Handles `/` (npm, Go), `.` (Python, Java) and `:` (node builtins) separators.
pub fn module_matches(source: &str, package: &str) -> bool {
    if source == package {
        return true;
    }
    match source.strip_prefix(package) {
        Some(rest) => rest.starts_with('/') || rest.starts_with('.'),
        None => source
            .strip_prefix("node:")
            .map(|s| s == package)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation {
            file_path: "a.ts".to_string(),
            start_line: 1,
            end_line: 1,
            start_column: 0,
            end_column: 10,
        }
    }

    #[test]
    fn test_qualify() {
        let f = FunctionDefinition {
            name: "save".to_string(),
            qualified_name: "save".to_string(),
            parameters: vec![],
            return_type: None,
            is_exported: false,
            is_async: false,
            location: loc(),
            doc_comment: None,
        };
        assert_eq!(f.qualify("UserRepository").qualified_name, "UserRepository.save");
    }

    #[test]
    fn test_module_matches() {
        assert!(module_matches("typeorm", "typeorm"));
        assert!(module_matches("sqlalchemy.orm", "sqlalchemy"));
        assert!(module_matches("gorm.io/gorm", "gorm.io/gorm"));
        assert!(module_matches("@nestjs/common/decorators", "@nestjs/common"));
        assert!(module_matches("javax.persistence.Entity", "javax.persistence"));
        assert!(module_matches("node:fs", "fs"));
        assert!(!module_matches("typeorm-extension", "typeorm"));
    }

    #[test]
    fn test_method_serializes_flat() {
        let method = MethodDefinition {
            function: FunctionDefinition {
                name: "getName".to_string(),
                qualified_name: "IUser.getName".to_string(),
                parameters: vec![],
                return_type: Some("string".to_string()),
                is_exported: true,
                is_async: false,
                location: loc(),
                doc_comment: None,
            },
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
        };
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["name"], "getName");
        assert_eq!(json["qualifiedName"], "IUser.getName");
        assert_eq!(json["returnType"], "string");
        assert_eq!(json["visibility"], "public");
        assert_eq!(json["isStatic"], false);
        assert_eq!(json["location"]["startLine"], 1);
    }

    #[test]
    fn test_binding_local_name() {
        let b = ImportBinding::named("Router").with_alias(Some("R".to_string()));
        assert_eq!(b.local_name(), "R");
        assert_eq!(ImportBinding::named("x").local_name(), "x");
    }
}
