//! Python fact extraction using tree-sitter.
//!
//! Python has no export keyword. A module-level name is exported when it does
//! not start with an underscore, narrowed to the `__all__` list when the
//! module declares one.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::extractors::{argument_snippet, LocalSymbols, RawCall};
use crate::analysis::facts::{
    CallExpression, ClassDefinition, ClassKind, ExportStatement, FunctionDefinition,
    ImportBinding, ImportStatement, MethodDefinition, Parameter, PropertyDefinition,
    SourceLocation, Visibility, MODULE_SCOPE,
};
use crate::analysis::node::{clean_docstring, find_ancestor, has_token, named_children, walk_tree};
use crate::parser::{Language, ParsedFile};

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
; import a, b as c
(import_statement) @import

; from x import y
(import_from_statement) @import_from
"#;

static IMPORTS: Lazy<Option<Query>> = Lazy::new(|| {
    match Query::new(&Language::Python.grammar(), IMPORT_QUERY) {
        Ok(query) => Some(query),
        Err(e) => {
            tracing::warn!(error = %e, "failed to compile python import query");
            None
        }
    }
});

const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];
const PROTOCOL_BASES: &[&str] = &["Protocol"];
const ABSTRACT_BASES: &[&str] = &["ABC"];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn text(parsed: &ParsedFile, node: Node) -> String {
    parsed.node_text(node).to_string()
}

/// Last segment of a dotted name: `enum.Enum` -> `Enum`.
fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

// =============================================================================
// Module structure
// =============================================================================

/// The node that occupies the definition's slot in its parent block: the
/// `decorated_definition` wrapper if there is one.
fn outer_definition(node: Node) -> Node {
    match node.parent() {
        Some(p) if p.kind() == "decorated_definition" => p,
        _ => node,
    }
}

fn is_module_level(node: Node) -> bool {
    outer_definition(node)
        .parent()
        .map(|p| p.kind() == "module")
        .unwrap_or(false)
}

/// The class whose body directly contains this definition.
fn owning_class(node: Node) -> Option<Node> {
    let block = outer_definition(node).parent()?;
    if block.kind() != "block" {
        return None;
    }
    block.parent().filter(|p| p.kind() == "class_definition")
}

fn decorator_names(parsed: &ParsedFile, node: Node) -> Vec<String> {
    let outer = outer_definition(node);
    if outer.kind() != "decorated_definition" {
        return Vec::new();
    }
    named_children(outer)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|d| {
            let raw = parsed.node_text(d).trim_start_matches('@').trim();
            let name = raw.split('(').next().unwrap_or(raw);
            last_segment(name).to_string()
        })
        .collect()
}

/// Names listed in a module-level `__all__`, if the module declares one.
fn dunder_all(parsed: &ParsedFile) -> Option<(Vec<String>, Node<'_>)> {
    for stmt in named_children(parsed.root()) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(assign) = named_children(stmt).into_iter().find(|n| n.kind() == "assignment") else {
            continue;
        };
        if parsed.field_text(assign, "left") != Some("__all__") {
            continue;
        }
        let names = assign
            .child_by_field_name("right")
            .map(|list| {
                named_children(list)
                    .into_iter()
                    .filter(|s| s.kind() == "string")
                    .map(|s| string_content(parsed, s))
                    .collect()
            })
            .unwrap_or_default();
        return Some((names, stmt));
    }
    None
}

fn string_content(parsed: &ParsedFile, node: Node) -> String {
    parsed
        .node_text(node)
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

struct ExportRule {
    all: Option<HashSet<String>>,
}

impl ExportRule {
    fn for_file(parsed: &ParsedFile) -> Self {
        Self {
            all: dunder_all(parsed).map(|(names, _)| names.into_iter().collect()),
        }
    }

    fn is_exported(&self, name: &str, module_level: bool) -> bool {
        if !module_level {
            return false;
        }
        match &self.all {
            Some(all) => all.contains(name),
            None => !name.starts_with('_'),
        }
    }
}

fn docstring(parsed: &ParsedFile, definition: Node) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let first = named_children(body).into_iter().next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = named_children(first).into_iter().next()?;
    (string.kind() == "string").then(|| clean_docstring(parsed.node_text(string)))
}

fn name_visibility(name: &str) -> Visibility {
    let is_dunder = name.starts_with("__") && name.ends_with("__");
    if name.starts_with("__") && !is_dunder {
        Visibility::Private
    } else if name.starts_with('_') && !is_dunder {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

// =============================================================================
// Functions
// =============================================================================

fn extract_parameters(parsed: &ParsedFile, func: Node, skip_receiver: bool) -> Vec<Parameter> {
    let Some(params) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out: Vec<Parameter> = named_children(params)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                Some(Parameter::named(text(parsed, p)))
            }
            "typed_parameter" => {
                let name = named_children(p).into_iter().next()?;
                Some(Parameter {
                    name: text(parsed, name),
                    type_annotation: parsed.field_text(p, "type").map(str::to_string),
                    is_optional: false,
                    default_value: None,
                })
            }
            "default_parameter" | "typed_default_parameter" => {
                let default_value = parsed.field_text(p, "value").map(str::to_string);
                Some(Parameter {
                    name: parsed.field_text(p, "name")?.to_string(),
                    type_annotation: parsed.field_text(p, "type").map(str::to_string),
                    is_optional: default_value.is_some(),
                    default_value,
                })
            }
            _ => None,
        })
        .collect();

    if skip_receiver && matches!(out.first().map(|p| p.name.as_str()), Some("self" | "cls")) {
        out.remove(0);
    }
    out
}

fn build_function(
    parsed: &ParsedFile,
    node: Node,
    qualified_name: String,
    is_exported: bool,
    skip_receiver: bool,
) -> FunctionDefinition {
    let name = parsed.field_text(node, "name").unwrap_or_default().to_string();
    FunctionDefinition {
        name,
        qualified_name,
        parameters: extract_parameters(parsed, node, skip_receiver),
        return_type: parsed.field_text(node, "return_type").map(str::to_string),
        is_exported,
        is_async: has_token(node, "async"),
        location: location(parsed, outer_definition(node)),
        doc_comment: docstring(parsed, node),
    }
}

/// Extract functions that are not methods, including nested helpers.
pub fn extract_functions(parsed: &ParsedFile) -> Vec<FunctionDefinition> {
    let rule = ExportRule::for_file(parsed);
    let mut functions = Vec::new();

    walk_tree(parsed.root(), |node| {
        if node.kind() != "function_definition" || owning_class(node).is_some() {
            return;
        }
        let Some(name) = parsed.field_text(node, "name") else {
            return;
        };
        let exported = rule.is_exported(name, is_module_level(node));
        functions.push(build_function(parsed, node, name.to_string(), exported, false));
    });

    functions
}

// =============================================================================
// Classes
// =============================================================================

pub fn extract_classes(parsed: &ParsedFile) -> Vec<ClassDefinition> {
    let rule = ExportRule::for_file(parsed);
    let mut classes = Vec::new();

    walk_tree(parsed.root(), |node| {
        if node.kind() == "class_definition" {
            if let Some(class) = class_from_node(parsed, node, &rule) {
                classes.push(class);
            }
        }
    });

    classes
}

fn class_from_node(parsed: &ParsedFile, node: Node, rule: &ExportRule) -> Option<ClassDefinition> {
    let name = parsed.field_text(node, "name")?.to_string();
    let mut class = ClassDefinition::new(name.clone(), ClassKind::Class, location(parsed, outer_definition(node)));
    class.is_exported = rule.is_exported(&name, is_module_level(node));
    class.doc_comment = docstring(parsed, node);

    if let Some(args) = node.child_by_field_name("superclasses") {
        for arg in named_children(args) {
            match arg.kind() {
                "keyword_argument" => {
                    let key = parsed.field_text(arg, "name");
                    let value = parsed.field_text(arg, "value").map(last_segment);
                    if key == Some("metaclass") && value == Some("ABCMeta") {
                        class.is_abstract = true;
                    }
                }
                "identifier" | "attribute" | "subscript" => {
                    let base = parsed.node_text(arg);
                    let short = last_segment(base.split('[').next().unwrap_or(base));
                    if ENUM_BASES.contains(&short) {
                        class.kind = ClassKind::Enum;
                    } else if PROTOCOL_BASES.contains(&short) {
                        class.kind = ClassKind::Interface;
                    } else if ABSTRACT_BASES.contains(&short) {
                        class.is_abstract = true;
                    }
                    if short != "object" && short != "Generic" {
                        class.extends_from.push(base.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    let Some(body) = node.child_by_field_name("body") else {
        return Some(class);
    };

    let mut seen_properties = HashSet::new();
    for stmt in named_children(body) {
        let definition = match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => stmt
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            "expression_statement" => {
                if let Some(prop) = class_attribute(parsed, stmt, class.kind) {
                    if seen_properties.insert(prop.name.clone()) {
                        class.properties.push(prop);
                    }
                }
                None
            }
            _ => None,
        };
        let Some(definition) = definition else {
            continue;
        };

        let method = method_from_node(parsed, definition, &name, class.is_exported);
        if method.is_abstract {
            class.is_abstract = true;
        }
        if method.name() == "__init__" {
            for prop in instance_attributes(parsed, definition) {
                if seen_properties.insert(prop.name.clone()) {
                    class.properties.push(prop);
                }
            }
        }
        class.methods.push(method);
    }

    Some(class)
}

fn method_from_node(parsed: &ParsedFile, node: Node, class_name: &str, class_exported: bool) -> MethodDefinition {
    let decorators = decorator_names(parsed, node);
    let is_static = decorators
        .iter()
        .any(|d| d == "staticmethod" || d == "classmethod");
    let name = parsed.field_text(node, "name").unwrap_or_default().to_string();
    let visibility = name_visibility(&name);
    let qualified = format!("{}.{}", class_name, name);
    let skip_receiver = !decorators.iter().any(|d| d == "staticmethod");

    MethodDefinition {
        function: build_function(
            parsed,
            node,
            qualified,
            class_exported && visibility == Visibility::Public,
            skip_receiver,
        ),
        visibility,
        is_static,
        is_abstract: decorators.iter().any(|d| d == "abstractmethod"),
    }
}

/// `name: type = value` or `name = value` directly in the class body.
fn class_attribute(parsed: &ParsedFile, stmt: Node, kind: ClassKind) -> Option<PropertyDefinition> {
    let assign = named_children(stmt).into_iter().find(|n| n.kind() == "assignment")?;
    let left = assign.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let name = text(parsed, left);
    if name.starts_with("__") && name.ends_with("__") {
        return None;
    }
    Some(PropertyDefinition {
        visibility: name_visibility(&name),
        type_annotation: parsed.field_text(assign, "type").map(str::to_string),
        is_static: kind == ClassKind::Enum,
        is_optional: false,
        location: location(parsed, stmt),
        name,
    })
}

/// `self.x = ...` assignments inside `__init__`.
fn instance_attributes(parsed: &ParsedFile, init: Node) -> Vec<PropertyDefinition> {
    let mut props = Vec::new();
    let Some(body) = init.child_by_field_name("body") else {
        return props;
    };
    walk_tree(body, |node| {
        if node.kind() != "assignment" {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "attribute" || parsed.field_text(left, "object") != Some("self") {
            return;
        }
        let Some(attr) = parsed.field_text(left, "attribute") else {
            return;
        };
        props.push(PropertyDefinition {
            name: attr.to_string(),
            type_annotation: parsed.field_text(node, "type").map(str::to_string),
            visibility: name_visibility(attr),
            is_static: false,
            is_optional: false,
            location: location(parsed, node),
        });
    });
    props
}

// =============================================================================
// Imports and exports
// =============================================================================

fn binding_from_name(parsed: &ParsedFile, node: Node, namespace: bool) -> Option<ImportBinding> {
    let (name, alias) = match node.kind() {
        "dotted_name" | "identifier" => (text(parsed, node), None),
        "aliased_import" => (
            parsed.field_text(node, "name")?.to_string(),
            parsed.field_text(node, "alias").map(str::to_string),
        ),
        _ => return None,
    };
    let binding = if namespace {
        ImportBinding::namespace(name)
    } else {
        ImportBinding::named(name)
    };
    Some(binding.with_alias(alias))
}

pub fn extract_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    let Some(query) = IMPORTS.as_ref() else {
        return Vec::new();
    };
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root(), parsed.source.as_bytes());
    let mut imports = Vec::new();

    while let Some(m) = matches.next() {
        for capture in m.captures {
            let node = capture.node;
            let mut names_cursor = node.walk();
            let names: Vec<Node> = node.children_by_field_name("name", &mut names_cursor).collect();

            match query.capture_names()[capture.index as usize] {
                "import" => {
                    // `import a, b` is two imports of two modules.
                    for name in names {
                        let Some(binding) = binding_from_name(parsed, name, true) else {
                            continue;
                        };
                        imports.push(ImportStatement {
                            source: binding.name.clone(),
                            bindings: vec![binding],
                            location: location(parsed, node),
                        });
                    }
                }
                "import_from" => {
                    let Some(source) = parsed.field_text(node, "module_name") else {
                        continue;
                    };
                    let mut bindings: Vec<_> = names
                        .into_iter()
                        .filter_map(|n| binding_from_name(parsed, n, false))
                        .collect();
                    if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
                        bindings.push(ImportBinding::namespace("*"));
                    }
                    imports.push(ImportStatement {
                        source: source.to_string(),
                        bindings,
                        location: location(parsed, node),
                    });
                }
                _ => {}
            }
        }
    }

    imports.sort_by_key(|i| (i.location.start_line, i.location.start_column));
    imports
}

/// `__all__` is the only explicit export construct Python has.
pub fn extract_exports(parsed: &ParsedFile) -> Vec<ExportStatement> {
    let Some((names, stmt)) = dunder_all(parsed) else {
        return Vec::new();
    };
    vec![ExportStatement {
        source: None,
        bindings: names.into_iter().map(ImportBinding::named).collect(),
        location: location(parsed, stmt),
    }]
}

// =============================================================================
// Calls
// =============================================================================

fn enclosing_scope(parsed: &ParsedFile, node: Node) -> (String, Option<String>) {
    let Some(func) = find_ancestor(node, &["function_definition"]) else {
        return (MODULE_SCOPE.to_string(), None);
    };
    let name = parsed.field_text(func, "name").unwrap_or_default().to_string();
    match owning_class(func).and_then(|c| parsed.field_text(c, "name")) {
        Some(class) => (format!("{}.{}", class, name), Some(class.to_string())),
        None => (name, None),
    }
}

pub fn extract_calls(parsed: &ParsedFile, symbols: &LocalSymbols) -> Vec<CallExpression> {
    let mut calls = Vec::new();

    walk_tree(parsed.root(), |node| {
        if node.kind() != "call" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (callee, receiver) = match function.kind() {
            "identifier" => (text(parsed, function), None),
            "attribute" => {
                let Some(attr) = parsed.field_text(function, "attribute") else {
                    return;
                };
                let object = parsed.field_text(function, "object").map(str::to_string);
                (attr.to_string(), object)
            }
            _ => return,
        };

        let (caller, enclosing_class) = enclosing_scope(parsed, node);
        let arguments = node
            .child_by_field_name("arguments")
            .map(|args| {
                named_children(args)
                    .into_iter()
                    .filter(|a| a.kind() != "comment")
                    .map(|a| argument_snippet(parsed.node_text(a)))
                    .collect()
            })
            .unwrap_or_default();

        let raw = RawCall {
            caller,
            callee,
            receiver_is_self: matches!(receiver.as_deref(), Some("self" | "cls")),
            receiver,
            enclosing_class,
            arguments,
            location: location(parsed, node),
        };
        calls.push(raw.resolve(symbols));
    });

    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserRegistry;

    fn parse(source: &str) -> ParsedFile {
        let registry = ParserRegistry::with_languages(&[Language::Python]).unwrap();
        registry.parse(Language::Python, "app/models.py", source).unwrap()
    }

    #[test]
    fn test_functions_and_export_rule() {
        let parsed = parse(
            r#"
async def get_task(task_id: int, db: Session = None) -> Task:
    """Get a task by ID."""
    return db.get(task_id)

def _private():
    pass

def outer():
    def inner():
        pass
"#,
        );
        let functions = extract_functions(&parsed);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["get_task", "_private", "outer", "inner"]);

        let get_task = &functions[0];
        assert!(get_task.is_async);
        assert!(get_task.is_exported);
        assert_eq!(get_task.return_type.as_deref(), Some("Task"));
        assert_eq!(get_task.doc_comment.as_deref(), Some("Get a task by ID."));
        assert_eq!(get_task.parameters[0].type_annotation.as_deref(), Some("int"));
        assert_eq!(get_task.parameters[1].default_value.as_deref(), Some("None"));

        assert!(!functions[1].is_exported);
        assert!(functions[2].is_exported);
        assert!(!functions[3].is_exported);
    }

    #[test]
    fn test_dunder_all_restricts_exports() {
        let parsed = parse(
            r#"
__all__ = ["public_one"]

def public_one():
    pass

def public_two():
    pass
"#,
        );
        let functions = extract_functions(&parsed);
        assert!(functions[0].is_exported);
        assert!(!functions[1].is_exported);

        let exports = extract_exports(&parsed);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].bindings[0].name, "public_one");
    }

    #[test]
    fn test_class_members() {
        let parsed = parse(
            r#"
class Task(Base):
    """A task row."""
    __tablename__ = "tasks"
    id: int = Column(Integer, primary_key=True)
    title = Column(String)

    def __init__(self, title):
        self.title = title
        self._cache = {}
        self.__secret = None

    @staticmethod
    def build(title):
        return Task(title)

    @classmethod
    def create(cls, title):
        return cls.build(title)

    def _refresh(self):
        self.save()

    def save(self):
        pass
"#,
        );
        let classes = extract_classes(&parsed);
        let task = &classes[0];
        assert_eq!(task.kind, ClassKind::Class);
        assert_eq!(task.extends_from, vec!["Base"]);
        assert_eq!(task.doc_comment.as_deref(), Some("A task row."));

        let props: Vec<_> = task.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["id", "title", "_cache", "__secret"]);
        assert_eq!(task.properties[0].type_annotation.as_deref(), Some("int"));
        assert_eq!(task.properties[2].visibility, Visibility::Protected);
        assert_eq!(task.properties[3].visibility, Visibility::Private);

        let build = task.find_method("build").unwrap();
        assert!(build.is_static);
        assert_eq!(build.function.parameters[0].name, "title");
        let create = task.find_method("create").unwrap();
        assert!(create.is_static);
        assert_eq!(create.function.parameters.len(), 1);
        assert_eq!(task.find_method("_refresh").unwrap().visibility, Visibility::Protected);
        assert!(task.find_method("__init__").unwrap().function.parameters.len() == 1);
    }

    #[test]
    fn test_class_kinds() {
        let parsed = parse(
            r#"
from abc import ABC, abstractmethod
from enum import Enum
from typing import Protocol

class Status(str, Enum):
    OPEN = "open"
    DONE = "done"

class Repo(Protocol):
    def get(self, id: int): ...

class Base(ABC):
    @abstractmethod
    def run(self): ...
"#,
        );
        let classes = extract_classes(&parsed);
        let status = classes.iter().find(|c| c.name == "Status").unwrap();
        assert_eq!(status.kind, ClassKind::Enum);
        assert!(status.properties.iter().all(|p| p.is_static));
        assert_eq!(
            classes.iter().find(|c| c.name == "Repo").unwrap().kind,
            ClassKind::Interface
        );
        let base = classes.iter().find(|c| c.name == "Base").unwrap();
        assert!(base.is_abstract);
        assert!(base.find_method("run").unwrap().is_abstract);
    }

    #[test]
    fn test_imports() {
        let parsed = parse(
            r#"
import os, json as j
from .models import Task, User as U
from ..service.schemas import *
from sqlalchemy.orm import Session
"#,
        );
        let imports = extract_imports(&parsed);
        let sources: Vec<_> = imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["os", "json", ".models", "..service.schemas", "sqlalchemy.orm"]
        );
        assert!(imports[0].bindings[0].is_namespace);
        assert_eq!(imports[1].bindings[0].alias.as_deref(), Some("j"));
        assert_eq!(imports[2].binding_names(), vec!["Task", "User"]);
        assert_eq!(imports[2].bindings[1].alias.as_deref(), Some("U"));
        assert!(imports[3].bindings[0].is_namespace);
        assert!(imports[2].is_relative());
    }

    #[test]
    fn test_calls() {
        let parsed = parse(
            r#"
def helper():
    pass

class Service:
    def run(self):
        helper()
        self.save(1)
        db.commit()

    def save(self, x):
        pass

helper()
"#,
        );
        let functions = extract_functions(&parsed);
        let classes = extract_classes(&parsed);
        let symbols = LocalSymbols::new(&functions, &classes);
        let calls = extract_calls(&parsed, &symbols);

        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].caller, "Service.run");
        assert_eq!(calls[0].resolved_callee.as_deref(), Some("helper"));
        assert_eq!(calls[1].resolved_callee.as_deref(), Some("Service.save"));
        assert_eq!(calls[2].callee, "commit");
        assert_eq!(calls[2].resolved_callee, None);
        assert_eq!(calls[3].caller, MODULE_SCOPE);
    }
}
