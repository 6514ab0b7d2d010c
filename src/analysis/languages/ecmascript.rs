//! TypeScript, TSX and JavaScript fact extraction using tree-sitter.
//!
//! The three grammars share node names for everything extracted here; the few
//! places where they diverge (`field_definition` vs `public_field_definition`,
//! bare `class_heritage` vs `extends_clause`) are handled inline.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::extractors::{argument_snippet, LocalSymbols, RawCall};
use crate::analysis::facts::{
    CallExpression, ClassDefinition, ClassKind, ExportStatement, FunctionDefinition,
    ImportBinding, ImportStatement, MethodDefinition, Parameter, PropertyDefinition,
    SourceLocation, Visibility, ANONYMOUS, MODULE_SCOPE,
};
use crate::analysis::node::{
    base_type_name, child_of_kind, children, has_ancestor, has_token, named_children,
    preceding_doc_comment, strip_type_prefix, unquote, walk_tree,
};
use crate::parser::{Language, ParsedFile};

const COMMENT_KINDS: &[&str] = &["comment"];
const DOC_MARKER: &str = "/**";

const FUNCTION_EXPRESSION_KINDS: &[&str] = &[
    "function_expression",
    "function",
    "arrow_function",
    "generator_function",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

/// Wrapper nodes between a declaration and the statement that carries its
/// doc comment.
const STATEMENT_WRAPPERS: &[&str] = &[
    "variable_declarator",
    "lexical_declaration",
    "variable_declaration",
    "export_statement",
    "expression_statement",
    "assignment_expression",
];

/// `const x = require('y')` and friends.
const REQUIRE_QUERY: &str = r#"
(call_expression
  function: (identifier) @require_func
  arguments: (arguments . (string) @require_source)
  (#eq? @require_func "require")
) @require
"#;

static TS_REQUIRE_QUERY: Lazy<Option<Query>> =
    Lazy::new(|| compile_query(Language::TypeScript, REQUIRE_QUERY));
static TSX_REQUIRE_QUERY: Lazy<Option<Query>> =
    Lazy::new(|| compile_query(Language::Tsx, REQUIRE_QUERY));
static JS_REQUIRE_QUERY: Lazy<Option<Query>> =
    Lazy::new(|| compile_query(Language::JavaScript, REQUIRE_QUERY));

fn compile_query(language: Language, source: &str) -> Option<Query> {
    match Query::new(&language.grammar(), source) {
        Ok(query) => Some(query),
        Err(e) => {
            tracing::warn!(%language, error = %e, "failed to compile require query");
            None
        }
    }
}

fn require_query(language: Language) -> Option<&'static Query> {
    match language {
        Language::TypeScript => TS_REQUIRE_QUERY.as_ref(),
        Language::Tsx => TSX_REQUIRE_QUERY.as_ref(),
        Language::JavaScript => JS_REQUIRE_QUERY.as_ref(),
        _ => None,
    }
}

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn text(parsed: &ParsedFile, node: Node) -> String {
    parsed.node_text(node).to_string()
}

// =============================================================================
// Export detection
// =============================================================================

/// Whether `node` sits inside an export construct at any depth, including
/// CommonJS `module.exports = ...` / `exports.x = ...` assignments.
fn is_exported_node(parsed: &ParsedFile, node: Node) -> bool {
    if has_ancestor(node, &["export_statement"]) {
        return true;
    }
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "assignment_expression" {
            if let Some(left) = n.child_by_field_name("left") {
                if is_commonjs_target(parsed.node_text(left)) {
                    return true;
                }
            }
        }
        current = n.parent();
    }
    false
}

fn is_commonjs_target(left: &str) -> bool {
    left == "module.exports" || left.starts_with("module.exports.") || left.starts_with("exports.")
}

/// Local names exported by `export { a, b }` lists, `export default name`,
/// and `module.exports = { a, b }`.
fn local_export_names(parsed: &ParsedFile) -> HashSet<String> {
    extract_exports(parsed)
        .into_iter()
        .filter(|e| e.source.is_none())
        .flat_map(|e| e.bindings.into_iter().map(|b| b.name))
        .collect()
}

// =============================================================================
// Names, doc comments, parameters
// =============================================================================

/// Name bound to a function or class expression by its surrounding syntax.
fn binding_name(parsed: &ParsedFile, node: Node) -> Option<String> {
    let parent = node.parent()?;
    match parent.kind() {
        "variable_declarator" => {
            let name = parent.child_by_field_name("name")?;
            (name.kind() == "identifier").then(|| text(parsed, name))
        }
        "assignment_expression" => {
            let left = parent.child_by_field_name("left")?;
            match left.kind() {
                "identifier" => Some(text(parsed, left)),
                "member_expression" => left
                    .child_by_field_name("property")
                    .map(|p| text(parsed, p)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn declared_name(parsed: &ParsedFile, node: Node) -> String {
    parsed
        .field_text(node, "name")
        .map(str::to_string)
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// The statement node that a doc comment would precede.
fn statement_anchor(node: Node) -> Node {
    let mut anchor = node;
    while let Some(parent) = anchor.parent() {
        if !STATEMENT_WRAPPERS.contains(&parent.kind()) {
            break;
        }
        anchor = parent;
    }
    anchor
}

fn statement_doc(parsed: &ParsedFile, node: Node) -> Option<String> {
    preceding_doc_comment(parsed, statement_anchor(node), COMMENT_KINDS, DOC_MARKER)
}

/// Doc comment for a class member, skipping decorators that sit between it
/// and the comment.
fn member_doc(parsed: &ParsedFile, node: Node) -> Option<String> {
    let mut anchor = node;
    while let Some(prev) = anchor.prev_sibling() {
        if prev.kind() != "decorator" {
            break;
        }
        anchor = prev;
    }
    preceding_doc_comment(parsed, anchor, COMMENT_KINDS, DOC_MARKER)
}

fn extract_parameters(parsed: &ParsedFile, func: Node) -> Vec<Parameter> {
    // `x => x * 2`
    if let Some(single) = func.child_by_field_name("parameter") {
        return vec![Parameter::named(text(parsed, single))];
    }
    let Some(params) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(params)
        .into_iter()
        .filter_map(|p| parameter_from_node(parsed, p))
        .collect()
}

fn parameter_from_node(parsed: &ParsedFile, node: Node) -> Option<Parameter> {
    match node.kind() {
        "required_parameter" | "optional_parameter" => {
            let pattern = node.child_by_field_name("pattern")?;
            Some(Parameter {
                name: text(parsed, pattern),
                type_annotation: parsed.field_text(node, "type").map(strip_type_prefix),
                is_optional: node.kind() == "optional_parameter",
                default_value: parsed.field_text(node, "value").map(str::to_string),
            })
        }
        "assignment_pattern" => {
            let left = node.child_by_field_name("left")?;
            Some(Parameter {
                name: text(parsed, left),
                type_annotation: None,
                is_optional: false,
                default_value: parsed.field_text(node, "right").map(str::to_string),
            })
        }
        "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
            Some(Parameter::named(text(parsed, node)))
        }
        _ => None,
    }
}

fn build_function(
    parsed: &ParsedFile,
    node: Node,
    name: String,
    exported: &HashSet<String>,
) -> FunctionDefinition {
    FunctionDefinition {
        qualified_name: name.clone(),
        parameters: extract_parameters(parsed, node),
        return_type: parsed.field_text(node, "return_type").map(strip_type_prefix),
        is_exported: is_exported_node(parsed, node) || exported.contains(&name),
        is_async: has_token(node, "async"),
        location: location(parsed, node),
        doc_comment: statement_doc(parsed, node),
        name,
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract free functions: declarations plus function/arrow expressions bound
/// to a name or default-exported.
pub fn extract_functions(parsed: &ParsedFile) -> Vec<FunctionDefinition> {
    let exported = local_export_names(parsed);
    let mut functions = Vec::new();

    walk_tree(parsed.root(), |node| {
        let name = match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                Some(declared_name(parsed, node))
            }
            kind if FUNCTION_EXPRESSION_KINDS.contains(&kind) => {
                binding_name(parsed, node).or_else(|| {
                    node.parent()
                        .filter(|p| p.kind() == "export_statement")
                        .map(|_| declared_name(parsed, node))
                })
            }
            _ => None,
        };
        if let Some(name) = name {
            functions.push(build_function(parsed, node, name, &exported));
        }
    });

    functions
}

// =============================================================================
// Classes, interfaces, enums, type aliases
// =============================================================================

pub fn extract_classes(parsed: &ParsedFile) -> Vec<ClassDefinition> {
    let exported = local_export_names(parsed);
    let mut classes = Vec::new();

    walk_tree(parsed.root(), |node| {
        let class = match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                Some(class_from_node(parsed, node, declared_name(parsed, node)))
            }
            "class" => binding_name(parsed, node)
                .or_else(|| parsed.field_text(node, "name").map(str::to_string))
                .map(|name| class_from_node(parsed, node, name)),
            "interface_declaration" => Some(interface_from_node(parsed, node)),
            "enum_declaration" => Some(enum_from_node(parsed, node)),
            "type_alias_declaration" => Some(type_alias_from_node(parsed, node)),
            _ => None,
        };

        if let Some(mut class) = class {
            if exported.contains(&class.name) {
                class.is_exported = true;
            }
            for method in &mut class.methods {
                method.function.is_exported = class.is_exported;
            }
            classes.push(class);
        }
    });

    classes
}

fn class_from_node(parsed: &ParsedFile, node: Node, name: String) -> ClassDefinition {
    let mut class = ClassDefinition::new(name, ClassKind::Class, location(parsed, node));
    class.is_abstract = node.kind() == "abstract_class_declaration" || has_token(node, "abstract");
    class.is_exported = is_exported_node(parsed, node);
    class.doc_comment = statement_doc(parsed, node);

    if let Some(heritage) = child_of_kind(node, "class_heritage") {
        for clause in named_children(heritage) {
            match clause.kind() {
                "extends_clause" => {
                    for base in named_children(clause) {
                        if base.kind() != "type_arguments" {
                            class.extends_from.push(base_type_name(parsed.node_text(base)));
                        }
                    }
                }
                "implements_clause" => {
                    for iface in named_children(clause) {
                        class.implements.push(base_type_name(parsed.node_text(iface)));
                    }
                }
                // JavaScript: `class A extends B` puts the expression directly
                // under class_heritage.
                _ => class.extends_from.push(base_type_name(parsed.node_text(clause))),
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let class_name = class.name.clone();
        for member in named_children(body) {
            match member.kind() {
                "method_definition" => {
                    let method = method_from_node(parsed, member, &class_name);
                    if method.name() == "constructor" {
                        class
                            .properties
                            .extend(parameter_properties(parsed, member));
                    }
                    class.methods.push(method);
                }
                "abstract_method_signature" => {
                    let mut method = method_from_node(parsed, member, &class_name);
                    method.is_abstract = true;
                    class.methods.push(method);
                }
                "public_field_definition" | "field_definition" => {
                    if let Some(prop) = property_from_field(parsed, member) {
                        class.properties.push(prop);
                    }
                }
                _ => {}
            }
        }
    }

    class
}

fn member_visibility(parsed: &ParsedFile, node: Node, name_node: Option<Node>) -> Visibility {
    if let Some(modifier) = child_of_kind(node, "accessibility_modifier") {
        if let Some(v) = Visibility::from_keyword(parsed.node_text(modifier)) {
            return v;
        }
    }
    match name_node {
        Some(n) if n.kind() == "private_property_identifier" => Visibility::Private,
        _ => Visibility::Public,
    }
}

fn method_from_node(parsed: &ParsedFile, node: Node, class_name: &str) -> MethodDefinition {
    let name_node = node.child_by_field_name("name");
    let name = name_node
        .map(|n| text(parsed, n))
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let function = FunctionDefinition {
        qualified_name: format!("{}.{}", class_name, name),
        parameters: extract_parameters(parsed, node),
        return_type: parsed.field_text(node, "return_type").map(strip_type_prefix),
        is_exported: is_exported_node(parsed, node),
        is_async: has_token(node, "async"),
        location: location(parsed, node),
        doc_comment: member_doc(parsed, node),
        name,
    };

    MethodDefinition {
        function,
        visibility: member_visibility(parsed, node, name_node),
        is_static: has_token(node, "static"),
        is_abstract: has_token(node, "abstract"),
    }
}

fn property_from_field(parsed: &ParsedFile, node: Node) -> Option<PropertyDefinition> {
    let name_node = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("property"))?;
    Some(PropertyDefinition {
        name: text(parsed, name_node),
        type_annotation: parsed.field_text(node, "type").map(strip_type_prefix),
        visibility: member_visibility(parsed, node, Some(name_node)),
        is_static: has_token(node, "static"),
        is_optional: has_token(node, "?"),
        location: location(parsed, node),
    })
}

/// `constructor(private readonly repo: Repo)` declares a property.
fn parameter_properties(parsed: &ParsedFile, ctor: Node) -> Vec<PropertyDefinition> {
    let Some(params) = ctor.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(params)
        .into_iter()
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .filter(|p| child_of_kind(*p, "accessibility_modifier").is_some() || has_token(*p, "readonly"))
        .filter_map(|p| {
            let pattern = p.child_by_field_name("pattern")?;
            Some(PropertyDefinition {
                name: text(parsed, pattern),
                type_annotation: parsed.field_text(p, "type").map(strip_type_prefix),
                visibility: member_visibility(parsed, p, None),
                is_static: false,
                is_optional: p.kind() == "optional_parameter",
                location: location(parsed, p),
            })
        })
        .collect()
}

/// Property and method signatures of an interface body or object type.
fn collect_signatures(parsed: &ParsedFile, body: Node, class: &mut ClassDefinition) {
    let class_name = class.name.clone();
    for member in named_children(body) {
        match member.kind() {
            "property_signature" => {
                if let Some(name_node) = member.child_by_field_name("name") {
                    class.properties.push(PropertyDefinition {
                        name: text(parsed, name_node),
                        type_annotation: parsed.field_text(member, "type").map(strip_type_prefix),
                        visibility: member_visibility(parsed, member, Some(name_node)),
                        is_static: false,
                        is_optional: has_token(member, "?"),
                        location: location(parsed, member),
                    });
                }
            }
            "method_signature" => {
                class.methods.push(method_from_node(parsed, member, &class_name));
            }
            _ => {}
        }
    }
}

fn interface_from_node(parsed: &ParsedFile, node: Node) -> ClassDefinition {
    let mut class = ClassDefinition::new(
        declared_name(parsed, node),
        ClassKind::Interface,
        location(parsed, node),
    );
    class.is_exported = is_exported_node(parsed, node);
    class.doc_comment = statement_doc(parsed, node);

    for clause in children(node) {
        if matches!(clause.kind(), "extends_type_clause" | "extends_clause") {
            for base in named_children(clause) {
                if base.kind() != "type_arguments" {
                    class.extends_from.push(base_type_name(parsed.node_text(base)));
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        collect_signatures(parsed, body, &mut class);
    }
    class
}

fn type_alias_from_node(parsed: &ParsedFile, node: Node) -> ClassDefinition {
    let mut class = ClassDefinition::new(
        declared_name(parsed, node),
        ClassKind::Type,
        location(parsed, node),
    );
    class.is_exported = is_exported_node(parsed, node);
    class.doc_comment = statement_doc(parsed, node);

    if let Some(value) = node.child_by_field_name("value") {
        if value.kind() == "object_type" {
            collect_signatures(parsed, value, &mut class);
        }
    }
    class
}

fn enum_from_node(parsed: &ParsedFile, node: Node) -> ClassDefinition {
    let mut class = ClassDefinition::new(
        declared_name(parsed, node),
        ClassKind::Enum,
        location(parsed, node),
    );
    class.is_exported = is_exported_node(parsed, node);
    class.doc_comment = statement_doc(parsed, node);

    if let Some(body) = node.child_by_field_name("body") {
        for member in named_children(body) {
            let name = match member.kind() {
                "property_identifier" => text(parsed, member),
                "enum_assignment" => match member.child_by_field_name("name") {
                    Some(n) => unquote(parsed.node_text(n)),
                    None => continue,
                },
                "string" => unquote(parsed.node_text(member)),
                _ => continue,
            };
            class.properties.push(PropertyDefinition {
                name,
                type_annotation: None,
                visibility: Visibility::Public,
                is_static: true,
                is_optional: false,
                location: location(parsed, member),
            });
        }
    }
    class
}

// =============================================================================
// Imports
// =============================================================================

pub fn extract_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    let mut imports = Vec::new();

    walk_tree(parsed.root(), |node| match node.kind() {
        "import_statement" => {
            if let Some(import) = import_from_statement(parsed, node) {
                imports.push(import);
            }
        }
        // import('./lazy')
        "call_expression" => {
            let is_dynamic = node
                .child_by_field_name("function")
                .map(|f| f.kind() == "import")
                .unwrap_or(false);
            if is_dynamic {
                if let Some(source) = first_string_argument(parsed, node) {
                    imports.push(ImportStatement {
                        source,
                        bindings: Vec::new(),
                        location: location(parsed, node),
                    });
                }
            }
        }
        _ => {}
    });

    imports.extend(require_imports(parsed));
    imports.sort_by_key(|i| (i.location.start_line, i.location.start_column));
    imports
}

fn first_string_argument(parsed: &ParsedFile, call: Node) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    named_children(args)
        .into_iter()
        .find(|a| a.kind() == "string")
        .map(|s| unquote(parsed.node_text(s)))
}

fn import_from_statement(parsed: &ParsedFile, node: Node) -> Option<ImportStatement> {
    let mut source = parsed.field_text(node, "source").map(unquote);
    let mut bindings = Vec::new();

    if let Some(clause) = child_of_kind(node, "import_clause") {
        for child in named_children(clause) {
            match child.kind() {
                "identifier" => bindings.push(ImportBinding::default_import(text(parsed, child))),
                "namespace_import" => {
                    if let Some(ident) = named_children(child).into_iter().last() {
                        bindings.push(ImportBinding::namespace(text(parsed, ident)));
                    }
                }
                "named_imports" => {
                    for spec in named_children(child) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name) = parsed.field_text(spec, "name") {
                            let alias = parsed.field_text(spec, "alias").map(str::to_string);
                            bindings.push(ImportBinding::named(unquote(name)).with_alias(alias));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // TypeScript `import fs = require('fs')`
    if let Some(clause) = child_of_kind(node, "import_require_clause") {
        if let Some(ident) = child_of_kind(clause, "identifier") {
            bindings.push(ImportBinding::default_import(text(parsed, ident)));
        }
        if source.is_none() {
            source = parsed.field_text(clause, "source").map(unquote);
        }
    }

    Some(ImportStatement {
        source: source?,
        bindings,
        location: location(parsed, node),
    })
}

fn require_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    let Some(query) = require_query(parsed.language) else {
        return Vec::new();
    };

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root(), parsed.source.as_bytes());
    let mut imports = Vec::new();

    while let Some(m) = matches.next() {
        let mut source = None;
        let mut call = None;
        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "require_source" => source = Some(unquote(parsed.node_text(capture.node))),
                "require" => call = Some(capture.node),
                _ => {}
            }
        }
        if let (Some(source), Some(call)) = (source, call) {
            imports.push(ImportStatement {
                source,
                bindings: require_bindings(parsed, call),
                location: location(parsed, call),
            });
        }
    }

    imports
}

/// Names bound by `const x = require(..)` or `const { a, b: c } = require(..)`.
fn require_bindings(parsed: &ParsedFile, call: Node) -> Vec<ImportBinding> {
    let Some(declarator) = call.parent().filter(|p| p.kind() == "variable_declarator") else {
        return Vec::new();
    };
    let Some(name) = declarator.child_by_field_name("name") else {
        return Vec::new();
    };
    match name.kind() {
        "identifier" => vec![ImportBinding::default_import(text(parsed, name))],
        "object_pattern" => named_children(name)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "shorthand_property_identifier_pattern" => {
                    Some(ImportBinding::named(text(parsed, p)))
                }
                "pair_pattern" => {
                    let key = parsed.field_text(p, "key")?;
                    let value = parsed.field_text(p, "value").map(str::to_string);
                    Some(ImportBinding::named(key).with_alias(value))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Exports
// =============================================================================

pub fn extract_exports(parsed: &ParsedFile) -> Vec<ExportStatement> {
    let mut exports = Vec::new();

    walk_tree(parsed.root(), |node| match node.kind() {
        "export_statement" => exports.push(export_from_statement(parsed, node)),
        "assignment_expression" => {
            if let Some(export) = commonjs_export(parsed, node) {
                exports.push(export);
            }
        }
        _ => {}
    });

    exports
}

/// Names introduced by an exported declaration.
fn declaration_names(parsed: &ParsedFile, decl: Node) -> Vec<String> {
    match decl.kind() {
        "lexical_declaration" | "variable_declaration" => named_children(decl)
            .into_iter()
            .filter(|d| d.kind() == "variable_declarator")
            .filter_map(|d| parsed.field_text(d, "name").map(str::to_string))
            .collect(),
        _ => parsed
            .field_text(decl, "name")
            .map(|n| vec![n.to_string()])
            .unwrap_or_default(),
    }
}

fn export_from_statement(parsed: &ParsedFile, node: Node) -> ExportStatement {
    let source = parsed.field_text(node, "source").map(unquote);
    let is_default = has_token(node, "default");
    let mut bindings = Vec::new();

    if let Some(decl) = node.child_by_field_name("declaration") {
        for name in declaration_names(parsed, decl) {
            bindings.push(if is_default {
                ImportBinding::default_import(name)
            } else {
                ImportBinding::named(name)
            });
        }
    } else if let Some(value) = node.child_by_field_name("value") {
        let name = if value.kind() == "identifier" {
            text(parsed, value)
        } else {
            parsed
                .field_text(value, "name")
                .unwrap_or("default")
                .to_string()
        };
        bindings.push(ImportBinding::default_import(name));
    } else if let Some(clause) = child_of_kind(node, "export_clause") {
        for spec in named_children(clause) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            if let Some(name) = parsed.field_text(spec, "name") {
                let alias = parsed.field_text(spec, "alias").map(unquote);
                let mut binding = ImportBinding::named(unquote(name));
                binding.is_default = alias.as_deref() == Some("default");
                bindings.push(binding.with_alias(alias));
            }
        }
    } else if let Some(ns) = child_of_kind(node, "namespace_export") {
        if let Some(ident) = named_children(ns).into_iter().last() {
            bindings.push(ImportBinding::namespace(unquote(parsed.node_text(ident))));
        }
    } else if has_token(node, "*") {
        bindings.push(ImportBinding::namespace("*"));
    }

    ExportStatement {
        source,
        bindings,
        location: location(parsed, node),
    }
}

fn commonjs_export(parsed: &ParsedFile, node: Node) -> Option<ExportStatement> {
    let left = parsed.node_text(node.child_by_field_name("left")?);
    if !is_commonjs_target(left) {
        return None;
    }

    let bindings = if left == "module.exports" {
        let right = node.child_by_field_name("right")?;
        match right.kind() {
            "object" => named_children(right)
                .into_iter()
                .filter_map(|entry| match entry.kind() {
                    "shorthand_property_identifier" => Some(ImportBinding::named(text(parsed, entry))),
                    "pair" | "method_definition" => parsed
                        .field_text(entry, "key")
                        .or_else(|| parsed.field_text(entry, "name"))
                        .map(|k| ImportBinding::named(unquote(k))),
                    _ => None,
                })
                .collect(),
            "identifier" => vec![ImportBinding::default_import(text(parsed, right))],
            _ => vec![ImportBinding::default_import(
                parsed.field_text(right, "name").unwrap_or("default"),
            )],
        }
    } else {
        let name = left.rsplit('.').next().unwrap_or(left);
        vec![ImportBinding::named(name)]
    };

    Some(ExportStatement {
        source: None,
        bindings,
        location: location(parsed, node),
    })
}

// =============================================================================
// Calls
// =============================================================================

fn class_name_of(parsed: &ParsedFile, class: Node) -> String {
    parsed
        .field_text(class, "name")
        .map(str::to_string)
        .or_else(|| binding_name(parsed, class))
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

fn enclosing_class_name(parsed: &ParsedFile, node: Node) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if CLASS_KINDS.contains(&n.kind()) {
            return Some(class_name_of(parsed, n));
        }
        current = n.parent();
    }
    None
}

/// Qualified name of the function enclosing `node`, and its class if any.
///
/// Anonymous callbacks are transparent: a call inside `items.map(x => f(x))`
/// belongs to the function that contains the `map` call.
fn enclosing_scope(parsed: &ParsedFile, node: Node) -> (String, Option<String>) {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "method_definition" => {
                let class = enclosing_class_name(parsed, n);
                let name = declared_name(parsed, n);
                let qualified = match &class {
                    Some(c) => format!("{}.{}", c, name),
                    None => name,
                };
                return (qualified, class);
            }
            "function_declaration" | "generator_function_declaration" => {
                return (declared_name(parsed, n), None);
            }
            kind if FUNCTION_EXPRESSION_KINDS.contains(&kind) => {
                if let Some(field) = n
                    .parent()
                    .filter(|p| matches!(p.kind(), "public_field_definition" | "field_definition"))
                {
                    let class = enclosing_class_name(parsed, field);
                    let name = parsed
                        .field_text(field, "name")
                        .or_else(|| parsed.field_text(field, "property"))
                        .unwrap_or(ANONYMOUS)
                        .to_string();
                    let qualified = match &class {
                        Some(c) => format!("{}.{}", c, name),
                        None => name,
                    };
                    return (qualified, class);
                }
                if let Some(name) = binding_name(parsed, n) {
                    return (name, None);
                }
            }
            _ => {}
        }
        current = n.parent();
    }
    (MODULE_SCOPE.to_string(), None)
}

pub fn extract_calls(parsed: &ParsedFile, symbols: &LocalSymbols) -> Vec<CallExpression> {
    let mut calls = Vec::new();

    walk_tree(parsed.root(), |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (callee, receiver) = match function.kind() {
            "identifier" => (text(parsed, function), None),
            "member_expression" => {
                let Some(property) = function.child_by_field_name("property") else {
                    return;
                };
                let object = parsed.field_text(function, "object").map(str::to_string);
                (text(parsed, property), object)
            }
            _ => return,
        };
        if receiver.is_none() && callee == "require" {
            return;
        }

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
            receiver_is_self: receiver.as_deref() == Some("this"),
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

    fn parse(language: Language, source: &str) -> ParsedFile {
        let registry = ParserRegistry::with_languages(&[language]).unwrap();
        registry.parse(language, "src/test.ts", source).unwrap()
    }

    fn parse_ts(source: &str) -> ParsedFile {
        parse(Language::TypeScript, source)
    }

    #[test]
    fn test_exported_functions_at_any_depth() {
        let parsed = parse_ts(
            r#"
export function a() {}
export const b = () => {};
export const c = function () {};
export default function () {}
export async function* gen() {}
"#,
        );
        let functions = extract_functions(&parsed);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "anonymous", "gen"]);
        assert!(functions.iter().all(|f| f.is_exported), "{:?}", functions);
    }

    #[test]
    fn test_export_lists_mark_functions() {
        let parsed = parse_ts(
            r#"
function hidden() {}
function shown() {}
const arrow = () => {};
export { shown, arrow as renamed };
"#,
        );
        let functions = extract_functions(&parsed);
        let hidden = functions.iter().find(|f| f.name == "hidden").unwrap();
        let shown = functions.iter().find(|f| f.name == "shown").unwrap();
        let arrow = functions.iter().find(|f| f.name == "arrow").unwrap();
        assert!(!hidden.is_exported);
        assert!(shown.is_exported);
        assert!(arrow.is_exported);
    }

    #[test]
    fn test_async_detection() {
        let parsed = parse_ts(
            r#"
async function one() {}
function two() {}
const three = async () => {};
const four = () => {};
const five = async function () {};
const six = function () {};
"#,
        );
        let functions = extract_functions(&parsed);
        let is_async = |name: &str| functions.iter().find(|f| f.name == name).unwrap().is_async;
        assert!(is_async("one"));
        assert!(!is_async("two"));
        assert!(is_async("three"));
        assert!(!is_async("four"));
        assert!(is_async("five"));
        assert!(!is_async("six"));
    }

    #[test]
    fn test_callbacks_are_not_functions() {
        let parsed = parse_ts("function outer() { [1, 2].map(x => x * 2); }");
        let functions = extract_functions(&parsed);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "outer");
    }

    #[test]
    fn test_parameters() {
        let parsed = parse_ts(
            "function f(a: string, b?: number, c: number = 5, ...rest: string[]): Promise<void> {}",
        );
        let f = &extract_functions(&parsed)[0];
        assert_eq!(f.parameters.len(), 4);
        assert_eq!(f.parameters[0].name, "a");
        assert_eq!(f.parameters[0].type_annotation.as_deref(), Some("string"));
        assert!(!f.parameters[0].is_optional);
        assert!(f.parameters[1].is_optional);
        assert_eq!(f.parameters[2].default_value.as_deref(), Some("5"));
        assert_eq!(f.parameters[3].name, "...rest");
        assert_eq!(f.return_type.as_deref(), Some("Promise<void>"));
    }

    #[test]
    fn test_doc_comment_attachment() {
        let parsed = parse_ts(
            r#"
/** Loads a user. */
export function load() {}

/** Detached. */

function detached() {}

// plain comment
function plain() {}
"#,
        );
        let functions = extract_functions(&parsed);
        let doc = |name: &str| {
            functions
                .iter()
                .find(|f| f.name == name)
                .unwrap()
                .doc_comment
                .clone()
        };
        assert_eq!(doc("load").as_deref(), Some("Loads a user."));
        assert_eq!(doc("detached"), None);
        assert_eq!(doc("plain"), None);
    }

    #[test]
    fn test_class_members() {
        let parsed = parse_ts(
            r#"
export abstract class Repo<T> extends Base<T> implements Store, Closeable {
    private cache: Map<string, T>;
    static count = 0;
    constructor(private readonly db: Db, name: string) { super(); }
    /** Find one. */
    async find(id: string): Promise<T> { return this.load(id); }
    protected load(id: string): T { return null; }
    abstract close(): void;
}
"#,
        );
        let classes = extract_classes(&parsed);
        assert_eq!(classes.len(), 1);
        let repo = &classes[0];
        assert_eq!(repo.name, "Repo");
        assert!(repo.is_abstract);
        assert!(repo.is_exported);
        assert_eq!(repo.extends_from, vec!["Base"]);
        assert_eq!(repo.implements, vec!["Store", "Closeable"]);

        let cache = repo.properties.iter().find(|p| p.name == "cache").unwrap();
        assert_eq!(cache.visibility, Visibility::Private);
        assert_eq!(cache.type_annotation.as_deref(), Some("Map<string, T>"));
        assert!(repo.properties.iter().any(|p| p.name == "count" && p.is_static));
        let db = repo.properties.iter().find(|p| p.name == "db").unwrap();
        assert_eq!(db.visibility, Visibility::Private);
        assert!(!repo.properties.iter().any(|p| p.name == "name"));

        let find = repo.find_method("find").unwrap();
        assert!(find.function.is_async);
        assert_eq!(find.function.qualified_name, "Repo.find");
        assert_eq!(find.function.doc_comment.as_deref(), Some("Find one."));
        assert_eq!(repo.find_method("load").unwrap().visibility, Visibility::Protected);
        assert!(repo.find_method("close").unwrap().is_abstract);
    }

    #[test]
    fn test_interface_enum_and_type() {
        let parsed = parse_ts(
            r#"
export interface IUser extends Named {
    id: string;
    email?: string;
    getName(): string;
}
enum Status { Active, Inactive = "inactive" }
type Point = { x: number; y: number };
"#,
        );
        let classes = extract_classes(&parsed);
        let user = classes.iter().find(|c| c.name == "IUser").unwrap();
        assert_eq!(user.kind, ClassKind::Interface);
        assert_eq!(user.extends_from, vec!["Named"]);
        assert!(user.properties.iter().any(|p| p.name == "email" && p.is_optional));
        assert_eq!(
            user.find_method("getName").unwrap().function.return_type.as_deref(),
            Some("string")
        );

        let status = classes.iter().find(|c| c.name == "Status").unwrap();
        assert_eq!(status.kind, ClassKind::Enum);
        let members: Vec<_> = status.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(members, vec!["Active", "Inactive"]);

        let point = classes.iter().find(|c| c.name == "Point").unwrap();
        assert_eq!(point.kind, ClassKind::Type);
        assert_eq!(point.properties.len(), 2);
    }

    #[test]
    fn test_imports() {
        let parsed = parse_ts(
            r#"
import express, { Router as R, json } from 'express';
import * as path from "path";
import type { User } from './user';
import './side-effect';
const fs = require('fs');
const { join, resolve: res } = require('./util');
"#,
        );
        let imports = extract_imports(&parsed);
        let sources: Vec<_> = imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["express", "path", "./user", "./side-effect", "fs", "./util"]
        );

        let express = &imports[0];
        assert!(express.bindings[0].is_default);
        assert_eq!(express.bindings[1].name, "Router");
        assert_eq!(express.bindings[1].alias.as_deref(), Some("R"));
        assert!(imports[1].bindings[0].is_namespace);
        assert!(imports[3].bindings.is_empty());
        assert_eq!(imports[5].bindings.len(), 2);
        assert_eq!(imports[5].bindings[1].alias.as_deref(), Some("res"));
    }

    #[test]
    fn test_exports() {
        let parsed = parse_ts(
            r#"
export const a = 1, b = 2;
export default class Service {}
export { x as y } from './x';
export * from './all';
export * as ns from './ns';
"#,
        );
        let exports = extract_exports(&parsed);
        assert_eq!(exports.len(), 5);
        assert_eq!(exports[0].bindings.len(), 2);
        assert!(exports[1].bindings[0].is_default);
        assert_eq!(exports[1].bindings[0].name, "Service");
        assert_eq!(exports[2].source.as_deref(), Some("./x"));
        assert_eq!(exports[2].bindings[0].alias.as_deref(), Some("y"));
        assert!(exports[3].bindings[0].is_namespace);
        assert_eq!(exports[4].bindings[0].name, "ns");
    }

    #[test]
    fn test_commonjs_exports() {
        let parsed = parse(
            Language::JavaScript,
            r#"
function create() {}
function remove() {}
module.exports = { create, remove };
exports.extra = function () {};
"#,
        );
        let functions = extract_functions(&parsed);
        assert!(functions.iter().all(|f| f.is_exported), "{:?}", functions);
        assert!(functions.iter().any(|f| f.name == "extra"));
    }

    #[test]
    fn test_javascript_classes() {
        let parsed = parse(
            Language::JavaScript,
            r#"
class User extends Model {
    static table = 'users';
    #secret = 1;
    greet(name = 'world') { return this.format(name); }
    format(s) { return s; }
}
"#,
        );
        let classes = extract_classes(&parsed);
        let user = &classes[0];
        assert_eq!(user.extends_from, vec!["Model"]);
        assert!(user.properties.iter().any(|p| p.name == "table" && p.is_static));
        assert!(user
            .properties
            .iter()
            .any(|p| p.name == "#secret" && p.visibility == Visibility::Private));
        let greet = user.find_method("greet").unwrap();
        assert_eq!(greet.function.parameters[0].default_value.as_deref(), Some("'world'"));
    }

    #[test]
    fn test_calls_resolve_locally() {
        let parsed = parse_ts(
            r#"
function helper(x: number) { return x; }
export class Service {
    run() {
        helper(1);
        this.save({ id: 1 });
        [1].forEach(v => console.log(v));
    }
    save(record: object) {}
}
"#,
        );
        let functions = extract_functions(&parsed);
        let classes = extract_classes(&parsed);
        let symbols = LocalSymbols::new(&functions, &classes);
        let calls = extract_calls(&parsed, &symbols);

        let helper = calls.iter().find(|c| c.callee == "helper").unwrap();
        assert_eq!(helper.caller, "Service.run");
        assert_eq!(helper.resolved_callee.as_deref(), Some("helper"));
        assert_eq!(helper.arguments, vec!["1"]);

        let save = calls.iter().find(|c| c.callee == "save").unwrap();
        assert_eq!(save.resolved_callee.as_deref(), Some("Service.save"));

        let log = calls.iter().find(|c| c.callee == "log").unwrap();
        assert_eq!(log.caller, "Service.run");
        assert_eq!(log.resolved_callee, None);
    }

    #[test]
    fn test_malformed_source_does_not_panic() {
        let parsed = parse_ts("export function broken( { class X extends { ");
        let _ = extract_functions(&parsed);
        let _ = extract_classes(&parsed);
        let _ = extract_imports(&parsed);
        let _ = extract_exports(&parsed);
    }
}
