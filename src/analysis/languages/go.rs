//! Go fact extraction using tree-sitter.
//!
//! Go exports by capitalization. Struct and interface types become class
//! facts; methods attach to their receiver type when that type is declared in
//! the same file, and are reported as `Type.Method` functions otherwise.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::analysis::extractors::{argument_snippet, LocalSymbols, RawCall};
use crate::analysis::facts::{
    CallExpression, ClassDefinition, ClassKind, ExportStatement, FunctionDefinition,
    ImportBinding, ImportStatement, MethodDefinition, Parameter, PropertyDefinition,
    SourceLocation, Visibility, MODULE_SCOPE,
};
use crate::analysis::node::{find_ancestor, named_children, preceding_line_comments, unquote, walk_tree};
use crate::parser::ParsedFile;

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

/// Go exports identifiers that start with an upper-case letter.
pub fn is_exported_name(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

fn name_visibility(name: &str) -> Visibility {
    if is_exported_name(name) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

fn doc(parsed: &ParsedFile, node: Node) -> Option<String> {
    preceding_line_comments(parsed, node, "comment")
}

/// `*Repo[T]` -> `Repo`.
fn bare_type(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('*');
    raw.split('[').next().unwrap_or(raw).trim().to_string()
}

/// Receiver variable name and base type of a method declaration.
fn receiver_of(parsed: &ParsedFile, method: Node) -> Option<(Option<String>, String)> {
    let list = method.child_by_field_name("receiver")?;
    let decl = named_children(list)
        .into_iter()
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = bare_type(parsed.field_text(decl, "type")?);
    let var = parsed.field_text(decl, "name").map(str::to_string);
    Some((var, ty))
}

/// Types declared in this file: `(name, type_spec, declared type node)`.
fn type_specs<'t>(parsed: &'t ParsedFile) -> Vec<(String, Node<'t>, Node<'t>)> {
    let mut specs = Vec::new();
    for decl in named_children(parsed.root()) {
        if decl.kind() != "type_declaration" {
            continue;
        }
        for spec in named_children(decl) {
            if !matches!(spec.kind(), "type_spec" | "type_alias") {
                continue;
            }
            let (Some(name), Some(ty)) = (
                parsed.field_text(spec, "name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            specs.push((name.to_string(), spec, ty));
        }
    }
    specs
}

fn struct_or_interface_names(parsed: &ParsedFile) -> HashSet<String> {
    type_specs(parsed)
        .into_iter()
        .filter(|(_, _, ty)| matches!(ty.kind(), "struct_type" | "interface_type"))
        .map(|(name, _, _)| name)
        .collect()
}

fn extract_parameters(parsed: &ParsedFile, list: Option<Node>) -> Vec<Parameter> {
    let Some(list) = list else {
        return Vec::new();
    };
    let mut params = Vec::new();
    for decl in named_children(list) {
        match decl.kind() {
            "parameter_declaration" => {
                let ty = parsed.field_text(decl, "type").map(str::to_string);
                let mut cursor = decl.walk();
                let names: Vec<Node> = decl.children_by_field_name("name", &mut cursor).collect();
                if names.is_empty() {
                    params.push(Parameter {
                        type_annotation: ty,
                        ..Parameter::named("_")
                    });
                } else {
                    for name in names {
                        params.push(Parameter {
                            type_annotation: ty.clone(),
                            ..Parameter::named(parsed.node_text(name))
                        });
                    }
                }
            }
            "variadic_parameter_declaration" => {
                let ty = parsed.field_text(decl, "type").map(|t| format!("...{}", t));
                params.push(Parameter {
                    type_annotation: ty,
                    ..Parameter::named(parsed.field_text(decl, "name").unwrap_or("_"))
                });
            }
            _ => {}
        }
    }
    params
}

fn build_function(parsed: &ParsedFile, node: Node, name: &str, qualified_name: String) -> FunctionDefinition {
    FunctionDefinition {
        name: name.to_string(),
        qualified_name,
        parameters: extract_parameters(parsed, node.child_by_field_name("parameters")),
        return_type: parsed.field_text(node, "result").map(str::to_string),
        is_exported: is_exported_name(name),
        is_async: false,
        location: location(parsed, node),
        doc_comment: doc(parsed, node),
    }
}

/// Free functions, plus methods whose receiver type is declared elsewhere.
pub fn extract_functions(parsed: &ParsedFile) -> Vec<FunctionDefinition> {
    let local_types = struct_or_interface_names(parsed);
    let mut functions = Vec::new();

    for node in named_children(parsed.root()) {
        let Some(name) = parsed.field_text(node, "name") else {
            continue;
        };
        match node.kind() {
            "function_declaration" => {
                functions.push(build_function(parsed, node, name, name.to_string()));
            }
            "method_declaration" => {
                let Some((_, ty)) = receiver_of(parsed, node) else {
                    continue;
                };
                if !local_types.contains(&ty) {
                    let qualified = format!("{}.{}", ty, name);
                    functions.push(build_function(parsed, node, name, qualified));
                }
            }
            _ => {}
        }
    }

    functions
}

// =============================================================================
// Types
// =============================================================================

pub fn extract_classes(parsed: &ParsedFile) -> Vec<ClassDefinition> {
    let mut classes: Vec<ClassDefinition> = type_specs(parsed)
        .into_iter()
        .map(|(name, spec, ty)| class_from_spec(parsed, name, spec, ty))
        .collect();

    // Attach methods to receiver types declared here.
    for node in named_children(parsed.root()) {
        if node.kind() != "method_declaration" {
            continue;
        }
        let (Some(name), Some((_, ty))) = (parsed.field_text(node, "name"), receiver_of(parsed, node)) else {
            continue;
        };
        let Some(class) = classes
            .iter_mut()
            .find(|c| c.name == ty && c.kind != ClassKind::Type)
        else {
            continue;
        };
        class.methods.push(MethodDefinition {
            function: build_function(parsed, node, name, format!("{}.{}", ty, name)),
            visibility: name_visibility(name),
            is_static: false,
            is_abstract: false,
        });
    }

    classes
}

fn class_from_spec(parsed: &ParsedFile, name: String, spec: Node, ty: Node) -> ClassDefinition {
    let kind = match ty.kind() {
        "struct_type" => ClassKind::Class,
        "interface_type" => ClassKind::Interface,
        _ => ClassKind::Type,
    };

    let mut class = ClassDefinition::new(name.clone(), kind, location(parsed, spec));
    class.is_exported = is_exported_name(&name);
    // Single-spec declarations carry the comment on the `type` keyword line.
    class.doc_comment = doc(parsed, spec).or_else(|| spec.parent().and_then(|d| doc(parsed, d)));

    match kind {
        ClassKind::Class => {
            if let Some(fields) = named_children(ty)
                .into_iter()
                .find(|n| n.kind() == "field_declaration_list")
            {
                for field in named_children(fields) {
                    if field.kind() == "field_declaration" {
                        add_struct_field(parsed, field, &mut class);
                    }
                }
            }
        }
        ClassKind::Interface => {
            for member in named_children(ty) {
                match member.kind() {
                    "method_elem" | "method_spec" => {
                        let Some(method_name) = parsed.field_text(member, "name") else {
                            continue;
                        };
                        class.methods.push(MethodDefinition {
                            function: build_function(
                                parsed,
                                member,
                                method_name,
                                format!("{}.{}", name, method_name),
                            ),
                            visibility: name_visibility(method_name),
                            is_static: false,
                            is_abstract: true,
                        });
                    }
                    // Embedded interface: `io.Reader`
                    "type_elem" | "constraint_elem" | "type_identifier" | "qualified_type" => {
                        class.extends_from.push(bare_type(parsed.node_text(member)));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    class
}

fn add_struct_field(parsed: &ParsedFile, field: Node, class: &mut ClassDefinition) {
    let ty = parsed.field_text(field, "type").map(str::to_string);
    let mut cursor = field.walk();
    let names: Vec<Node> = field.children_by_field_name("name", &mut cursor).collect();

    // Embedded field: `gorm.Model`, `*Base`
    if names.is_empty() {
        if let Some(ty) = ty {
            class.extends_from.push(bare_type(&ty));
        }
        return;
    }

    for name in names {
        let name = parsed.node_text(name);
        class.properties.push(PropertyDefinition {
            name: name.to_string(),
            type_annotation: ty.clone(),
            visibility: name_visibility(name),
            is_static: false,
            is_optional: ty.as_deref().map(|t| t.starts_with('*')).unwrap_or(false),
            location: location(parsed, field),
        });
    }
}

// =============================================================================
// Imports and exports
// =============================================================================

pub fn extract_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    let mut imports = Vec::new();
    walk_tree(parsed.root(), |node| {
        if node.kind() != "import_spec" {
            return;
        }
        let Some(path) = parsed.field_text(node, "path").map(unquote) else {
            return;
        };
        let package = path.rsplit('/').next().unwrap_or(&path).to_string();
        let alias = parsed.field_text(node, "name").map(str::to_string);
        imports.push(ImportStatement {
            bindings: vec![ImportBinding::namespace(package).with_alias(alias)],
            source: path,
            location: location(parsed, node),
        });
    });
    imports
}

/// Exported top-level functions and types.
pub fn extract_exports(parsed: &ParsedFile) -> Vec<ExportStatement> {
    let mut exports = Vec::new();

    for node in named_children(parsed.root()) {
        if node.kind() != "function_declaration" {
            continue;
        }
        if let Some(name) = parsed.field_text(node, "name").filter(|n| is_exported_name(n)) {
            exports.push(ExportStatement {
                source: None,
                bindings: vec![ImportBinding::named(name)],
                location: location(parsed, node),
            });
        }
    }
    for (name, spec, _) in type_specs(parsed) {
        if is_exported_name(&name) {
            exports.push(ExportStatement {
                source: None,
                bindings: vec![ImportBinding::named(name)],
                location: location(parsed, spec),
            });
        }
    }

    exports.sort_by_key(|e| (e.location.start_line, e.location.start_column));
    exports
}

// =============================================================================
// Calls
// =============================================================================

struct Scope {
    caller: String,
    class: Option<String>,
    receiver_var: Option<String>,
}

fn enclosing_scope(parsed: &ParsedFile, node: Node) -> Scope {
    let Some(decl) = find_ancestor(node, &["function_declaration", "method_declaration"]) else {
        return Scope {
            caller: MODULE_SCOPE.to_string(),
            class: None,
            receiver_var: None,
        };
    };
    let name = parsed.field_text(decl, "name").unwrap_or_default();
    match receiver_of(parsed, decl) {
        Some((var, ty)) => Scope {
            caller: format!("{}.{}", ty, name),
            class: Some(ty),
            receiver_var: var,
        },
        None => Scope {
            caller: name.to_string(),
            class: None,
            receiver_var: None,
        },
    }
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
            "identifier" => (parsed.node_text(function).to_string(), None),
            "selector_expression" => {
                let Some(field) = parsed.field_text(function, "field") else {
                    return;
                };
                let operand = parsed.field_text(function, "operand").map(str::to_string);
                (field.to_string(), operand)
            }
            _ => return,
        };

        let scope = enclosing_scope(parsed, node);
        let receiver_is_self = receiver.is_some() && receiver == scope.receiver_var;
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
            caller: scope.caller,
            callee,
            receiver,
            receiver_is_self,
            enclosing_class: scope.class,
            arguments,
            location: location(parsed, node),
        };
        calls.push(raw.resolve(symbols));
    });

    calls
}
