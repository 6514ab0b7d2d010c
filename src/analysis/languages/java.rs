//! Java fact extraction using tree-sitter.
//!
//! Java has no free functions; everything callable is a method on a type.
//! A type is exported when it carries the `public` modifier.

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
    base_type_name, child_of_kind, find_ancestor, has_token, named_children,
    preceding_doc_comment, walk_tree,
};
use crate::parser::{Language, ParsedFile};

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
; import com.package.Class;
(import_declaration
  [(scoped_identifier) (identifier)] @import_path
) @import
"#;

static IMPORTS: Lazy<Option<Query>> = Lazy::new(|| {
    match Query::new(&Language::Java.grammar(), IMPORT_QUERY) {
        Ok(query) => Some(query),
        Err(e) => {
            tracing::warn!(error = %e, "failed to compile java import query");
            None
        }
    }
});

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const COMMENT_KINDS: &[&str] = &["block_comment", "comment"];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn text(parsed: &ParsedFile, node: Node) -> String {
    parsed.node_text(node).to_string()
}

fn has_modifier(node: Node, keyword: &str) -> bool {
    child_of_kind(node, "modifiers")
        .map(|m| has_token(m, keyword))
        .unwrap_or(false)
}

fn modifier_visibility(node: Node) -> Option<Visibility> {
    let modifiers = child_of_kind(node, "modifiers")?;
    ["public", "private", "protected"]
        .into_iter()
        .find(|kw| has_token(modifiers, kw))
        .and_then(Visibility::from_keyword)
}

fn javadoc(parsed: &ParsedFile, node: Node) -> Option<String> {
    preceding_doc_comment(parsed, node, COMMENT_KINDS, "/**")
}

/// Java has no free functions.
pub fn extract_functions(_parsed: &ParsedFile) -> Vec<FunctionDefinition> {
    Vec::new()
}

// =============================================================================
// Types
// =============================================================================

pub fn extract_classes(parsed: &ParsedFile) -> Vec<ClassDefinition> {
    let mut classes = Vec::new();
    walk_tree(parsed.root(), |node| {
        if TYPE_KINDS.contains(&node.kind()) {
            if let Some(class) = class_from_node(parsed, node) {
                classes.push(class);
            }
        }
    });
    classes
}

fn type_list(parsed: &ParsedFile, clause: Node) -> Vec<String> {
    let list = child_of_kind(clause, "type_list").unwrap_or(clause);
    named_children(list)
        .into_iter()
        .map(|t| base_type_name(parsed.node_text(t)))
        .collect()
}

fn class_from_node(parsed: &ParsedFile, node: Node) -> Option<ClassDefinition> {
    let name = parsed.field_text(node, "name")?.to_string();
    let kind = match node.kind() {
        "interface_declaration" => ClassKind::Interface,
        "enum_declaration" => ClassKind::Enum,
        _ => ClassKind::Class,
    };

    let mut class = ClassDefinition::new(name.clone(), kind, location(parsed, node));
    class.is_exported = has_modifier(node, "public");
    class.is_abstract = has_modifier(node, "abstract");
    class.doc_comment = javadoc(parsed, node);

    if let Some(superclass) = node.child_by_field_name("superclass") {
        if let Some(base) = named_children(superclass).into_iter().next() {
            class.extends_from.push(base_type_name(parsed.node_text(base)));
        }
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        class.implements.extend(type_list(parsed, interfaces));
    }
    if let Some(extends) = child_of_kind(node, "extends_interfaces") {
        class.extends_from.extend(type_list(parsed, extends));
    }

    // record Point(int x, int y)
    if let Some(params) = node
        .child_by_field_name("parameters")
        .filter(|_| node.kind() == "record_declaration")
    {
        for p in extract_parameters(parsed, params) {
            class.properties.push(PropertyDefinition {
                name: p.name,
                type_annotation: p.type_annotation,
                visibility: Visibility::Private,
                is_static: false,
                is_optional: false,
                location: location(parsed, params),
            });
        }
    }

    let Some(body) = node.child_by_field_name("body") else {
        return Some(class);
    };

    let mut members = named_children(body);
    // Enum constants come first, then an optional declarations block.
    if let Some(decls) = child_of_kind(body, "enum_body_declarations") {
        members.extend(named_children(decls));
    }

    let is_interface = kind == ClassKind::Interface;
    for member in members {
        match member.kind() {
            "enum_constant" => {
                if let Some(constant) = parsed.field_text(member, "name") {
                    class.properties.push(PropertyDefinition {
                        name: constant.to_string(),
                        type_annotation: None,
                        visibility: Visibility::Public,
                        is_static: true,
                        is_optional: false,
                        location: location(parsed, member),
                    });
                }
            }
            "method_declaration" | "constructor_declaration" => {
                let method = method_from_node(parsed, member, &name, is_interface, class.is_exported);
                class.methods.push(method);
            }
            "field_declaration" | "constant_declaration" => {
                class.properties.extend(fields_from_node(parsed, member, is_interface));
            }
            _ => {}
        }
    }

    Some(class)
}

fn extract_parameters(parsed: &ParsedFile, params: Node) -> Vec<Parameter> {
    named_children(params)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "formal_parameter" => Some(Parameter {
                name: parsed.field_text(p, "name")?.to_string(),
                type_annotation: parsed.field_text(p, "type").map(str::to_string),
                is_optional: false,
                default_value: None,
            }),
            // String... args
            "spread_parameter" => {
                let declarator = child_of_kind(p, "variable_declarator")?;
                let ty = named_children(p)
                    .into_iter()
                    .find(|c| !matches!(c.kind(), "variable_declarator" | "modifiers"))
                    .map(|t| format!("{}...", parsed.node_text(t)));
                Some(Parameter {
                    name: parsed.field_text(declarator, "name")?.to_string(),
                    type_annotation: ty,
                    is_optional: false,
                    default_value: None,
                })
            }
            _ => None,
        })
        .collect()
}

fn method_from_node(
    parsed: &ParsedFile,
    node: Node,
    class_name: &str,
    in_interface: bool,
    class_exported: bool,
) -> MethodDefinition {
    let name = parsed
        .field_text(node, "name")
        .unwrap_or(ANONYMOUS)
        .to_string();
    let visibility = modifier_visibility(node).unwrap_or(Visibility::Public);
    let has_body = node.child_by_field_name("body").is_some();
    let is_static = has_modifier(node, "static");
    let is_abstract = has_modifier(node, "abstract")
        || (in_interface && !has_body && !is_static && !has_modifier(node, "default"));

    let explicitly_public = in_interface || has_modifier(node, "public");

    MethodDefinition {
        function: FunctionDefinition {
            qualified_name: format!("{}.{}", class_name, name),
            parameters: node
                .child_by_field_name("parameters")
                .map(|p| extract_parameters(parsed, p))
                .unwrap_or_default(),
            return_type: parsed.field_text(node, "type").map(str::to_string),
            is_exported: class_exported && explicitly_public,
            is_async: false,
            location: location(parsed, node),
            doc_comment: javadoc(parsed, node),
            name,
        },
        visibility,
        is_static,
        is_abstract,
    }
}

fn fields_from_node(parsed: &ParsedFile, node: Node, in_interface: bool) -> Vec<PropertyDefinition> {
    let ty = parsed.field_text(node, "type").map(str::to_string);
    let visibility = modifier_visibility(node).unwrap_or(Visibility::Public);
    // Interface fields are implicitly static constants.
    let is_static = in_interface || has_modifier(node, "static");

    let mut cursor = node.walk();
    let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
    declarators
        .into_iter()
        .filter_map(|d| {
            Some(PropertyDefinition {
                name: parsed.field_text(d, "name")?.to_string(),
                type_annotation: ty.clone(),
                visibility,
                is_static,
                is_optional: false,
                location: location(parsed, node),
            })
        })
        .collect()
}

// =============================================================================
// Imports and exports
// =============================================================================

pub fn extract_imports(parsed: &ParsedFile) -> Vec<ImportStatement> {
    let Some(query) = IMPORTS.as_ref() else {
        return Vec::new();
    };
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.root(), parsed.source.as_bytes());
    let mut imports = Vec::new();

    while let Some(m) = matches.next() {
        let mut path = None;
        let mut decl = None;
        for capture in m.captures {
            match query.capture_names()[capture.index as usize] {
                "import_path" => path = Some(text(parsed, capture.node)),
                "import" => decl = Some(capture.node),
                _ => {}
            }
        }
        let (Some(path), Some(decl)) = (path, decl) else {
            continue;
        };

        let binding = if child_of_kind(decl, "asterisk").is_some() {
            ImportBinding::namespace("*")
        } else {
            let last = path.rsplit('.').next().unwrap_or(&path);
            ImportBinding::named(last)
        };
        imports.push(ImportStatement {
            source: path,
            bindings: vec![binding],
            location: location(parsed, decl),
        });
    }

    imports.sort_by_key(|i| (i.location.start_line, i.location.start_column));
    imports
}

/// One export per public top-level type.
pub fn extract_exports(parsed: &ParsedFile) -> Vec<ExportStatement> {
    named_children(parsed.root())
        .into_iter()
        .filter(|n| TYPE_KINDS.contains(&n.kind()) && has_modifier(*n, "public"))
        .filter_map(|n| {
            Some(ExportStatement {
                source: None,
                bindings: vec![ImportBinding::named(parsed.field_text(n, "name")?)],
                location: location(parsed, n),
            })
        })
        .collect()
}

// =============================================================================
// Calls
// =============================================================================

fn enclosing_scope(parsed: &ParsedFile, node: Node) -> (String, Option<String>) {
    let class = find_ancestor(node, TYPE_KINDS)
        .and_then(|c| parsed.field_text(c, "name"))
        .map(str::to_string);
    let method = find_ancestor(node, &["method_declaration", "constructor_declaration"])
        .and_then(|m| parsed.field_text(m, "name"));
    match (method, &class) {
        (Some(m), Some(c)) => (format!("{}.{}", c, m), class.clone()),
        (Some(m), None) => (m.to_string(), None),
        (None, Some(c)) => (c.clone(), class.clone()),
        (None, None) => (MODULE_SCOPE.to_string(), None),
    }
}

pub fn extract_calls(parsed: &ParsedFile, symbols: &LocalSymbols) -> Vec<CallExpression> {
    let mut calls = Vec::new();

    walk_tree(parsed.root(), |node| {
        if node.kind() != "method_invocation" {
            return;
        }
        let Some(callee) = parsed.field_text(node, "name") else {
            return;
        };
        let receiver = parsed.field_text(node, "object").map(str::to_string);
        let (caller, enclosing_class) = enclosing_scope(parsed, node);
        let arguments = node
            .child_by_field_name("arguments")
            .map(|args| {
                named_children(args)
                    .into_iter()
                    .filter(|a| !COMMENT_KINDS.contains(&a.kind()) && a.kind() != "line_comment")
                    .map(|a| argument_snippet(parsed.node_text(a)))
                    .collect()
            })
            .unwrap_or_default();

        let raw = RawCall {
            caller,
            callee: callee.to_string(),
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

    fn parse(source: &str) -> ParsedFile {
        let registry = ParserRegistry::with_languages(&[Language::Java]).unwrap();
        registry
            .parse(Language::Java, "src/main/java/app/User.java", source)
            .unwrap()
    }

    const USER: &str = r#"
package app;

import java.util.List;
import javax.persistence.*;
import static java.util.Objects.requireNonNull;

/** A registered user. */
@Entity
public class User extends BaseEntity implements Serializable, Comparable<User> {
    private Long id;
    protected String name, email;
    public static final int MAX = 10;

    public User(String name) { this.name = requireNonNull(name); }

    /** Display name. */
    public String getName() { return format(name); }

    private String format(String value) { return value.trim(); }

    static void log(String... lines) {}
}

interface Named {
    String getName();
    default String label() { return getName(); }
}

enum Role { ADMIN, MEMBER; public boolean isAdmin() { return this == ADMIN; } }
"#;

    #[test]
    fn test_no_free_functions() {
        assert!(extract_functions(&parse(USER)).is_empty());
    }

    #[test]
    fn test_class_structure() {
        let classes = extract_classes(&parse(USER));
        let user = classes.iter().find(|c| c.name == "User").unwrap();
        assert!(user.is_exported);
        assert_eq!(user.extends_from, vec!["BaseEntity"]);
        assert_eq!(user.implements, vec!["Serializable", "Comparable"]);
        assert_eq!(user.doc_comment.as_deref(), Some("A registered user."));

        let props: Vec<_> = user.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["id", "name", "email", "MAX"]);
        assert_eq!(user.properties[0].visibility, Visibility::Private);
        assert_eq!(user.properties[1].visibility, Visibility::Protected);
        assert!(user.properties[3].is_static);

        let get_name = user.find_method("getName").unwrap();
        assert!(get_name.function.is_exported);
        assert_eq!(get_name.function.return_type.as_deref(), Some("String"));
        assert_eq!(get_name.function.doc_comment.as_deref(), Some("Display name."));
        assert_eq!(user.find_method("format").unwrap().visibility, Visibility::Private);

        let log = user.find_method("log").unwrap();
        assert!(log.is_static);
        assert_eq!(log.function.parameters[0].type_annotation.as_deref(), Some("String..."));
        assert!(user.find_method("User").is_some());
    }

    #[test]
    fn test_interface_and_enum() {
        let classes = extract_classes(&parse(USER));
        let named = classes.iter().find(|c| c.name == "Named").unwrap();
        assert_eq!(named.kind, ClassKind::Interface);
        assert!(!named.is_exported);
        assert!(named.find_method("getName").unwrap().is_abstract);
        assert!(!named.find_method("label").unwrap().is_abstract);

        let role = classes.iter().find(|c| c.name == "Role").unwrap();
        assert_eq!(role.kind, ClassKind::Enum);
        let constants: Vec<_> = role.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(constants, vec!["ADMIN", "MEMBER"]);
        assert!(role.find_method("isAdmin").is_some());
    }

    #[test]
    fn test_imports_and_exports() {
        let parsed = parse(USER);
        let imports = extract_imports(&parsed);
        let sources: Vec<_> = imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["java.util.List", "javax.persistence", "java.util.Objects.requireNonNull"]
        );
        assert_eq!(imports[0].bindings[0].name, "List");
        assert!(imports[1].bindings[0].is_namespace);

        let exports = extract_exports(&parsed);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].bindings[0].name, "User");
    }

    #[test]
    fn test_calls() {
        let parsed = parse(USER);
        let classes = extract_classes(&parsed);
        let symbols = LocalSymbols::new(&[], &classes);
        let calls = extract_calls(&parsed, &symbols);

        let format = calls.iter().find(|c| c.callee == "format").unwrap();
        assert_eq!(format.caller, "User.getName");
        assert_eq!(format.resolved_callee.as_deref(), Some("User.format"));

        let trim = calls.iter().find(|c| c.callee == "trim").unwrap();
        assert_eq!(trim.resolved_callee, None);
    }
}
