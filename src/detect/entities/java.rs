//! Entity detection for JPA/Hibernate annotations.

use tree_sitter::Node;

use crate::analysis::node::{child_of_kind, named_children, unquote, walk_tree};
use crate::analysis::SourceLocation;
use crate::detect::types::{EntityField, OrmFramework, Relationship, RelationshipKind};
use crate::parser::ParsedFile;

use super::{EntityDraft, SignalKind};

const COLUMN_ANNOTATIONS: &[&str] = &["Column", "Id", "EmbeddedId", "GeneratedValue", "JoinColumn", "Lob", "Enumerated", "Temporal"];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn relationship_kind(annotation: &str) -> Option<RelationshipKind> {
    match annotation {
        "OneToMany" => Some(RelationshipKind::OneToMany),
        "ManyToOne" | "OneToOne" => Some(RelationshipKind::ManyToOne),
        "ManyToMany" => Some(RelationshipKind::ManyToMany),
        _ => None,
    }
}

struct Annotation<'t> {
    name: String,
    /// `key = value` pairs; a lone value is stored under `value`.
    arguments: Vec<(String, Node<'t>)>,
}

impl<'t> Annotation<'t> {
    fn argument(&self, key: &str) -> Option<Node<'t>> {
        self.arguments.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    fn flag(&self, parsed: &ParsedFile, key: &str) -> bool {
        self.argument(key)
            .map(|v| parsed.node_text(v) == "true")
            .unwrap_or(false)
    }

    fn string(&self, parsed: &ParsedFile, key: &str) -> Option<String> {
        self.argument(key)
            .filter(|v| v.kind() == "string_literal")
            .map(|v| unquote(parsed.node_text(v)))
    }
}

fn annotations<'t>(parsed: &ParsedFile, declaration: Node<'t>) -> Vec<Annotation<'t>> {
    let Some(modifiers) = child_of_kind(declaration, "modifiers") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for node in named_children(modifiers) {
        if !matches!(node.kind(), "annotation" | "marker_annotation") {
            continue;
        }
        let Some(name) = node.child_by_field_name("name") else {
            continue;
        };
        let name = parsed.node_text(name);
        let mut annotation = Annotation {
            name: name.rsplit('.').next().unwrap_or(name).to_string(),
            arguments: Vec::new(),
        };
        if let Some(args) = node.child_by_field_name("arguments") {
            for arg in named_children(args) {
                if arg.kind() == "element_value_pair" {
                    if let (Some(k), Some(v)) =
                        (arg.child_by_field_name("key"), arg.child_by_field_name("value"))
                    {
                        annotation.arguments.push((parsed.node_text(k).to_string(), v));
                    }
                } else if arg.kind() != "comment" {
                    annotation.arguments.push(("value".to_string(), arg));
                }
            }
        }
        found.push(annotation);
    }
    found
}

/// Element type of a declared field type: `List<Task>` -> `Task`,
/// `Set<Tag>` -> `Tag`, `User` -> `User`.
fn element_type(raw: &str) -> String {
    let raw = raw.trim();
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let inner = &raw[open + 1..close];
            inner.rsplit(',').next().unwrap_or(inner).trim().to_string()
        }
        _ => raw.trim_end_matches("[]").to_string(),
    }
}

fn draft_from_class(parsed: &ParsedFile, class: Node) -> Option<EntityDraft> {
    let name = parsed.field_text(class, "name")?.to_string();
    let class_annotations = annotations(parsed, class);
    if class_annotations
        .iter()
        .any(|a| a.name == "MappedSuperclass" || a.name == "Embeddable")
    {
        return None;
    }

    let mut draft = EntityDraft::new(name, location(parsed, class));
    draft.framework = Some(OrmFramework::Jpa);
    let is_entity = class_annotations.iter().any(|a| a.name == "Entity");
    if is_entity {
        draft.mark(SignalKind::EntityMarker);
    }
    for annotation in &class_annotations {
        let table = match annotation.name.as_str() {
            "Table" => annotation.string(parsed, "name"),
            "Entity" => annotation.string(parsed, "name").filter(|_| draft.table_name.is_none()),
            _ => None,
        };
        if let Some(table) = table {
            draft.set_table(table);
        }
    }

    let body = class.child_by_field_name("body")?;
    for field_decl in named_children(body) {
        if field_decl.kind() != "field_declaration" {
            continue;
        }
        let modifiers_text = child_of_kind(field_decl, "modifiers")
            .map(|m| parsed.node_text(m))
            .unwrap_or("");
        let field_annotations = annotations(parsed, field_decl);
        if modifiers_text.split_whitespace().any(|m| m == "static" || m == "transient")
            || field_annotations.iter().any(|a| a.name == "Transient")
        {
            continue;
        }
        let field_type = parsed.field_text(field_decl, "type").unwrap_or("Object").to_string();

        let mut cursor = field_decl.walk();
        let names: Vec<String> = field_decl
            .children_by_field_name("declarator", &mut cursor)
            .filter_map(|d| parsed.field_text(d, "name").map(str::to_string))
            .collect();

        if let Some((annotation, kind)) = field_annotations
            .iter()
            .find_map(|a| relationship_kind(&a.name).map(|k| (a, k)))
        {
            let target = annotation
                .argument("targetEntity")
                .map(|v| parsed.node_text(v).trim_end_matches(".class").to_string())
                .unwrap_or_else(|| element_type(&field_type));
            for name in names {
                draft.relationships.push(Relationship {
                    kind,
                    target: target.clone(),
                    field: name,
                });
            }
            continue;
        }

        let marked = field_annotations
            .iter()
            .any(|a| COLUMN_ANNOTATIONS.contains(&a.name.as_str()));
        if marked {
            draft.mark(SignalKind::ColumnMarkers);
        } else if !is_entity {
            // Outside an @Entity class only annotated fields are persistent.
            continue;
        }

        let column = field_annotations.iter().find(|a| a.name == "Column");
        for name in names {
            let mut field = EntityField::new(name, field_type.clone());
            field.is_primary_key = field_annotations
                .iter()
                .any(|a| a.name == "Id" || a.name == "EmbeddedId");
            if let Some(column) = column {
                field.is_unique = column.flag(parsed, "unique");
                field.is_nullable = column.flag(parsed, "nullable");
            }
            draft.fields.push(field);
        }
    }

    Some(draft)
}

/// Detect entities in a parsed Java file.
pub(crate) fn detect(parsed: &ParsedFile) -> Vec<EntityDraft> {
    let mut classes = Vec::new();
    walk_tree(parsed.root(), |node| {
        if node.kind() == "class_declaration" {
            classes.push(node);
        }
    });
    classes
        .into_iter()
        .filter_map(|class| draft_from_class(parsed, class))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::entities::detect_source;
    use crate::parser::Language;

    #[test]
    fn test_jpa_entity() {
        let source = r#"
package com.example.model;

import javax.persistence.*;
import java.util.List;

@Entity
@Table(name = "app_users")
public class User {
    @Id
    @GeneratedValue(strategy = GenerationType.IDENTITY)
    private Long id;

    @Column(unique = true, nullable = false)
    private String email;

    private String displayName;

    @Transient
    private String cached;

    private static final long serialVersionUID = 1L;

    @OneToMany(mappedBy = "owner")
    private List<Task> tasks;

    @ManyToOne(targetEntity = Team.class)
    private Object team;
}
"#;
        let entities = detect_source("src/main/java/com/example/model/User.java", source, Language::Java);
        assert_eq!(entities.len(), 1);
        let user = &entities[0];
        assert_eq!(user.table_name, "app_users");
        assert_eq!(user.framework, OrmFramework::Jpa);
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "displayName"]);
        assert!(user.fields[0].is_primary_key);
        assert_eq!(user.fields[0].field_type, "Long");
        assert!(user.fields[1].is_unique);
        assert_eq!(user.relationships[0].target, "Task");
        assert_eq!(user.relationships[0].kind, RelationshipKind::OneToMany);
        assert_eq!(user.relationships[1].target, "Team");
        assert_eq!(user.confidence, 1.0);
    }

    #[test]
    fn test_mapped_superclass_skipped() {
        let source = r#"
import jakarta.persistence.*;

@MappedSuperclass
public abstract class Auditable {
    @Column
    private String createdBy;
}

@Entity
public class Category extends Auditable {
    @Id
    private Long id;
}
"#;
        let entities = detect_source("src/Category.java", source, Language::Java);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Category");
        assert_eq!(entities[0].table_name, "categories");
    }

    #[test]
    fn test_plain_class_ignored() {
        let source = r#"
import javax.persistence.EntityManager;

public class UserService {
    private EntityManager em;
}
"#;
        assert!(detect_source("src/UserService.java", source, Language::Java).is_empty());
    }
}
