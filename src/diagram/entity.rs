//! `erDiagram` rendering of detected entities.

use std::collections::HashSet;
use std::fmt::Write;

use crate::detect::{Entity, EntityField, RelationshipKind};

use super::{sanitize_id, INDENT};

fn cardinality(kind: RelationshipKind) -> &'static str {
    match kind {
        RelationshipKind::OneToMany => "||--o{",
        RelationshipKind::ManyToOne => "}o--||",
        RelationshipKind::ManyToMany => "}o--o{",
    }
}

fn render_field(field: &EntityField) -> String {
    let ty = match sanitize_id(field.field_type.trim()).trim_matches('_') {
        "" => "unknown".to_string(),
        ty => ty.to_string(),
    };
    let mut line = format!("{} {}", ty, sanitize_id(&field.name));
    if field.is_primary_key {
        line.push_str(" PK");
    } else if field.is_unique {
        line.push_str(" UK");
    }
    line
}

/// One block per entity, one line per relationship. An entity name seen
/// twice is drawn from its first occurrence.
pub fn render_entity_diagram(entities: &[Entity]) -> String {
    let mut out = String::from("erDiagram\n");

    let mut seen = HashSet::new();
    let unique: Vec<&Entity> = entities
        .iter()
        .filter(|e| seen.insert(sanitize_id(&e.name)))
        .collect();

    for entity in &unique {
        let id = sanitize_id(&entity.name);
        if entity.fields.is_empty() {
            let _ = writeln!(out, "{}{}", INDENT, id);
            continue;
        }
        let _ = writeln!(out, "{}{} {{", INDENT, id);
        for field in &entity.fields {
            let _ = writeln!(out, "{}{}{}", INDENT, INDENT, render_field(field));
        }
        let _ = writeln!(out, "{}}}", INDENT);
    }

    for entity in &unique {
        let id = sanitize_id(&entity.name);
        for rel in &entity.relationships {
            let _ = writeln!(
                out,
                "{}{} {} {} : \"{}\"",
                INDENT,
                id,
                cardinality(rel.kind),
                sanitize_id(&rel.target),
                rel.field.replace('"', "'")
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SourceLocation;
    use crate::detect::{OrmFramework, Relationship};

    fn entity(name: &str, fields: Vec<EntityField>, relationships: Vec<Relationship>) -> Entity {
        Entity {
            name: name.to_string(),
            service: None,
            table_name: format!("{}s", name.to_lowercase()),
            framework: OrmFramework::TypeOrm,
            fields,
            relationships,
            confidence: 1.0,
            detection_signals: Vec::new(),
            file_path: "src/entities.ts".to_string(),
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_entity_blocks_and_relationships() {
        let mut id = EntityField::new("id", "number");
        id.is_primary_key = true;
        let mut email = EntityField::new("email", "string");
        email.is_unique = true;
        let user = entity(
            "User",
            vec![id, email],
            vec![Relationship {
                kind: RelationshipKind::OneToMany,
                target: "Task".into(),
                field: "tasks".into(),
            }],
        );
        let task = entity(
            "Task",
            vec![EntityField::new("owner_id", "Mapped[int]")],
            vec![
                Relationship {
                    kind: RelationshipKind::ManyToOne,
                    target: "User".into(),
                    field: "owner".into(),
                },
                Relationship {
                    kind: RelationshipKind::ManyToMany,
                    target: "Tag".into(),
                    field: "tags".into(),
                },
            ],
        );
        let out = render_entity_diagram(&[user, task, entity("Tag", Vec::new(), Vec::new())]);
        assert!(out.starts_with("erDiagram\n"));
        assert!(out.contains("    User {\n        number id PK\n        string email UK\n    }"));
        assert!(out.contains("Mapped_int owner_id"));
        assert!(out.contains("    Tag\n"));
        assert!(out.contains("User ||--o{ Task : \"tasks\""));
        assert!(out.contains("Task }o--|| User : \"owner\""));
        assert!(out.contains("Task }o--o{ Tag : \"tags\""));
    }
}
