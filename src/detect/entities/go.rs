//! Entity detection for GORM models.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::analysis::node::{named_children, unquote, walk_tree};
use crate::analysis::SourceLocation;
use crate::detect::types::{EntityField, OrmFramework, Relationship, RelationshipKind};
use crate::parser::ParsedFile;

use super::{EntityDraft, SignalKind};

static GORM_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"gorm:"([^"]*)""#).ok());

const BUILTIN_TYPES: &[&str] = &[
    "string", "bool", "byte", "rune", "int", "int8", "int16", "int32", "int64", "uint", "uint8",
    "uint16", "uint32", "uint64", "float32", "float64", "complex64", "complex128", "error", "any",
];

/// Fields contributed by an embedded `gorm.Model`.
const GORM_MODEL_FIELDS: &[(&str, &str)] = &[
    ("ID", "uint"),
    ("CreatedAt", "time.Time"),
    ("UpdatedAt", "time.Time"),
    ("DeletedAt", "gorm.DeletedAt"),
];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

/// Parsed `gorm:"..."` settings, keys lower-cased.
#[derive(Debug, Default)]
struct GormTag {
    present: bool,
    settings: HashMap<String, String>,
}

impl GormTag {
    fn parse(raw: &str) -> Self {
        let Some(captures) = GORM_TAG.as_ref().and_then(|re| re.captures(raw)) else {
            return Self::default();
        };
        let mut settings = HashMap::new();
        for part in captures[1].split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once(':').unwrap_or((part, ""));
            settings.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
        Self {
            present: true,
            settings,
        }
    }

    fn has(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    fn is_ignored(&self) -> bool {
        self.has("-")
    }
}

/// `[]*Task` -> (`Task`, true); `*User` -> (`User`, false).
fn referenced_type(raw: &str) -> (String, bool) {
    let mut ty = raw.trim();
    let is_slice = ty.starts_with("[]");
    ty = ty.trim_start_matches("[]").trim_start_matches('*');
    (ty.to_string(), is_slice)
}

fn looks_like_model(name: &str, local_structs: &HashSet<String>) -> bool {
    if local_structs.contains(name) {
        return true;
    }
    !name.contains('.')
        && !BUILTIN_TYPES.contains(&name)
        && name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Table names returned by `func (T) TableName() string { return "..." }`.
fn table_name_methods(parsed: &ParsedFile) -> HashMap<String, String> {
    let mut tables = HashMap::new();
    walk_tree(parsed.root(), |node| {
        if node.kind() != "method_declaration" || parsed.field_text(node, "name") != Some("TableName") {
            return;
        }
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| r.named_child(0))
            .and_then(|param| param.child_by_field_name("type"))
            .map(|t| parsed.node_text(t).trim_start_matches('*').to_string());
        let Some(receiver) = receiver else { return };
        let Some(body) = node.child_by_field_name("body") else { return };
        let mut literal = None;
        walk_tree(body, |n| {
            if literal.is_none()
                && matches!(n.kind(), "interpreted_string_literal" | "raw_string_literal")
            {
                literal = Some(unquote(parsed.node_text(n)));
            }
        });
        if let Some(table) = literal {
            tables.insert(receiver, table);
        }
    });
    tables
}

fn draft_from_struct(
    parsed: &ParsedFile,
    spec: Node,
    struct_type: Node,
    local_structs: &HashSet<String>,
) -> Option<EntityDraft> {
    let name = parsed.field_text(spec, "name")?.to_string();
    let mut draft = EntityDraft::new(name, location(parsed, spec));
    draft.framework = Some(OrmFramework::Gorm);

    let field_list = named_children(struct_type)
        .into_iter()
        .find(|c| c.kind() == "field_declaration_list")?;

    for decl in named_children(field_list) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let Some(type_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let type_text = parsed.node_text(type_node).to_string();
        let tag = decl
            .child_by_field_name("tag")
            .map(|t| GormTag::parse(parsed.node_text(t)))
            .unwrap_or_default();
        if tag.is_ignored() {
            continue;
        }
        if tag.present {
            draft.mark(SignalKind::ColumnMarkers);
        }

        let mut cursor = decl.walk();
        let names: Vec<String> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| parsed.node_text(n).to_string())
            .collect();

        if names.is_empty() {
            // Embedded field.
            if type_text.trim_start_matches('*') == "gorm.Model" {
                draft.mark(SignalKind::OrmBaseClass);
                for (field_name, field_type) in GORM_MODEL_FIELDS {
                    let mut field = EntityField::new(*field_name, *field_type);
                    field.is_primary_key = *field_name == "ID";
                    field.is_nullable = *field_name == "DeletedAt";
                    draft.fields.push(field);
                }
            }
            continue;
        }

        let (target, is_slice) = referenced_type(&type_text);
        let is_relation = tag.has("many2many")
            || tag.has("foreignkey")
            || (is_slice && looks_like_model(&target, local_structs))
            || (!is_slice && local_structs.contains(&target));
        if is_relation {
            let kind = if tag.has("many2many") {
                RelationshipKind::ManyToMany
            } else if is_slice {
                RelationshipKind::OneToMany
            } else {
                RelationshipKind::ManyToOne
            };
            for field_name in names {
                draft.relationships.push(Relationship {
                    kind,
                    target: target.clone(),
                    field: field_name,
                });
            }
            continue;
        }

        for field_name in names {
            if !field_name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                continue;
            }
            let column = tag
                .settings
                .get("column")
                .filter(|c| !c.is_empty())
                .cloned()
                .unwrap_or(field_name);
            let mut field = EntityField::new(column, type_text.clone());
            field.is_primary_key = tag.has("primarykey") || tag.has("primary_key");
            field.is_unique = tag.has("unique") || tag.has("uniqueindex");
            field.is_nullable = type_text.starts_with('*') && !tag.has("not null");
            draft.fields.push(field);
        }
    }

    // GORM treats a field named ID as the primary key by convention.
    if !draft.fields.iter().any(|f| f.is_primary_key) {
        if let Some(id) = draft.fields.iter_mut().find(|f| f.name == "ID") {
            id.is_primary_key = true;
        }
    }

    Some(draft)
}

/// Detect entities in a parsed Go file.
pub(crate) fn detect(parsed: &ParsedFile) -> Vec<EntityDraft> {
    let mut structs = Vec::new();
    walk_tree(parsed.root(), |node| {
        if node.kind() != "type_spec" {
            return;
        }
        if let Some(ty) = node.child_by_field_name("type").filter(|t| t.kind() == "struct_type") {
            structs.push((node, ty));
        }
    });

    let local_structs: HashSet<String> = structs
        .iter()
        .filter_map(|(spec, _)| parsed.field_text(*spec, "name").map(str::to_string))
        .collect();
    let tables = table_name_methods(parsed);

    structs
        .into_iter()
        .filter_map(|(spec, ty)| draft_from_struct(parsed, spec, ty, &local_structs))
        .map(|mut draft| {
            if let Some(table) = tables.get(&draft.name) {
                draft.set_table(table.clone());
            }
            draft
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::entities::detect_source;
    use crate::parser::Language;

    #[test]
    fn test_gorm_models() {
        let source = r#"
package models

import "gorm.io/gorm"

type User struct {
	gorm.Model
	Email string  `gorm:"uniqueIndex;not null" json:"email"`
	Name  string  `json:"name"`
	Tasks []Task  `gorm:"foreignKey:OwnerID"`
	Roles []Role  `gorm:"many2many:user_roles;"`
}

type Task struct {
	ID      uint   `gorm:"primaryKey"`
	Title   string `gorm:"column:task_title"`
	OwnerID uint
	Owner   User
}

func (Task) TableName() string {
	return "todo_tasks"
}

type request struct {
	Page int
}
"#;
        let entities = detect_source("internal/models/user.go", source, Language::Go);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Task"]);

        let user = &entities[0];
        assert_eq!(user.framework, OrmFramework::Gorm);
        assert_eq!(user.table_name, "users");
        assert_eq!(user.primary_keys().next().unwrap().name, "ID");
        let email = user.fields.iter().find(|f| f.name == "Email").unwrap();
        assert!(email.is_unique);
        assert_eq!(user.relationships.len(), 2);
        assert_eq!(user.relationships[0].kind, RelationshipKind::OneToMany);
        assert_eq!(user.relationships[0].target, "Task");
        assert_eq!(user.relationships[1].kind, RelationshipKind::ManyToMany);

        let task = &entities[1];
        assert_eq!(task.table_name, "todo_tasks");
        assert!(task.fields.iter().any(|f| f.name == "task_title"));
        assert_eq!(task.relationships[0].kind, RelationshipKind::ManyToOne);
        assert_eq!(task.relationships[0].target, "User");
    }

    #[test]
    fn test_gorm_tag_parse() {
        let tag = GormTag::parse(r#"`gorm:"primaryKey;column:user_id" json:"id"`"#);
        assert!(tag.present);
        assert!(tag.has("primarykey"));
        assert_eq!(tag.settings.get("column").map(String::as_str), Some("user_id"));
        assert!(!GormTag::parse(r#"`json:"id"`"#).present);
    }
}
