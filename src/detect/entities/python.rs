//! Entity detection for Python: SQLAlchemy, Django, SQLModel and Peewee.

use tree_sitter::Node;

use crate::analysis::node::{named_children, unquote, walk_tree};
use crate::analysis::SourceLocation;
use crate::detect::types::{EntityField, OrmFramework, Relationship, RelationshipKind};
use crate::parser::ParsedFile;

use super::naming::default_table_name;
use super::{EntityDraft, SignalKind};

/// Bases that map a class to a table.
const ORM_BASES: &[&str] = &["Base", "Model"];

/// Bases that define a declarative root rather than a table.
const DECLARATIVE_ROOTS: &[&str] = &["DeclarativeBase", "DeclarativeBaseNoMeta", "AsyncAttrs"];

/// Bases that mark a validation schema.
const VALIDATION_BASES: &[&str] = &["BaseModel", "Schema", "BaseSettings"];

const PRIMARY_KEY_FIELDS: &[&str] = &["AutoField", "BigAutoField", "SmallAutoField", "PrimaryKeyField"];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// The innermost type argument: `Mapped[List["Task"]]` -> `Task`,
/// `Optional[int]` -> `int`.
fn innermost_type(raw: &str) -> String {
    let mut ty = raw.trim();
    while let (Some(open), Some(close)) = (ty.find('['), ty.rfind(']')) {
        if open >= close {
            break;
        }
        ty = ty[open + 1..close].trim();
    }
    let first = ty.split(',').next().unwrap_or(ty);
    last_segment(&unquote(first)).to_string()
}

fn is_collection_annotation(raw: &str) -> bool {
    ["List[", "list[", "Set[", "set[", "Sequence["]
        .iter()
        .any(|c| raw.contains(c))
}

/// A call split into callee, positional arguments and keyword arguments.
struct PyCall<'t> {
    name: String,
    positional: Vec<Node<'t>>,
    keywords: Vec<(String, Node<'t>)>,
}

impl<'t> PyCall<'t> {
    fn parse(parsed: &ParsedFile, node: Node<'t>) -> Option<Self> {
        if node.kind() != "call" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        let mut call = PyCall {
            name: parsed.node_text(function).to_string(),
            positional: Vec::new(),
            keywords: Vec::new(),
        };
        if let Some(args) = node.child_by_field_name("arguments") {
            for arg in named_children(args) {
                match arg.kind() {
                    "keyword_argument" => {
                        if let (Some(k), Some(v)) =
                            (arg.child_by_field_name("name"), arg.child_by_field_name("value"))
                        {
                            call.keywords.push((parsed.node_text(k).to_string(), v));
                        }
                    }
                    "comment" => {}
                    _ => call.positional.push(arg),
                }
            }
        }
        Some(call)
    }

    fn callee(&self) -> &str {
        last_segment(&self.name)
    }

    fn keyword(&self, key: &str) -> Option<Node<'t>> {
        self.keywords.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    fn flag(&self, parsed: &ParsedFile, key: &str) -> bool {
        self.keyword(key)
            .map(|v| parsed.node_text(v) == "True")
            .unwrap_or(false)
    }
}

/// One class-level assignment: `name: annotation = value`.
struct ClassAttribute<'t> {
    name: String,
    annotation: Option<String>,
    value: Option<Node<'t>>,
}

fn class_attributes<'t>(parsed: &ParsedFile, body: Node<'t>) -> Vec<ClassAttribute<'t>> {
    let mut attrs = Vec::new();
    for stmt in named_children(body) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(assign) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
            continue;
        };
        let Some(left) = assign.child_by_field_name("left").filter(|l| l.kind() == "identifier") else {
            continue;
        };
        attrs.push(ClassAttribute {
            name: parsed.node_text(left).to_string(),
            annotation: assign
                .child_by_field_name("type")
                .map(|t| parsed.node_text(t).to_string()),
            value: assign.child_by_field_name("right"),
        });
    }
    attrs
}

/// Table named in a nested `class Meta` (`db_table` or `table_name`).
fn meta_table(parsed: &ParsedFile, body: Node) -> Option<String> {
    let meta = named_children(body).into_iter().find(|n| {
        n.kind() == "class_definition"
            && n.child_by_field_name("name")
                .map(|name| parsed.node_text(name) == "Meta")
                .unwrap_or(false)
    })?;
    let meta_body = meta.child_by_field_name("body")?;
    class_attributes(parsed, meta_body)
        .into_iter()
        .find(|a| a.name == "db_table" || a.name == "table_name")
        .and_then(|a| a.value)
        .filter(|v| v.kind() == "string")
        .map(|v| unquote(parsed.node_text(v)))
}

/// Table part of a `ForeignKey("users.id")` argument.
fn foreign_key_table(parsed: &ParsedFile, call: &PyCall) -> Option<String> {
    call.positional
        .iter()
        .find_map(|arg| PyCall::parse(parsed, *arg).filter(|c| c.callee() == "ForeignKey"))
        .and_then(|fk| fk.positional.first().copied())
        .filter(|a| a.kind() == "string")
        .map(|a| {
            let target = unquote(parsed.node_text(a));
            target.split('.').next().unwrap_or(&target).to_string()
        })
}

/// Relationship target from the first positional argument.
fn target_argument(parsed: &ParsedFile, call: &PyCall, owner: &str) -> Option<String> {
    let arg = call.positional.first()?;
    let target = match arg.kind() {
        "string" => unquote(parsed.node_text(*arg)),
        "identifier" | "attribute" => parsed.node_text(*arg).to_string(),
        _ => return None,
    };
    let target = last_segment(&target).to_string();
    if target == "self" {
        Some(owner.to_string())
    } else {
        Some(target)
    }
}

struct ClassShape {
    framework: Option<OrmFramework>,
    orm_base: bool,
    declarative_root: bool,
    validation_base: bool,
}

fn class_shape(parsed: &ParsedFile, class: Node) -> ClassShape {
    let mut shape = ClassShape {
        framework: None,
        orm_base: false,
        declarative_root: false,
        validation_base: false,
    };
    let Some(bases) = class.child_by_field_name("superclasses") else {
        return shape;
    };
    let table_keyword = named_children(bases).into_iter().any(|arg| {
        arg.kind() == "keyword_argument"
            && arg
                .child_by_field_name("name")
                .map(|n| parsed.node_text(n) == "table")
                .unwrap_or(false)
            && arg
                .child_by_field_name("value")
                .map(|v| parsed.node_text(v) == "True")
                .unwrap_or(false)
    });

    for base in named_children(bases) {
        if !matches!(base.kind(), "identifier" | "attribute") {
            continue;
        }
        let full = parsed.node_text(base);
        let name = last_segment(full);
        if full == "models.Model" {
            shape.framework = Some(OrmFramework::Django);
            shape.orm_base = true;
        } else if name == "SQLModel" {
            if table_keyword {
                shape.framework = Some(OrmFramework::SqlModel);
                shape.orm_base = true;
            } else {
                shape.validation_base = true;
            }
        } else if DECLARATIVE_ROOTS.contains(&name) {
            shape.declarative_root = true;
        } else if ORM_BASES.contains(&name) {
            shape.orm_base = true;
        } else if VALIDATION_BASES.contains(&name) {
            shape.validation_base = true;
        }
    }
    shape
}

fn draft_from_class(parsed: &ParsedFile, class: Node) -> Option<EntityDraft> {
    let name = parsed.field_text(class, "name")?.to_string();
    let body = class.child_by_field_name("body")?;
    let shape = class_shape(parsed, class);
    if shape.declarative_root {
        return None;
    }
    let attributes = class_attributes(parsed, body);
    let is_abstract = attributes.iter().any(|a| {
        a.name == "__abstract__" && a.value.map(|v| parsed.node_text(v) == "True").unwrap_or(false)
    });
    if is_abstract {
        return None;
    }

    let mut draft = EntityDraft::new(name.clone(), location(parsed, class));
    draft.framework = shape.framework;
    if shape.orm_base {
        draft.mark(SignalKind::OrmBaseClass);
    }
    if shape.validation_base {
        draft.mark(SignalKind::ValidationBase);
    }
    if let Some(table) = meta_table(parsed, body) {
        draft.set_table(table);
    }

    let foreign_tables: Vec<String> = attributes
        .iter()
        .filter_map(|a| a.value.and_then(|v| PyCall::parse(parsed, v)))
        .filter_map(|c| foreign_key_table(parsed, &c))
        .collect();

    for attr in &attributes {
        if attr.name == "__tablename__" {
            if let Some(v) = attr.value.filter(|v| v.kind() == "string") {
                draft.set_table(unquote(parsed.node_text(v)));
            }
            continue;
        }
        if attr.name.starts_with("__") {
            continue;
        }

        let call = attr.value.and_then(|v| PyCall::parse(parsed, v));
        let Some(call) = call else {
            // Bare annotated attribute: `title: Mapped[str]`, or a field of a
            // SQLModel table.
            if let Some(annotation) = &attr.annotation {
                let mapped = annotation.starts_with("Mapped[");
                if mapped || draft.framework == Some(OrmFramework::SqlModel) {
                    if mapped {
                        draft.mark(SignalKind::ColumnMarkers);
                    }
                    let mut field = EntityField::new(attr.name.clone(), innermost_type(annotation));
                    field.is_nullable = annotation.contains("Optional[");
                    draft.fields.push(field);
                }
            }
            continue;
        };

        match call.callee() {
            "relationship" | "Relationship" => {
                let target = target_argument(parsed, &call, &name)
                    .or_else(|| attr.annotation.as_deref().map(innermost_type));
                let Some(target) = target else { continue };
                let kind = sqlalchemy_relationship_kind(parsed, &call, attr.annotation.as_deref(), &target, &foreign_tables);
                draft.relationships.push(Relationship {
                    kind,
                    target,
                    field: attr.name.clone(),
                });
            }
            "Column" | "mapped_column" | "Field" => {
                draft.mark(SignalKind::ColumnMarkers);
                let ty = call
                    .positional
                    .iter()
                    .find(|a| {
                        PyCall::parse(parsed, **a)
                            .map(|c| c.callee() != "ForeignKey")
                            .unwrap_or(matches!(a.kind(), "identifier" | "attribute"))
                    })
                    .map(|a| {
                        let text = parsed.node_text(*a);
                        last_segment(text.split('(').next().unwrap_or(text)).to_string()
                    })
                    .or_else(|| attr.annotation.as_deref().map(innermost_type))
                    .unwrap_or_else(|| "unknown".to_string());
                let mut field = EntityField::new(attr.name.clone(), ty);
                field.is_primary_key = call.flag(parsed, "primary_key");
                field.is_unique = call.flag(parsed, "unique");
                field.is_nullable = call.flag(parsed, "nullable")
                    || attr
                        .annotation
                        .as_deref()
                        .map(|a| a.contains("Optional["))
                        .unwrap_or(false);
                draft.fields.push(field);
            }
            callee if callee == "ForeignKey" || callee.ends_with("Field") => {
                draft.mark(SignalKind::ColumnMarkers);
                let kind = match callee {
                    "ForeignKey" | "ForeignKeyField" | "OneToOneField" => Some(RelationshipKind::ManyToOne),
                    "ManyToManyField" => Some(RelationshipKind::ManyToMany),
                    _ => None,
                };
                if let Some(kind) = kind {
                    if let Some(target) = target_argument(parsed, &call, &name) {
                        draft.relationships.push(Relationship {
                            kind,
                            target,
                            field: attr.name.clone(),
                        });
                    }
                    continue;
                }
                let mut field = EntityField::new(attr.name.clone(), callee);
                field.is_primary_key =
                    call.flag(parsed, "primary_key") || PRIMARY_KEY_FIELDS.contains(&callee);
                field.is_unique = call.flag(parsed, "unique");
                field.is_nullable = call.flag(parsed, "null");
                draft.fields.push(field);
            }
            _ => {}
        }
    }

    Some(draft)
}

fn sqlalchemy_relationship_kind(
    parsed: &ParsedFile,
    call: &PyCall,
    annotation: Option<&str>,
    target: &str,
    foreign_tables: &[String],
) -> RelationshipKind {
    if call.keyword("secondary").is_some() || call.keyword("link_model").is_some() {
        return RelationshipKind::ManyToMany;
    }
    if call
        .keyword("uselist")
        .map(|v| parsed.node_text(v) == "False")
        .unwrap_or(false)
    {
        return RelationshipKind::ManyToOne;
    }
    if annotation.map(is_collection_annotation).unwrap_or(false) {
        return RelationshipKind::OneToMany;
    }
    let target_table = default_table_name(target);
    if foreign_tables.iter().any(|t| *t == target_table || t.eq_ignore_ascii_case(target)) {
        return RelationshipKind::ManyToOne;
    }
    if annotation.is_some() {
        return RelationshipKind::ManyToOne;
    }
    RelationshipKind::OneToMany
}

/// Detect entities in a parsed Python file.
pub(crate) fn detect(parsed: &ParsedFile) -> Vec<EntityDraft> {
    let mut classes = Vec::new();
    walk_tree(parsed.root(), |node| {
        if node.kind() == "class_definition" {
            let is_meta = parsed.field_text(node, "name") == Some("Meta");
            if !is_meta {
                classes.push(node);
            }
        }
    });

    let mut drafts: Vec<EntityDraft> = classes
        .into_iter()
        .filter_map(|class| draft_from_class(parsed, class))
        .collect();

    // Django and Peewee add an implicit `id` key.
    for draft in &mut drafts {
        let implicit_id = matches!(draft.framework, Some(OrmFramework::Django) | Some(OrmFramework::Peewee))
            || (draft.signals.contains(&SignalKind::OrmBaseClass)
                && draft.fields.iter().any(|f| f.field_type.ends_with("Field")));
        if implicit_id && !draft.fields.iter().any(|f| f.is_primary_key) && !draft.has_field("id") {
            let mut id = EntityField::new("id", "AutoField");
            id.is_primary_key = true;
            draft.fields.insert(0, id);
        }
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::entities::detect_source;
    use crate::parser::Language;

    #[test]
    fn test_sqlalchemy_declarative() {
        let source = r#"
from sqlalchemy import Column, Integer, String, ForeignKey
from sqlalchemy.orm import relationship
from .database import Base

class User(Base):
    __tablename__ = "users"

    id = Column(Integer, primary_key=True, index=True)
    email = Column(String(255), unique=True, nullable=False)
    tasks = relationship("Task", back_populates="owner")

class Task(Base):
    __tablename__ = "tasks"

    id = Column(Integer, primary_key=True)
    owner_id = Column(Integer, ForeignKey("users.id"))
    owner = relationship("User", back_populates="tasks")
    tags = relationship("Tag", secondary="task_tags")
"#;
        let entities = detect_source("app/models.py", source, Language::Python);
        assert_eq!(entities.len(), 2);
        let user = &entities[0];
        assert_eq!(user.table_name, "users");
        assert_eq!(user.framework, OrmFramework::SqlAlchemy);
        assert_eq!(user.fields[1].field_type, "String");
        assert!(user.fields[1].is_unique);
        assert_eq!(user.relationships[0].kind, RelationshipKind::OneToMany);

        let task = &entities[1];
        assert_eq!(task.fields[1].field_type, "Integer");
        assert_eq!(task.relationships[0].target, "User");
        assert_eq!(task.relationships[0].kind, RelationshipKind::ManyToOne);
        assert_eq!(task.relationships[1].kind, RelationshipKind::ManyToMany);
    }

    #[test]
    fn test_sqlalchemy_mapped_annotations() {
        let source = r#"
from typing import List, Optional
from sqlalchemy.orm import DeclarativeBase, Mapped, mapped_column, relationship

class Base(DeclarativeBase):
    pass

class Project(Base):
    __tablename__ = "projects"
    id: Mapped[int] = mapped_column(primary_key=True)
    name: Mapped[str]
    description: Mapped[Optional[str]]
    items: Mapped[List["ProjectItem"]] = relationship(back_populates="project")
"#;
        let entities = detect_source("app/db.py", source, Language::Python);
        let project = entities.iter().find(|e| e.name == "Project").unwrap();
        assert_eq!(project.fields.len(), 3);
        assert_eq!(project.fields[0].field_type, "int");
        assert!(project.fields[0].is_primary_key);
        assert!(project.fields[2].is_nullable);
        assert_eq!(project.relationships[0].target, "ProjectItem");
        assert_eq!(project.relationships[0].kind, RelationshipKind::OneToMany);
    }

    #[test]
    fn test_django_model() {
        let source = r#"
from django.db import models

class Article(models.Model):
    title = models.CharField(max_length=200, unique=True)
    author = models.ForeignKey("auth.User", on_delete=models.CASCADE)
    tags = models.ManyToManyField(Tag)
    parent = models.ForeignKey("self", null=True, on_delete=models.SET_NULL)

    class Meta:
        db_table = "blog_articles"
"#;
        let entities = detect_source("blog/models.py", source, Language::Python);
        assert_eq!(entities.len(), 1);
        let article = &entities[0];
        assert_eq!(article.framework, OrmFramework::Django);
        assert_eq!(article.table_name, "blog_articles");
        assert_eq!(article.fields[0].name, "id");
        assert!(article.fields[0].is_primary_key);
        assert_eq!(article.fields[1].field_type, "CharField");
        assert!(article.fields[1].is_unique);
        let targets: Vec<&str> = article.relationships.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["User", "Tag", "Article"]);
        assert_eq!(article.relationships[1].kind, RelationshipKind::ManyToMany);
    }

    #[test]
    fn test_sqlmodel_table_vs_schema() {
        let source = r#"
from typing import Optional
from sqlmodel import Field, SQLModel

class HeroBase(SQLModel):
    name: str

class Hero(SQLModel, table=True):
    id: Optional[int] = Field(default=None, primary_key=True)
    name: str
"#;
        let entities = detect_source("app/heroes.py", source, Language::Python);
        assert_eq!(entities.len(), 1);
        let hero = &entities[0];
        assert_eq!(hero.name, "Hero");
        assert_eq!(hero.framework, OrmFramework::SqlModel);
        assert_eq!(hero.table_name, "heros");
        assert_eq!(hero.fields.len(), 2);
        assert!(hero.fields[0].is_primary_key);
    }

    #[test]
    fn test_peewee_model() {
        let source = r#"
import peewee

class Account(peewee.Model):
    email = peewee.CharField(unique=True)
    owner = peewee.ForeignKeyField(Person, backref="accounts")
"#;
        let entities = detect_source("app/store.py", source, Language::Python);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].framework, OrmFramework::Peewee);
        assert_eq!(entities[0].fields[0].name, "id");
        assert_eq!(entities[0].relationships[0].target, "Person");
    }

    #[test]
    fn test_innermost_type() {
        assert_eq!(innermost_type("Mapped[List[\"Task\"]]"), "Task");
        assert_eq!(innermost_type("Optional[int]"), "int");
        assert_eq!(innermost_type("str"), "str");
    }
}
