//! Entity detection for TypeScript and JavaScript.
//!
//! Recognizes decorator-based mappers (TypeORM, MikroORM,
//! sequelize-typescript), classic Sequelize (`Model.init`, `define`,
//! association calls) and Mongoose schemas.

use tree_sitter::Node;

use crate::analysis::node::{
    base_type_name, child_of_kind, named_children, strip_type_prefix, unquote, walk_tree,
};
use crate::analysis::SourceLocation;
use crate::detect::types::{EntityField, OrmFramework, Relationship, RelationshipKind};
use crate::parser::ParsedFile;

use super::{EntityDraft, SignalKind};

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

const ENTITY_DECORATORS: &[&str] = &["Entity", "Table"];

const COLUMN_DECORATORS: &[&str] = &[
    "Column",
    "PrimaryColumn",
    "PrimaryGeneratedColumn",
    "CreateDateColumn",
    "UpdateDateColumn",
    "DeleteDateColumn",
    "VersionColumn",
    "ObjectIdColumn",
    "Property",
    "PrimaryKey",
    "SerializedPrimaryKey",
    "Enum",
    "Formula",
    "AutoIncrement",
    "Unique",
    "AllowNull",
    "CreatedAt",
    "UpdatedAt",
    "DeletedAt",
    "ForeignKey",
    "Default",
];

const PRIMARY_KEY_DECORATORS: &[&str] = &[
    "PrimaryColumn",
    "PrimaryGeneratedColumn",
    "ObjectIdColumn",
    "PrimaryKey",
    "SerializedPrimaryKey",
];

/// Wrappers whose type argument is the real element type.
const CONTAINER_TYPES: &[&str] = &["Array", "Collection", "Set", "Promise", "Ref", "Reference", "Relation"];

fn location(parsed: &ParsedFile, node: Node) -> SourceLocation {
    SourceLocation::from_node(&parsed.path, node)
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn relationship_kind(decorator: &str) -> Option<RelationshipKind> {
    match decorator {
        "OneToMany" | "HasMany" => Some(RelationshipKind::OneToMany),
        "ManyToOne" | "BelongsTo" | "OneToOne" | "HasOne" => Some(RelationshipKind::ManyToOne),
        "ManyToMany" | "BelongsToMany" => Some(RelationshipKind::ManyToMany),
        _ => None,
    }
}

/// Sequelize association method names.
fn association_kind(method: &str) -> Option<RelationshipKind> {
    match method {
        "hasMany" => Some(RelationshipKind::OneToMany),
        "belongsTo" | "hasOne" => Some(RelationshipKind::ManyToOne),
        "belongsToMany" => Some(RelationshipKind::ManyToMany),
        _ => None,
    }
}

// =============================================================================
// Decorators and literals
// =============================================================================

struct Decorator<'t> {
    name: String,
    args: Vec<Node<'t>>,
}

impl<'t> Decorator<'t> {
    /// The first object-literal argument (decorator options).
    fn options(&self) -> Option<Node<'t>> {
        self.args.iter().copied().find(|a| a.kind() == "object")
    }
}

fn call_arguments(call: Node) -> Vec<Node> {
    call.child_by_field_name("arguments")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|a| a.kind() != "comment")
                .collect()
        })
        .unwrap_or_default()
}

fn decorator_from<'t>(parsed: &ParsedFile, node: Node<'t>) -> Option<Decorator<'t>> {
    let inner = node.named_child(0)?;
    match inner.kind() {
        "call_expression" => {
            let function = inner.child_by_field_name("function")?;
            Some(Decorator {
                name: last_segment(parsed.node_text(function)).to_string(),
                args: call_arguments(inner),
            })
        }
        _ => Some(Decorator {
            name: last_segment(parsed.node_text(inner)).to_string(),
            args: Vec::new(),
        }),
    }
}

fn direct_decorators<'t>(parsed: &ParsedFile, node: Node<'t>) -> Vec<Decorator<'t>> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .filter_map(|c| decorator_from(parsed, c))
        .collect()
}

/// Class decorators sit on the class itself or, for `@X() export class`, on
/// the enclosing export statement.
fn class_decorators<'t>(parsed: &ParsedFile, class: Node<'t>) -> Vec<Decorator<'t>> {
    let mut decorators = direct_decorators(parsed, class);
    if let Some(parent) = class.parent() {
        if parent.kind() == "export_statement" {
            decorators.extend(direct_decorators(parsed, parent));
        }
    }
    decorators
}

/// Value node for `key` in an object literal.
fn object_value<'t>(parsed: &ParsedFile, object: Node<'t>, key: &str) -> Option<Node<'t>> {
    named_children(object)
        .into_iter()
        .filter(|c| c.kind() == "pair")
        .find(|pair| {
            pair.child_by_field_name("key")
                .map(|k| unquote(parsed.node_text(k)) == key)
                .unwrap_or(false)
        })
        .and_then(|pair| pair.child_by_field_name("value"))
}

fn object_flag(parsed: &ParsedFile, object: Option<Node>, keys: &[&str]) -> bool {
    object
        .map(|obj| {
            keys.iter().any(|key| {
                object_value(parsed, obj, key)
                    .map(|v| parsed.node_text(v) == "true")
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn object_string(parsed: &ParsedFile, object: Option<Node>, keys: &[&str]) -> Option<String> {
    let obj = object?;
    keys.iter().find_map(|key| {
        object_value(parsed, obj, key)
            .filter(|v| v.kind() == "string" || v.kind() == "template_string")
            .map(|v| unquote(parsed.node_text(v)))
    })
}

/// Target named by a relationship argument: `Task`, `() => Task`,
/// `type => Task`, or `'Task'`.
fn target_from_argument(parsed: &ParsedFile, arg: Node) -> Option<String> {
    match arg.kind() {
        "arrow_function" | "function_expression" => {
            let body = arg.child_by_field_name("body")?;
            if body.kind() == "statement_block" {
                return None;
            }
            target_from_argument(parsed, body)
        }
        "identifier" | "member_expression" => {
            Some(last_segment(parsed.node_text(arg)).to_string())
        }
        "string" | "template_string" => Some(unquote(parsed.node_text(arg))),
        "array" => arg.named_child(0).and_then(|el| target_from_argument(parsed, el)),
        _ => None,
    }
}

/// Element type of a declared type: `Task[]`, `Collection<Task>` and
/// `Task | null` all yield `Task`.
fn element_type(raw: &str) -> String {
    let mut ty = raw.split('|').next().unwrap_or(raw).trim();
    if let Some(stripped) = ty.strip_suffix("[]") {
        ty = stripped.trim();
    }
    let base = base_type_name(ty);
    if CONTAINER_TYPES.contains(&base.as_str()) {
        if let (Some(open), Some(close)) = (ty.find('<'), ty.rfind('>')) {
            if open < close {
                return element_type(&ty[open + 1..close]);
            }
        }
    }
    base
}

// =============================================================================
// Decorated classes
// =============================================================================

fn class_name(parsed: &ParsedFile, class: Node) -> Option<String> {
    class
        .child_by_field_name("name")
        .map(|n| parsed.node_text(n).to_string())
}

fn extends_model(parsed: &ParsedFile, class: Node) -> bool {
    let Some(heritage) = child_of_kind(class, "class_heritage") else {
        return false;
    };
    let mut found = false;
    walk_tree(heritage, |n| {
        if (n.kind() == "identifier" || n.kind() == "type_identifier")
            && parsed.node_text(n) == "Model"
        {
            found = true;
        }
    });
    found
}

/// Members of a class body with the decorators that apply to them.
///
/// TypeScript places method decorators as siblings before the member, while
/// field decorators are children of the field; both are collected.
fn decorated_members<'t>(parsed: &ParsedFile, body: Node<'t>) -> Vec<(Node<'t>, Vec<Decorator<'t>>)> {
    let mut members = Vec::new();
    let mut pending = Vec::new();
    for child in named_children(body) {
        match child.kind() {
            "decorator" => {
                if let Some(d) = decorator_from(parsed, child) {
                    pending.push(d);
                }
            }
            "comment" => {}
            _ => {
                let mut decorators = std::mem::take(&mut pending);
                decorators.extend(direct_decorators(parsed, child));
                members.push((child, decorators));
            }
        }
    }
    members
}

fn member_name(parsed: &ParsedFile, member: Node) -> Option<String> {
    member
        .child_by_field_name("name")
        .or_else(|| member.child_by_field_name("property"))
        .map(|n| unquote(parsed.node_text(n)))
}

fn member_type(parsed: &ParsedFile, member: Node) -> Option<String> {
    member
        .child_by_field_name("type")
        .map(|t| strip_type_prefix(parsed.node_text(t)))
        .filter(|t| !t.is_empty())
}

fn column_type(parsed: &ParsedFile, member: Node, decorators: &[Decorator]) -> String {
    if let Some(ty) = member_type(parsed, member) {
        return ty;
    }
    for decorator in decorators {
        if let Some(ty) = object_string(parsed, decorator.options(), &["type"]) {
            return ty;
        }
        if let Some(first) = decorator.args.first() {
            match first.kind() {
                "string" => return unquote(parsed.node_text(*first)),
                "member_expression" | "identifier" => {
                    return last_segment(parsed.node_text(*first)).to_string()
                }
                _ => {}
            }
        }
    }
    "unknown".to_string()
}

fn draft_from_class(parsed: &ParsedFile, class: Node) -> Option<EntityDraft> {
    let name = class_name(parsed, class)?;
    let mut draft = EntityDraft::new(name, location(parsed, class));

    for decorator in class_decorators(parsed, class) {
        if !ENTITY_DECORATORS.contains(&decorator.name.as_str()) {
            continue;
        }
        draft.mark(SignalKind::EntityMarker);
        if decorator.name == "Table" {
            draft.framework = Some(OrmFramework::SequelizeTypescript);
        }
        let table = decorator
            .args
            .first()
            .filter(|a| a.kind() == "string")
            .map(|a| unquote(parsed.node_text(*a)))
            .or_else(|| object_string(parsed, decorator.options(), &["tableName", "name", "collection"]));
        if let Some(table) = table {
            draft.set_table(table);
        }
    }

    if extends_model(parsed, class) {
        draft.mark(SignalKind::OrmBaseClass);
    }

    if let Some(body) = class.child_by_field_name("body") {
        for (member, decorators) in decorated_members(parsed, body) {
            if !matches!(member.kind(), "public_field_definition" | "field_definition") {
                continue;
            }
            let Some(field_name) = member_name(parsed, member) else {
                continue;
            };

            if let Some((decorator, kind)) = decorators
                .iter()
                .find_map(|d| relationship_kind(&d.name).map(|k| (d, k)))
            {
                let target = decorator
                    .args
                    .first()
                    .and_then(|a| target_from_argument(parsed, *a))
                    .or_else(|| member_type(parsed, member).map(|t| element_type(&t)));
                if let Some(target) = target {
                    draft.relationships.push(Relationship {
                        kind,
                        target,
                        field: field_name,
                    });
                }
                continue;
            }

            if !decorators
                .iter()
                .any(|d| COLUMN_DECORATORS.contains(&d.name.as_str()))
            {
                continue;
            }
            draft.mark(SignalKind::ColumnMarkers);

            let mut field = EntityField::new(field_name, column_type(parsed, member, &decorators));
            for decorator in &decorators {
                let options = decorator.options();
                if PRIMARY_KEY_DECORATORS.contains(&decorator.name.as_str())
                    || object_flag(parsed, options, &["primary", "primaryKey"])
                {
                    field.is_primary_key = true;
                }
                if decorator.name == "Unique" || object_flag(parsed, options, &["unique"]) {
                    field.is_unique = true;
                }
                if decorator.name == "AllowNull" || object_flag(parsed, options, &["nullable", "allowNull"]) {
                    field.is_nullable = true;
                }
            }
            if child_of_kind(member, "?").is_some() {
                field.is_nullable = true;
            }
            draft.fields.push(field);
        }
    }

    Some(draft)
}

// =============================================================================
// Sequelize and Mongoose call forms
// =============================================================================

/// Fields declared by a Sequelize attributes object.
fn sequelize_fields(parsed: &ParsedFile, attributes: Node) -> Vec<EntityField> {
    let mut fields = Vec::new();
    for pair in named_children(attributes) {
        if pair.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(value)) = (pair.child_by_field_name("key"), pair.child_by_field_name("value")) else {
            continue;
        };
        let name = unquote(parsed.node_text(key));
        let field = if value.kind() == "object" {
            let ty = object_value(parsed, value, "type")
                .map(|t| last_segment(parsed.node_text(t)).to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let mut field = EntityField::new(name, base_type_name(&ty));
            field.is_primary_key = object_flag(parsed, Some(value), &["primaryKey"]);
            field.is_unique = object_flag(parsed, Some(value), &["unique"]);
            field.is_nullable = object_flag(parsed, Some(value), &["allowNull"]);
            field
        } else {
            EntityField::new(name, base_type_name(last_segment(parsed.node_text(value))))
        };
        fields.push(field);
    }
    fields
}

enum MongooseValue {
    Field(EntityField),
    Relation(Relationship),
}

fn mongoose_field(parsed: &ParsedFile, name: String, value: Node) -> MongooseValue {
    match value.kind() {
        "object" => {
            if let Some(target) = object_string(parsed, Some(value), &["ref"]) {
                return MongooseValue::Relation(Relationship {
                    kind: RelationshipKind::ManyToOne,
                    target,
                    field: name,
                });
            }
            let ty = object_value(parsed, value, "type")
                .map(|t| last_segment(parsed.node_text(t)).to_string())
                .unwrap_or_else(|| "Object".to_string());
            let mut field = EntityField::new(name, ty);
            field.is_unique = object_flag(parsed, Some(value), &["unique"]);
            field.is_nullable = !object_flag(parsed, Some(value), &["required"]);
            MongooseValue::Field(field)
        }
        "array" => {
            if let Some(element) = value.named_child(0) {
                if element.kind() == "object" {
                    if let Some(target) = object_string(parsed, Some(element), &["ref"]) {
                        return MongooseValue::Relation(Relationship {
                            kind: RelationshipKind::OneToMany,
                            target,
                            field: name,
                        });
                    }
                }
                let inner = last_segment(parsed.node_text(element)).to_string();
                return MongooseValue::Field(EntityField::new(name, format!("{}[]", inner)));
            }
            MongooseValue::Field(EntityField::new(name, "Array"))
        }
        _ => {
            let mut field = EntityField::new(name, last_segment(parsed.node_text(value)));
            field.is_nullable = true;
            MongooseValue::Field(field)
        }
    }
}

/// `userSchema` -> `User`.
fn model_name_from_schema_var(var: &str) -> String {
    let stem = var
        .strip_suffix("Schema")
        .or_else(|| var.strip_suffix("_schema"))
        .filter(|s| !s.is_empty())
        .unwrap_or(var);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_schema_constructor(parsed: &ParsedFile, node: Node) -> bool {
    node.kind() == "new_expression"
        && node
            .child_by_field_name("constructor")
            .map(|c| last_segment(parsed.node_text(c)) == "Schema")
            .unwrap_or(false)
}

/// Detect entities in a parsed TypeScript/JavaScript file.
pub(crate) fn detect(parsed: &ParsedFile) -> Vec<EntityDraft> {
    let root = parsed.root();
    let mut drafts: Vec<EntityDraft> = Vec::new();
    let mut schemas: Vec<(String, Node)> = Vec::new();
    let mut model_calls: Vec<(String, String)> = Vec::new();
    let mut calls: Vec<Node> = Vec::new();

    walk_tree(root, |node| {
        if CLASS_KINDS.contains(&node.kind()) {
            if let Some(draft) = draft_from_class(parsed, node) {
                drafts.push(draft);
            }
            return;
        }
        match node.kind() {
            "variable_declarator" => {
                if let (Some(name), Some(value)) = (node.child_by_field_name("name"), node.child_by_field_name("value")) {
                    if is_schema_constructor(parsed, value) {
                        schemas.push((parsed.node_text(name).to_string(), value));
                    }
                }
            }
            "call_expression" => calls.push(node),
            _ => {}
        }
    });

    for call in calls {
        let Some(function) = call.child_by_field_name("function") else {
            continue;
        };
        let args = call_arguments(call);
        let callee = parsed.node_text(function);
        let method = last_segment(callee);

        if function.kind() == "member_expression" {
            let receiver = function
                .child_by_field_name("object")
                .map(|o| parsed.node_text(o).to_string())
                .unwrap_or_default();

            if method == "init" {
                if let Some(draft) = drafts.iter_mut().find(|d| d.name == receiver) {
                    apply_sequelize_init(parsed, draft, &args);
                }
                continue;
            }
            if method == "define" {
                if let Some(name) = args.first().filter(|a| a.kind() == "string") {
                    let mut draft = EntityDraft::new(unquote(parsed.node_text(*name)), location(parsed, call));
                    draft.mark(SignalKind::EntityMarker);
                    apply_sequelize_init(parsed, &mut draft, &args);
                    drafts.push(draft);
                }
                continue;
            }
            if let Some(kind) = association_kind(method) {
                let target = args.first().and_then(|a| target_from_argument(parsed, *a));
                if let (Some(draft), Some(target)) = (drafts.iter_mut().find(|d| d.name == receiver), target) {
                    let field = object_string(parsed, args.get(1).copied(), &["as", "foreignKey"])
                        .unwrap_or_else(|| target.to_lowercase());
                    draft.relationships.push(Relationship { kind, target, field });
                }
                continue;
            }
        }

        if method == "model" {
            if let (Some(name), Some(schema)) = (args.first(), args.get(1)) {
                if name.kind() == "string" && schema.kind() == "identifier" {
                    model_calls.push((
                        unquote(parsed.node_text(*name)),
                        parsed.node_text(*schema).to_string(),
                    ));
                }
            }
        }
    }

    for (var, constructor) in schemas {
        let registered = model_calls.iter().find(|(_, schema)| *schema == var);
        let name = registered
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| model_name_from_schema_var(&var));
        let mut draft = EntityDraft::new(name, location(parsed, constructor));
        draft.framework = Some(OrmFramework::Mongoose);
        if registered.is_some() {
            draft.mark(SignalKind::EntityMarker);
        }
        let definition = call_arguments(constructor).into_iter().find(|a| a.kind() == "object");
        if let Some(definition) = definition {
            let mut id = EntityField::new("_id", "ObjectId");
            id.is_primary_key = true;
            draft.fields.push(id);
            for pair in named_children(definition) {
                if pair.kind() != "pair" {
                    continue;
                }
                let (Some(key), Some(value)) = (pair.child_by_field_name("key"), pair.child_by_field_name("value")) else {
                    continue;
                };
                match mongoose_field(parsed, unquote(parsed.node_text(key)), value) {
                    MongooseValue::Field(field) => draft.fields.push(field),
                    MongooseValue::Relation(rel) => draft.relationships.push(rel),
                }
            }
            if draft.fields.len() > 1 || !draft.relationships.is_empty() {
                draft.mark(SignalKind::ColumnMarkers);
            }
        }
        drafts.push(draft);
    }

    drafts
}

fn apply_sequelize_init(parsed: &ParsedFile, draft: &mut EntityDraft, args: &[Node]) {
    let objects: Vec<Node> = args.iter().copied().filter(|a| a.kind() == "object").collect();
    if draft.framework.is_none() {
        draft.framework = Some(OrmFramework::Sequelize);
    }
    if let Some(attributes) = objects.first() {
        let fields = sequelize_fields(parsed, *attributes);
        if !fields.is_empty() {
            draft.mark(SignalKind::ColumnMarkers);
        }
        for field in fields {
            if !draft.has_field(&field.name) {
                draft.fields.push(field);
            }
        }
    }
    if let Some(table) = object_string(parsed, objects.get(1).copied(), &["tableName"]) {
        draft.set_table(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::entities::detect_source;
    use crate::parser::Language;

    #[test]
    fn test_typeorm_entity() {
        let source = r#"
import { Entity, Column, PrimaryGeneratedColumn, OneToMany, ManyToOne } from 'typeorm';

@Entity('users')
export class User {
  @PrimaryGeneratedColumn()
  id: number;

  @Column({ unique: true })
  email: string;

  @Column({ nullable: true })
  nickname?: string;

  @OneToMany(() => Task, (task) => task.owner)
  tasks: Task[];

  @ManyToOne(type => Team)
  team: Team;

  helper(): void {}
}
"#;
        let entities = detect_source("src/user.ts", source, Language::TypeScript);
        assert_eq!(entities.len(), 1);
        let user = &entities[0];
        assert_eq!(user.table_name, "users");
        assert_eq!(user.framework, OrmFramework::TypeOrm);
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "nickname"]);
        assert!(user.fields[0].is_primary_key);
        assert_eq!(user.fields[0].field_type, "number");
        assert!(user.fields[1].is_unique);
        assert!(user.fields[2].is_nullable);
        assert_eq!(user.relationships.len(), 2);
        assert_eq!(user.relationships[0].target, "Task");
        assert_eq!(user.relationships[0].field, "tasks");
        assert_eq!(user.relationships[1].kind, RelationshipKind::ManyToOne);
        assert_eq!(user.relationships[1].target, "Team");
        assert_eq!(user.confidence, 1.0);
    }

    #[test]
    fn test_entity_decorator_default_table() {
        let source = r#"
import { Entity, PrimaryKey, Property } from '@mikro-orm/core';

@Entity()
export class TaskItem {
  @PrimaryKey()
  id!: number;

  @Property()
  title!: string;
}
"#;
        let entities = detect_source("src/task-item.ts", source, Language::TypeScript);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].table_name, "task_items");
        assert_eq!(entities[0].framework, OrmFramework::MikroOrm);
    }

    #[test]
    fn test_sequelize_typescript() {
        let source = r#"
import { Table, Column, Model, HasMany, PrimaryKey, DataType } from 'sequelize-typescript';

@Table({ tableName: 'projects' })
export class Project extends Model {
  @PrimaryKey
  @Column(DataType.INTEGER)
  id: number;

  @HasMany(() => Task)
  tasks: Task[];
}
"#;
        let entities = detect_source("src/project.ts", source, Language::TypeScript);
        assert_eq!(entities.len(), 1);
        let project = &entities[0];
        assert_eq!(project.framework, OrmFramework::SequelizeTypescript);
        assert_eq!(project.table_name, "projects");
        assert!(project.fields[0].is_primary_key);
        assert_eq!(project.relationships[0].kind, RelationshipKind::OneToMany);
    }

    #[test]
    fn test_sequelize_init_and_associations() {
        let source = r#"
const { Model, DataTypes } = require('sequelize');

class Order extends Model {}

Order.init({
  id: { type: DataTypes.INTEGER, primaryKey: true, autoIncrement: true },
  total: DataTypes.DECIMAL,
}, { sequelize, tableName: 'orders' });

Order.belongsTo(Customer);
"#;
        let entities = detect_source("models/order.js", source, Language::JavaScript);
        assert_eq!(entities.len(), 1);
        let order = &entities[0];
        assert_eq!(order.framework, OrmFramework::Sequelize);
        assert_eq!(order.table_name, "orders");
        assert_eq!(order.fields.len(), 2);
        assert!(order.fields[0].is_primary_key);
        assert_eq!(order.fields[0].field_type, "INTEGER");
        assert_eq!(order.fields[1].field_type, "DECIMAL");
        assert_eq!(order.relationships[0].target, "Customer");
        assert_eq!(order.relationships[0].kind, RelationshipKind::ManyToOne);
    }

    #[test]
    fn test_mongoose_schema() {
        let source = r#"
const mongoose = require('mongoose');

const userSchema = new mongoose.Schema({
  email: { type: String, required: true, unique: true },
  name: String,
  tasks: [{ type: mongoose.Schema.Types.ObjectId, ref: 'Task' }],
  team: { type: mongoose.Schema.Types.ObjectId, ref: 'Team' },
});

module.exports = mongoose.model('User', userSchema);
"#;
        let entities = detect_source("src/user.js", source, Language::JavaScript);
        assert_eq!(entities.len(), 1);
        let user = &entities[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.framework, OrmFramework::Mongoose);
        assert_eq!(user.primary_keys().next().unwrap().name, "_id");
        let email = user.fields.iter().find(|f| f.name == "email").unwrap();
        assert!(email.is_unique);
        assert!(!email.is_nullable);
        assert_eq!(user.relationships.len(), 2);
        assert_eq!(user.relationships[0].kind, RelationshipKind::OneToMany);
        assert_eq!(user.relationships[1].kind, RelationshipKind::ManyToOne);
    }

    #[test]
    fn test_element_type() {
        assert_eq!(element_type("Task[]"), "Task");
        assert_eq!(element_type("Collection<Task>"), "Task");
        assert_eq!(element_type("Team | null"), "Team");
        assert_eq!(model_name_from_schema_var("userSchema"), "User");
    }
}
