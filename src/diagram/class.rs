//! `classDiagram` rendering.

use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::analysis::node::base_type_name;
use crate::analysis::{
    ClassDefinition, ClassKind, FileAnalysis, MethodDefinition, Parameter, PropertyDefinition,
    Visibility,
};

use super::{format_type, sanitize_id, INDENT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDiagramOptions {
    /// Render private members.
    #[serde(default)]
    pub include_private: bool,
    /// Draw inheritance edges to supertypes that are not in the input.
    #[serde(default)]
    pub show_external: bool,
}

fn glyph(visibility: Visibility) -> char {
    match visibility {
        Visibility::Public => '+',
        Visibility::Private => '-',
        Visibility::Protected => '#',
    }
}

fn stereotype(class: &ClassDefinition) -> Option<&'static str> {
    match class.kind {
        ClassKind::Interface => Some("<<interface>>"),
        ClassKind::Enum => Some("<<enumeration>>"),
        ClassKind::Type => Some("<<type>>"),
        ClassKind::Class if class.is_abstract => Some("<<abstract>>"),
        ClassKind::Class => None,
    }
}

fn render_parameter(param: &Parameter) -> String {
    let optional = if param.is_optional { "?" } else { "" };
    match &param.type_annotation {
        Some(ty) => format!("{}{}: {}", param.name, optional, format_type(ty)),
        None => format!("{}{}", param.name, optional),
    }
}

fn render_property(property: &PropertyDefinition) -> String {
    let mut line = format!("{}{}", glyph(property.visibility), property.name);
    if let Some(ty) = &property.type_annotation {
        let _ = write!(line, ": {}", format_type(ty));
    }
    if property.is_static {
        line.push('$');
    }
    line
}

fn render_method(method: &MethodDefinition) -> String {
    let function = &method.function;
    let params: Vec<String> = function.parameters.iter().map(render_parameter).collect();
    let mut line = format!(
        "{}{}({})",
        glyph(method.visibility),
        function.name,
        params.join(", ")
    );
    if method.is_static {
        line.push('$');
    } else if method.is_abstract {
        line.push('*');
    }
    if let Some(ret) = &function.return_type {
        let _ = write!(line, " {}", format_type(ret));
    }
    line
}

/// Render the class-like declarations of `files`.
///
/// A declaration name seen twice is drawn once, from its first occurrence.
pub fn render_class_diagram(files: &[FileAnalysis], options: &ClassDiagramOptions) -> String {
    let mut out = String::from("classDiagram\n");

    let mut seen = HashSet::new();
    let classes: Vec<&ClassDefinition> = files
        .iter()
        .flat_map(|f| f.classes.iter())
        .filter(|c| seen.insert(sanitize_id(&c.name)))
        .collect();
    let known: HashSet<String> = classes.iter().map(|c| sanitize_id(&c.name)).collect();

    for class in &classes {
        let _ = writeln!(out, "{}class {} {{", INDENT, sanitize_id(&class.name));
        if let Some(stereotype) = stereotype(class) {
            let _ = writeln!(out, "{}{}{}", INDENT, INDENT, stereotype);
        }
        for property in &class.properties {
            if property.visibility == Visibility::Private && !options.include_private {
                continue;
            }
            let _ = writeln!(out, "{}{}{}", INDENT, INDENT, render_property(property));
        }
        for method in &class.methods {
            if method.visibility == Visibility::Private && !options.include_private {
                continue;
            }
            let _ = writeln!(out, "{}{}{}", INDENT, INDENT, render_method(method));
        }
        let _ = writeln!(out, "{}}}", INDENT);
    }

    let mut edges = HashSet::new();
    for class in &classes {
        let child = sanitize_id(&class.name);
        let supertypes = class
            .extends_from
            .iter()
            .map(|s| (s, "<|--"))
            .chain(class.implements.iter().map(|s| (s, "<|..")));
        for (supertype, arrow) in supertypes {
            let parent = sanitize_id(&base_type_name(supertype));
            if !options.show_external && !known.contains(&parent) {
                continue;
            }
            let line = format!("{}{} {} {}", INDENT, parent, arrow, child);
            if edges.insert(line.clone()) {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    out
}
