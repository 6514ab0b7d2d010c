//! Mermaid diagram rendering.
//!
//! Every renderer is a pure function from analysis records to text. Output
//! is deterministic: declarations keep input order and edges are emitted
//! once each.

mod class;
mod component;
mod entity;
mod sequence;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub use class::{render_class_diagram, ClassDiagramOptions};
pub use component::render_component_diagram;
pub use entity::render_entity_diagram;
pub use sequence::{render_sequence_diagram, SequenceDiagramOptions, DEFAULT_MAX_DEPTH};

/// Indentation for diagram body lines.
pub(crate) const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Class,
    Component,
    Sequence,
    Entity,
}

impl DiagramKind {
    pub const ALL: &'static [DiagramKind] = &[
        DiagramKind::Class,
        DiagramKind::Component,
        DiagramKind::Sequence,
        DiagramKind::Entity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Class => "class",
            DiagramKind::Component => "component",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Entity => "entity",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "class" => Ok(DiagramKind::Class),
            "component" => Ok(DiagramKind::Component),
            "sequence" => Ok(DiagramKind::Sequence),
            "entity" | "er" => Ok(DiagramKind::Entity),
            _ => Err(AnalysisError::Config(format!("unknown diagram kind: {}", s))),
        }
    }
}

/// Reduce `name` to a Mermaid identifier: `[A-Za-z0-9_]` only.
pub fn sanitize_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if id.is_empty() {
        "_".to_string()
    } else {
        id
    }
}

/// Render a type for a class diagram member. Generic brackets become `~`:
/// `Promise<User[]>` -> `Promise~User[]~`, `List[int]` -> `List~int~`.
pub fn format_type(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut square_generic = 0usize;
    let chars: Vec<char> = raw.trim().chars().collect();
    for (i, c) in chars.iter().enumerate() {
        match c {
            '<' | '>' => out.push('~'),
            // `User[]` stays as is; `List[int]` is a Python generic.
            '[' if chars.get(i + 1) != Some(&']') => {
                square_generic += 1;
                out.push('~');
            }
            ']' if square_generic > 0 => {
                square_generic -= 1;
                out.push('~');
            }
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(*c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("src/user-service.ts"), "src_user_service_ts");
        assert_eq!(sanitize_id("models.Model"), "models_Model");
        assert_eq!(sanitize_id(""), "_");
    }

    #[test]
    fn test_format_type() {
        assert_eq!(format_type("Promise<User[]>"), "Promise~User[]~");
        assert_eq!(format_type("Map<string, List<int>>"), "Map~string, List~int~~");
        assert_eq!(format_type("Optional[List[str]]"), "Optional~List~str~~");
        assert_eq!(format_type("string"), "string");
    }

    #[test]
    fn test_diagram_kind_parse() {
        assert_eq!("ER".parse::<DiagramKind>().unwrap(), DiagramKind::Entity);
        assert!("flow".parse::<DiagramKind>().is_err());
    }
}
