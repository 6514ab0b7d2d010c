//! `graph TD` rendering of file-level dependencies.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::analysis::FileAnalysis;
use crate::graph::build_dependency_graph;

use super::{sanitize_id, INDENT};

/// One node per file, one edge per resolved import.
pub fn render_component_diagram(files: &[FileAnalysis]) -> String {
    let mut out = String::from("graph TD\n");

    let mut ids: HashMap<&str, String> = HashMap::new();
    let mut used = HashSet::new();
    for file in files {
        if ids.contains_key(file.file_path.as_str()) {
            continue;
        }
        let base = sanitize_id(&file.file_path);
        let mut id = base.clone();
        let mut n = 2;
        while !used.insert(id.clone()) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        let _ = writeln!(out, "{}{}[\"{}\"]", INDENT, id, file.file_path.replace('"', "'"));
        ids.insert(file.file_path.as_str(), id);
    }

    for dep in build_dependency_graph(files) {
        if let (Some(source), Some(target)) =
            (ids.get(dep.source.as_str()), ids.get(dep.target.as_str()))
        {
            let _ = writeln!(out, "{}{} --> {}", INDENT, source, target);
        }
    }

    out
}
