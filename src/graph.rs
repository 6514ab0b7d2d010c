//! Cross-file module dependency graph.
//!
//! Only relative imports are resolved: a specifier such as `./user` or, for
//! Python, `.models` is joined to the importing file's directory and probed
//! against the set of analyzed files. Package imports never produce edges.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{FileAnalysis, ImportBinding};

/// Extensions probed, in order, when a specifier omits one.
pub const RESOLVE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".java", ".go",
];

/// A resolved import edge between two analyzed files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDependency {
    pub source: String,
    pub target: String,
    /// Names imported along this edge, sorted and deduplicated.
    pub imported_names: Vec<String>,
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Collapse `.` and `..` segments. Leading `..` that escape the root are kept.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Translate Python dotted relative modules to path form:
/// `.models` -> `./models`, `..service.schemas` -> `../service/schemas`.
///
/// Path-style specifiers (`./x`, `../x`) pass through unchanged.
fn relative_specifier_to_path(specifier: &str) -> String {
    if specifier.contains('/') {
        return specifier.to_string();
    }
    let dots = specifier.chars().take_while(|c| *c == '.').count();
    let rest = specifier[dots..].replace('.', "/");
    let prefix = if dots <= 1 {
        "./".to_string()
    } else {
        "../".repeat(dots - 1)
    };
    format!("{}{}", prefix, rest)
}

/// Resolve `specifier`, imported from `from_file`, to one of `known_files`.
///
/// Known paths are expected in normalized form (`src/a.ts`, no `./`).
/// Returns `None` for package imports and for relative imports that hit no
/// analyzed file.
pub fn resolve_import(
    from_file: &str,
    specifier: &str,
    known_files: &HashSet<String>,
) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }

    let relative = relative_specifier_to_path(specifier);
    let dir = dirname(&from_file.replace('\\', "/")).to_string();
    let base = normalize_path(&format!("{}/{}", dir, relative));

    let mut candidates: Vec<String> = RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}", base, ext))
        .collect();
    candidates.push(base.clone());
    candidates.extend(
        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| normalize_path(&format!("{}/index{}", base, ext))),
    );
    candidates.push(normalize_path(&format!("{}/__init__.py", base)));

    // ESM sources import `./user.js` while the file on disk is `user.ts`.
    for (js, ts) in [(".js", ".ts"), (".jsx", ".tsx"), (".mjs", ".mts")] {
        if let Some(stem) = base.strip_suffix(js) {
            candidates.push(format!("{}{}", stem, ts));
        }
    }

    candidates.into_iter().find(|c| known_files.contains(c))
}

/// Targets of one import, each with the names imported from it.
///
/// A bare Python package import (`from . import models`) names submodules:
/// each binding resolves as `.models` first and falls back to the package
/// `__init__.py`.
fn resolve_bindings(
    from: &str,
    specifier: &str,
    bindings: &[ImportBinding],
    known: &HashSet<String>,
) -> Vec<(String, Vec<String>)> {
    let bare_package = !specifier.is_empty() && specifier.chars().all(|c| c == '.');
    if !bare_package {
        return resolve_import(from, specifier, known)
            .map(|target| vec![(target, bindings.iter().map(|b| b.name.clone()).collect())])
            .unwrap_or_default();
    }

    let package = resolve_import(from, specifier, known);
    let mut resolved: Vec<(String, Vec<String>)> = Vec::new();
    for binding in bindings {
        let submodule = resolve_import(from, &format!("{}{}", specifier, binding.name), known);
        let Some(target) = submodule.or_else(|| package.clone()) else {
            continue;
        };
        match resolved.iter_mut().find(|(t, _)| *t == target) {
            Some((_, names)) => names.push(binding.name.clone()),
            None => resolved.push((target, vec![binding.name.clone()])),
        }
    }
    resolved
}

/// Build one edge per (source, target) pair across `files`.
///
/// Edges come from relative imports and from relative re-exports
/// (`export * from './x'`). Names imported over the same pair are merged.
pub fn build_dependency_graph(files: &[FileAnalysis]) -> Vec<ModuleDependency> {
    let known: HashSet<String> = files.iter().map(|f| normalize_path(&f.file_path)).collect();
    let original: BTreeMap<String, &str> = files
        .iter()
        .map(|f| (normalize_path(&f.file_path), f.file_path.as_str()))
        .collect();

    let mut edges: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

    for file in files {
        let from = normalize_path(&file.file_path);
        let import_refs = file
            .imports
            .iter()
            .map(|i| (i.source.as_str(), &i.bindings));
        let reexport_refs = file
            .exports
            .iter()
            .filter_map(|e| e.source.as_deref().map(|s| (s, &e.bindings)));

        for (specifier, bindings) in import_refs.chain(reexport_refs) {
            let resolved = resolve_bindings(&from, specifier, bindings, &known);
            if resolved.is_empty() && specifier.starts_with('.') {
                debug!(file = %file.file_path, specifier, "unresolved relative import");
            }
            for (target, names) in resolved {
                let target = original.get(&target).map(|s| s.to_string()).unwrap_or(target);
                edges
                    .entry((file.file_path.clone(), target))
                    .or_default()
                    .extend(names);
            }
        }
    }

    edges
        .into_iter()
        .map(|((source, target), names)| ModuleDependency {
            source,
            target,
            imported_names: names.into_iter().collect(),
        })
        .collect()
}

/// Files that no other file imports, in input order.
pub fn find_entry_points(files: &[FileAnalysis], dependencies: &[ModuleDependency]) -> Vec<String> {
    let targets: HashSet<&str> = dependencies.iter().map(|d| d.target.as_str()).collect();
    files
        .iter()
        .filter(|f| !targets.contains(f.file_path.as_str()))
        .map(|f| f.file_path.clone())
        .collect()
}

/// Adjacency view over a list of dependencies.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new(dependencies: &[ModuleDependency]) -> Self {
        let mut graph = Self::default();
        for dep in dependencies {
            graph
                .forward
                .entry(dep.source.clone())
                .or_default()
                .insert(dep.target.clone());
            graph
                .reverse
                .entry(dep.target.clone())
                .or_default()
                .insert(dep.source.clone());
        }
        graph
    }

    /// Files that `path` imports.
    pub fn dependencies_of(&self, path: &str) -> Vec<&str> {
        self.forward
            .get(path)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Files that import `path`.
    pub fn dependents_of(&self, path: &str) -> Vec<&str> {
        self.reverse
            .get(path)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Circular import groups: strongly connected components with more than
    /// one member, plus files importing themselves. Each group is sorted.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut tarjan = Tarjan::new(&self.forward);
        let nodes: Vec<&str> = self.forward.keys().map(String::as_str).collect();
        for node in nodes {
            if !tarjan.index.contains_key(node) {
                tarjan.visit(node);
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan
            .components
            .into_iter()
            .filter(|c| {
                c.len() > 1
                    || self
                        .forward
                        .get(&c[0])
                        .map(|t| t.contains(&c[0]))
                        .unwrap_or(false)
            })
            .map(|mut c| {
                c.sort();
                c
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Tarjan's strongly-connected-components algorithm.
struct Tarjan<'g> {
    graph: &'g BTreeMap<String, BTreeSet<String>>,
    counter: usize,
    index: BTreeMap<&'g str, usize>,
    lowlink: BTreeMap<&'g str, usize>,
    stack: Vec<&'g str>,
    on_stack: HashSet<&'g str>,
    components: Vec<Vec<String>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g BTreeMap<String, BTreeSet<String>>) -> Self {
        Self {
            graph,
            counter: 0,
            index: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, node: &'g str) {
        self.index.insert(node, self.counter);
        self.lowlink.insert(node, self.counter);
        self.counter += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let graph = self.graph;
        if let Some(targets) = graph.get(node) {
            for target in targets {
                let target = target.as_str();
                if !self.index.contains_key(target) {
                    self.visit(target);
                    let low = self.lowlink[target].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                } else if self.on_stack.contains(target) {
                    let low = self.index[target].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                }
            }
        }

        if self.lowlink[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.to_string());
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
