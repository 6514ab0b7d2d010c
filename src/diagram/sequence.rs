//! `sequenceDiagram` rendering from call facts.
//!
//! Entries are exported functions and the public methods of exported
//! classes. From each entry, calls are followed through functions defined
//! in the input up to `max_depth` levels. Calls to anything outside the
//! input are dropped. Without call facts each entry renders on its own.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::analysis::{CallExpression, FileAnalysis, FunctionDefinition, Visibility};

use super::{sanitize_id, INDENT};

pub const DEFAULT_MAX_DEPTH: usize = 3;

const CLIENT: &str = "Client";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDiagramOptions {
    /// Call levels followed from each entry, the entry itself included.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for SequenceDiagramOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Participant name for module-level code in `path`: the file stem, or the
/// directory name for `index`/`__init__` files.
fn module_participant(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let file_name = segments.next().unwrap_or(path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let name = match stem {
        "index" | "__init__" => segments.next().unwrap_or(stem),
        _ => stem,
    };
    sanitize_id(name)
}

#[derive(Clone, Copy)]
struct Callable<'a> {
    file: &'a FileAnalysis,
    function: &'a FunctionDefinition,
}

impl Callable<'_> {
    fn participant(&self) -> String {
        match self.function.qualified_name.rsplit_once('.') {
            Some((owner, _)) => sanitize_id(owner),
            None => module_participant(&self.file.file_path),
        }
    }
}

struct Tracer<'a> {
    max_depth: usize,
    /// Functions by (file, qualified name).
    by_qualified: HashMap<(&'a str, &'a str), Callable<'a>>,
    /// Functions by bare name, in input order.
    by_name: HashMap<&'a str, Vec<Callable<'a>>>,
    /// Calls by (file, caller).
    calls: HashMap<(&'a str, &'a str), Vec<&'a CallExpression>>,
    seen: HashSet<(&'a str, &'a str, &'a str, usize)>,
    participants: Vec<String>,
    lines: Vec<String>,
}

impl<'a> Tracer<'a> {
    fn new(files: &'a [FileAnalysis], max_depth: usize) -> Self {
        let mut by_qualified = HashMap::new();
        let mut by_name: HashMap<&str, Vec<Callable>> = HashMap::new();
        let mut calls: HashMap<(&str, &str), Vec<&CallExpression>> = HashMap::new();

        for file in files {
            let functions = file.functions.iter().chain(
                file.classes
                    .iter()
                    .flat_map(|c| c.methods.iter().map(|m| &m.function)),
            );
            for function in functions {
                let callable = Callable { file, function };
                by_qualified
                    .entry((file.file_path.as_str(), function.qualified_name.as_str()))
                    .or_insert(callable);
                by_name.entry(function.name.as_str()).or_default().push(callable);
            }
            for call in &file.calls {
                calls
                    .entry((file.file_path.as_str(), call.caller.as_str()))
                    .or_default()
                    .push(call);
            }
        }

        Self {
            max_depth,
            by_qualified,
            by_name,
            calls,
            seen: HashSet::new(),
            participants: vec![CLIENT.to_string()],
            lines: Vec::new(),
        }
    }

    fn participant(&mut self, name: String) -> String {
        if !self.participants.contains(&name) {
            self.participants.push(name.clone());
        }
        name
    }

    /// The function a call lands on: the resolved callee, else a same-file
    /// function of that name, else the first one anywhere.
    fn resolve(&self, file: &'a FileAnalysis, call: &'a CallExpression) -> Option<Callable<'a>> {
        if let Some(resolved) = &call.resolved_callee {
            if let Some(callable) = self
                .by_qualified
                .get(&(file.file_path.as_str(), resolved.as_str()))
            {
                return Some(*callable);
            }
        }
        let candidates = self.by_name.get(call.callee.as_str())?;
        candidates
            .iter()
            .find(|c| c.file.file_path == file.file_path)
            .or_else(|| candidates.first())
            .copied()
    }

    fn entry(&mut self, callable: Callable<'a>) {
        let target = self.participant(callable.participant());
        let name = &callable.function.name;
        if callable.function.is_async {
            self.lines
                .push(format!("{}->>+{}: {}() (async)", CLIENT, target, name));
        } else {
            self.lines.push(format!("{}->>{}: {}()", CLIENT, target, name));
        }

        self.trace(callable, &target, 1);

        if callable.function.is_async {
            self.lines
                .push(format!("{}-->>-{}: {} result", target, CLIENT, name));
        }
    }

    fn trace(&mut self, caller: Callable<'a>, from: &str, depth: usize) {
        if depth >= self.max_depth {
            return;
        }
        let key = (
            caller.file.file_path.as_str(),
            caller.function.qualified_name.as_str(),
        );
        let Some(calls) = self.calls.get(&key).cloned() else {
            return;
        };
        for call in calls {
            let seen_key = (key.0, key.1, call.callee.as_str(), call.location.start_line);
            if !self.seen.insert(seen_key) {
                continue;
            }
            let Some(target) = self.resolve(caller.file, call) else {
                continue;
            };
            let to = self.participant(target.participant());
            self.lines
                .push(format!("{}->>{}: {}()", from, to, call.callee));
            self.trace(target, &to, depth + 1);
        }
    }
}

fn entries(files: &[FileAnalysis]) -> Vec<Callable<'_>> {
    let mut out = Vec::new();
    for file in files {
        out.extend(
            file.exported_functions()
                .map(|function| Callable { file, function }),
        );
        for class in file.classes.iter().filter(|c| c.is_exported) {
            out.extend(
                class
                    .methods
                    .iter()
                    .filter(|m| m.visibility == Visibility::Public)
                    .map(|m| Callable {
                        file,
                        function: &m.function,
                    }),
            );
        }
    }
    out
}

pub fn render_sequence_diagram(files: &[FileAnalysis], options: &SequenceDiagramOptions) -> String {
    let mut out = String::from("sequenceDiagram\n");

    let entries = entries(files);
    if entries.is_empty() {
        let _ = writeln!(out, "{}participant {}", INDENT, CLIENT);
        let _ = writeln!(out, "{}Note over {}: No entry points found", INDENT, CLIENT);
        return out;
    }

    let mut tracer = Tracer::new(files, options.max_depth.max(1));
    for entry in entries {
        tracer.entry(entry);
    }

    for participant in &tracer.participants {
        let _ = writeln!(out, "{}participant {}", INDENT, participant);
    }
    for line in &tracer.lines {
        let _ = writeln!(out, "{}{}", INDENT, line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClassDefinition, ClassKind, MethodDefinition, SourceLocation, MODULE_SCOPE};
    use crate::parser::Language;

    fn function(name: &str, qualified: &str, exported: bool, is_async: bool) -> FunctionDefinition {
        FunctionDefinition {
            name: name.to_string(),
            qualified_name: qualified.to_string(),
            parameters: Vec::new(),
            return_type: None,
            is_exported: exported,
            is_async,
            location: SourceLocation::default(),
            doc_comment: None,
        }
    }

    fn call(caller: &str, callee: &str, resolved: Option<&str>, line: usize) -> CallExpression {
        CallExpression {
            caller: caller.to_string(),
            callee: callee.to_string(),
            resolved_callee: resolved.map(str::to_string),
            arguments: Vec::new(),
            location: SourceLocation {
                start_line: line,
                end_line: line,
                ..SourceLocation::default()
            },
        }
    }

    #[test]
    fn test_async_entry_without_calls() {
        let mut file = FileAnalysis::empty("src/api.ts", Language::TypeScript);
        file.functions.push(function("fetchUser", "fetchUser", true, true));
        let out = render_sequence_diagram(&[file], &SequenceDiagramOptions::default());
        assert!(out.starts_with("sequenceDiagram\n"));
        assert!(out.contains("Client->>+api: fetchUser() (async)"));
        assert!(out.contains("api-->>-Client: fetchUser result"));
    }

    #[test]
    fn test_sync_entry() {
        let mut file = FileAnalysis::empty("src/users/index.ts", Language::TypeScript);
        file.functions.push(function("listUsers", "listUsers", true, false));
        file.functions.push(function("helper", "helper", false, false));
        let out = render_sequence_diagram(&[file], &SequenceDiagramOptions::default());
        assert!(out.contains("Client->>users: listUsers()"));
        assert!(!out.contains("helper"));
        assert!(!out.contains("-->>"));
    }

    #[test]
    fn test_no_entry_points() {
        let file = FileAnalysis::empty("src/internal.ts", Language::TypeScript);
        let out = render_sequence_diagram(&[file], &SequenceDiagramOptions::default());
        assert!(out.contains("Note over Client: No entry points found"));
    }

    fn traced_files() -> Vec<FileAnalysis> {
        let mut users = FileAnalysis::empty("src/users.ts", Language::TypeScript);
        users.functions.push(function("getUser", "getUser", true, false));
        users.functions.push(function("findUser", "findUser", false, false));
        users.calls.push(call("getUser", "findUser", Some("findUser"), 3));
        users.calls.push(call("findUser", "load", None, 8));
        users.calls.push(call("findUser", "findUser", Some("findUser"), 9));
        users.calls.push(call("getUser", "log", None, 4));
        users.calls.push(call(MODULE_SCOPE, "getUser", Some("getUser"), 20));

        let mut repo = FileAnalysis::empty("src/repo.ts", Language::TypeScript);
        let mut class = ClassDefinition::new("UserRepo", ClassKind::Class, SourceLocation::default());
        class.methods.push(MethodDefinition {
            function: function("load", "UserRepo.load", false, false),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
        });
        repo.classes.push(class);
        repo.calls.push(call("UserRepo.load", "query", None, 2));
        vec![users, repo]
    }

    #[test]
    fn test_traces_calls() {
        let out = render_sequence_diagram(&traced_files(), &SequenceDiagramOptions::default());
        let body: Vec<&str> = out.lines().map(str::trim).collect();
        assert_eq!(
            body,
            vec![
                "sequenceDiagram",
                "participant Client",
                "participant users",
                "participant UserRepo",
                "Client->>users: getUser()",
                "users->>users: findUser()",
                "users->>UserRepo: load()",
                "users->>users: findUser()",
            ]
        );
    }

    #[test]
    fn test_max_depth() {
        let options = SequenceDiagramOptions { max_depth: 2 };
        let out = render_sequence_diagram(&traced_files(), &options);
        assert!(out.contains("users->>users: findUser()"));
        assert!(!out.contains("UserRepo"));
    }
}
