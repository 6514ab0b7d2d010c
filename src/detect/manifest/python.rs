//! Python project files: `requirements*.txt`, `pyproject.toml`, `setup.py`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ManifestData;

static SETUP_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"name\s*=\s*["']([^"']+)["']"#).ok());
static SETUP_REQUIRES: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?s)install_requires\s*=\s*\[(.*?)\]"#).ok());
static QUOTED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).ok());

/// Distribution name from a requirement specifier:
/// `pandas[sql]>=1.3` -> `pandas`.
pub fn requirement_name(spec: &str) -> String {
    let spec = spec.trim();
    let end = spec
        .find(|c: char| "=<>!~[;@ (".contains(c))
        .unwrap_or(spec.len());
    spec[..end].trim().to_lowercase()
}

pub fn parse_requirements(content: &str) -> ManifestData {
    let mut dependencies = Vec::new();
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        // Options like -r, -e, --index-url
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        let name = requirement_name(line);
        if !name.is_empty() {
            dependencies.push(name);
        }
    }
    dependencies.sort();
    dependencies.dedup();
    ManifestData {
        name: None,
        dependencies,
        workspaces: Vec::new(),
    }
}

/// `line` up to the first `#` that is not inside a quoted string.
fn strip_toml_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..idx],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Line-oriented reading of the `[project]` and `[tool.poetry]` tables.
pub fn parse_pyproject(content: &str) -> ManifestData {
    let mut name = None;
    let mut dependencies = Vec::new();
    let mut section = String::new();
    let mut in_dep_array = false;

    for line in content.lines() {
        let trimmed = strip_toml_comment(line).trim();
        if trimmed.is_empty() {
            continue;
        }

        if in_dep_array {
            if trimmed.starts_with(']') {
                in_dep_array = false;
                continue;
            }
            for item in trimmed.split(',') {
                let item = item.trim().trim_matches(|c| c == '"' || c == '\'' || c == ']');
                let dep = requirement_name(item);
                if !dep.is_empty() {
                    dependencies.push(dep);
                }
            }
            if trimmed.ends_with(']') {
                in_dep_array = false;
            }
            continue;
        }

        if trimmed.starts_with('[') {
            section = trimmed.trim_matches(|c| c == '[' || c == ']').to_string();
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match section.as_str() {
            "project" | "tool.poetry" if key == "name" => {
                name = Some(value.trim_matches(|c| c == '"' || c == '\'').to_string());
            }
            "project" if key == "dependencies" => {
                let inline = value.trim_start_matches('[');
                for item in inline.split(',') {
                    let item = item.trim().trim_matches(|c| c == '"' || c == '\'' || c == ']');
                    let dep = requirement_name(item);
                    if !dep.is_empty() {
                        dependencies.push(dep);
                    }
                }
                in_dep_array = !value.contains(']');
            }
            "tool.poetry.dependencies" | "tool.poetry.dev-dependencies" => {
                let dep = requirement_name(key);
                if !dep.is_empty() && dep != "python" {
                    dependencies.push(dep);
                }
            }
            _ => {}
        }
    }

    dependencies.sort();
    dependencies.dedup();
    ManifestData {
        name: name.filter(|n| !n.is_empty()),
        dependencies,
        workspaces: Vec::new(),
    }
}

pub fn parse_setup_py(content: &str) -> ManifestData {
    let name = SETUP_NAME
        .as_ref()
        .and_then(|re| re.captures(content))
        .map(|c| c[1].to_string());

    let mut dependencies = Vec::new();
    if let (Some(requires), Some(quoted)) = (SETUP_REQUIRES.as_ref(), QUOTED.as_ref()) {
        if let Some(block) = requires.captures(content) {
            for item in quoted.captures_iter(&block[1]) {
                let dep = requirement_name(&item[1]);
                if !dep.is_empty() {
                    dependencies.push(dep);
                }
            }
        }
    }
    dependencies.sort();
    dependencies.dedup();

    ManifestData {
        name,
        dependencies,
        workspaces: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirements() {
        let data = parse_requirements(
            r#"
# Comment
fastapi>=0.100
SQLAlchemy==2.0.1  # orm
pandas[sql]>=1.3.0
-r other-requirements.txt
--index-url https://pypi.org/simple
"#,
        );
        assert_eq!(data.dependencies, vec!["fastapi", "pandas", "sqlalchemy"]);
    }

    #[test]
    fn test_parse_pyproject_pep621() {
        let data = parse_pyproject(
            r#"
[project]
name = "worker-service"
dependencies = [
    "celery>=5.0",
    "redis",
]

[tool.ruff]
line-length = 100
"#,
        );
        assert_eq!(data.name.as_deref(), Some("worker-service"));
        assert_eq!(data.dependencies, vec!["celery", "redis"]);
    }

    #[test]
    fn test_pyproject_hash_inside_quotes() {
        let data = parse_pyproject(
            r#"
[project]
name = "tagged#1" # display name
dependencies = [
    "pkg @ git+https://host/repo#egg=pkg",  # pinned fork
    'other>=2',
]
"#,
        );
        assert_eq!(data.name.as_deref(), Some("tagged#1"));
        assert_eq!(data.dependencies, vec!["other", "pkg"]);
        assert_eq!(strip_toml_comment(r#"a = "x#y" # note"#), r#"a = "x#y" "#);
    }

    #[test]
    fn test_parse_pyproject_poetry() {
        let data = parse_pyproject(
            r#"
[tool.poetry]
name = "api"

[tool.poetry.dependencies]
python = "^3.11"
flask = "^3.0"
requests = { version = "^2.31" }
"#,
        );
        assert_eq!(data.name.as_deref(), Some("api"));
        assert_eq!(data.dependencies, vec!["flask", "requests"]);
    }

    #[test]
    fn test_parse_setup_py() {
        let data = parse_setup_py(
            r#"
from setuptools import setup
setup(
    name="mailer",
    install_requires=["click>=8", 'jinja2'],
)
"#,
        );
        assert_eq!(data.name.as_deref(), Some("mailer"));
        assert_eq!(data.dependencies, vec!["click", "jinja2"]);
    }
}
