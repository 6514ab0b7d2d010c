//! `go.mod` parsing.

use super::ManifestData;

/// Parse a require line: `google.golang.org/grpc v1.78.0 // indirect`.
fn parse_require_line(line: &str) -> Option<String> {
    let line = line.split("//").next().unwrap_or("").trim();
    line.split_whitespace().next().map(str::to_string)
}

/// Module path and required modules of a `go.mod` file.
///
/// The manifest name is the last segment of the module path.
pub fn parse_go_mod(content: &str) -> anyhow::Result<ManifestData> {
    let mut module_path = String::new();
    let mut dependencies = Vec::new();
    let mut in_require_block = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if let Some(rest) = line.strip_prefix("module ") {
            module_path = rest.trim().trim_matches('"').to_string();
            continue;
        }

        if line == "require (" {
            in_require_block = true;
            continue;
        }
        if line == ")" {
            in_require_block = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix("require ") {
            if !rest.contains('(') {
                dependencies.extend(parse_require_line(rest));
            }
            continue;
        }

        if in_require_block {
            dependencies.extend(parse_require_line(line));
        }
    }

    if module_path.is_empty() {
        anyhow::bail!("no module declaration found in go.mod");
    }

    dependencies.sort();
    dependencies.dedup();
    let name = module_path
        .rsplit('/')
        .next()
        .unwrap_or(&module_path)
        .to_string();

    Ok(ManifestData {
        name: Some(name),
        dependencies,
        workspaces: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod() {
        let data = parse_go_mod(
            r#"
module github.com/acme/orders

go 1.22

require (
	github.com/gin-gonic/gin v1.9.1
	gorm.io/gorm v1.25.5 // indirect
)

require github.com/google/uuid v1.6.0
"#,
        )
        .unwrap();
        assert_eq!(data.name.as_deref(), Some("orders"));
        assert_eq!(
            data.dependencies,
            vec!["github.com/gin-gonic/gin", "github.com/google/uuid", "gorm.io/gorm"]
        );
    }

    #[test]
    fn test_missing_module() {
        assert!(parse_go_mod("go 1.22\n").is_err());
    }
}
