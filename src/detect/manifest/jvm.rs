//! Maven and Gradle build files.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ManifestData;

static POM_PARENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<parent>.*?</parent>").ok());
static POM_DEPENDENCIES: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)<dependencies>.*?</dependencies>").ok());
static POM_ARTIFACT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"<artifactId>\s*([^<\s]+)\s*</artifactId>").ok());
static GRADLE_DEPENDENCY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:implementation|api|compile|compileOnly|runtimeOnly|testImplementation)\s*\(?\s*["']([^:"']+):([^:"']+)"#,
    )
    .ok()
});

/// Project `artifactId` and dependency artifacts of a `pom.xml`.
pub fn parse_pom(content: &str) -> ManifestData {
    let (Some(parent), Some(deps_block), Some(artifact)) = (
        POM_PARENT.as_ref(),
        POM_DEPENDENCIES.as_ref(),
        POM_ARTIFACT.as_ref(),
    ) else {
        return ManifestData::default();
    };

    let without_parent = parent.replace_all(content, "");

    let mut dependencies = Vec::new();
    for block in deps_block.find_iter(&without_parent) {
        for cap in artifact.captures_iter(block.as_str()) {
            dependencies.push(cap[1].to_string());
        }
    }
    dependencies.sort();
    dependencies.dedup();

    let project_only = deps_block.replace_all(&without_parent, "");
    let name = artifact
        .captures(&project_only)
        .map(|cap| cap[1].to_string());

    ManifestData {
        name,
        dependencies,
        workspaces: Vec::new(),
    }
}

/// Dependency artifacts declared in `build.gradle` or `build.gradle.kts`.
pub fn parse_gradle(content: &str) -> ManifestData {
    let mut dependencies: Vec<String> = GRADLE_DEPENDENCY
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .map(|cap| cap[2].to_string())
                .collect()
        })
        .unwrap_or_default();
    dependencies.sort();
    dependencies.dedup();
    ManifestData {
        name: None,
        dependencies,
        workspaces: Vec::new(),
    }
}
