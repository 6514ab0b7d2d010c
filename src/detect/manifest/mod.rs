//! Project manifests and repository layout.
//!
//! Manifests are read for three things only: a project name, the declared
//! dependencies, and workspace globs. Each format has a small content parser
//! so the readers can be tested without a filesystem.
//!
//! ```text
//! RepoLayout::scan(root)
//!     ├── package.json         (npm)
//!     ├── pnpm-workspace.yaml  (npm workspaces)
//!     ├── pyproject.toml, requirements*.txt, setup.py (python)
//!     ├── go.mod               (golang)
//!     └── pom.xml, build.gradle[.kts] (jvm)
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod golang;
mod jvm;
mod layout;
mod npm;
mod python;

pub use golang::parse_go_mod;
pub use jvm::{parse_gradle, parse_pom};
pub use layout::RepoLayout;
pub use npm::{parse_package_json, parse_pnpm_workspace};
pub use python::{parse_pyproject, parse_requirements, parse_setup_py, requirement_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    PackageJson,
    PyProject,
    Requirements,
    SetupPy,
    GoMod,
    PomXml,
    Gradle,
}

impl ManifestKind {
    /// The manifest kind a file name denotes, if any.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "package.json" => Some(ManifestKind::PackageJson),
            "pyproject.toml" => Some(ManifestKind::PyProject),
            "setup.py" => Some(ManifestKind::SetupPy),
            "go.mod" => Some(ManifestKind::GoMod),
            "pom.xml" => Some(ManifestKind::PomXml),
            "build.gradle" | "build.gradle.kts" => Some(ManifestKind::Gradle),
            _ if name.starts_with("requirements") && name.ends_with(".txt") => {
                Some(ManifestKind::Requirements)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "package.json",
            ManifestKind::PyProject => "pyproject.toml",
            ManifestKind::Requirements => "requirements.txt",
            ManifestKind::SetupPy => "setup.py",
            ManifestKind::GoMod => "go.mod",
            ManifestKind::PomXml => "pom.xml",
            ManifestKind::Gradle => "build.gradle",
        }
    }

    /// Parse manifest content of this kind.
    pub fn parse(&self, content: &str) -> anyhow::Result<ManifestData> {
        match self {
            ManifestKind::PackageJson => parse_package_json(content),
            ManifestKind::PyProject => Ok(parse_pyproject(content)),
            ManifestKind::Requirements => Ok(parse_requirements(content)),
            ManifestKind::SetupPy => Ok(parse_setup_py(content)),
            ManifestKind::GoMod => parse_go_mod(content),
            ManifestKind::PomXml => Ok(parse_pom(content)),
            ManifestKind::Gradle => Ok(parse_gradle(content)),
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a manifest declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestData {
    pub name: Option<String>,
    pub dependencies: Vec<String>,
    /// Workspace member globs (`package.json#workspaces`).
    pub workspaces: Vec<String>,
}

/// A manifest file found in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub kind: ManifestKind,
    /// Directory holding the manifest, relative to the repository root
    /// (`""` for the root).
    pub dir: String,
    /// Manifest file path relative to the repository root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub workspaces: Vec<String>,
}

impl Manifest {
    pub fn new(kind: ManifestKind, dir: impl Into<String>, data: ManifestData) -> Self {
        let dir = dir.into();
        let file_name = kind.as_str();
        let path = if dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", dir, file_name)
        };
        Self {
            kind,
            dir,
            path,
            name: data.name,
            dependencies: data.dependencies,
            workspaces: data.workspaces,
        }
    }

    /// Read and parse the manifest at `file`, recorded under `dir`.
    pub fn read(file: &Path, dir: &str) -> anyhow::Result<Option<Self>> {
        let Some(kind) = file
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ManifestKind::from_file_name)
        else {
            return Ok(None);
        };
        let content = fs::read_to_string(file)?;
        let mut manifest = Self::new(kind, dir, kind.parse(&content)?);
        if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
            manifest.path = if dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", dir, name)
            };
        }
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(ManifestKind::from_file_name("package.json"), Some(ManifestKind::PackageJson));
        assert_eq!(
            ManifestKind::from_file_name("requirements-dev.txt"),
            Some(ManifestKind::Requirements)
        );
        assert_eq!(ManifestKind::from_file_name("build.gradle.kts"), Some(ManifestKind::Gradle));
        assert_eq!(ManifestKind::from_file_name("Cargo.toml"), None);
    }

    #[test]
    fn test_read_manifest() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("requirements.txt");
        fs::write(&file, "flask\n").unwrap();

        let manifest = Manifest::read(&file, "services/api").unwrap().unwrap();
        assert_eq!(manifest.kind, ManifestKind::Requirements);
        assert_eq!(manifest.path, "services/api/requirements.txt");
        assert_eq!(manifest.dependencies, vec!["flask"]);

        let other = temp.path().join("notes.md");
        fs::write(&other, "hi").unwrap();
        assert!(Manifest::read(&other, "").unwrap().is_none());
    }
}
