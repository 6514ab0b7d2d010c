//! Filesystem metadata the service detector works from.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::AnalysisError;
use crate::parser::Language;

use super::{parse_pnpm_workspace, Manifest};

/// Directories never descended into.
const PRUNED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    ".next",
    "vendor",
];

/// Manifests, directory names and workspace globs of a repository.
///
/// Paths are relative to the repository root with `/` separators; the root
/// itself is `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoLayout {
    /// Name of the root directory.
    pub root_name: String,
    /// Every manifest found, ordered by path.
    pub manifests: Vec<Manifest>,
    /// Every directory below the root.
    pub directories: BTreeSet<String>,
    /// Workspace member globs declared at the root.
    pub workspace_globs: Vec<String>,
    /// Files in a supported language, ordered by path.
    pub source_files: Vec<String>,
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

impl RepoLayout {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            ..Self::default()
        }
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.add_directory_chain(&manifest.dir.clone());
        self.manifests.push(manifest);
        self.manifests.sort_by(|a, b| a.path.cmp(&b.path));
        self
    }

    pub fn with_directory(mut self, dir: &str) -> Self {
        self.add_directory_chain(dir);
        self
    }

    pub fn with_workspace_glob(mut self, glob: impl Into<String>) -> Self {
        self.workspace_globs.push(glob.into());
        self
    }

    /// Record `dir` and all of its ancestors.
    fn add_directory_chain(&mut self, dir: &str) {
        let mut current = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.directories.insert(current.clone());
        }
    }

    /// Walk `root` and collect its layout.
    ///
    /// Unreadable entries and malformed manifests are skipped; only a missing
    /// or unreadable root is an error.
    pub fn scan(root: &Path) -> Result<Self, AnalysisError> {
        fs::metadata(root).map_err(|source| AnalysisError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let root_name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "root".to_string());
        let mut layout = Self::new(root_name);

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !PRUNED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
        });

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if entry.depth() > 0 {
                    layout.directories.insert(relative_path(root, path));
                }
                continue;
            }
            let relative = relative_path(root, path);
            if Language::from_path(&relative).is_some() {
                layout.source_files.push(relative);
            }
            let dir = path
                .parent()
                .map(|p| relative_path(root, p))
                .unwrap_or_default();

            if entry.file_name() == "pnpm-workspace.yaml" && dir.is_empty() {
                match fs::read_to_string(path)
                    .map_err(anyhow::Error::from)
                    .and_then(|content| parse_pnpm_workspace(&content))
                {
                    Ok(globs) => layout.workspace_globs.extend(globs),
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping workspace file"),
                }
                continue;
            }

            match Manifest::read(path, &dir) {
                Ok(Some(manifest)) => {
                    if manifest.dir.is_empty() {
                        layout.workspace_globs.extend(manifest.workspaces.iter().cloned());
                    }
                    layout.manifests.push(manifest);
                }
                Ok(None) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "skipping manifest"),
            }
        }

        layout.manifests.sort_by(|a, b| a.path.cmp(&b.path));
        layout.source_files.sort();
        layout.workspace_globs.sort();
        layout.workspace_globs.dedup();
        debug!(
            manifests = layout.manifests.len(),
            sources = layout.source_files.len(),
            directories = layout.directories.len(),
            "scanned repository layout"
        );
        Ok(layout)
    }

    /// Manifests located directly in `dir`.
    pub fn manifests_in<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a Manifest> + 'a {
        self.manifests.iter().filter(move |m| m.dir == dir)
    }

    pub fn has_manifest(&self, dir: &str) -> bool {
        self.manifests_in(dir).next().is_some()
    }

    /// Distinct directories that hold at least one manifest.
    pub fn manifest_dirs(&self) -> BTreeSet<&str> {
        self.manifests.iter().map(|m| m.dir.as_str()).collect()
    }

    /// Directories at or below `root`, as paths relative to the repository.
    pub fn directories_under<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.directories.iter().map(String::as_str).filter(move |d| {
            root.is_empty() || *d == root || d.starts_with(&format!("{}/", root))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_monorepo() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(
            root.join("package.json"),
            r#"{ "name": "mono", "private": true, "workspaces": ["packages/*"] }"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("packages/web/src")).unwrap();
        fs::write(root.join("packages/web/src/App.tsx"), "export {}\n").unwrap();
        fs::write(
            root.join("packages/web/package.json"),
            r#"{ "name": "web", "dependencies": { "react": "18" } }"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("packages/web/node_modules/react")).unwrap();
        fs::write(root.join("packages/web/node_modules/react/package.json"), "{}").unwrap();
        fs::create_dir_all(root.join("services/api")).unwrap();
        fs::write(root.join("services/api/requirements.txt"), "fastapi\n").unwrap();
        fs::write(root.join("services/api/broken.json"), "{").unwrap();

        let layout = RepoLayout::scan(root).unwrap();
        let dirs: Vec<&str> = layout.manifest_dirs().into_iter().collect();
        assert_eq!(dirs, vec!["", "packages/web", "services/api"]);
        assert_eq!(layout.workspace_globs, vec!["packages/*"]);
        assert!(layout.directories.contains("packages/web/src"));
        assert!(!layout.directories.iter().any(|d| d.contains("node_modules")));
        assert_eq!(layout.source_files, vec!["packages/web/src/App.tsx"]);
        assert_eq!(
            layout.manifests_in("services/api").next().unwrap().dependencies,
            vec!["fastapi"]
        );
    }

    #[test]
    fn test_scan_pnpm_workspace_and_bad_manifest() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("pnpm-workspace.yaml"), "packages:\n  - apps/*\n").unwrap();
        fs::create_dir_all(root.join("apps/site")).unwrap();
        fs::write(root.join("apps/site/package.json"), "{ broken").unwrap();

        let layout = RepoLayout::scan(root).unwrap();
        assert_eq!(layout.workspace_globs, vec!["apps/*"]);
        assert!(layout.manifests.is_empty());
    }

    #[test]
    fn test_scan_missing_root() {
        let err = RepoLayout::scan(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_builder() {
        let layout = RepoLayout::new("repo").with_directory("src/routes");
        assert!(layout.directories.contains("src"));
        assert!(layout.directories.contains("src/routes"));
        assert_eq!(layout.directories_under("src").count(), 2);
    }
}
