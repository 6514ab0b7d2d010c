//! Service boundary detection.
//!
//! A service is rooted at a directory holding a manifest. Which manifest
//! directories count is decided in order:
//!
//! 1. manifests below `packages/`, `services/` or `apps/`, or in a directory
//!    matched by a declared workspace glob;
//! 2. when the root has no manifest, two or more direct children with one;
//! 3. when no manifest helps, two or more `*-service` children;
//! 4. the repository as a single service.
//!
//! Classification uses declared dependencies, the external imports of the
//! service's files, and its directory names.

use std::collections::{BTreeMap, BTreeSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::analysis::FileAnalysis;

use super::known::{
    external_package, matching_package, CLI_FRAMEWORKS, FRONTEND_FRAMEWORKS, WEB_FRAMEWORKS,
    WORKER_FRAMEWORKS,
};
use super::manifest::RepoLayout;
use super::types::{Service, ServiceType};

/// Parent directories whose manifest-bearing children are services.
const SERVICE_CONTAINERS: &[&str] = &["packages", "services", "apps"];

const API_DIRECTORIES: &[&str] = &["routes", "controllers", "api"];
const WORKER_DIRECTORIES: &[&str] = &["workers", "jobs"];

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_under(path: &str, root: &str) -> bool {
    root.is_empty()
        || path == root
        || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

fn build_globset(globs: &[String]) -> Option<GlobSet> {
    if globs.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!(pattern, error = %err, "ignoring invalid workspace glob"),
        }
    }
    builder.build().ok()
}

fn is_service_suffix(name: &str) -> bool {
    name.ends_with("-service") || name.ends_with("_service")
}

/// Directories that root a service, relative to the repository root.
fn service_roots(layout: &RepoLayout, files: &[FileAnalysis]) -> Vec<String> {
    let workspaces = build_globset(&layout.workspace_globs);
    let manifest_dirs = layout.manifest_dirs();

    let mut roots: BTreeSet<String> = manifest_dirs
        .iter()
        .filter(|dir| !dir.is_empty())
        .filter(|dir| {
            let mut parents = dir.split('/').rev().skip(1);
            parents.any(|part| SERVICE_CONTAINERS.contains(&part))
                || workspaces.as_ref().is_some_and(|set| set.is_match(**dir))
        })
        .map(|dir| dir.to_string())
        .collect();

    if roots.is_empty() && !layout.has_manifest("") {
        let children: Vec<&str> = manifest_dirs
            .iter()
            .copied()
            .filter(|dir| !dir.is_empty() && !dir.contains('/'))
            .collect();
        if children.len() >= 2 {
            roots.extend(children.into_iter().map(str::to_string));
        }
    }

    if roots.is_empty() && manifest_dirs.is_empty() {
        let mut children: BTreeSet<String> = layout
            .directories
            .iter()
            .filter(|dir| !dir.contains('/') && is_service_suffix(dir))
            .cloned()
            .collect();
        for file in files {
            if let Some(first) = file.file_path.split('/').next() {
                if file.file_path.contains('/') && is_service_suffix(first) {
                    children.insert(first.to_string());
                }
            }
        }
        if children.len() >= 2 {
            roots = children;
        }
    }

    if roots.is_empty() {
        roots.insert(String::new());
    }
    roots.into_iter().collect()
}

/// The deepest root containing `path`.
fn owning_root<'a>(roots: &'a [String], path: &str) -> Option<&'a str> {
    roots
        .iter()
        .filter(|root| is_under(path, root))
        .max_by_key(|root| root.len())
        .map(String::as_str)
}

/// The framework and type implied by a set of package names and directory
/// names.
fn classify(
    packages: &BTreeSet<String>,
    directories: &BTreeSet<&str>,
) -> (ServiceType, Option<String>) {
    let find = |set: &'static phf::Set<&'static str>| {
        packages
            .iter()
            .find_map(|package| matching_package(set, package))
            .map(str::to_string)
    };
    let has_dir = |names: &[&str]| names.iter().any(|name| directories.contains(name));

    if let Some(framework) = find(&FRONTEND_FRAMEWORKS) {
        return (ServiceType::Frontend, Some(framework));
    }
    if let Some(framework) = find(&WEB_FRAMEWORKS) {
        return (ServiceType::ApiServer, Some(framework));
    }
    if has_dir(API_DIRECTORIES) {
        return (ServiceType::ApiServer, None);
    }
    if let Some(framework) = find(&WORKER_FRAMEWORKS) {
        return (ServiceType::Worker, Some(framework));
    }
    if has_dir(WORKER_DIRECTORIES) {
        return (ServiceType::Worker, None);
    }
    if let Some(framework) = find(&CLI_FRAMEWORKS) {
        return (ServiceType::Cli, Some(framework));
    }
    (ServiceType::Library, None)
}

/// Detect the services of a repository.
///
/// Pure over its inputs: `layout` carries the filesystem metadata and
/// `files` the analyzed sources, whose paths are relative to the same root.
/// Services are ordered by root.
pub fn detect_services(layout: &RepoLayout, files: &[FileAnalysis]) -> Vec<Service> {
    let roots = service_roots(layout, files);

    let mut assigned: BTreeMap<&str, Vec<&FileAnalysis>> = BTreeMap::new();
    for file in files {
        match owning_root(&roots, &file.file_path) {
            Some(root) => assigned.entry(root).or_default().push(file),
            None => debug!(path = %file.file_path, "file belongs to no service"),
        }
    }

    let services: Vec<Service> = roots
        .iter()
        .map(|root| {
            let owned = assigned.get(root.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            build_service(layout, root, owned)
        })
        .collect();

    info!(services = services.len(), "detected services");
    services
}

fn build_service(layout: &RepoLayout, root: &str, files: &[&FileAnalysis]) -> Service {
    let manifests: Vec<_> = layout.manifests_in(root).collect();

    let name = manifests
        .iter()
        .find_map(|m| m.name.clone())
        .unwrap_or_else(|| {
            if root.is_empty() {
                layout.root_name.clone()
            } else {
                last_segment(root).to_string()
            }
        });

    let dependencies: Vec<String> = manifests
        .iter()
        .flat_map(|m| m.dependencies.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut packages: BTreeSet<String> = dependencies.iter().cloned().collect();
    for file in files {
        for source in file.import_sources() {
            if let Some(package) = external_package(file.language, source) {
                packages.insert(package);
            }
        }
    }

    let mut directories: BTreeSet<&str> = layout
        .directories_under(root)
        .filter(|dir| *dir != root)
        .map(last_segment)
        .collect();
    for file in files {
        let mut dir = parent_dir(&file.file_path);
        while !dir.is_empty() && dir != root {
            directories.insert(last_segment(dir));
            dir = parent_dir(dir);
        }
    }

    let (service_type, framework) = if files.is_empty() && packages.is_empty() {
        (ServiceType::Unknown, None)
    } else {
        classify(&packages, &directories)
    };

    let mut file_paths: Vec<String> = files.iter().map(|f| f.file_path.clone()).collect();
    file_paths.sort();

    debug!(
        service = %name,
        root,
        service_type = %service_type,
        files = file_paths.len(),
        "classified service"
    );

    Service {
        name,
        service_type,
        framework,
        root: root.to_string(),
        manifest: manifests.first().map(|m| m.path.clone()),
        files: file_paths,
        dependencies,
    }
}

/// The service owning `path`: the one with the deepest root containing it.
pub fn service_for_path<'a>(services: &'a [Service], path: &str) -> Option<&'a Service> {
    services
        .iter()
        .filter(|service| is_under(path, &service.root))
        .max_by_key(|service| service.root.len())
}
