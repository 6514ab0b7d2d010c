//! `package.json` and `pnpm-workspace.yaml`.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::ManifestData;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    workspaces: Option<Workspaces>,
}

/// `workspaces` is either a list of globs or `{ "packages": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Workspaces {
    List(Vec<String>),
    Config {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

pub fn parse_package_json(content: &str) -> anyhow::Result<ManifestData> {
    let pkg: PackageJson = serde_json::from_str(content)?;
    let mut dependencies: Vec<String> = pkg
        .dependencies
        .into_keys()
        .chain(pkg.peer_dependencies.into_keys())
        .chain(pkg.dev_dependencies.into_keys())
        .collect();
    dependencies.sort();
    dependencies.dedup();

    let workspaces = match pkg.workspaces {
        Some(Workspaces::List(globs)) => globs,
        Some(Workspaces::Config { packages }) => packages,
        None => Vec::new(),
    };

    Ok(ManifestData {
        name: pkg.name.filter(|n| !n.is_empty()),
        dependencies,
        workspaces,
    })
}

pub fn parse_pnpm_workspace(content: &str) -> anyhow::Result<Vec<String>> {
    let ws: PnpmWorkspace = serde_yaml::from_str(content)?;
    Ok(ws.packages)
}
