//! Architectural layer classification.
//!
//! Each file collects votes: a path component or file-name segment that
//! names a layer is worth two, an import of a package associated with a
//! layer is worth one. The layer with most votes wins, ties broken by
//! [`Layer::PRIORITY`].

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::analysis::FileAnalysis;
use crate::graph::ModuleDependency;

use super::known::{
    matching_package, DATA_PACKAGES, HTTP_CLIENT_PACKAGES, INFRASTRUCTURE_PACKAGES,
    WEB_FRAMEWORKS,
};
use super::types::{Layer, LayerAnalysis, LayerViolation};

const PATH_WEIGHT: u32 = 2;
const IMPORT_WEIGHT: u32 = 1;

const PRESENTATION_NAMES: &[&str] = &[
    "presentation",
    "routes",
    "route",
    "router",
    "routers",
    "controllers",
    "controller",
    "views",
    "view",
    "api",
    "handlers",
    "handler",
    "endpoints",
    "resolvers",
    "pages",
    "components",
    "ui",
];

const BUSINESS_NAMES: &[&str] = &[
    "business",
    "service",
    "services",
    "domain",
    "usecases",
    "usecase",
    "logic",
    "application",
];

const DATA_NAMES: &[&str] = &[
    "data",
    "repositories",
    "repository",
    "repo",
    "models",
    "model",
    "entities",
    "entity",
    "dao",
    "db",
    "database",
    "persistence",
    "migrations",
];

const INFRASTRUCTURE_NAMES: &[&str] = &[
    "infrastructure",
    "infra",
    "config",
    "configuration",
    "cache",
    "queue",
    "queues",
    "messaging",
    "events",
];

const EXTERNAL_NAMES: &[&str] = &[
    "external",
    "clients",
    "client",
    "integrations",
    "integration",
    "gateways",
    "gateway",
    "thirdparty",
];

/// Import provenance, checked in order.
static IMPORT_LAYERS: [(Layer, &phf::Set<&str>); 4] = [
    (Layer::Data, &DATA_PACKAGES),
    (Layer::Infrastructure, &INFRASTRUCTURE_PACKAGES),
    (Layer::External, &HTTP_CLIENT_PACKAGES),
    (Layer::Presentation, &WEB_FRAMEWORKS),
];

/// Classifies files into layers by path conventions and imports.
#[derive(Debug, Clone)]
pub struct LayerClassifier {
    names: HashMap<String, Layer>,
}

impl Default for LayerClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerClassifier {
    pub fn new() -> Self {
        let mut names = HashMap::new();
        for (layer, list) in [
            (Layer::Presentation, PRESENTATION_NAMES),
            (Layer::Business, BUSINESS_NAMES),
            (Layer::Data, DATA_NAMES),
            (Layer::Infrastructure, INFRASTRUCTURE_NAMES),
            (Layer::External, EXTERNAL_NAMES),
        ] {
            for name in list {
                names.insert(name.to_string(), layer);
            }
        }
        Self { names }
    }

    /// Add or reassign directory names per layer. Names are matched
    /// case-insensitively.
    pub fn with_overrides(mut self, overrides: &BTreeMap<Layer, Vec<String>>) -> Self {
        for (layer, names) in overrides {
            if *layer == Layer::Unknown {
                continue;
            }
            for name in names {
                self.names.insert(name.to_lowercase(), *layer);
            }
        }
        self
    }

    fn layer_for_name(&self, name: &str) -> Option<Layer> {
        self.names.get(&name.to_lowercase()).copied()
    }

    pub fn classify(&self, file: &FileAnalysis) -> LayerAnalysis {
        let mut votes: HashMap<Layer, u32> = HashMap::new();
        let mut evidence = Vec::new();

        let path = file.file_path.as_str();
        let (dirs, file_name) = match path.rfind('/') {
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("", path),
        };
        let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);

        for dir in dirs.split('/').filter(|d| !d.is_empty()) {
            if let Some(layer) = self.layer_for_name(dir) {
                *votes.entry(layer).or_default() += PATH_WEIGHT;
                evidence.push(format!("directory '{}' -> {}", dir, layer));
            }
        }
        for segment in stem.split(['_', '-', '.']).filter(|s| !s.is_empty()) {
            if let Some(layer) = self.layer_for_name(segment) {
                *votes.entry(layer).or_default() += PATH_WEIGHT;
                evidence.push(format!("file name '{}' -> {}", segment, layer));
            }
        }

        for source in file.import_sources().filter(|s| !s.starts_with('.')) {
            for (layer, set) in IMPORT_LAYERS.iter() {
                if let Some(package) = matching_package(*set, source) {
                    *votes.entry(*layer).or_default() += IMPORT_WEIGHT;
                    evidence.push(format!("import '{}' -> {}", package, layer));
                }
            }
        }

        let total: u32 = votes.values().sum();
        let winner = Layer::PRIORITY
            .iter()
            .filter_map(|layer| votes.get(layer).map(|count| (*layer, *count)))
            .fold(None, |best: Option<(Layer, u32)>, (layer, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((layer, count)),
            });

        let (layer, confidence) = match winner {
            Some((layer, count)) if total > 0 => (layer, f64::from(count) / f64::from(total)),
            _ => (Layer::Unknown, 0.0),
        };

        debug!(path = %file.file_path, layer = %layer, confidence, "classified layer");
        LayerAnalysis {
            file_path: file.file_path.clone(),
            layer,
            confidence,
            evidence,
        }
    }

    pub fn classify_all(&self, files: &[FileAnalysis]) -> Vec<LayerAnalysis> {
        files.iter().map(|file| self.classify(file)).collect()
    }
}

/// Classify a file with the default conventions.
pub fn classify_file(file: &FileAnalysis) -> LayerAnalysis {
    LayerClassifier::new().classify(file)
}

/// Whether an edge from `source` to `target` points up the layer stack.
fn is_upward(source: Layer, target: Layer) -> bool {
    matches!(
        (source, target),
        (Layer::Data, Layer::Business)
            | (Layer::Data, Layer::Presentation)
            | (Layer::Business, Layer::Presentation)
            | (Layer::Infrastructure, Layer::Presentation)
    )
}

/// Dependencies whose source sits in a lower layer than their target.
pub fn find_layer_violations(
    layers: &[LayerAnalysis],
    dependencies: &[ModuleDependency],
) -> Vec<LayerViolation> {
    let by_path: HashMap<&str, Layer> = layers
        .iter()
        .map(|analysis| (analysis.file_path.as_str(), analysis.layer))
        .collect();

    dependencies
        .iter()
        .filter_map(|dep| {
            let source_layer = *by_path.get(dep.source.as_str())?;
            let target_layer = *by_path.get(dep.target.as_str())?;
            is_upward(source_layer, target_layer).then(|| LayerViolation {
                source: dep.source.clone(),
                target: dep.target.clone(),
                source_layer,
                target_layer,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ImportStatement, SourceLocation};
    use crate::parser::Language;

    fn file(path: &str, imports: &[&str]) -> FileAnalysis {
        let mut analysis = FileAnalysis::empty(path, Language::Python);
        analysis.imports = imports
            .iter()
            .map(|source| ImportStatement {
                source: source.to_string(),
                bindings: Vec::new(),
                location: SourceLocation::default(),
            })
            .collect();
        analysis
    }

    #[test]
    fn test_path_conventions() {
        assert_eq!(classify_file(&file("src/api/tasks.py", &[])).layer, Layer::Presentation);
        assert_eq!(
            classify_file(&file("src/service/task_service.py", &[])).layer,
            Layer::Business
        );
        assert_eq!(classify_file(&file("src/data/repository.py", &[])).layer, Layer::Data);
        assert_eq!(
            classify_file(&file("src/external/email_client.py", &[])).layer,
            Layer::External
        );
        assert_eq!(
            classify_file(&file("src/config/settings.py", &[])).layer,
            Layer::Infrastructure
        );
    }

    #[test]
    fn test_imports_vote() {
        let analysis = classify_file(&file("src/store.py", &["sqlalchemy.orm", "redis"]));
        // One vote each: data wins the tie.
        assert_eq!(analysis.layer, Layer::Data);
        assert!((analysis.confidence - 0.5).abs() < 1e-9);
        assert_eq!(analysis.evidence.len(), 2);

        let analysis = classify_file(&file("main.py", &["httpx"]));
        assert_eq!(analysis.layer, Layer::External);
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn test_path_outweighs_import() {
        let analysis = classify_file(&file("app/routes/users.py", &["sqlalchemy"]));
        assert_eq!(analysis.layer, Layer::Presentation);
        assert!((analysis.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_evidence_is_unknown() {
        let analysis = classify_file(&file("main.py", &["os", "./util"]));
        assert_eq!(analysis.layer, Layer::Unknown);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.evidence.is_empty());
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(Layer::Data, vec!["Store".to_string()]);
        let classifier = LayerClassifier::new().with_overrides(&overrides);
        assert_eq!(classifier.classify(&file("src/store/users.ts", &[])).layer, Layer::Data);
        assert_eq!(classify_file(&file("src/store/users.ts", &[])).layer, Layer::Unknown);
    }

    #[test]
    fn test_layer_violations() {
        let layers = vec![
            classify_file(&file("src/api/users.py", &[])),
            classify_file(&file("src/services/users.py", &[])),
            classify_file(&file("src/models/user.py", &[])),
        ];
        let dep = |source: &str, target: &str| ModuleDependency {
            source: source.to_string(),
            target: target.to_string(),
            imported_names: Vec::new(),
        };
        let deps = vec![
            dep("src/api/users.py", "src/services/users.py"),
            dep("src/services/users.py", "src/models/user.py"),
            dep("src/models/user.py", "src/api/users.py"),
            dep("src/models/user.py", "src/unknown.py"),
        ];
        let violations = find_layer_violations(&layers, &deps);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].source_layer, Layer::Data);
        assert_eq!(violations[0].target_layer, Layer::Presentation);
    }
}
