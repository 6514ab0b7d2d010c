//! End-to-end analysis: files in, architecture model out.
//!
//! Stages run in order, each over the complete output of the previous one:
//! per-file extraction (parallel), dependency graph, entities, layers,
//! services. A file that fails to parse is counted and skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{FileAnalysis, FileAnalyzer, SourceFile};
use crate::config::ArchConfig;
use crate::detect::{
    detect_services, find_layer_violations, service_for_path, Entity, EntityDetector,
    LayerAnalysis, LayerClassifier, LayerViolation, RepoLayout, Service,
};
use crate::diagram::{
    render_class_diagram, render_component_diagram, render_entity_diagram,
    render_sequence_diagram, DiagramKind,
};
use crate::error::AnalysisError;
use crate::graph::{build_dependency_graph, find_entry_points, DependencyGraph, ModuleDependency};
use crate::parser::ParserRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub attempted: usize,
    pub analyzed: usize,
    pub failed: usize,
    /// Paths of files that could not be parsed.
    #[serde(default)]
    pub failed_files: Vec<String>,
    /// Analyzed files whose tree contains error nodes.
    #[serde(default)]
    pub files_with_syntax_errors: usize,
}

/// Everything the pipeline learned about a code base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureModel {
    pub files: Vec<FileAnalysis>,
    pub dependencies: Vec<ModuleDependency>,
    pub entry_points: Vec<String>,
    /// Circular import groups.
    pub cycles: Vec<Vec<String>>,
    pub entities: Vec<Entity>,
    pub services: Vec<Service>,
    pub layers: Vec<LayerAnalysis>,
    pub layer_violations: Vec<LayerViolation>,
    pub stats: PipelineStats,
}

impl ArchitectureModel {
    /// Render one diagram with the diagram options from `config`.
    pub fn render(&self, kind: DiagramKind, config: &ArchConfig) -> String {
        match kind {
            DiagramKind::Class => render_class_diagram(&self.files, &config.class_diagram_options()),
            DiagramKind::Component => render_component_diagram(&self.files),
            DiagramKind::Sequence => {
                render_sequence_diagram(&self.files, &config.sequence_diagram_options())
            }
            DiagramKind::Entity => render_entity_diagram(&self.entities),
        }
    }

    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn find_service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn layer_of(&self, path: &str) -> Option<&LayerAnalysis> {
        self.layers.iter().find(|l| l.file_path == path)
    }
}

/// Runs every analysis stage against a shared parser registry.
pub struct Pipeline<'r> {
    registry: &'r ParserRegistry,
    config: ArchConfig,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r ParserRegistry) -> Self {
        Self {
            registry,
            config: ArchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ArchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ArchConfig {
        &self.config
    }

    /// Analyze `sources`, using `layout` for service detection.
    ///
    /// Source paths and layout paths are relative to the same root. Fails
    /// only on configuration errors such as a language missing from the
    /// registry.
    pub fn run(
        &self,
        sources: &[SourceFile],
        layout: &RepoLayout,
    ) -> Result<ArchitectureModel, AnalysisError> {
        self.config.validate()?;

        let sources: Vec<SourceFile> = sources
            .iter()
            .filter(|s| !self.config.is_path_excluded(&s.path))
            .cloned()
            .collect();

        let run = FileAnalyzer::new(self.registry).analyze_all(&sources)?;
        let files = run.analyses;

        let dependencies = build_dependency_graph(&files);
        let entry_points = find_entry_points(&files, &dependencies);
        let cycles = DependencyGraph::new(&dependencies).find_cycles();
        info!(
            dependencies = dependencies.len(),
            entry_points = entry_points.len(),
            cycles = cycles.len(),
            "dependency graph built"
        );

        let mut entities = EntityDetector::new(self.registry)
            .with_threshold(self.config.entity_confidence_threshold)
            .with_orm_registry(self.config.orm_registry())
            .detect_all(&files, &sources);

        let layers = LayerClassifier::new()
            .with_overrides(&self.config.layer_overrides)
            .classify_all(&files);
        let layer_violations = find_layer_violations(&layers, &dependencies);
        info!(
            files = layers.len(),
            violations = layer_violations.len(),
            "layers classified"
        );

        let services = detect_services(layout, &files);
        for entity in &mut entities {
            entity.service = service_for_path(&services, &entity.file_path).map(|s| s.name.clone());
        }

        let stats = PipelineStats {
            attempted: run.attempted,
            analyzed: files.len(),
            failed: run.failed.len(),
            failed_files: run.failed,
            files_with_syntax_errors: files.iter().filter(|f| f.has_syntax_errors).count(),
        };

        Ok(ArchitectureModel {
            files,
            dependencies,
            entry_points,
            cycles,
            entities,
            services,
            layers,
            layer_violations,
            stats,
        })
    }

    /// Scan `root` and analyze every supported file found there.
    ///
    /// Unreadable files are counted as failed.
    pub fn run_directory(&self, root: &Path) -> Result<ArchitectureModel, AnalysisError> {
        let layout = RepoLayout::scan(root)?;

        let mut sources = Vec::new();
        let mut unreadable = Vec::new();
        for relative in &layout.source_files {
            match SourceFile::read(root, relative) {
                Ok(Some(file)) => sources.push(file),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %relative, error = %err, "skipping unreadable file");
                    unreadable.push(relative.clone());
                }
            }
        }

        let mut model = self.run(&sources, &layout)?;
        model.stats.attempted += unreadable.len();
        model.stats.failed += unreadable.len();
        model.stats.failed_files.extend(unreadable);
        Ok(model)
    }
}
