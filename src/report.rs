//! Output for archscope results.
//!
//! Two formats:
//! - JSON: the full architecture model plus a summary block
//! - Mermaid: one or more diagrams, separated by a blank line

use std::io::Write;

use serde::Serialize;

use crate::config::ArchConfig;
use crate::diagram::DiagramKind;
use crate::pipeline::{ArchitectureModel, PipelineStats};

// =============================================================================
// JSON Format
// =============================================================================

/// Counts over a model, for quick inspection without walking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub files: usize,
    pub functions: usize,
    pub classes: usize,
    pub dependencies: usize,
    pub entry_points: usize,
    pub cycles: usize,
    pub entities: usize,
    pub services: usize,
    pub layer_violations: usize,
}

impl ReportSummary {
    pub fn from_model(model: &ArchitectureModel) -> Self {
        Self {
            files: model.files.len(),
            functions: model.files.iter().map(|f| f.functions.len()).sum(),
            classes: model.files.iter().map(|f| f.classes.len()).sum(),
            dependencies: model.dependencies.len(),
            entry_points: model.entry_points.len(),
            cycles: model.cycles.len(),
            entities: model.entities.len(),
            services: model.services.len(),
            layer_violations: model.layer_violations.len(),
        }
    }
}

/// Top-level JSON document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub summary: ReportSummary,
    pub stats: &'a PipelineStats,
    pub model: &'a ArchitectureModel,
}

impl<'a> JsonReport<'a> {
    pub fn new(model: &'a ArchitectureModel) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            summary: ReportSummary::from_model(model),
            stats: &model.stats,
            model,
        }
    }
}

/// Write the model as pretty-printed JSON.
pub fn write_json<W: Write>(mut writer: W, model: &ArchitectureModel) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut writer, &JsonReport::new(model))?;
    writeln!(writer)?;
    Ok(())
}

// =============================================================================
// Mermaid Format
// =============================================================================

/// Write the requested diagrams, in order, separated by blank lines.
pub fn write_diagrams<W: Write>(
    mut writer: W,
    model: &ArchitectureModel,
    kinds: &[DiagramKind],
    config: &ArchConfig,
) -> anyhow::Result<()> {
    for (i, kind) in kinds.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writer.write_all(model.render(*kind, config).as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FileAnalysis, ImportBinding, ImportStatement, SourceLocation};
    use crate::graph::ModuleDependency;
    use crate::parser::Language;

    fn model() -> ArchitectureModel {
        let mut a = FileAnalysis::empty("src/a.ts", Language::TypeScript);
        a.imports.push(ImportStatement {
            source: "./b".into(),
            bindings: vec![ImportBinding::named("b")],
            location: SourceLocation::default(),
        });
        ArchitectureModel {
            files: vec![a, FileAnalysis::empty("src/b.ts", Language::TypeScript)],
            dependencies: vec![ModuleDependency {
                source: "src/a.ts".into(),
                target: "src/b.ts".into(),
                imported_names: vec!["b".into()],
            }],
            entry_points: vec!["src/a.ts".into()],
            stats: PipelineStats {
                attempted: 3,
                analyzed: 2,
                failed: 1,
                failed_files: vec!["src/broken.ts".into()],
                files_with_syntax_errors: 0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_write_json() {
        let mut buf = Vec::new();
        write_json(&mut buf, &model()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["summary"]["files"], 2);
        assert_eq!(value["summary"]["dependencies"], 1);
        assert_eq!(value["stats"]["failed"], 1);
        assert_eq!(value["stats"]["failedFiles"][0], "src/broken.ts");
        assert_eq!(value["model"]["entryPoints"][0], "src/a.ts");
        assert_eq!(value["model"]["dependencies"][0]["importedNames"][0], "b");
        assert_eq!(value["model"]["files"][0]["filePath"], "src/a.ts");
    }

    #[test]
    fn test_write_diagrams() {
        let mut buf = Vec::new();
        write_diagrams(
            &mut buf,
            &model(),
            &[DiagramKind::Component, DiagramKind::Class],
            &ArchConfig::default(),
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("graph TD\n"));
        assert!(text.contains("src_a_ts --> src_b_ts"));
        assert!(text.contains("\n\nclassDiagram\n"));
    }
}
