//! End-to-end in-memory pipeline.
//!
//! Stages run strictly in sequence, each fully consuming the previous
//! stage's output: merge, label reconciliation, reference resolution,
//! dependency derivation, validation, snapshot. The persisted-store load is
//! a separate concern layered on top of the returned graph.

use crate::derive::derive_dependencies;
use crate::merge::{merge_fragments, MergedGraph};
use crate::resolve::{resolve_references, ResolutionStats};
use crate::snapshot::{write_snapshot, SnapshotError};
use crate::validate::{validate, ValidateError, ValidationOptions};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use trellis_core::FileFragment;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidateError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Pipeline run configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Where to write the snapshot checkpoint; skipped when unset.
    pub output_dir: Option<PathBuf>,

    pub validation: ValidationOptions,
}

/// Summary of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub nodes: usize,
    pub relationships: usize,
    /// Nodes whose locatable-element label was corrected by the post-pass.
    pub labels_synced: usize,
    pub resolution: ResolutionStats,
    pub derived: usize,
    pub dangling: usize,
    pub duration_ms: u64,
}

/// Runs the full in-memory pipeline over the given fragments.
pub fn build_graph(
    mut fragments: Vec<FileFragment>,
    options: &PipelineOptions,
) -> Result<(MergedGraph, PipelineReport), PipelineError> {
    let started = Instant::now();

    let mut graph = merge_fragments(&mut fragments);
    drop(fragments);

    let labels_synced = graph
        .nodes
        .iter_mut()
        .map(|node| node.sync_code_element_label())
        .filter(|&changed| changed)
        .count();

    let resolution = resolve_references(&mut graph);
    let derived = derive_dependencies(&mut graph);
    let report = validate(&graph, &options.validation)?;

    if let Some(dir) = &options.output_dir {
        write_snapshot(&graph, dir)?;
    }

    let summary = PipelineReport {
        nodes: graph.nodes.len(),
        relationships: graph.relationships.len(),
        labels_synced,
        resolution,
        derived,
        dangling: report.dangling.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        nodes = summary.nodes,
        relationships = summary.relationships,
        derived = summary.derived,
        dangling = summary.dangling,
        duration_ms = summary.duration_ms,
        "pipeline complete"
    );

    Ok((graph, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Node, RelKind, Relationship};

    #[test]
    fn test_duplicates_collapse_before_derivation() {
        // Two fragments each carrying the same file node; one fragment
        // repeats the same call relationship twice. The duplicate must be
        // collapsed by id before derivation so the dependency weight is 1.
        let file_node = Node::new("f1:File:a.ts", "f1", vec!["File".into()]);
        let call = Relationship::new(
            "r1",
            "f1",
            RelKind::Calls,
            "f1:Function:foo",
            "f1:Function:bar",
        );

        let fragments = vec![
            FileFragment::new(vec![file_node.clone()], vec![call.clone(), call]),
            FileFragment::new(vec![file_node], vec![]),
        ];

        let options = PipelineOptions {
            validation: ValidationOptions {
                skip_referential: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let (graph, report) = build_graph(fragments, &options).unwrap();

        assert_eq!(graph.nodes.len(), 1);

        let calls: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelKind::Calls)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "r1");

        let depends: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelKind::DependsOn)
            .collect();
        assert_eq!(depends.len(), 1);
        assert_eq!(depends[0].properties["weight"], 1);

        assert_eq!(report.nodes, 1);
        assert_eq!(report.derived, 1);
    }

    #[test]
    fn test_label_post_pass_runs_before_resolution() {
        let located = Node::new("f1:Component:src/App.vue:App", "f1", vec!["Component".into()])
            .with_property("name", "App")
            .with_property("file", "src/App.vue")
            .with_property("startLine", 1)
            .with_property("endLine", 40);

        let fragments = vec![FileFragment::new(vec![located], vec![])];
        let options = PipelineOptions::default();

        let (graph, report) = build_graph(fragments, &options).unwrap();

        assert_eq!(report.labels_synced, 1);
        assert!(graph.nodes[0]
            .labels
            .iter()
            .any(|l| l == trellis_core::CODE_ELEMENT_LABEL));
    }

    #[test]
    fn test_structural_failure_aborts_run() {
        let bad = Node::new("", "f1", vec!["File".into()]);
        let fragments = vec![FileFragment::new(vec![bad], vec![])];

        let result = build_graph(fragments, &PipelineOptions::default());
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidateError::Structural { .. }))
        ));
    }
}
