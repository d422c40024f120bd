//! Two-tier graph validation.
//!
//! The hard gate is structural: a violation there is a programmer error in
//! a fragment producer and fails the whole run before anything is written.
//! The soft gate is referential: dangling endpoints are a data-quality
//! signal, logged and reported but non-fatal by default, with an exemption
//! list for relationship kinds that legitimately point outside the merged
//! node set.

use crate::merge::MergedGraph;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use trellis_core::{EntityId, RelKind, Relationship};

/// Import targets with these extensions are assets, not code; a dangling
/// import edge to one of them is expected.
pub const NON_CODE_EXTENSIONS: &[&str] = &[
    "css", "scss", "sass", "less", "styl", "svg", "png", "jpg", "jpeg", "gif", "webp", "ico",
    "json", "yaml", "yml", "md", "txt", "html", "woff", "woff2", "ttf", "eot", "otf", "map",
];

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("structural validation failed: {n} violation(s), first: {first}",
        n = .violations.len(),
        first = .violations.first().map(String::as_str).unwrap_or("<none>"))]
    Structural { violations: Vec<String> },

    #[error("referential validation failed: {n} dangling relationship(s)",
        n = .dangling.len())]
    Referential { dangling: Vec<DanglingRef> },
}

/// Which end of a relationship failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Source,
    Target,
}

/// A relationship endpoint that does not match any merged node id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingRef {
    pub relationship_id: String,
    pub kind: RelKind,
    pub endpoint: Endpoint,
    pub missing_id: String,
}

/// Caller-controlled validation behavior.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Skip the soft referential gate entirely.
    pub skip_referential: bool,

    /// Treat non-exempt dangling endpoints as fatal instead of warning.
    pub strict_referential: bool,

    /// Root used to probe whether an import target is a directory on disk.
    pub project_root: Option<PathBuf>,
}

/// Result of the soft gate.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub dangling: Vec<DanglingRef>,
}

/// Runs both gates over the merged graph.
///
/// Hard violations abort immediately; dangling refs are returned in the
/// report (and logged) unless `strict_referential` turns them fatal.
pub fn validate(
    graph: &MergedGraph,
    options: &ValidationOptions,
) -> Result<ValidationReport, ValidateError> {
    let violations = structural_violations(graph);
    if !violations.is_empty() {
        return Err(ValidateError::Structural { violations });
    }

    if options.skip_referential {
        return Ok(ValidationReport::default());
    }

    let dangling = dangling_references(graph, options.project_root.as_deref());
    for reference in &dangling {
        warn!(
            relationship = %reference.relationship_id,
            kind = %reference.kind,
            missing = %reference.missing_id,
            "dangling relationship endpoint"
        );
    }

    if options.strict_referential && !dangling.is_empty() {
        return Err(ValidateError::Referential { dangling });
    }

    Ok(ValidationReport { dangling })
}

fn structural_violations(graph: &MergedGraph) -> Vec<String> {
    let mut violations = Vec::new();

    for node in &graph.nodes {
        if node.id.is_empty() {
            violations.push("node with empty id".to_string());
        }
        if node.codebase_id.is_empty() {
            violations.push(format!("node {:?} missing codebase id", node.id));
        }
        if node.labels.is_empty() {
            violations.push(format!("node {:?} has no labels", node.id));
        }
    }

    for rel in &graph.relationships {
        if rel.id.is_empty() {
            violations.push("relationship with empty id".to_string());
        }
        if rel.codebase_id.is_empty() {
            violations.push(format!("relationship {:?} missing codebase id", rel.id));
        }
        if rel.source_id.is_empty() {
            violations.push(format!("relationship {:?} missing source id", rel.id));
        }
        if rel.target_id.is_empty() {
            violations.push(format!("relationship {:?} missing target id", rel.id));
        }
    }

    violations
}

fn dangling_references(graph: &MergedGraph, project_root: Option<&Path>) -> Vec<DanglingRef> {
    let known = graph.node_ids();
    let mut dangling = Vec::new();

    for rel in &graph.relationships {
        if is_exempt(rel, project_root) {
            continue;
        }
        for (endpoint, id) in [
            (Endpoint::Source, &rel.source_id),
            (Endpoint::Target, &rel.target_id),
        ] {
            if !known.contains(id.as_str()) {
                dangling.push(DanglingRef {
                    relationship_id: rel.id.clone(),
                    kind: rel.kind,
                    endpoint,
                    missing_id: id.clone(),
                });
            }
        }
    }

    dangling
}

/// Relationship kinds that legitimately point outside the merged node set.
fn is_exempt(rel: &Relationship, project_root: Option<&Path>) -> bool {
    // Anything already flagged unresolved gets a stub target at import time.
    if rel.unresolved_kind().is_some() {
        return true;
    }

    match rel.kind {
        // External packages are never part of the merged graph.
        RelKind::ImportsFromPackage => true,
        // Sentinel edges within a file.
        RelKind::ExportsLocal => true,
        // Bare type names, unresolvable without whole-program type info.
        RelKind::Extends | RelKind::Implements => true,
        // May point at globals or externally-defined symbols.
        RelKind::ReferencesType | RelKind::ReferencesVariable => true,
        // Inherit referential validity from their source edges.
        RelKind::DependsOn => true,
        RelKind::Imports => import_target_is_non_code(&rel.target_id, project_root),
        _ => false,
    }
}

/// Whether an import target is a directory or a known non-code asset.
fn import_target_is_non_code(target_id: &str, project_root: Option<&Path>) -> bool {
    // The target may be a canonical file id or a raw path placeholder.
    let path = EntityId::parse(target_id)
        .map(|entity| entity.path)
        .unwrap_or(target_id);

    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        if NON_CODE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return true;
        }
    }

    match project_root {
        Some(root) => root.join(path).is_dir(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Node;

    fn node(id: &str) -> Node {
        Node::new(id, "f1", vec!["Function".into()])
    }

    fn graph(nodes: Vec<Node>, relationships: Vec<Relationship>) -> MergedGraph {
        MergedGraph {
            nodes,
            relationships,
        }
    }

    #[test]
    fn test_hard_gate_rejects_missing_labels() {
        let bad = Node::new("a", "f1", vec![]);
        let result = validate(&graph(vec![bad], vec![]), &ValidationOptions::default());

        match result {
            Err(ValidateError::Structural { violations }) => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].contains("no labels"));
            }
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_soft_gate_reports_dangling_target() {
        let rel = Relationship::new("r1", "f1", RelKind::Calls, "a", "ghost");
        let report = validate(
            &graph(vec![node("a")], vec![rel]),
            &ValidationOptions::default(),
        )
        .unwrap();

        assert_eq!(report.dangling.len(), 1);
        assert_eq!(report.dangling[0].missing_id, "ghost");
        assert_eq!(report.dangling[0].endpoint, Endpoint::Target);
    }

    #[test]
    fn test_package_imports_never_reported() {
        let rel = Relationship::new("r1", "f1", RelKind::ImportsFromPackage, "a", "lodash");
        let report = validate(
            &graph(vec![node("a")], vec![rel]),
            &ValidationOptions::default(),
        )
        .unwrap();

        assert!(report.dangling.is_empty());
    }

    #[test]
    fn test_unresolved_marker_exempts_relationship() {
        let mut rel = Relationship::new("r1", "f1", RelKind::Renders, "a", "MissingWidget");
        rel.mark_unresolved(trellis_core::UnresolvedKind::Component);

        let report = validate(
            &graph(vec![node("a")], vec![rel]),
            &ValidationOptions::default(),
        )
        .unwrap();

        assert!(report.dangling.is_empty());
    }

    #[test]
    fn test_asset_import_is_exempt() {
        let rel = Relationship::new(
            "r1",
            "f1",
            RelKind::Imports,
            "a",
            "f1:File:src/styles/main.scss",
        );
        let report = validate(
            &graph(vec![node("a")], vec![rel]),
            &ValidationOptions::default(),
        )
        .unwrap();

        assert!(report.dangling.is_empty());
    }

    #[test]
    fn test_directory_import_is_exempt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("components")).unwrap();

        let rel = Relationship::new("r1", "f1", RelKind::Imports, "a", "f1:File:components");
        let options = ValidationOptions {
            project_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let report = validate(&graph(vec![node("a")], vec![rel]), &options).unwrap();
        assert!(report.dangling.is_empty());
    }

    #[test]
    fn test_strict_mode_turns_dangling_fatal() {
        let rel = Relationship::new("r1", "f1", RelKind::Calls, "a", "ghost");
        let options = ValidationOptions {
            strict_referential: true,
            ..Default::default()
        };

        let result = validate(&graph(vec![node("a")], vec![rel]), &options);
        assert!(matches!(result, Err(ValidateError::Referential { .. })));
    }

    #[test]
    fn test_skip_referential_suppresses_soft_gate() {
        let rel = Relationship::new("r1", "f1", RelKind::Calls, "a", "ghost");
        let options = ValidationOptions {
            skip_referential: true,
            ..Default::default()
        };

        let report = validate(&graph(vec![node("a")], vec![rel]), &options).unwrap();
        assert!(report.dangling.is_empty());
    }
}
