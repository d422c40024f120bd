//! Placeholder reference resolution.
//!
//! Rendering, composable-use and project-import relationships arrive with a
//! display name in `target_id` because the producing parser cannot see the
//! whole project. This pass rewrites those placeholders to canonical ids
//! via the [`NameRegistry`]; misses are flagged with the matching
//! `unresolved*` marker and kept in the graph so the import stage can
//! materialize stub targets for them.

use crate::merge::MergedGraph;
use crate::registry::NameRegistry;
use tracing::{debug, info};

/// Relationships processed between progress log lines. Advisory only.
const PROGRESS_INTERVAL: usize = 5_000;

/// Outcome counts for one resolution pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Placeholders rewritten to canonical ids.
    pub resolved: usize,
    /// Placeholders with no registry match, now marker-flagged.
    pub unresolved: usize,
    /// Targets that were already canonical ids.
    pub already_canonical: usize,
}

/// Resolves placeholder targets in place.
///
/// Pass 1 builds the name registry from the node set; pass 2 rewrites every
/// relationship whose kind resolves through a placeholder category. Targets
/// already present in the node-id set are left untouched.
pub fn resolve_references(graph: &mut MergedGraph) -> ResolutionStats {
    let MergedGraph {
        nodes,
        relationships,
    } = graph;

    let registry = NameRegistry::build(nodes);
    let known_ids: std::collections::HashSet<&str> =
        nodes.iter().map(|n| n.id.as_str()).collect();
    debug!(names = registry.len(), "built name registry");

    let total = relationships.len();
    let mut stats = ResolutionStats::default();

    for (processed, rel) in relationships.iter_mut().enumerate() {
        if (processed + 1) % PROGRESS_INTERVAL == 0 {
            info!(processed = processed + 1, total, "resolving references");
        }

        let Some(category) = rel.kind.placeholder_category() else {
            continue;
        };

        if known_ids.contains(rel.target_id.as_str()) {
            stats.already_canonical += 1;
            continue;
        }

        match registry.resolve(category, &rel.target_id) {
            Some(canonical) => {
                rel.target_id = canonical.to_string();
                stats.resolved += 1;
            }
            None => {
                // Placeholder string stays in target_id for the stub pass.
                rel.mark_unresolved(category);
                stats.unresolved += 1;
            }
        }
    }

    info!(
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        already_canonical = stats.already_canonical,
        "reference resolution complete"
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{FileFragment, Node, RelKind, Relationship, UnresolvedKind};

    fn graph_with(nodes: Vec<Node>, relationships: Vec<Relationship>) -> MergedGraph {
        let mut fragments = vec![FileFragment::new(nodes, relationships)];
        crate::merge::merge_fragments(&mut fragments)
    }

    #[test]
    fn test_placeholder_rewritten_to_registry_id() {
        let component = Node::new(
            "f1:Component:src/Header.vue:AppHeader",
            "f1",
            vec!["Component".into()],
        )
        .with_property("name", "AppHeader");
        let rel = Relationship::new("r1", "f1", RelKind::Renders, "f1:Component:src/App.vue:App", "AppHeader");

        let mut graph = graph_with(vec![component], vec![rel]);
        let stats = resolve_references(&mut graph);

        let rel = &graph.relationships[0];
        assert_eq!(rel.target_id, "f1:Component:src/Header.vue:AppHeader");
        assert!(rel.unresolved_kind().is_none());
        assert_eq!(stats.resolved, 1);
    }

    #[test]
    fn test_miss_sets_marker_and_keeps_placeholder() {
        let rel = Relationship::new("r1", "f1", RelKind::Renders, "f1:Component:src/App.vue:App", "MissingWidget");

        let mut graph = graph_with(vec![], vec![rel]);
        let stats = resolve_references(&mut graph);

        let rel = &graph.relationships[0];
        assert_eq!(rel.target_id, "MissingWidget");
        assert_eq!(rel.unresolved_kind(), Some(UnresolvedKind::Component));
        assert_eq!(stats.unresolved, 1);
    }

    #[test]
    fn test_canonical_target_left_untouched() {
        let file = Node::new("f1:File:src/util.ts", "f1", vec!["File".into()])
            .with_property("file", "src/util.ts");
        let rel = Relationship::new(
            "r1",
            "f1",
            RelKind::Imports,
            "f1:File:src/app.ts",
            "f1:File:src/util.ts",
        );

        let mut graph = graph_with(vec![file], vec![rel]);
        let stats = resolve_references(&mut graph);

        assert_eq!(graph.relationships[0].target_id, "f1:File:src/util.ts");
        assert!(graph.relationships[0].unresolved_kind().is_none());
        assert_eq!(stats.already_canonical, 1);
    }

    #[test]
    fn test_non_placeholder_kinds_ignored() {
        let rel = Relationship::new("r1", "f1", RelKind::Calls, "a", "not-a-known-id");

        let mut graph = graph_with(vec![], vec![rel]);
        let stats = resolve_references(&mut graph);

        assert_eq!(stats, ResolutionStats::default());
        assert!(graph.relationships[0].unresolved_kind().is_none());
    }

    #[test]
    fn test_import_placeholder_resolves_to_file() {
        let file = Node::new("f1:File:src/util.ts", "f1", vec!["File".into()])
            .with_property("file", "src/util.ts");
        let rel = Relationship::new("r1", "f1", RelKind::Imports, "f1:File:src/app.ts", "src/util.ts");

        let mut graph = graph_with(vec![file], vec![rel]);
        resolve_references(&mut graph);

        assert_eq!(graph.relationships[0].target_id, "f1:File:src/util.ts");
    }
}
