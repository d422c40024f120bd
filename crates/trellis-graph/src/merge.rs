//! Fragment merging and global deduplication.
//!
//! Thousands of per-file fragments collapse into one graph here. Duplicate
//! ids are routine (a shared type shows up in every file that touches it),
//! so collisions are resolved last-write-wins rather than treated as errors.
//!
//! The merge runs in two bounded passes: a counting pass sizes the output
//! vectors from the unique id sets, then a collection pass drains each
//! fragment into pre-allocated storage. Peak memory tracks the unique
//! entity count, not the much larger fragment sum.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use trellis_core::{FileFragment, Node, Relationship};

/// The merged, deduplicated graph.
///
/// Lives in memory only until persisted; the store is the durable copy.
#[derive(Debug, Default)]
pub struct MergedGraph {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl MergedGraph {
    /// The set of node ids, borrowed. Used for endpoint checks.
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// Merges fragments into one graph, collapsing duplicates by id.
///
/// Later fragments override earlier ones for the same id. Each fragment's
/// lists are taken (and their allocations dropped) as soon as the fragment
/// is absorbed.
pub fn merge_fragments(fragments: &mut [FileFragment]) -> MergedGraph {
    let (unique_nodes, unique_rels) = {
        let mut node_ids: HashSet<&str> = HashSet::new();
        let mut rel_ids: HashSet<&str> = HashSet::new();
        for fragment in fragments.iter() {
            for node in &fragment.nodes {
                node_ids.insert(node.id.as_str());
            }
            for rel in &fragment.relationships {
                rel_ids.insert(rel.id.as_str());
            }
        }
        (node_ids.len(), rel_ids.len())
    };

    let mut nodes: Vec<Node> = Vec::with_capacity(unique_nodes);
    let mut relationships: Vec<Relationship> = Vec::with_capacity(unique_rels);
    let mut node_slots: HashMap<String, usize> = HashMap::with_capacity(unique_nodes);
    let mut rel_slots: HashMap<String, usize> = HashMap::with_capacity(unique_rels);

    for fragment in fragments.iter_mut() {
        for node in std::mem::take(&mut fragment.nodes) {
            match node_slots.entry(node.id.clone()) {
                Entry::Occupied(slot) => nodes[*slot.get()] = node,
                Entry::Vacant(slot) => {
                    slot.insert(nodes.len());
                    nodes.push(node);
                }
            }
        }
        for rel in std::mem::take(&mut fragment.relationships) {
            match rel_slots.entry(rel.id.clone()) {
                Entry::Occupied(slot) => relationships[*slot.get()] = rel,
                Entry::Vacant(slot) => {
                    slot.insert(relationships.len());
                    relationships.push(rel);
                }
            }
        }
    }

    debug!(
        nodes = nodes.len(),
        relationships = relationships.len(),
        fragments = fragments.len(),
        "merged fragments"
    );

    MergedGraph {
        nodes,
        relationships,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::RelKind;

    fn node(id: &str) -> Node {
        Node::new(id, "f1", vec!["Function".into()])
    }

    #[test]
    fn test_duplicate_node_keeps_last_occurrence() {
        let mut fragments = vec![
            FileFragment::new(vec![node("A").with_property("arity", 1)], vec![]),
            FileFragment::new(vec![node("A").with_property("arity", 2)], vec![]),
        ];

        let graph = merge_fragments(&mut fragments);

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].properties["arity"], 2);
    }

    #[test]
    fn test_duplicate_relationship_collapses_by_id() {
        let rel = Relationship::new("r1", "f1", RelKind::Calls, "a", "b");
        let mut fragments = vec![FileFragment::new(
            vec![node("a"), node("b")],
            vec![rel.clone(), rel],
        )];

        let graph = merge_fragments(&mut fragments);

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.relationships.len(), 1);
    }

    #[test]
    fn test_fragments_are_drained() {
        let mut fragments = vec![FileFragment::new(vec![node("a")], vec![])];

        let graph = merge_fragments(&mut fragments);

        assert_eq!(graph.nodes.len(), 1);
        assert!(fragments[0].nodes.is_empty());
        assert_eq!(fragments[0].nodes.capacity(), 0);
    }

    #[test]
    fn test_output_is_pre_sized() {
        let mut fragments: Vec<FileFragment> = (0..10)
            .map(|_| FileFragment::new(vec![node("shared")], vec![]))
            .collect();

        let graph = merge_fragments(&mut fragments);

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes.capacity(), 1);
    }
}
