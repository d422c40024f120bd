//! Derived dependency synthesis.
//!
//! Folds primitive coupling edges (calls, type references, variable
//! references) into one `DEPENDS_ON` edge per (source, target) pair with a
//! `weight` counter and a `strength` tag. The fold is keyed strictly off
//! the already-deduplicated primitive set, so re-running the pass yields
//! the same weights instead of double counting.

use crate::merge::MergedGraph;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use trellis_core::{RelKind, Relationship, Strength};

/// Synthesizes aggregate `DEPENDS_ON` edges from primitive edges.
///
/// Derived edges are appended to the relationship list; primitives are kept.
/// A pair seen through both calls and references keeps the strong tag.
/// Returns the number of distinct derived pairs.
pub fn derive_dependencies(graph: &mut MergedGraph) -> usize {
    // BTreeMap keeps the appended edge order deterministic.
    let mut aggregate: BTreeMap<(String, String), (i64, Strength, String)> = BTreeMap::new();

    for rel in &graph.relationships {
        let Some(strength) = rel.kind.dependency_strength() else {
            continue;
        };
        aggregate
            .entry((rel.source_id.clone(), rel.target_id.clone()))
            .and_modify(|(weight, existing, _)| {
                *weight += 1;
                if strength > *existing {
                    *existing = strength;
                }
            })
            .or_insert((1, strength, rel.codebase_id.clone()));
    }

    // Existing derived edges (from a previous run over this graph) get their
    // weights overwritten rather than incremented.
    let mut existing_derived: HashMap<(String, String), usize> = HashMap::new();
    for (index, rel) in graph.relationships.iter().enumerate() {
        if rel.kind == RelKind::DependsOn {
            existing_derived.insert((rel.source_id.clone(), rel.target_id.clone()), index);
        }
    }

    let derived = aggregate.len();

    for ((source, target), (weight, strength, codebase)) in aggregate {
        match existing_derived.get(&(source.clone(), target.clone())) {
            Some(&index) => {
                let rel = &mut graph.relationships[index];
                rel.properties.insert("weight".into(), weight.into());
                rel.properties
                    .insert("strength".into(), strength.as_str().into());
            }
            None => {
                let id = format!("{source}-DEPENDS_ON->{target}");
                let rel = Relationship::new(id, codebase, RelKind::DependsOn, source, target)
                    .with_property("weight", weight)
                    .with_property("strength", strength.as_str());
                graph.relationships.push(rel);
            }
        }
    }

    debug!(derived, "synthesized dependency edges");
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, source: &str, target: &str) -> Relationship {
        Relationship::new(id, "f1", RelKind::Calls, source, target)
    }

    #[test]
    fn test_repeated_calls_aggregate_into_one_weighted_edge() {
        let mut graph = MergedGraph {
            nodes: vec![],
            relationships: vec![
                call("r1", "a", "b"),
                call("r2", "a", "b"),
                call("r3", "a", "b"),
            ],
        };

        let derived = derive_dependencies(&mut graph);

        assert_eq!(derived, 1);
        let depends: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelKind::DependsOn)
            .collect();
        assert_eq!(depends.len(), 1);
        assert_eq!(depends[0].properties["weight"], 3);
        assert_eq!(depends[0].properties["strength"], "strong");
        assert_eq!(depends[0].id, "a-DEPENDS_ON->b");
    }

    #[test]
    fn test_mixed_primitives_keep_strong_tag() {
        let mut graph = MergedGraph {
            nodes: vec![],
            relationships: vec![
                Relationship::new("r1", "f1", RelKind::ReferencesType, "a", "b"),
                call("r2", "a", "b"),
                Relationship::new("r3", "f1", RelKind::ReferencesVariable, "a", "b"),
            ],
        };

        derive_dependencies(&mut graph);

        let depends = graph
            .relationships
            .iter()
            .find(|r| r.kind == RelKind::DependsOn)
            .unwrap();
        assert_eq!(depends.properties["weight"], 3);
        assert_eq!(depends.properties["strength"], "strong");
    }

    #[test]
    fn test_rerun_does_not_double_count() {
        let mut graph = MergedGraph {
            nodes: vec![],
            relationships: vec![call("r1", "a", "b"), call("r2", "a", "b")],
        };

        derive_dependencies(&mut graph);
        derive_dependencies(&mut graph);

        let depends: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelKind::DependsOn)
            .collect();
        assert_eq!(depends.len(), 1);
        assert_eq!(depends[0].properties["weight"], 2);
    }

    #[test]
    fn test_distinct_pairs_stay_distinct() {
        let mut graph = MergedGraph {
            nodes: vec![],
            relationships: vec![call("r1", "a", "b"), call("r2", "a", "c")],
        };

        let derived = derive_dependencies(&mut graph);

        assert_eq!(derived, 2);
    }
}
