//! Snapshot checkpoint artifacts.
//!
//! The merged graph is written to the output directory as two flat JSON
//! collections, independent of the store. A later run can replay the
//! persistence stage from these files without re-running any parsing.

use crate::merge::MergedGraph;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const NODES_FILE: &str = "nodes.json";
pub const RELATIONSHIPS_FILE: &str = "relationships.json";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `nodes.json` and `relationships.json` into `dir`.
pub fn write_snapshot(graph: &MergedGraph, dir: &Path) -> Result<(), SnapshotError> {
    fs::create_dir_all(dir)?;

    fs::write(
        dir.join(NODES_FILE),
        serde_json::to_string_pretty(&graph.nodes)?,
    )?;
    fs::write(
        dir.join(RELATIONSHIPS_FILE),
        serde_json::to_string_pretty(&graph.relationships)?,
    )?;

    info!(
        nodes = graph.nodes.len(),
        relationships = graph.relationships.len(),
        dir = %dir.display(),
        "wrote snapshot"
    );
    Ok(())
}

/// Loads a previously written snapshot for persistence replay.
pub fn read_snapshot(dir: &Path) -> Result<MergedGraph, SnapshotError> {
    let nodes = serde_json::from_str(&fs::read_to_string(dir.join(NODES_FILE))?)?;
    let relationships =
        serde_json::from_str(&fs::read_to_string(dir.join(RELATIONSHIPS_FILE))?)?;
    Ok(MergedGraph {
        nodes,
        relationships,
    })
}
