//! Per-file extraction fragments.

use crate::entity::{Node, Relationship};
use serde::{Deserialize, Serialize};

/// The raw output of parsing one source file.
///
/// Fragments are produced independently per file, so they routinely contain
/// duplicate nodes (a shared type referenced from many files) and
/// relationships whose targets are still display-name placeholders. The
/// merge stage consumes fragments destructively: absorbed lists are drained
/// to keep peak memory proportional to the unique entity count.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFragment {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl FileFragment {
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        Self {
            nodes,
            relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}
