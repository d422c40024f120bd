//! Trellis Graph - Fragment merging and consistency
//!
//! This crate turns per-file extraction fragments into one internally
//! consistent graph: global deduplication by id, cross-file placeholder
//! resolution, derived dependency edges, and two-tier validation, with a
//! JSON snapshot checkpoint for persistence replay.
//!
//! # Architecture
//!
//! Stages are pure, sequential passes over flat vectors:
//! - merge: two-pass dedup, last-write-wins
//! - resolve: name registry then in-place target rewrite
//! - derive: weighted `DEPENDS_ON` aggregation
//! - validate: hard structural gate, soft referential gate
//!
//! # Example
//!
//! ```no_run
//! use trellis_graph::{build_graph, PipelineOptions};
//! use trellis_core::FileFragment;
//!
//! let fragments: Vec<FileFragment> = Vec::new(); // from parser output
//! let (graph, report) = build_graph(fragments, &PipelineOptions::default()).unwrap();
//! println!("{} nodes, {} dangling", report.nodes, report.dangling);
//! ```

mod derive;
mod merge;
mod pipeline;
mod registry;
mod resolve;
mod snapshot;
mod validate;

pub use derive::derive_dependencies;
pub use merge::{merge_fragments, MergedGraph};
pub use pipeline::{build_graph, PipelineError, PipelineOptions, PipelineReport};
pub use registry::NameRegistry;
pub use resolve::{resolve_references, ResolutionStats};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotError, NODES_FILE, RELATIONSHIPS_FILE};
pub use validate::{
    validate, DanglingRef, Endpoint, ValidateError, ValidationOptions, ValidationReport,
    NON_CODE_EXTENSIONS,
};
