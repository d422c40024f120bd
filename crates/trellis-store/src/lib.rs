//! Trellis Store - Graph persistence
//!
//! This crate writes the merged graph into a shared, multi-codebase Neo4j
//! store and keeps it consistent: declarative schema provisioning,
//! versioned migrations, batched merge-by-id import with stub targets for
//! unresolved references, post-import aggregate recomputation, and a
//! codebase-scoping layer for ad hoc queries.
//!
//! # Example
//!
//! ```no_run
//! use trellis_store::{GraphStore, LoadOptions, StoreConfig};
//! use trellis_graph::MergedGraph;
//!
//! # async fn run(graph: MergedGraph) -> Result<(), trellis_store::StoreError> {
//! let config = StoreConfig::new("bolt://localhost:7687", "neo4j", "secret");
//! let store = GraphStore::connect(&config).await?;
//! let report = trellis_store::load_graph(&store, &graph, &LoadOptions::new("my-app")).await?;
//! println!("{} nodes loaded", report.nodes);
//! # Ok(())
//! # }
//! ```

mod client;
mod consistency;
mod error;
mod import;
mod loader;
mod migrate;
mod schema;
mod scope;

pub use client::{GraphStore, StoreConfig};
pub use consistency::{run_consistency_passes, ConsistencyReport};
pub use error::StoreError;
pub use import::{
    import_nodes, import_relationships, ImportOptions, ImportSummary, DEFAULT_BATCH_SIZE,
};
pub use loader::{load_graph, LoadOptions, LoadReport};
pub use migrate::{
    export_backup, migrate, stale_versions, steps_for, BackupSummary, MigrationStep,
    MigrationSummary, VersionMigration,
};
pub use schema::{
    provision_schema, verify_schema, ConstraintSpec, FulltextSpec, IndexSpec, SchemaDocument,
    SCHEMA_VERSION,
};
pub use scope::scope_to_codebase;
