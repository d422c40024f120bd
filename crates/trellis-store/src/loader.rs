//! Store load state machine.
//!
//! One run walks a fixed sequence: provision schema, verify it, migrate
//! stale versions (optional, with an optional backup first), import nodes,
//! import relationships, then recompute consistency aggregates. Stages run
//! strictly one after another with a single store call in flight at a time;
//! a failure halts the run and surfaces to the caller, who may retry the
//! whole run safely because every write is an idempotent merge-by-id.

use crate::client::GraphStore;
use crate::consistency::{run_consistency_passes, ConsistencyReport};
use crate::error::StoreError;
use crate::import::{import_nodes, import_relationships, ImportOptions, ImportSummary, DEFAULT_BATCH_SIZE};
use crate::migrate::{export_backup, migrate, stale_versions};
use crate::schema::{provision_schema, verify_schema};
use std::path::PathBuf;
use tracing::{info, warn};
use trellis_graph::MergedGraph;

/// Load run parameters.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub codebase_id: String,
    pub batch_size: usize,
    /// Run pending schema migrations before importing.
    pub auto_migrate: bool,
    /// Export a backup into this directory before migrating.
    pub backup_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new(codebase_id: impl Into<String>) -> Self {
        Self {
            codebase_id: codebase_id.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            auto_migrate: false,
            backup_dir: None,
        }
    }
}

/// Summary of one load run.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub migrated_versions: Vec<i64>,
    pub nodes: usize,
    pub relationships: usize,
    pub stubs: usize,
    pub skipped_properties: usize,
    pub consistency: ConsistencyReport,
}

impl LoadReport {
    fn absorb(&mut self, summary: ImportSummary) {
        self.nodes += summary.nodes;
        self.relationships += summary.relationships;
        self.stubs += summary.stubs;
        self.skipped_properties += summary.skipped_properties;
    }
}

/// Loads a merged graph into the store, end to end.
pub async fn load_graph(
    store: &GraphStore,
    graph: &MergedGraph,
    options: &LoadOptions,
) -> Result<LoadReport, StoreError> {
    let mut report = LoadReport::default();

    provision_schema(store).await?;
    verify_schema(store).await?;

    let stale = stale_versions(store).await?;
    if !stale.is_empty() {
        if options.auto_migrate {
            if let Some(dir) = &options.backup_dir {
                export_backup(store, dir).await?;
            }
            let summary = migrate(store).await?;
            report.migrated_versions = summary.versions.iter().map(|v| v.from).collect();
        } else {
            warn!(
                versions = ?stale,
                "stale schema versions present and auto-migration is disabled"
            );
        }
    }

    let import_options = ImportOptions {
        codebase_id: options.codebase_id.clone(),
        batch_size: options.batch_size,
    };
    report.absorb(import_nodes(store, &graph.nodes, &import_options).await?);
    report.absorb(import_relationships(store, &graph.relationships, &import_options).await?);

    report.consistency = run_consistency_passes(store, &options.codebase_id).await?;

    info!(
        codebase = %options.codebase_id,
        nodes = report.nodes,
        relationships = report.relationships,
        stubs = report.stubs,
        "load complete"
    );

    Ok(report)
}
