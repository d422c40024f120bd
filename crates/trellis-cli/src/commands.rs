//! CLI command implementations.

use anyhow::{bail, Context};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trellis_core::FileFragment;
use trellis_graph::{
    build_graph, read_snapshot, MergedGraph, PipelineOptions, PipelineReport, ValidationOptions,
};
use trellis_store::{GraphStore, LoadOptions, LoadReport, StoreConfig};

type Result<T> = anyhow::Result<T>;

pub struct LoadParams {
    pub fragments: PathBuf,
    pub codebase: String,
    pub output: PathBuf,
    pub batch_size: usize,
    pub skip_soft_validation: bool,
    pub strict_references: bool,
    pub project_root: Option<PathBuf>,
    pub auto_migrate: bool,
    pub backup: bool,
    pub store: StoreConfig,
}

/// Reads fragments from a JSON file or a directory of JSON files.
///
/// Directory entries are consumed in sorted filename order so the
/// last-write-wins merge is deterministic across runs.
fn read_fragments(path: &Path) -> Result<Vec<FileFragment>> {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("reading fragment directory {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        entries.sort();

        let mut fragments = Vec::with_capacity(entries.len());
        for entry in entries {
            fragments.extend(parse_fragment_file(&entry)?);
        }
        Ok(fragments)
    } else {
        parse_fragment_file(path)
    }
}

/// A fragment file holds either one fragment or an array of them.
fn parse_fragment_file(path: &Path) -> Result<Vec<FileFragment>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading fragment file {}", path.display()))?;

    if let Ok(list) = serde_json::from_str::<Vec<FileFragment>>(&text) {
        return Ok(list);
    }
    let single: FileFragment = serde_json::from_str(&text)
        .with_context(|| format!("parsing fragment file {}", path.display()))?;
    Ok(vec![single])
}

/// Build the merged graph and write the snapshot checkpoint.
pub fn build(
    fragments_path: &Path,
    codebase: &str,
    output: &Path,
    skip_soft_validation: bool,
    strict_references: bool,
    project_root: Option<PathBuf>,
) -> Result<(MergedGraph, PipelineReport)> {
    println!("{}", "Building merged graph...".cyan());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Reading fragments...");

    let fragments = read_fragments(fragments_path)?;
    if fragments.is_empty() {
        spinner.finish_and_clear();
        bail!("no fragments found at {}", fragments_path.display());
    }

    spinner.set_message(format!("Merging {} fragments...", fragments.len()));

    let options = PipelineOptions {
        output_dir: Some(output.to_path_buf()),
        validation: ValidationOptions {
            skip_referential: skip_soft_validation,
            strict_referential: strict_references,
            project_root,
        },
    };
    let (graph, report) = build_graph(fragments, &options)?;

    spinner.finish_and_clear();

    println!(
        "{} Merged {} nodes, {} relationships ({} derived) in {}ms",
        "✓".green(),
        report.nodes.to_string().cyan(),
        report.relationships.to_string().cyan(),
        report.derived,
        report.duration_ms
    );
    println!(
        "  {} resolved, {} unresolved, {} dangling (codebase {})",
        report.resolution.resolved,
        report.resolution.unresolved,
        report.dangling,
        codebase.cyan()
    );
    println!("{} Snapshot written to {}", "✓".green(), output.display());

    Ok((graph, report))
}

/// Full run: pipeline, store load, consistency passes.
pub async fn load(params: LoadParams) -> Result<()> {
    let (graph, _) = build(
        &params.fragments,
        &params.codebase,
        &params.output,
        params.skip_soft_validation,
        params.strict_references,
        params.project_root.clone(),
    )?;

    let options = LoadOptions {
        codebase_id: params.codebase.clone(),
        batch_size: params.batch_size,
        auto_migrate: params.auto_migrate,
        backup_dir: params.backup.then(|| params.output.join("backup")),
    };

    import_graph(&graph, &params.store, &options).await
}

/// Re-run persistence from an existing snapshot.
pub async fn replay(
    output: &Path,
    codebase: &str,
    batch_size: usize,
    auto_migrate: bool,
    backup: bool,
    store: StoreConfig,
) -> Result<()> {
    println!("{}", "Replaying snapshot...".cyan());
    let graph = read_snapshot(output)
        .with_context(|| format!("reading snapshot from {}", output.display()))?;
    println!(
        "{} Loaded snapshot: {} nodes, {} relationships",
        "✓".green(),
        graph.nodes.len().to_string().cyan(),
        graph.relationships.len().to_string().cyan()
    );

    let options = LoadOptions {
        codebase_id: codebase.to_string(),
        batch_size,
        auto_migrate,
        backup_dir: backup.then(|| output.join("backup")),
    };

    import_graph(&graph, &store, &options).await
}

async fn import_graph(
    graph: &MergedGraph,
    config: &StoreConfig,
    options: &LoadOptions,
) -> Result<()> {
    println!("{}", "Loading into store...".cyan());
    let store = GraphStore::connect(config)
        .await
        .context("connecting to graph store")?;

    let report = trellis_store::load_graph(&store, graph, options).await?;
    print_load_report(&report);
    Ok(())
}

fn print_load_report(report: &LoadReport) {
    if !report.migrated_versions.is_empty() {
        println!(
            "{} Migrated schema versions: {:?}",
            "✓".green(),
            report.migrated_versions
        );
    }
    println!(
        "{} Imported {} nodes, {} relationships ({} stubs)",
        "✓".green(),
        report.nodes.to_string().cyan(),
        report.relationships.to_string().cyan(),
        report.stubs
    );
    if report.skipped_properties > 0 {
        println!(
            "{} Skipped {} unsupported property values",
            "⚠".yellow(),
            report.skipped_properties
        );
    }
    println!(
        "{} Consistency: {} counters updated, {} ownership edges backfilled",
        "✓".green(),
        report.consistency.counters_updated,
        report.consistency.ownership_backfilled
    );
}

/// Standalone schema migration.
pub async fn migrate(backup: bool, backup_dir: &Path, config: StoreConfig) -> Result<()> {
    let store = GraphStore::connect(&config)
        .await
        .context("connecting to graph store")?;

    let stale = trellis_store::stale_versions(&store).await?;
    if stale.is_empty() {
        println!("{} Store is already at the current schema version", "✓".green());
        return Ok(());
    }
    println!("Stale schema versions: {stale:?}");

    if backup {
        let summary = trellis_store::export_backup(&store, backup_dir).await?;
        println!(
            "{} Backup written to {} ({} nodes, {} relationships)",
            "✓".green(),
            backup_dir.display(),
            summary.nodes,
            summary.relationships
        );
    }

    let summary = trellis_store::migrate(&store).await?;
    for version in &summary.versions {
        println!(
            "{} Migrated version {} ({} entities stamped)",
            "✓".green(),
            version.from,
            version.stamped
        );
        for (step, affected) in &version.steps {
            println!("    {step}: {affected}");
        }
    }

    Ok(())
}

/// Scoped ad hoc query, rows printed as JSON.
pub async fn query(
    cypher: &str,
    codebase: &str,
    cross_codebase: bool,
    config: StoreConfig,
) -> Result<()> {
    let store = GraphStore::connect(&config)
        .await
        .context("connecting to graph store")?;

    let mut stream = if cross_codebase {
        store.execute_cross_codebase(cypher).await?
    } else {
        store.execute_scoped(cypher, codebase).await?
    };

    let mut rows = 0usize;
    while let Some(row) = stream.next().await.map_err(trellis_store::StoreError::from)? {
        let value: serde_json::Value = row.to()?;
        println!("{}", serde_json::to_string(&value)?);
        rows += 1;
    }

    eprintln!("{} {} row(s)", "✓".green(), rows);
    Ok(())
}
