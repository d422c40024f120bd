//! Versioned schema migration.
//!
//! Already-persisted entities carry a `schemaVersion` stamp. Before a new
//! load, every stale version found in the store is migrated through a
//! per-version strategy table: each source version runs its named steps
//! plus the version stamp inside one transaction, committed or rolled back
//! as a unit. A failure aborts that version only; earlier versions already
//! committed stay committed.

use crate::client::GraphStore;
use crate::error::StoreError;
use crate::schema::SCHEMA_VERSION;
use neo4rs::{query, Txn};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// One named migration statement. Every statement returns a single
/// `affected` count column.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    pub name: &'static str,
    pub cypher: &'static str,
}

/// Version 1 stored the tenant under a legacy `codebase` property.
const V1_STEPS: &[MigrationStep] = &[
    MigrationStep {
        name: "rename node codebase property",
        cypher: "MATCH (n) WHERE n.schemaVersion = 1 AND n.codebase IS NOT NULL \
                 SET n.codebaseId = n.codebase REMOVE n.codebase \
                 RETURN count(n) AS affected",
    },
    MigrationStep {
        name: "rename relationship codebase property",
        cypher: "MATCH ()-[r]->() WHERE r.schemaVersion = 1 AND r.codebase IS NOT NULL \
                 SET r.codebaseId = r.codebase REMOVE r.codebase \
                 RETURN count(r) AS affected",
    },
];

/// Version 2 predates the locatable-element label and dependency weights.
const V2_STEPS: &[MigrationStep] = &[
    MigrationStep {
        name: "tag locatable elements",
        cypher: "MATCH (n) WHERE n.schemaVersion = 2 AND NOT n:CodeElement \
                 AND n.name IS NOT NULL AND n.file IS NOT NULL \
                 AND n.startLine IS NOT NULL AND n.endLine IS NOT NULL \
                 SET n:CodeElement \
                 RETURN count(n) AS affected",
    },
    MigrationStep {
        name: "default dependency weights",
        cypher: "MATCH ()-[r:DEPENDS_ON]->() WHERE r.schemaVersion = 2 AND r.weight IS NULL \
                 SET r.weight = 1 \
                 RETURN count(r) AS affected",
    },
];

/// The strategy table: steps that bring entities at `from` up to the
/// current version. Unknown versions get no transform steps, only the
/// final stamp.
pub fn steps_for(from: i64) -> &'static [MigrationStep] {
    match from {
        1 => V1_STEPS,
        2 => V2_STEPS,
        _ => &[],
    }
}

/// Distinct persisted schema versions older than the current one,
/// ascending.
pub async fn stale_versions(store: &GraphStore) -> Result<Vec<i64>, StoreError> {
    let q = query(
        "MATCH (n) WHERE n.schemaVersion IS NOT NULL AND n.schemaVersion < $current \
         RETURN DISTINCT n.schemaVersion AS version ORDER BY version",
    )
    .param("current", SCHEMA_VERSION);

    let mut versions = Vec::new();
    let mut stream = store.execute(q).await?;
    while let Some(row) = stream.next().await? {
        versions.push(row.get::<i64>("version")?);
    }
    Ok(versions)
}

/// Counts applied per migrated version.
#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub versions: Vec<VersionMigration>,
}

#[derive(Debug)]
pub struct VersionMigration {
    pub from: i64,
    pub steps: Vec<(String, i64)>,
    pub stamped: i64,
}

/// Migrates every stale version, one transaction per source version.
pub async fn migrate(store: &GraphStore) -> Result<MigrationSummary, StoreError> {
    let versions = stale_versions(store).await?;
    if versions.is_empty() {
        info!("no stale schema versions, migration skipped");
        return Ok(MigrationSummary::default());
    }

    let mut summary = MigrationSummary::default();
    for from in versions {
        let mut txn = store.start_txn().await?;
        match run_version(&mut txn, from).await {
            Ok(migration) => {
                txn.commit().await?;
                info!(
                    from,
                    to = SCHEMA_VERSION,
                    stamped = migration.stamped,
                    "schema version migrated"
                );
                summary.versions.push(migration);
            }
            Err(err) => {
                error!(from, error = %err, "migration step failed, rolling back version");
                txn.rollback().await?;
                return Err(StoreError::Migration {
                    version: from,
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(summary)
}

async fn run_version(txn: &mut Txn, from: i64) -> Result<VersionMigration, StoreError> {
    let mut steps = Vec::new();

    for step in steps_for(from) {
        let affected = txn_count(txn, query(step.cypher)).await?;
        info!(from, step = step.name, affected, "migration step applied");
        steps.push((step.name.to_string(), affected));
    }

    // The stamp is the table's final, implicit step for every version.
    let stamp_nodes = query(
        "MATCH (n) WHERE n.schemaVersion = $from SET n.schemaVersion = $current \
         RETURN count(n) AS affected",
    )
    .param("from", from)
    .param("current", SCHEMA_VERSION);
    let stamp_rels = query(
        "MATCH ()-[r]->() WHERE r.schemaVersion = $from SET r.schemaVersion = $current \
         RETURN count(r) AS affected",
    )
    .param("from", from)
    .param("current", SCHEMA_VERSION);

    let stamped = txn_count(txn, stamp_nodes).await? + txn_count(txn, stamp_rels).await?;

    Ok(VersionMigration {
        from,
        steps,
        stamped,
    })
}

async fn txn_count(txn: &mut Txn, q: neo4rs::Query) -> Result<i64, StoreError> {
    let mut stream = txn.execute(q).await?;
    match stream.next(txn.handle()).await? {
        Some(row) => Ok(row.get::<i64>("affected")?),
        None => Ok(0),
    }
}

/// Counts from a pre-migration backup export.
#[derive(Debug)]
pub struct BackupSummary {
    pub nodes: usize,
    pub relationships: usize,
}

/// Exports every persisted entity to JSON files in `dir`.
///
/// Runs before migration when enabled, as a safety copy independent of the
/// transactional rollback.
pub async fn export_backup(store: &GraphStore, dir: &Path) -> Result<BackupSummary, StoreError> {
    fs::create_dir_all(dir)?;

    let mut nodes: Vec<Value> = Vec::new();
    let mut stream = store
        .execute(query(
            "MATCH (n) RETURN n.id AS id, labels(n) AS labels, properties(n) AS props",
        ))
        .await?;
    while let Some(row) = stream.next().await? {
        nodes.push(serde_json::json!({
            "id": row.get::<Option<String>>("id")?,
            "labels": row.get::<Vec<String>>("labels")?,
            "properties": row.get::<Value>("props")?,
        }));
    }

    let mut relationships: Vec<Value> = Vec::new();
    let mut stream = store
        .execute(query(
            "MATCH (a)-[r]->(b) RETURN type(r) AS kind, a.id AS sourceId, b.id AS targetId, \
             properties(r) AS props",
        ))
        .await?;
    while let Some(row) = stream.next().await? {
        relationships.push(serde_json::json!({
            "kind": row.get::<String>("kind")?,
            "sourceId": row.get::<Option<String>>("sourceId")?,
            "targetId": row.get::<Option<String>>("targetId")?,
            "properties": row.get::<Value>("props")?,
        }));
    }

    fs::write(
        dir.join("backup_nodes.json"),
        serde_json::to_string_pretty(&nodes)?,
    )?;
    fs::write(
        dir.join("backup_relationships.json"),
        serde_json::to_string_pretty(&relationships)?,
    )?;

    if nodes.is_empty() {
        warn!("backup export found no persisted entities");
    }
    info!(
        nodes = nodes.len(),
        relationships = relationships.len(),
        dir = %dir.display(),
        "backup exported"
    );

    Ok(BackupSummary {
        nodes: nodes.len(),
        relationships: relationships.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table_known_versions() {
        assert_eq!(steps_for(1).len(), 2);
        assert_eq!(steps_for(2).len(), 2);
        assert!(steps_for(SCHEMA_VERSION).is_empty());
        assert!(steps_for(99).is_empty());
    }

    #[test]
    fn test_every_step_returns_affected_count() {
        for from in [1, 2] {
            for step in steps_for(from) {
                assert!(
                    step.cypher.contains("AS affected"),
                    "step {:?} must report an affected count",
                    step.name
                );
            }
        }
    }

    #[test]
    fn test_steps_are_scoped_to_their_source_version() {
        for from in [1i64, 2] {
            for step in steps_for(from) {
                assert!(
                    step.cypher.contains(&format!("schemaVersion = {from}")),
                    "step {:?} must only touch version {from} entities",
                    step.name
                );
            }
        }
    }
}
