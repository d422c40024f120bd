//! Post-import consistency passes.
//!
//! These run against the persisted store, not the in-memory graph: once the
//! bulk load is durable, aggregate counters are recomputed from the stored
//! relationship set, and code elements missing their ownership edge get it
//! backfilled.

use crate::client::GraphStore;
use crate::error::StoreError;
use neo4rs::{query, BoltType};
use std::collections::HashMap;
use tracing::{info, warn};
use trellis_core::EntityId;

/// One aggregate-recomputation statement, parameterized by `$codebase`.
struct CounterPass {
    name: &'static str,
    cypher: &'static str,
}

const COUNTER_PASSES: &[CounterPass] = &[
    CounterPass {
        name: "file import counts",
        cypher: "MATCH (f:File {codebaseId: $codebase}) \
                 OPTIONAL MATCH (f)-[i:IMPORTS]->() \
                 WITH f, count(i) AS imports SET f.importCount = imports \
                 RETURN count(f) AS affected",
    },
    CounterPass {
        name: "file export counts",
        cypher: "MATCH (f:File {codebaseId: $codebase}) \
                 OPTIONAL MATCH (f)-[e:EXPORTS_LOCAL]->() \
                 WITH f, count(e) AS exports SET f.exportCount = exports \
                 RETURN count(f) AS affected",
    },
    CounterPass {
        name: "cross-codebase import counts",
        cypher: "MATCH (f:File {codebaseId: $codebase}) \
                 OPTIONAL MATCH (f)-[i:IMPORTS]->() WHERE i.isCrossCodebase = true \
                 WITH f, count(i) AS crossImports SET f.crossCodebaseImportCount = crossImports \
                 RETURN count(f) AS affected",
    },
];

/// Result of the consistency stage.
#[derive(Debug, Default)]
pub struct ConsistencyReport {
    /// Entities touched by counter recomputation.
    pub counters_updated: i64,
    /// Ownership edges created by the backfill.
    pub ownership_backfilled: i64,
    /// Backfills whose owner had to be inferred from the entity id.
    pub owners_inferred: usize,
}

/// Runs the aggregate counters and the ownership backfill.
pub async fn run_consistency_passes(
    store: &GraphStore,
    codebase_id: &str,
) -> Result<ConsistencyReport, StoreError> {
    let mut report = ConsistencyReport::default();

    for pass in COUNTER_PASSES {
        let q = query(pass.cypher).param("codebase", codebase_id);
        let affected = store.fetch_count(q, "affected").await?;
        info!(pass = pass.name, affected, "consistency counter updated");
        report.counters_updated += affected;
    }

    backfill_ownership(store, codebase_id, &mut report).await?;

    Ok(report)
}

/// Creates missing `PART_OF` edges from code elements to their files.
///
/// Elements carrying a `file` property match their owner directly in the
/// store. Elements without one fall back to the structured id: the owning
/// file id is derived from the id's path segment, logged, and only applied
/// when the id's codebase matches the current one.
async fn backfill_ownership(
    store: &GraphStore,
    codebase_id: &str,
    report: &mut ConsistencyReport,
) -> Result<(), StoreError> {
    let direct = query(
        "MATCH (e:CodeElement {codebaseId: $codebase}) \
         WHERE NOT e:File AND e.file IS NOT NULL AND NOT (e)-[:PART_OF]->(:File) \
         MATCH (f:File {codebaseId: $codebase}) WHERE f.file = e.file \
         MERGE (e)-[r:PART_OF]->(f) \
         ON CREATE SET r.id = e.id + '-PART_OF->' + f.id, r.codebaseId = $codebase \
         RETURN count(r) AS affected",
    )
    .param("codebase", codebase_id);
    let affected = store.fetch_count(direct, "affected").await?;
    report.ownership_backfilled += affected;
    info!(affected, "ownership backfill (file property)");

    // Remaining orphans have no file property at all.
    let orphans_query = query(
        "MATCH (e:CodeElement {codebaseId: $codebase}) \
         WHERE NOT e:File AND e.file IS NULL AND NOT (e)-[:PART_OF]->(:File) \
         RETURN e.id AS id",
    )
    .param("codebase", codebase_id);

    let mut orphans: Vec<String> = Vec::new();
    let mut stream = store.execute(orphans_query).await?;
    while let Some(row) = stream.next().await? {
        orphans.push(row.get::<String>("id")?);
    }
    if orphans.is_empty() {
        return Ok(());
    }

    let mut rows: Vec<HashMap<String, BoltType>> = Vec::new();
    for id in &orphans {
        let entity = match EntityId::parse(id) {
            Ok(entity) => entity,
            Err(err) => {
                warn!(node = %id, error = %err, "cannot infer owning file, skipping backfill");
                continue;
            }
        };
        // Never guess across codebases.
        if entity.codebase != codebase_id {
            warn!(node = %id, "id belongs to a different codebase, skipping backfill");
            continue;
        }

        let file_id = entity.owning_file_id();
        warn!(node = %id, file = %file_id, "inferring owning file from entity id");

        let mut row: HashMap<String, BoltType> = HashMap::with_capacity(3);
        row.insert("id".into(), id.clone().into());
        row.insert("fileId".into(), file_id.clone().into());
        row.insert("relId".into(), format!("{id}-PART_OF->{file_id}").into());
        rows.push(row);
    }

    if rows.is_empty() {
        return Ok(());
    }
    report.owners_inferred = rows.len();

    let inferred = query(
        "UNWIND $rows AS row \
         MATCH (e {id: row.id}) \
         MATCH (f:File {id: row.fileId, codebaseId: $codebase}) \
         MERGE (e)-[r:PART_OF]->(f) \
         ON CREATE SET r.id = row.relId, r.codebaseId = $codebase \
         RETURN count(r) AS affected",
    )
    .param("rows", rows)
    .param("codebase", codebase_id);
    let affected = store.fetch_count(inferred, "affected").await?;
    report.ownership_backfilled += affected;
    info!(affected, "ownership backfill (inferred from id)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_passes_are_codebase_scoped() {
        for pass in COUNTER_PASSES {
            assert!(
                pass.cypher.contains("codebaseId: $codebase"),
                "pass {:?} must scope to one codebase",
                pass.name
            );
            assert!(pass.cypher.contains("AS affected"));
        }
    }
}
