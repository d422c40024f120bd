//! Batched idempotent import.
//!
//! Every entity write is a merge-by-id upsert in fixed-size UNWIND batches,
//! so a whole run can be retried without duplicate-key errors. Properties
//! are sanitized first: the store only holds primitives and arrays of
//! primitives, so nested values are flattened to a JSON string encoding.
//! Relationships still carrying an `unresolved*` marker get a stub target
//! node merged in first, guaranteeing the relationship's endpoint exists
//! even when true resolution failed.

use crate::client::GraphStore;
use crate::error::StoreError;
use crate::schema::SCHEMA_VERSION;
use neo4rs::{query, BoltType};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use trellis_core::{Node, Relationship};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Import run parameters.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub codebase_id: String,
    /// Entities per UNWIND batch. Smaller batches trade throughput for
    /// finer-grained progress and failure isolation.
    pub batch_size: usize,
}

impl ImportOptions {
    pub fn new(codebase_id: impl Into<String>) -> Self {
        Self {
            codebase_id: codebase_id.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Counters from one import run.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub nodes: usize,
    pub relationships: usize,
    pub stubs: usize,
    pub skipped_properties: usize,
}

type BoltRow = HashMap<String, BoltType>;

/// Flattens entity properties into store-compatible values.
///
/// Primitives and all-string arrays pass through; any nested value is
/// serialized to a JSON string. A value that cannot be encoded is dropped
/// with a log line and counted, never aborting the batch.
fn sanitize_properties(properties: &Map<String, Value>) -> (BoltRow, usize) {
    let mut row = BoltRow::with_capacity(properties.len());
    let mut skipped = 0;

    for (key, value) in properties {
        match value {
            Value::Null => {}
            Value::Bool(b) => {
                row.insert(key.clone(), (*b).into());
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    row.insert(key.clone(), i.into());
                } else if let Some(f) = n.as_f64() {
                    row.insert(key.clone(), f.into());
                }
            }
            Value::String(s) => {
                row.insert(key.clone(), s.clone().into());
            }
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let strings: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                row.insert(key.clone(), strings.into());
            }
            nested => match serde_json::to_string(nested) {
                Ok(encoded) => {
                    row.insert(key.clone(), encoded.into());
                }
                Err(err) => {
                    warn!(property = %key, error = %err, "skipping unsupported property value");
                    skipped += 1;
                }
            },
        }
    }

    (row, skipped)
}

/// Labels are spliced into query text (they cannot be parameters), so only
/// plain identifier characters are allowed through.
fn valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Upserts all nodes in label-grouped batches.
pub async fn import_nodes(
    store: &GraphStore,
    nodes: &[Node],
    options: &ImportOptions,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();

    // Rows grouped by primary label; extra labels sync separately.
    let mut rows_by_label: HashMap<&str, Vec<BoltRow>> = HashMap::new();
    let mut label_sync: Vec<BoltRow> = Vec::new();

    for node in nodes {
        let Some(primary) = node.labels.first().map(String::as_str) else {
            warn!(node = %node.id, "node without labels skipped");
            continue;
        };
        if !valid_label(primary) {
            warn!(node = %node.id, label = %primary, "node with malformed label skipped");
            continue;
        }

        let (mut row, skipped) = sanitize_properties(&node.properties);
        summary.skipped_properties += skipped;
        row.insert("id".into(), node.id.clone().into());
        row.insert("codebaseId".into(), node.codebase_id.clone().into());
        rows_by_label.entry(primary).or_default().push(row);

        if node.labels.len() > 1 {
            let mut sync_row = BoltRow::with_capacity(2);
            sync_row.insert("id".into(), node.id.clone().into());
            sync_row.insert("labels".into(), node.labels.clone().into());
            label_sync.push(sync_row);
        }
    }

    for (label, rows) in &rows_by_label {
        let stmt = format!(
            "UNWIND $rows AS row \
             MERGE (n:`{label}` {{id: row.id}}) \
             ON CREATE SET n.createdAt = datetime() \
             SET n += row, n.schemaVersion = $version, n.updatedAt = datetime()"
        );
        for chunk in rows.chunks(options.batch_size) {
            let q = query(&stmt)
                .param("rows", chunk.to_vec())
                .param("version", SCHEMA_VERSION);
            store.run(q).await?;
            debug!(%label, batch = chunk.len(), "node batch upserted");
        }
        summary.nodes += rows.len();
        info!(%label, count = rows.len(), "nodes imported");
    }

    sync_labels(store, &label_sync, options).await?;

    Ok(summary)
}

/// Applies secondary labels with the dynamic-label extension, if present.
async fn sync_labels(
    store: &GraphStore,
    rows: &[BoltRow],
    options: &ImportOptions,
) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }
    if !store.supports_dynamic_labels().await {
        warn!(nodes = rows.len(), "secondary label sync skipped");
        return Ok(());
    }

    let stmt = "UNWIND $rows AS row \
                MATCH (n {id: row.id}) \
                CALL apoc.create.addLabels(n, row.labels) YIELD node \
                RETURN count(node) AS affected";
    for chunk in rows.chunks(options.batch_size) {
        let q = query(stmt).param("rows", chunk.to_vec());
        store.run(q).await?;
    }
    debug!(nodes = rows.len(), "secondary labels synced");
    Ok(())
}

fn relationship_row(rel: &Relationship, skipped: &mut usize) -> BoltRow {
    let (mut row, dropped) = sanitize_properties(&rel.properties);
    *skipped += dropped;

    row.insert("id".into(), rel.id.clone().into());
    row.insert("codebaseId".into(), rel.codebase_id.clone().into());
    row.insert("sourceId".into(), rel.source_id.clone().into());
    row.insert("targetId".into(), rel.target_id.clone().into());

    if rel.is_cross_codebase {
        row.insert("isCrossCodebase".into(), true.into());
    }
    if let Some(source) = &rel.source_codebase {
        row.insert("sourceCodebase".into(), source.clone().into());
    }
    if let Some(target) = &rel.target_codebase {
        row.insert("targetCodebase".into(), target.clone().into());
    }
    if rel.unresolved_component {
        row.insert("unresolvedComponent".into(), true.into());
    }
    if rel.unresolved_composable {
        row.insert("unresolvedComposable".into(), true.into());
    }
    if rel.unresolved_import {
        row.insert("unresolvedImport".into(), true.into());
    }

    row
}

/// The id under which an unresolved placeholder is materialized as a stub.
fn stub_id(rel: &Relationship, stub_label: &str) -> String {
    format!("{}:{}:{}", rel.codebase_id, stub_label, rel.target_id)
}

/// Upserts all relationships in kind-grouped batches.
///
/// Unresolved relationships get their stub target merged first, then the
/// relationship is created pointing at the stub.
pub async fn import_relationships(
    store: &GraphStore,
    relationships: &[Relationship],
    options: &ImportOptions,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();

    let mut rows_by_kind: HashMap<&'static str, Vec<BoltRow>> = HashMap::new();
    let mut stubs_by_label: HashMap<&'static str, HashMap<String, BoltRow>> = HashMap::new();

    for rel in relationships {
        let mut row = relationship_row(rel, &mut summary.skipped_properties);

        if let Some(unresolved) = rel.unresolved_kind() {
            let label = unresolved.stub_label();
            let stub = stub_id(rel, label);

            let mut stub_row = BoltRow::with_capacity(3);
            stub_row.insert("id".into(), stub.clone().into());
            stub_row.insert("name".into(), rel.target_id.clone().into());
            stub_row.insert("codebaseId".into(), rel.codebase_id.clone().into());
            stubs_by_label
                .entry(label)
                .or_default()
                .insert(stub.clone(), stub_row);

            // The placeholder stays in the row; the created edge points at
            // the stub so the target always exists post-import.
            row.insert("targetId".into(), stub.into());
        }

        rows_by_kind.entry(rel.kind.as_str()).or_default().push(row);
    }

    for (label, stubs) in &stubs_by_label {
        let stmt = format!(
            "UNWIND $rows AS row \
             MERGE (s:`{label}` {{id: row.id}}) \
             ON CREATE SET s.createdAt = datetime() \
             SET s.name = row.name, s.codebaseId = row.codebaseId, s.schemaVersion = $version"
        );
        let rows: Vec<BoltRow> = stubs.values().cloned().collect();
        for chunk in rows.chunks(options.batch_size) {
            let q = query(&stmt)
                .param("rows", chunk.to_vec())
                .param("version", SCHEMA_VERSION);
            store.run(q).await?;
        }
        summary.stubs += rows.len();
        info!(%label, count = rows.len(), "stub targets merged");
    }

    for (kind, rows) in &rows_by_kind {
        let stmt = format!(
            "UNWIND $rows AS row \
             MATCH (a {{id: row.sourceId}}) \
             MATCH (b {{id: row.targetId}}) \
             MERGE (a)-[r:`{kind}` {{id: row.id}}]->(b) \
             SET r += row, r.schemaVersion = $version"
        );
        for chunk in rows.chunks(options.batch_size) {
            let q = query(&stmt)
                .param("rows", chunk.to_vec())
                .param("version", SCHEMA_VERSION);
            store.run(q).await?;
            debug!(%kind, batch = chunk.len(), "relationship batch upserted");
        }
        summary.relationships += rows.len();
        info!(%kind, count = rows.len(), "relationships imported");
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{RelKind, UnresolvedKind};

    #[test]
    fn test_sanitize_passes_primitives_through() {
        let mut props = Map::new();
        props.insert("name".into(), "mount".into());
        props.insert("startLine".into(), 12.into());
        props.insert("exported".into(), true.into());
        props.insert("missing".into(), Value::Null);

        let (row, skipped) = sanitize_properties(&props);

        assert_eq!(skipped, 0);
        assert_eq!(row.len(), 3);
        assert_eq!(row["name"], BoltType::from("mount"));
        assert_eq!(row["startLine"], BoltType::from(12i64));
    }

    #[test]
    fn test_sanitize_keeps_string_arrays_as_lists() {
        let mut props = Map::new();
        props.insert("tags".into(), serde_json::json!(["setup", "template"]));

        let (row, _) = sanitize_properties(&props);

        assert!(matches!(row["tags"], BoltType::List(_)));
    }

    #[test]
    fn test_sanitize_flattens_nested_values_to_json() {
        let mut props = Map::new();
        props.insert("span".into(), serde_json::json!({"start": 1, "end": 9}));
        props.insert("mixed".into(), serde_json::json!([1, "two"]));

        let (row, skipped) = sanitize_properties(&props);

        assert_eq!(skipped, 0);
        assert_eq!(row["span"], BoltType::from("{\"start\":1,\"end\":9}"));
        assert_eq!(row["mixed"], BoltType::from("[1,\"two\"]"));
    }

    #[test]
    fn test_unresolved_relationship_row_targets_stub() {
        let mut rel = Relationship::new("r1", "f1", RelKind::Renders, "a", "MissingWidget");
        rel.mark_unresolved(UnresolvedKind::Component);

        let mut skipped = 0;
        let mut row = relationship_row(&rel, &mut skipped);
        let stub = stub_id(&rel, UnresolvedKind::Component.stub_label());
        row.insert("targetId".into(), stub.clone().into());

        assert_eq!(stub, "f1:UnresolvedComponent:MissingWidget");
        assert_eq!(row["targetId"], BoltType::from(stub));
        assert_eq!(row["unresolvedComponent"], BoltType::from(true));
    }

    #[test]
    fn test_label_validation() {
        assert!(valid_label("Component"));
        assert!(valid_label("UnresolvedImport"));
        assert!(!valid_label(""));
        assert!(!valid_label("Bad Label"));
        assert!(!valid_label("x`) DETACH DELETE n //"));
    }
}
