//! Schema metadata and provisioning.
//!
//! The store schema is declared as a versioned document: node labels,
//! relationship kinds, uniqueness constraints, lookup indexes and full-text
//! indexes. Provisioning is `CREATE … IF NOT EXISTS` throughout, so it is
//! safe to re-run on every load. Constraints are required (verification
//! fails without them); plain and full-text indexes are optional and their
//! absence is logged, not fatal.

use crate::client::GraphStore;
use crate::error::StoreError;
use neo4rs::query;
use std::collections::HashSet;
use tracing::{info, warn};

/// Current schema version, stamped onto every imported entity.
pub const SCHEMA_VERSION: i64 = 3;

#[derive(Debug, Clone, Copy)]
pub struct ConstraintSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub property: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub property: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct FulltextSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub properties: &'static [&'static str],
}

/// The declarative schema document.
#[derive(Debug)]
pub struct SchemaDocument {
    pub version: i64,
    pub node_labels: &'static [&'static str],
    pub relationship_kinds: &'static [&'static str],
    pub constraints: &'static [ConstraintSpec],
    pub indexes: &'static [IndexSpec],
    pub fulltext: &'static [FulltextSpec],
}

static CURRENT: SchemaDocument = SchemaDocument {
    version: SCHEMA_VERSION,
    node_labels: &[
        "File",
        "Component",
        "Composable",
        "Function",
        "Class",
        "Interface",
        "Variable",
        "TypeAlias",
        "CodeElement",
        "UnresolvedComponent",
        "UnresolvedComposable",
        "UnresolvedImport",
    ],
    relationship_kinds: &[
        "CALLS",
        "RENDERS",
        "USES_COMPOSABLE",
        "IMPORTS",
        "IMPORTS_FROM_PACKAGE",
        "EXPORTS_LOCAL",
        "EXTENDS",
        "IMPLEMENTS",
        "REFERENCES_TYPE",
        "REFERENCES_VARIABLE",
        "DEPENDS_ON",
        "PART_OF",
    ],
    constraints: &[
        ConstraintSpec { name: "file_id_unique", label: "File", property: "id" },
        ConstraintSpec { name: "component_id_unique", label: "Component", property: "id" },
        ConstraintSpec { name: "composable_id_unique", label: "Composable", property: "id" },
        ConstraintSpec { name: "function_id_unique", label: "Function", property: "id" },
        ConstraintSpec { name: "class_id_unique", label: "Class", property: "id" },
        ConstraintSpec { name: "interface_id_unique", label: "Interface", property: "id" },
        ConstraintSpec { name: "variable_id_unique", label: "Variable", property: "id" },
        ConstraintSpec { name: "type_alias_id_unique", label: "TypeAlias", property: "id" },
    ],
    indexes: &[
        IndexSpec { name: "file_codebase", label: "File", property: "codebaseId" },
        IndexSpec { name: "code_element_codebase", label: "CodeElement", property: "codebaseId" },
        IndexSpec { name: "code_element_file", label: "CodeElement", property: "file" },
    ],
    fulltext: &[FulltextSpec {
        name: "code_element_names",
        label: "CodeElement",
        properties: &["name", "file"],
    }],
};

impl SchemaDocument {
    pub fn current() -> &'static SchemaDocument {
        &CURRENT
    }
}

/// Creates constraints and indexes declared by the schema document.
///
/// Constraint failures are fatal (the import depends on merge-by-id
/// uniqueness); index and full-text failures are logged and skipped.
pub async fn provision_schema(store: &GraphStore) -> Result<(), StoreError> {
    let schema = SchemaDocument::current();

    for constraint in schema.constraints {
        let stmt = format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:`{}`) REQUIRE n.{} IS UNIQUE",
            constraint.name, constraint.label, constraint.property
        );
        store.run(query(&stmt)).await?;
    }

    for index in schema.indexes {
        let stmt = format!(
            "CREATE INDEX {} IF NOT EXISTS FOR (n:`{}`) ON (n.{})",
            index.name, index.label, index.property
        );
        if let Err(err) = store.run(query(&stmt)).await {
            warn!(index = index.name, error = %err, "index provisioning skipped");
        }
    }

    for fulltext in schema.fulltext {
        let properties = fulltext
            .properties
            .iter()
            .map(|p| format!("n.{p}"))
            .collect::<Vec<_>>()
            .join(", ");
        let stmt = format!(
            "CREATE FULLTEXT INDEX {} IF NOT EXISTS FOR (n:`{}`) ON EACH [{}]",
            fulltext.name, fulltext.label, properties
        );
        if let Err(err) = store.run(query(&stmt)).await {
            warn!(index = fulltext.name, error = %err, "full-text index provisioning skipped");
        }
    }

    info!(
        version = schema.version,
        constraints = schema.constraints.len(),
        indexes = schema.indexes.len(),
        "schema provisioned"
    );
    Ok(())
}

/// Confirms the provisioned schema is actually in place.
///
/// Missing uniqueness constraints fail the run before any data write;
/// missing optional indexes only warn.
pub async fn verify_schema(store: &GraphStore) -> Result<(), StoreError> {
    let schema = SchemaDocument::current();

    let mut present: HashSet<String> = HashSet::new();
    let mut stream = store
        .execute(query("SHOW CONSTRAINTS YIELD name RETURN name"))
        .await?;
    while let Some(row) = stream.next().await? {
        present.insert(row.get::<String>("name")?);
    }

    for constraint in schema.constraints {
        if !present.contains(constraint.name) {
            return Err(StoreError::SchemaVerification(format!(
                "uniqueness constraint {} on :{} is missing",
                constraint.name, constraint.label
            )));
        }
    }

    let mut indexes: HashSet<String> = HashSet::new();
    let mut stream = store
        .execute(query("SHOW INDEXES YIELD name RETURN name"))
        .await?;
    while let Some(row) = stream.next().await? {
        indexes.insert(row.get::<String>("name")?);
    }

    for index in schema.indexes {
        if !indexes.contains(index.name) {
            warn!(index = index.name, "optional index missing after provisioning");
        }
    }
    for fulltext in schema.fulltext {
        if !indexes.contains(fulltext.name) {
            warn!(index = fulltext.name, "optional full-text index missing after provisioning");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_document_covers_stub_labels() {
        let schema = SchemaDocument::current();
        for stub in ["UnresolvedComponent", "UnresolvedComposable", "UnresolvedImport"] {
            assert!(schema.node_labels.contains(&stub));
        }
    }

    #[test]
    fn test_constraint_labels_are_declared() {
        let schema = SchemaDocument::current();
        for constraint in schema.constraints {
            assert!(
                schema.node_labels.contains(&constraint.label),
                "constraint {} references undeclared label {}",
                constraint.name,
                constraint.label
            );
        }
    }
}
