//! Entity types for the merged code graph.
//!
//! Nodes and relationships arrive as per-file fragments produced by external
//! parsers, so the wire format is camelCase JSON and every field beyond the
//! identity core is optional. Identity (`id` + `codebase_id`) is what the
//! whole pipeline keys on: duplicates collapse by id, upserts merge by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The shared pseudo-codebase for entities visible to every codebase
/// (external packages, runtime builtins).
pub const GLOBAL_CODEBASE: &str = "global";

/// Label marking a node as a locatable code element.
///
/// Present exactly when the node carries the full location property set,
/// see [`Node::sync_code_element_label`].
pub const CODE_ELEMENT_LABEL: &str = "CodeElement";

/// Property keys that together make a node locatable in source.
pub const LOCATION_KEYS: [&str; 4] = ["name", "file", "startLine", "endLine"];

/// Well-known node labels the pipeline treats specially.
pub mod labels {
    pub const FILE: &str = "File";
    pub const COMPONENT: &str = "Component";
    pub const COMPOSABLE: &str = "Composable";
}

/// A node in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Globally unique id, stable across runs for the same logical entity.
    pub id: String,

    /// The codebase (tenant) this node belongs to.
    pub codebase_id: String,

    /// Category tags. Never empty after validation.
    pub labels: Vec<String>,

    /// Category-specific attributes, kept open-ended because each parser
    /// emits its own shape.
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Creates a node with the given identity and labels.
    pub fn new(
        id: impl Into<String>,
        codebase_id: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            codebase_id: codebase_id.into(),
            labels,
            properties: Map::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Sets a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a string property if present.
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Whether the node carries the full location set (name, file, span).
    pub fn has_location(&self) -> bool {
        LOCATION_KEYS
            .iter()
            .all(|key| matches!(self.properties.get(*key), Some(v) if !v.is_null()))
    }

    /// Reconciles the `CodeElement` label with the location properties.
    ///
    /// Fragment producers do not agree on labeling, so this runs as a
    /// post-pass over the merged graph: the label is added when the full
    /// location set is present and removed when it is not. Returns true if
    /// the label set changed.
    pub fn sync_code_element_label(&mut self) -> bool {
        let tagged = self.labels.iter().any(|l| l == CODE_ELEMENT_LABEL);
        if self.has_location() {
            if !tagged {
                self.labels.push(CODE_ELEMENT_LABEL.to_string());
                return true;
            }
        } else if tagged {
            self.labels.retain(|l| l != CODE_ELEMENT_LABEL);
            return true;
        }
        false
    }
}

/// The type of relationship between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelKind {
    /// Function calls another function.
    Calls,

    /// A component renders another named component in its template.
    Renders,

    /// Code uses a composable function.
    UsesComposable,

    /// File imports from another file in the same project.
    Imports,

    /// File imports from an external package.
    ImportsFromPackage,

    /// Local re-export sentinel within a file.
    ExportsLocal,

    /// Type extends another type.
    Extends,

    /// Type implements an interface.
    Implements,

    /// Code references a type by name.
    ReferencesType,

    /// Code references a variable by name.
    ReferencesVariable,

    /// Aggregated dependency synthesized from primitive edges.
    DependsOn,

    /// Ownership: a code element belongs to its containing file.
    PartOf,
}

impl RelKind {
    /// The store-side relationship type tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::Renders => "RENDERS",
            Self::UsesComposable => "USES_COMPOSABLE",
            Self::Imports => "IMPORTS",
            Self::ImportsFromPackage => "IMPORTS_FROM_PACKAGE",
            Self::ExportsLocal => "EXPORTS_LOCAL",
            Self::Extends => "EXTENDS",
            Self::Implements => "IMPLEMENTS",
            Self::ReferencesType => "REFERENCES_TYPE",
            Self::ReferencesVariable => "REFERENCES_VARIABLE",
            Self::DependsOn => "DEPENDS_ON",
            Self::PartOf => "PART_OF",
        }
    }

    /// Dependency strength this primitive kind contributes, if any.
    pub fn dependency_strength(&self) -> Option<Strength> {
        match self {
            Self::Calls => Some(Strength::Strong),
            Self::ReferencesType | Self::ReferencesVariable => Some(Strength::Weak),
            _ => None,
        }
    }

    /// The unresolved-marker category this kind resolves through, if its
    /// targets start out as display-name placeholders.
    pub fn placeholder_category(&self) -> Option<UnresolvedKind> {
        match self {
            Self::Renders => Some(UnresolvedKind::Component),
            Self::UsesComposable => Some(UnresolvedKind::Composable),
            Self::Imports => Some(UnresolvedKind::Import),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strength of a synthesized dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    /// Reference-only coupling.
    Weak,
    /// Call coupling.
    Strong,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Strong => "strong",
        }
    }
}

/// Category of an unresolved placeholder reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnresolvedKind {
    Component,
    Composable,
    Import,
}

impl UnresolvedKind {
    /// Label for the stub node materialized at import time.
    pub fn stub_label(&self) -> &'static str {
        match self {
            Self::Component => "UnresolvedComponent",
            Self::Composable => "UnresolvedComposable",
            Self::Import => "UnresolvedImport",
        }
    }
}

/// A relationship in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Globally unique id, stable across runs.
    pub id: String,

    /// The codebase (tenant) this relationship belongs to.
    pub codebase_id: String,

    pub kind: RelKind,

    pub source_id: String,

    /// Target entity id, or a display-name placeholder until resolution.
    pub target_id: String,

    /// Set when source and target live in different codebases.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_cross_codebase: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_codebase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_codebase: Option<String>,

    /// Exactly one of these is set once resolution has been attempted and
    /// the placeholder target could not be matched. The placeholder string
    /// stays in `target_id`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved_component: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved_composable: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved_import: bool,

    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Relationship {
    /// Creates a relationship with the given identity and endpoints.
    pub fn new(
        id: impl Into<String>,
        codebase_id: impl Into<String>,
        kind: RelKind,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            codebase_id: codebase_id.into(),
            kind,
            source_id: source_id.into(),
            target_id: target_id.into(),
            is_cross_codebase: false,
            source_codebase: None,
            target_codebase: None,
            unresolved_component: false,
            unresolved_composable: false,
            unresolved_import: false,
            properties: Map::new(),
        }
    }

    /// Sets a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The unresolved category flagged on this relationship, if any.
    pub fn unresolved_kind(&self) -> Option<UnresolvedKind> {
        if self.unresolved_component {
            Some(UnresolvedKind::Component)
        } else if self.unresolved_composable {
            Some(UnresolvedKind::Composable)
        } else if self.unresolved_import {
            Some(UnresolvedKind::Import)
        } else {
            None
        }
    }

    /// Flags this relationship as unresolved in the given category,
    /// clearing any other marker so exactly one is set.
    pub fn mark_unresolved(&mut self, kind: UnresolvedKind) {
        self.unresolved_component = kind == UnresolvedKind::Component;
        self.unresolved_composable = kind == UnresolvedKind::Composable;
        self.unresolved_import = kind == UnresolvedKind::Import;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_label_added_and_removed() {
        let mut node = Node::new("f1:Function:a.ts:foo", "f1", vec!["Function".into()])
            .with_property("name", "foo")
            .with_property("file", "a.ts")
            .with_property("startLine", 1)
            .with_property("endLine", 10);

        assert!(node.sync_code_element_label());
        assert!(node.labels.iter().any(|l| l == CODE_ELEMENT_LABEL));

        // Second pass is a no-op.
        assert!(!node.sync_code_element_label());

        node.properties.remove("endLine");
        assert!(node.sync_code_element_label());
        assert!(!node.labels.iter().any(|l| l == CODE_ELEMENT_LABEL));
    }

    #[test]
    fn test_unresolved_marker_is_exclusive() {
        let mut rel = Relationship::new("r1", "f1", RelKind::Renders, "a", "AppHeader");
        rel.unresolved_import = true;

        rel.mark_unresolved(UnresolvedKind::Component);

        assert!(rel.unresolved_component);
        assert!(!rel.unresolved_composable);
        assert!(!rel.unresolved_import);
        assert_eq!(rel.unresolved_kind(), Some(UnresolvedKind::Component));
    }

    #[test]
    fn test_rel_kind_wire_format() {
        let json = serde_json::to_string(&RelKind::UsesComposable).unwrap();
        assert_eq!(json, "\"USES_COMPOSABLE\"");
        assert_eq!(RelKind::DependsOn.to_string(), "DEPENDS_ON");
    }

    #[test]
    fn test_relationship_deserializes_without_markers() {
        let json = r#"{
            "id": "r1",
            "codebaseId": "f1",
            "kind": "CALLS",
            "sourceId": "f1:Function:a.ts:foo",
            "targetId": "f1:Function:a.ts:bar"
        }"#;
        let rel: Relationship = serde_json::from_str(json).unwrap();
        assert_eq!(rel.kind, RelKind::Calls);
        assert!(!rel.is_cross_codebase);
        assert!(rel.unresolved_kind().is_none());
    }
}
