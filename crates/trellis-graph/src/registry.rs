//! Name registry for cross-file reference resolution.
//!
//! Maps display names to canonical entity ids, one namespace per
//! placeholder category. Built in a single scan over the merged node set
//! before any relationship is rewritten, since forward references across
//! files are unavoidable.

use std::collections::HashMap;
use trellis_core::{labels, EntityId, Node, UnresolvedKind};

/// Display-name to canonical-id lookup tables.
#[derive(Debug, Default)]
pub struct NameRegistry {
    components: HashMap<String, String>,
    composables: HashMap<String, String>,
    files: HashMap<String, String>,
}

impl NameRegistry {
    /// Builds the registry by scanning every node carrying a registerable
    /// label. Component and composable nodes register under their `name`
    /// property; file nodes under their `file` path (with the id's path
    /// segment as fallback).
    pub fn build(nodes: &[Node]) -> Self {
        let mut registry = Self::default();

        for node in nodes {
            for label in &node.labels {
                match label.as_str() {
                    labels::COMPONENT => {
                        if let Some(name) = node.str_property("name") {
                            registry
                                .components
                                .insert(name.to_string(), node.id.clone());
                        }
                    }
                    labels::COMPOSABLE => {
                        if let Some(name) = node.str_property("name") {
                            registry
                                .composables
                                .insert(name.to_string(), node.id.clone());
                        }
                    }
                    labels::FILE => {
                        let path = node
                            .str_property("file")
                            .map(str::to_string)
                            .or_else(|| EntityId::parse(&node.id).ok().map(|e| e.path.to_string()));
                        if let Some(path) = path {
                            registry.files.insert(path, node.id.clone());
                        }
                    }
                    _ => {}
                }
            }
        }

        registry
    }

    /// Looks up a placeholder in the namespace for its category.
    pub fn resolve(&self, category: UnresolvedKind, name: &str) -> Option<&str> {
        let table = match category {
            UnresolvedKind::Component => &self.components,
            UnresolvedKind::Composable => &self.composables,
            UnresolvedKind::Import => &self.files,
        };
        table.get(name).map(String::as_str)
    }

    /// Total registered names across all namespaces.
    pub fn len(&self) -> usize {
        self.components.len() + self.composables.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_by_label_namespace() {
        let nodes = vec![
            Node::new("f1:Component:src/App.vue:AppHeader", "f1", vec!["Component".into()])
                .with_property("name", "AppHeader"),
            Node::new("f1:Composable:src/use.ts:useAuth", "f1", vec!["Composable".into()])
                .with_property("name", "useAuth"),
            Node::new("f1:File:src/util.ts", "f1", vec!["File".into()])
                .with_property("file", "src/util.ts"),
        ];

        let registry = NameRegistry::build(&nodes);

        assert_eq!(
            registry.resolve(UnresolvedKind::Component, "AppHeader"),
            Some("f1:Component:src/App.vue:AppHeader")
        );
        assert_eq!(
            registry.resolve(UnresolvedKind::Composable, "useAuth"),
            Some("f1:Composable:src/use.ts:useAuth")
        );
        assert_eq!(
            registry.resolve(UnresolvedKind::Import, "src/util.ts"),
            Some("f1:File:src/util.ts")
        );
        // Namespaces do not bleed into each other.
        assert_eq!(registry.resolve(UnresolvedKind::Composable, "AppHeader"), None);
    }

    #[test]
    fn test_file_path_falls_back_to_id_segment() {
        let nodes = vec![Node::new("f1:File:src/main.ts", "f1", vec!["File".into()])];

        let registry = NameRegistry::build(&nodes);

        assert_eq!(
            registry.resolve(UnresolvedKind::Import, "src/main.ts"),
            Some("f1:File:src/main.ts")
        );
    }
}
