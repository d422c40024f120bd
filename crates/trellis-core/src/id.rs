//! Structured entity-id parsing.
//!
//! Entity ids follow the convention `{codebase}:{Category}:{path}[:{name}]`,
//! e.g. `f1:File:src/app.ts` or `f1:Function:src/app.ts:mount`. The parser
//! is best-effort: ids are opaque to most of the pipeline, and only the
//! ownership backfill reaches into their structure when a node is missing
//! its `file` property.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("entity id has fewer than three segments: {0:?}")]
    TooFewSegments(String),
    #[error("entity id has an empty segment: {0:?}")]
    EmptySegment(String),
}

/// A decomposed entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityId<'a> {
    pub codebase: &'a str,
    pub category: &'a str,
    pub path: &'a str,
    pub name: Option<&'a str>,
}

impl<'a> EntityId<'a> {
    /// Splits an id into its structured segments.
    ///
    /// Splits on the first two colons and an optional third, so paths
    /// containing further colons stay intact in `name`.
    pub fn parse(id: &'a str) -> Result<Self, IdError> {
        let mut parts = id.splitn(4, ':');
        let codebase = parts.next().unwrap_or_default();
        let category = parts.next();
        let path = parts.next();
        let name = parts.next();

        let (category, path) = match (category, path) {
            (Some(c), Some(p)) => (c, p),
            _ => return Err(IdError::TooFewSegments(id.to_string())),
        };
        if codebase.is_empty() || category.is_empty() || path.is_empty() {
            return Err(IdError::EmptySegment(id.to_string()));
        }

        Ok(Self {
            codebase,
            category,
            path,
            name,
        })
    }

    /// The id of the `File` node that owns this entity.
    pub fn owning_file_id(&self) -> String {
        format!("{}:File:{}", self.codebase, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_id() {
        let id = EntityId::parse("f1:File:src/app.ts").unwrap();
        assert_eq!(id.codebase, "f1");
        assert_eq!(id.category, "File");
        assert_eq!(id.path, "src/app.ts");
        assert_eq!(id.name, None);
    }

    #[test]
    fn test_parse_named_entity_id() {
        let id = EntityId::parse("f1:Function:src/app.ts:mount").unwrap();
        assert_eq!(id.name, Some("mount"));
        assert_eq!(id.owning_file_id(), "f1:File:src/app.ts");
    }

    #[test]
    fn test_parse_rejects_short_ids() {
        assert_eq!(
            EntityId::parse("just-a-name"),
            Err(IdError::TooFewSegments("just-a-name".to_string()))
        );
        assert_eq!(
            EntityId::parse("f1::src/app.ts"),
            Err(IdError::EmptySegment("f1::src/app.ts".to_string()))
        );
    }
}
