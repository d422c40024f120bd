//! Trellis Core - Graph data model
//!
//! This crate defines the entities shared by the whole ingestion pipeline:
//! nodes and relationships as emitted by per-file parsers, the fragment
//! container they arrive in, and the structured entity-id convention.
//!
//! # Example
//!
//! ```
//! use trellis_core::{Node, Relationship, RelKind};
//!
//! let node = Node::new("f1:File:src/app.ts", "f1", vec!["File".into()])
//!     .with_property("file", "src/app.ts");
//!
//! let rel = Relationship::new(
//!     "r1",
//!     "f1",
//!     RelKind::Calls,
//!     "f1:Function:src/app.ts:mount",
//!     "f1:Function:src/app.ts:render",
//! );
//! ```

mod entity;
mod fragment;
mod id;

pub use entity::{
    labels, Node, RelKind, Relationship, Strength, UnresolvedKind, CODE_ELEMENT_LABEL,
    GLOBAL_CODEBASE, LOCATION_KEYS,
};
pub use fragment::FileFragment;
pub use id::{EntityId, IdError};
