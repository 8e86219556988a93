//! Stored document schema
//!
//! Snapshots are persisted with a `version` tag. Reading a stored document
//! goes through [`SnapshotDocument`], which dispatches on that tag instead of
//! assuming the current shape.

mod document;

pub use document::*;
