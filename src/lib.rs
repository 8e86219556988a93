//! inj-points - Snapshot persistence and session tracking for an Injective points dashboard
//!
//! The service keeps one sanitized snapshot document per wallet address and two
//! shared analytics documents (sessions and device names). Every write goes
//! through a deterministic pipeline: JSON body → scalar coercion → series and
//! event normalization → bounded, versioned document.
//!
//! ## Modules
//!
//! - **Snapshot pipeline**: `coerce`, `normalizer`, `events`, `pipeline`, `schema`
//! - **Tracking**: session reducer and device name directory
//! - **Storage**: `store` with filesystem and in-memory backends
//! - **Service**: `service` orchestration and the axum `server`

pub mod coerce;
pub mod config;
pub mod error;
pub mod events;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod service;
pub mod store;
pub mod tracking;
pub mod types;

pub use config::ServiceConfig;
pub use error::{PointsError, StoreError};
pub use pipeline::{sanitize_snapshot, SnapshotAssembler};
pub use service::{PointsService, TrackOutcome};
pub use store::{DocumentStore, FsDocumentStore, MemoryDocumentStore};
pub use types::{PersistedSnapshot, SNAPSHOT_VERSION};

// Tracking exports
pub use tracking::{NameDirectory, SessionLog, SessionRecord, TrackRequest};

/// Crate version reported by `/healthz` and the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name used in logs
pub const SERVICE_NAME: &str = "inj-points";
