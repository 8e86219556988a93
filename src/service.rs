//! Request orchestration
//!
//! Glues validation, normalization and the document store together. Each
//! operation is a single read and/or write; shared documents are
//! read-modify-written without locking, so concurrent writers can lose
//! updates (last write wins).

use crate::coerce::validate_address;
use crate::error::PointsError;
use crate::pipeline::{now_millis, sanitize_snapshot};
use crate::schema::load_snapshot;
use crate::store::{
    encode_sequence_within, snapshot_key, Committed, DocumentStore, MAX_DOCUMENT_BYTES, NAMES_KEY,
    SESSIONS_KEY,
};
use crate::tracking::{
    NameDirectory, ReduceOutcome, SessionLog, SessionRecord, TrackRequest,
};
use crate::types::PersistedSnapshot;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of storing a snapshot
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub committed: Committed,
    pub snapshot: PersistedSnapshot,
}

/// Contents of the shared tracking documents
#[derive(Debug, Clone, Default)]
pub struct TrackingState {
    pub sessions: Vec<SessionRecord>,
    pub names: NameDirectory,
}

/// What a tracking request changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Named { device_id: String },
    Session { session_id: String, outcome: ReduceOutcome },
}

/// Snapshot and tracking operations over a document store
#[derive(Clone)]
pub struct PointsService {
    store: Arc<dyn DocumentStore>,
}

impl PointsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Stored snapshot for an address, `None` if absent or unreadable
    pub async fn load_snapshot(
        &self,
        address: &str,
    ) -> Result<Option<PersistedSnapshot>, PointsError> {
        let address = validate_address(address).ok_or(PointsError::InvalidAddress)?;
        let key = snapshot_key(&address);

        let Some(bytes) = self.store.read_document(&key).await? else {
            debug!(key, "no snapshot stored");
            return Ok(None);
        };
        Ok(load_snapshot(&key, &bytes))
    }

    /// Sanitize a raw body and replace the address's snapshot with it
    pub async fn save_snapshot(
        &self,
        address: &str,
        body: &[u8],
    ) -> Result<SnapshotWrite, PointsError> {
        let address = validate_address(address).ok_or(PointsError::InvalidAddress)?;
        let snapshot = sanitize_snapshot(body)?;
        let key = snapshot_key(&address);

        let encoded = serde_json::to_vec(&snapshot)?;
        let committed = self
            .store
            .write_document(&key, Bytes::from(encoded))
            .await?;

        info!(
            address = %address,
            size = committed.size,
            events = snapshot.events.len(),
            "snapshot stored"
        );
        Ok(SnapshotWrite {
            committed,
            snapshot,
        })
    }

    /// Current sessions and names; unreadable documents read as empty
    pub async fn tracking_state(&self) -> Result<TrackingState, PointsError> {
        let sessions = self.load_sessions().await?.into_records();
        let names = self.load_names().await?;
        Ok(TrackingState { sessions, names })
    }

    /// Validate a raw tracking body and fold it into the shared documents
    pub async fn track(&self, body: &[u8]) -> Result<TrackOutcome, PointsError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PointsError::EmptyBody);
        }
        let raw: Value = serde_json::from_slice(body)?;

        match TrackRequest::parse(&raw, now_millis())? {
            TrackRequest::Name { device_id, name } => {
                let mut names = self.load_names().await?;
                names.upsert(&device_id, &name);

                let encoded = serde_json::to_vec(&names)?;
                self.store
                    .write_document(NAMES_KEY, Bytes::from(encoded))
                    .await?;
                info!(device_id = %device_id, "device name updated");
                Ok(TrackOutcome::Named { device_id })
            }
            TrackRequest::Session(event) => {
                let mut log = self.load_sessions().await?;
                let outcome = log.apply(&event);

                let mut records = log.into_records();
                let encoded = encode_sequence_within(&mut records, MAX_DOCUMENT_BYTES)?;
                self.store
                    .write_document(SESSIONS_KEY, Bytes::from(encoded))
                    .await?;
                debug!(
                    session_id = %event.session_id,
                    kind = event.kind.as_str(),
                    ?outcome,
                    sessions = records.len(),
                    "session event applied"
                );
                Ok(TrackOutcome::Session {
                    session_id: event.session_id,
                    outcome,
                })
            }
        }
    }

    async fn load_sessions(&self) -> Result<SessionLog, PointsError> {
        Ok(match self.store.read_document(SESSIONS_KEY).await? {
            Some(bytes) => SessionLog::from_json(SESSIONS_KEY, &bytes),
            None => SessionLog::default(),
        })
    }

    async fn load_names(&self) -> Result<NameDirectory, PointsError> {
        Ok(match self.store.read_document(NAMES_KEY).await? {
            Some(bytes) => NameDirectory::from_json(NAMES_KEY, &bytes),
            None => NameDirectory::default(),
        })
    }
}
