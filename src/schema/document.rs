//! Versioned snapshot documents
//!
//! - Version 2 is the current shape and is parsed strictly
//! - Version 1 (or a document with no version) is migrated by running its
//!   sections through the current normalizers
//! - Anything newer or unknown is rejected

use crate::coerce::coerce_timestamp;
use crate::error::PointsError;
use crate::pipeline::{now_millis, SnapshotAssembler};
use crate::types::{PersistedSnapshot, MAX_EVENTS, MAX_POINTS, SNAPSHOT_VERSION};
use serde_json::Value;
use tracing::warn;

/// The snapshot version predating the event timeline
pub const LEGACY_SNAPSHOT_VERSION: u64 = 1;

/// A stored snapshot, tagged by the version it was written with
#[derive(Debug, Clone)]
pub enum SnapshotDocument {
    /// Pre-current document; only its raw sections are trusted
    Legacy {
        raw: Value,
        written_at: Option<i64>,
    },
    /// Document in the current shape
    Current(PersistedSnapshot),
}

impl SnapshotDocument {
    /// Parse stored bytes, dispatching on the `version` tag
    pub fn parse(bytes: &[u8]) -> Result<Self, PointsError> {
        let raw: Value = serde_json::from_slice(bytes)?;
        if !raw.is_object() {
            return Err(PointsError::InvalidPayload(
                "stored snapshot is not an object".to_string(),
            ));
        }

        let version = match raw.get("version") {
            None | Some(Value::Null) => LEGACY_SNAPSHOT_VERSION,
            Some(v) => v.as_u64().ok_or_else(|| {
                PointsError::InvalidPayload("version is not an unsigned integer".to_string())
            })?,
        };

        match version {
            SNAPSHOT_VERSION => {
                let snapshot: PersistedSnapshot = serde_json::from_value(raw)?;
                check_invariants(&snapshot)?;
                Ok(SnapshotDocument::Current(snapshot))
            }
            LEGACY_SNAPSHOT_VERSION => {
                let written_at = coerce_timestamp(raw.get("writtenAt"));
                Ok(SnapshotDocument::Legacy { raw, written_at })
            }
            other => Err(PointsError::UnsupportedVersion(other)),
        }
    }

    /// Version tag of the stored document
    pub fn version(&self) -> u64 {
        match self {
            SnapshotDocument::Legacy { .. } => LEGACY_SNAPSHOT_VERSION,
            SnapshotDocument::Current(snapshot) => snapshot.version,
        }
    }

    /// Convert to the current document shape
    pub fn into_current(self) -> PersistedSnapshot {
        match self {
            SnapshotDocument::Current(snapshot) => snapshot,
            SnapshotDocument::Legacy { raw, written_at } => {
                let now = now_millis();
                SnapshotAssembler::new(now).assemble_sections(&raw, written_at.unwrap_or(now))
            }
        }
    }
}

/// Decode a stored snapshot, treating anything unreadable as absent
pub fn load_snapshot(key: &str, bytes: &[u8]) -> Option<PersistedSnapshot> {
    match SnapshotDocument::parse(bytes) {
        Ok(document) => Some(document.into_current()),
        Err(e) => {
            warn!(key, error = %e, "discarding unreadable stored snapshot");
            None
        }
    }
}

fn check_invariants(snapshot: &PersistedSnapshot) -> Result<(), PointsError> {
    let stake = &snapshot.stake;
    let withdrawals = &snapshot.withdrawals;
    let networth = &snapshot.networth;

    let aligned = [stake.labels.len(), stake.moves.len(), stake.types.len()]
        .iter()
        .all(|&len| len == stake.data.len())
        && [withdrawals.labels.len(), withdrawals.times.len()]
            .iter()
            .all(|&len| len == withdrawals.values.len())
        && [networth.usd.len(), networth.inj.len()]
            .iter()
            .all(|&len| len == networth.times.len());

    let bounded = stake.len() <= MAX_POINTS
        && withdrawals.len() <= MAX_POINTS
        && networth.len() <= MAX_POINTS
        && snapshot.events.len() <= MAX_EVENTS;

    let ordered = snapshot.events.windows(2).all(|w| w[0].ts <= w[1].ts);

    if aligned && bounded && ordered {
        Ok(())
    } else {
        Err(PointsError::InvalidPayload(
            "stored snapshot violates series or event invariants".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::STAKE_LABEL_PLACEHOLDER;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_current_document_round_trips() {
        let snapshot = SnapshotAssembler::new(42)
            .assemble(&json!({ "stake": { "data": [1, 2] }, "events": [{ "id": "x", "ts": 3 }] }))
            .unwrap();
        let bytes = serde_json::to_vec(&snapshot).unwrap();

        let document = SnapshotDocument::parse(&bytes).unwrap();
        assert_eq!(document.version(), SNAPSHOT_VERSION);
        assert_eq!(document.into_current(), snapshot);
    }

    #[test]
    fn test_legacy_document_is_migrated() {
        let stored = json!({
            "version": 1,
            "writtenAt": 1_600_000_000_000i64,
            "stake": { "data": [5, 6] },
            "networth": { "times": [1], "usd": [10, 20] },
        });
        let bytes = serde_json::to_vec(&stored).unwrap();

        let document = SnapshotDocument::parse(&bytes).unwrap();
        assert_eq!(document.version(), LEGACY_SNAPSHOT_VERSION);

        let snapshot = document.into_current();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.written_at, 1_600_000_000_000);
        assert_eq!(snapshot.stake.labels, vec![STAKE_LABEL_PLACEHOLDER; 2]);
        assert_eq!(snapshot.networth.usd, vec![20.0]);
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn test_untagged_document_is_legacy() {
        let document = SnapshotDocument::parse(br#"{"withdrawals": {"values": [1]}}"#).unwrap();
        assert!(matches!(document, SnapshotDocument::Legacy { written_at: None, .. }));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let result = SnapshotDocument::parse(br#"{"version": 3}"#);
        assert!(matches!(result, Err(PointsError::UnsupportedVersion(3))));

        let result = SnapshotDocument::parse(br#"{"version": "2"}"#);
        assert!(matches!(result, Err(PointsError::InvalidPayload(_))));
    }

    #[test]
    fn test_misaligned_current_document_is_rejected() {
        let stored = json!({
            "version": 2,
            "writtenAt": 1,
            "stake": { "labels": ["a"], "data": [1, 2], "moves": [0, 0], "types": ["x", "y"] },
            "withdrawals": { "labels": [], "values": [], "times": [] },
            "networth": { "times": [], "usd": [], "inj": [] },
            "events": [],
        });
        let bytes = serde_json::to_vec(&stored).unwrap();
        assert!(SnapshotDocument::parse(&bytes).is_err());
    }

    #[test]
    fn test_load_snapshot_swallows_corruption() {
        assert!(load_snapshot("k", b"{corrupt").is_none());
        assert!(load_snapshot("k", b"[]").is_none());
        assert!(load_snapshot("k", br#"{"version": 7}"#).is_none());
    }
}
