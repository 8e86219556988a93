//! Snapshot assembly
//!
//! This module provides the public API for turning an untrusted request body
//! into the persisted snapshot document.
//!
//! Pipeline stages:
//! 1. JSON parse - the body must be a JSON object
//! 2. SeriesNormalizer - stake, withdrawals and networth series
//! 3. EventNormalizer - event timeline
//! 4. Assembly - versioned document with a server-side `writtenAt`

use crate::error::PointsError;
use crate::events::EventNormalizer;
use crate::normalizer::SeriesNormalizer;
use crate::types::{PersistedSnapshot, SNAPSHOT_VERSION};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Sanitize a raw request body into a persisted snapshot.
///
/// # Arguments
/// * `body` - Raw request bytes
///
/// # Returns
/// The normalized document, stamped with the current time
///
/// # Example
/// ```ignore
/// let snapshot = sanitize_snapshot(br#"{"stake": {"data": [1, 2, 3]}}"#)?;
/// assert_eq!(snapshot.stake.labels.len(), 3);
/// ```
pub fn sanitize_snapshot(body: &[u8]) -> Result<PersistedSnapshot, PointsError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PointsError::EmptyBody);
    }
    let raw: Value = serde_json::from_slice(body)?;
    SnapshotAssembler::new(now_millis()).assemble(&raw)
}

/// Builds persisted snapshots at a fixed point in time
pub struct SnapshotAssembler {
    now: i64,
}

impl SnapshotAssembler {
    /// Create an assembler that stamps documents with `now` (ms)
    pub fn new(now: i64) -> Self {
        Self { now }
    }

    /// Assemble a snapshot from a raw JSON payload.
    ///
    /// Absent sections yield empty series. Any caller-provided `version` or
    /// `writtenAt` is ignored.
    pub fn assemble(&self, raw: &Value) -> Result<PersistedSnapshot, PointsError> {
        if !raw.is_object() {
            return Err(PointsError::InvalidPayload(
                "expected a JSON object".to_string(),
            ));
        }
        Ok(self.assemble_sections(raw, self.now))
    }

    /// Assemble with an explicit `writtenAt`, used when migrating stored documents
    pub(crate) fn assemble_sections(&self, raw: &Value, written_at: i64) -> PersistedSnapshot {
        let stake = SeriesNormalizer::stake(raw.get("stake"));
        let withdrawals = SeriesNormalizer::withdrawals(raw.get("withdrawals"));
        let networth = SeriesNormalizer::networth(raw.get("networth"));
        let events = EventNormalizer::normalize(raw.get("events"), self.now);

        debug!(
            stake_points = stake.len(),
            withdrawal_points = withdrawals.len(),
            networth_points = networth.len(),
            events = events.len(),
            "assembled snapshot"
        );

        PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            written_at,
            stake,
            withdrawals,
            networth,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NetworthSeries, WithdrawalSeries, STAKE_LABEL_PLACEHOLDER};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_stake_labels_are_backfilled() {
        let raw = json!({ "stake": { "data": [1, 2, 3] } });
        let snapshot = SnapshotAssembler::new(NOW).assemble(&raw).unwrap();

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.written_at, NOW);
        assert_eq!(snapshot.stake.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(snapshot.stake.labels, vec![STAKE_LABEL_PLACEHOLDER; 3]);
        assert_eq!(snapshot.stake.moves, vec![0.0; 3]);
        assert_eq!(snapshot.withdrawals, WithdrawalSeries::default());
        assert_eq!(snapshot.networth, NetworthSeries::default());
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn test_schema_is_fully_populated() {
        let snapshot = SnapshotAssembler::new(NOW).assemble(&json!({})).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(
            value,
            json!({
                "version": 2,
                "writtenAt": NOW,
                "stake": { "labels": [], "data": [], "moves": [], "types": [] },
                "withdrawals": { "labels": [], "values": [], "times": [] },
                "networth": { "times": [], "usd": [], "inj": [] },
                "events": [],
            })
        );
    }

    #[test]
    fn test_caller_metadata_is_ignored() {
        let raw = json!({ "version": 9, "writtenAt": 5 });
        let snapshot = SnapshotAssembler::new(NOW).assemble(&raw).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.written_at, NOW);
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let result = SnapshotAssembler::new(NOW).assemble(&json!([1, 2]));
        assert!(matches!(result, Err(PointsError::InvalidPayload(_))));
    }

    #[test]
    fn test_sanitize_snapshot_errors() {
        assert!(matches!(sanitize_snapshot(b""), Err(PointsError::EmptyBody)));
        assert!(matches!(sanitize_snapshot(b"  \n"), Err(PointsError::EmptyBody)));
        assert!(matches!(
            sanitize_snapshot(b"{not json"),
            Err(PointsError::JsonError(_))
        ));
    }

    #[test]
    fn test_sanitize_snapshot_stamps_current_time() {
        let before = now_millis();
        let snapshot = sanitize_snapshot(br#"{"networth": {"times": [1], "usd": [2]}}"#).unwrap();
        assert!(snapshot.written_at >= before);
        assert_eq!(snapshot.networth.inj, vec![0.0]);
    }
}
