//! Core types for the snapshot pipeline
//!
//! These are the typed shapes that come out of normalization and get
//! persisted. Field names follow the camelCase wire format of the stored
//! documents.

use serde::{Deserialize, Serialize};

/// Maximum points retained per series array
pub const MAX_POINTS: usize = 2400;

/// Maximum events retained per snapshot
pub const MAX_EVENTS: usize = 1200;

/// Current persisted snapshot version
pub const SNAPSHOT_VERSION: u64 = 2;

/// Placeholder label backfilled into stake history
pub const STAKE_LABEL_PLACEHOLDER: &str = "Stake update";

/// Placeholder type backfilled into stake history
pub const STAKE_TYPE_PLACEHOLDER: &str = "update";

/// Placeholder label backfilled into withdrawal history
pub const WITHDRAWAL_LABEL_PLACEHOLDER: &str = "Withdrawal";

/// Stake history series. `data` is the primary array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub moves: Vec<f64>,
    pub types: Vec<String>,
}

/// Withdrawal history series. `values` is the primary array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub times: Vec<f64>,
}

/// Net-worth history series. `times` is the primary array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworthSeries {
    pub times: Vec<f64>,
    pub usd: Vec<f64>,
    pub inj: Vec<f64>,
}

/// A discrete, user-visible event on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier; re-submission with the same id replaces the event
    pub id: String,
    /// Event time (ms since epoch)
    pub ts: i64,
    pub kind: String,
    pub title: String,
    pub detail: String,
    pub value: f64,
    pub dir: String,
    pub status: String,
}

/// The document persisted for an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub version: u64,
    /// Server-side write time (ms since epoch)
    pub written_at: i64,
    pub stake: StakeSeries,
    pub withdrawals: WithdrawalSeries,
    pub networth: NetworthSeries,
    pub events: Vec<Event>,
}

impl StakeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl WithdrawalSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl NetworthSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
