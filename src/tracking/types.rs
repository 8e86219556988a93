//! Tracking data types
//!
//! This module defines the typed tracking requests parsed from untrusted
//! bodies, and the session records and name directory that get persisted.

use crate::coerce::{coerce_string, coerce_timestamp, truncate_chars};
use crate::error::PointsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum session records kept in the shared sessions document
pub const MAX_SESSIONS: usize = 5000;

/// Maximum characters in a device display name
pub const MAX_NAME_CHARS: usize = 32;

pub const MAX_ID_CHARS: usize = 96;
pub const MAX_PAGE_CHARS: usize = 300;
pub const MAX_REASON_CHARS: usize = 64;
pub const MAX_DEVICE_INFO_ENTRIES: usize = 24;
pub const MAX_DEVICE_INFO_KEY_CHARS: usize = 40;
pub const MAX_DEVICE_INFO_VALUE_CHARS: usize = 200;

/// End reason recorded when the client gives none
pub const DEFAULT_END_REASON: &str = "end";

/// Lifecycle event kinds that touch session records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Start,
    Beat,
    End,
}

impl SessionEventKind {
    /// Parse a session event type. `name` is not a session event.
    pub fn parse(kind: &str) -> Result<Self, PointsError> {
        match kind {
            "start" => Ok(SessionEventKind::Start),
            "beat" => Ok(SessionEventKind::Beat),
            "end" => Ok(SessionEventKind::End),
            other => Err(PointsError::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::Start => "start",
            SessionEventKind::Beat => "beat",
            SessionEventKind::End => "end",
        }
    }
}

/// Free-form client details (user agent, platform, screen...), bounded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo(pub BTreeMap<String, String>);

impl DeviceInfo {
    /// Keep up to `MAX_DEVICE_INFO_ENTRIES` scalar entries of a JSON object
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return DeviceInfo::default();
        };

        let entries = map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .take(MAX_DEVICE_INFO_ENTRIES)
            .map(|(k, v)| {
                (
                    truncate_chars(k, MAX_DEVICE_INFO_KEY_CHARS),
                    coerce_string(Some(v), MAX_DEVICE_INFO_VALUE_CHARS),
                )
            })
            .collect();
        DeviceInfo(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A validated start/beat/end event
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session_id: String,
    pub device_id: String,
    pub ts: i64,
    pub page: String,
    pub device_info: DeviceInfo,
    pub reason: Option<String>,
}

/// A validated tracking request
#[derive(Debug, Clone, PartialEq)]
pub enum TrackRequest {
    /// Upsert a display name for a device
    Name { device_id: String, name: String },
    /// Fold a lifecycle event into the session collection
    Session(SessionEvent),
}

impl TrackRequest {
    /// Validate a raw tracking body.
    ///
    /// `now` (ms) is used when the event carries no usable timestamp.
    pub fn parse(raw: &Value, now: i64) -> Result<Self, PointsError> {
        let Some(obj) = raw.as_object() else {
            return Err(PointsError::InvalidPayload(
                "expected a JSON object".to_string(),
            ));
        };

        let kind = coerce_string(obj.get("type"), 16);
        let device_id = bounded_id(obj, "deviceId");

        if kind == "name" {
            // Trim before truncating
            let name = truncate_chars(
                coerce_string(obj.get("name"), usize::MAX).trim(),
                MAX_NAME_CHARS,
            );
            if device_id.is_empty() || name.is_empty() {
                return Err(PointsError::MissingField("deviceId or name".to_string()));
            }
            return Ok(TrackRequest::Name { device_id, name });
        }

        let kind = SessionEventKind::parse(&kind)?;
        let session_id = bounded_id(obj, "sessionId");
        if session_id.is_empty() || device_id.is_empty() {
            return Err(PointsError::MissingField("sessionId or deviceId".to_string()));
        }

        let reason = coerce_string(obj.get("reason"), MAX_REASON_CHARS);
        Ok(TrackRequest::Session(SessionEvent {
            kind,
            session_id,
            device_id,
            ts: coerce_timestamp(obj.get("ts")).unwrap_or(now),
            page: coerce_string(obj.get("page"), MAX_PAGE_CHARS),
            device_info: DeviceInfo::from_value(obj.get("deviceInfo")),
            reason: Some(reason.trim().to_string()).filter(|r| !r.is_empty()),
        }))
    }
}

fn bounded_id(obj: &Map<String, Value>, key: &str) -> String {
    coerce_string(obj.get(key), MAX_ID_CHARS).trim().to_string()
}

/// One tracked browsing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub device_id: String,
    pub start_ts: i64,
    pub last_ts: i64,
    pub end_ts: Option<i64>,
    pub beats: u64,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<String>,
}

/// Device id to display name mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameDirectory(pub BTreeMap<String, String>);
