//! Session state reduction
//!
//! Folds start/beat/end events into the shared session collection. Events
//! can arrive out of order or without a preceding `start`; every event lands
//! on a record, synthesizing one when needed.

use crate::tracking::types::{
    SessionEvent, SessionEventKind, SessionRecord, DEFAULT_END_REASON, MAX_SESSIONS,
};
use serde_json::Value;
use tracing::warn;

/// Outcome of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    /// No record existed; one was created
    Created,
    /// An existing record was updated
    Updated,
}

/// Ordered collection of session records, oldest first
#[derive(Debug, Clone)]
pub struct SessionLog {
    records: Vec<SessionRecord>,
    max_sessions: usize,
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new(MAX_SESSIONS)
    }
}

impl SessionLog {
    /// Create an empty log holding at most `max_sessions` records
    pub fn new(max_sessions: usize) -> Self {
        Self {
            records: Vec::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Wrap existing records, trimming to the default cap
    pub fn from_records(records: Vec<SessionRecord>) -> Self {
        let mut log = Self::default();
        log.records = records;
        log.trim();
        log
    }

    /// Decode a stored sessions document.
    ///
    /// Corrupt documents read as empty; individual malformed records are
    /// dropped.
    pub fn from_json(key: &str, bytes: &[u8]) -> Self {
        let raw: Vec<Value> = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable sessions document");
                return Self::default();
            }
        };

        let total = raw.len();
        let records: Vec<SessionRecord> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if records.len() < total {
            warn!(key, dropped = total - records.len(), "dropped malformed session records");
        }
        Self::from_records(records)
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SessionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.session_id == session_id)
    }

    /// Apply one lifecycle event, then enforce the collection cap
    pub fn apply(&mut self, event: &SessionEvent) -> ReduceOutcome {
        let outcome = match self.position(&event.session_id) {
            Some(idx) => {
                update_record(&mut self.records[idx], event);
                ReduceOutcome::Updated
            }
            None => {
                self.records.push(new_record(event));
                ReduceOutcome::Created
            }
        };
        self.trim();
        outcome
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        // Recent sessions sit at the back
        self.records.iter().rposition(|r| r.session_id == session_id)
    }

    fn trim(&mut self) {
        if self.records.len() > self.max_sessions {
            let excess = self.records.len() - self.max_sessions;
            self.records.drain(..excess);
        }
    }
}

/// Record for a session seen for the first time
fn new_record(event: &SessionEvent) -> SessionRecord {
    let mut record = SessionRecord {
        session_id: event.session_id.clone(),
        device_id: event.device_id.clone(),
        start_ts: event.ts,
        last_ts: event.ts,
        end_ts: None,
        beats: 0,
        page: String::new(),
        device_info: Default::default(),
        end_reason: None,
    };

    match event.kind {
        SessionEventKind::Start => {
            record.page = event.page.clone();
            record.device_info = event.device_info.clone();
        }
        SessionEventKind::Beat => record.beats = 1,
        SessionEventKind::End => {
            record.end_ts = Some(event.ts);
            record.end_reason = Some(end_reason(event));
        }
    }
    record
}

fn update_record(record: &mut SessionRecord, event: &SessionEvent) {
    record.last_ts = record.last_ts.max(event.ts);

    match event.kind {
        SessionEventKind::Start => {
            // Retried start, or a start arriving after an early beat
            if record.page.is_empty() {
                record.page = event.page.clone();
            }
            if record.device_info.is_empty() {
                record.device_info = event.device_info.clone();
            }
        }
        SessionEventKind::Beat => record.beats += 1,
        SessionEventKind::End => {
            if record.end_ts.is_none() {
                record.end_ts = Some(event.ts);
                record.end_reason = Some(end_reason(event));
            }
        }
    }
}

fn end_reason(event: &SessionEvent) -> String {
    event
        .reason
        .clone()
        .unwrap_or_else(|| DEFAULT_END_REASON.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::types::DeviceInfo;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn event(kind: SessionEventKind, session_id: &str, ts: i64) -> SessionEvent {
        SessionEvent {
            kind,
            session_id: session_id.to_string(),
            device_id: "device-1".to_string(),
            ts,
            page: String::new(),
            device_info: DeviceInfo::default(),
            reason: None,
        }
    }

    fn start(session_id: &str, ts: i64, page: &str) -> SessionEvent {
        let mut e = event(SessionEventKind::Start, session_id, ts);
        e.page = page.to_string();
        e.device_info = DeviceInfo(BTreeMap::from([("ua".to_string(), "test".to_string())]));
        e
    }

    #[test]
    fn test_start_creates_record() {
        let mut log = SessionLog::default();
        assert_eq!(log.apply(&start("s1", 100, "/home")), ReduceOutcome::Created);

        let record = log.get("s1").unwrap();
        assert_eq!(record.start_ts, 100);
        assert_eq!(record.last_ts, 100);
        assert_eq!(record.end_ts, None);
        assert_eq!(record.beats, 0);
        assert_eq!(record.page, "/home");
        assert!(!record.device_info.is_empty());
    }

    #[test]
    fn test_retried_start_keeps_start_ts() {
        let mut log = SessionLog::default();
        log.apply(&start("s1", 100, "/home"));
        assert_eq!(log.apply(&start("s1", 150, "/other")), ReduceOutcome::Updated);
        log.apply(&start("s1", 120, "/other"));

        let record = log.get("s1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(record.start_ts, 100);
        assert_eq!(record.last_ts, 150);
        assert_eq!(record.page, "/home");
    }

    #[test]
    fn test_beat_before_start_synthesizes_record() {
        let mut log = SessionLog::default();
        log.apply(&event(SessionEventKind::Beat, "s1", 500));

        let record = log.get("s1").unwrap();
        assert_eq!(record.beats, 1);
        assert_eq!(record.start_ts, 500);
        assert_eq!(record.last_ts, 500);
        assert_eq!(record.page, "");
        assert!(record.device_info.is_empty());

        // The late start fills in what the beat could not know
        log.apply(&start("s1", 490, "/late"));
        let record = log.get("s1").unwrap();
        assert_eq!(record.start_ts, 500);
        assert_eq!(record.last_ts, 500);
        assert_eq!(record.page, "/late");
    }

    #[test]
    fn test_beats_accumulate_and_last_ts_is_monotonic() {
        let mut log = SessionLog::default();
        log.apply(&start("s1", 100, "/"));
        log.apply(&event(SessionEventKind::Beat, "s1", 200));
        log.apply(&event(SessionEventKind::Beat, "s1", 150));
        log.apply(&event(SessionEventKind::Beat, "s1", 300));

        let record = log.get("s1").unwrap();
        assert_eq!(record.beats, 3);
        assert_eq!(record.last_ts, 300);
    }

    #[test]
    fn test_end_without_start() {
        let mut log = SessionLog::default();
        log.apply(&event(SessionEventKind::End, "s1", 900));

        let record = log.get("s1").unwrap();
        assert_eq!(record.start_ts, 900);
        assert_eq!(record.end_ts, Some(900));
        assert_eq!(record.last_ts, 900);
        assert_eq!(record.end_reason.as_deref(), Some("end"));
    }

    #[test]
    fn test_first_end_wins() {
        let mut log = SessionLog::default();
        log.apply(&start("s1", 100, "/"));

        let mut first = event(SessionEventKind::End, "s1", 400);
        first.reason = Some("hidden".to_string());
        log.apply(&first);

        let mut second = event(SessionEventKind::End, "s1", 700);
        second.reason = Some("unload".to_string());
        log.apply(&second);

        let record = log.get("s1").unwrap();
        assert_eq!(record.end_ts, Some(400));
        assert_eq!(record.end_reason.as_deref(), Some("hidden"));
        assert_eq!(record.last_ts, 700);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut log = SessionLog::new(3);
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            log.apply(&start(id, i as i64, "/"));
        }
        let ids: Vec<&str> = log.records().iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_from_records_enforces_default_cap() {
        let records: Vec<SessionRecord> = (0..MAX_SESSIONS + 10)
            .map(|i| new_record(&start(&format!("s{i}"), i as i64, "/")))
            .collect();
        let log = SessionLog::from_records(records);
        assert_eq!(log.len(), MAX_SESSIONS);
        assert_eq!(log.records()[0].session_id, "s10");
    }

    #[test]
    fn test_from_json_is_lenient() {
        let bytes = br#"[
            {"sessionId":"s1","deviceId":"d","startTs":1,"lastTs":2,"endTs":null,"beats":0},
            {"garbage":true}
        ]"#;
        let log = SessionLog::from_json("analytics/sessions.json", bytes);
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].page, "");

        assert!(SessionLog::from_json("analytics/sessions.json", b"{oops").is_empty());
        assert!(SessionLog::from_json("analytics/sessions.json", b"{}").is_empty());
    }
}
