//! Event normalization
//!
//! Maps loose client event objects to the canonical [`Event`] shape,
//! upserts them by id, orders them by time and clamps the history.

use crate::coerce::{coerce_number, coerce_string, coerce_timestamp, truncate_chars};
use crate::types::{Event, MAX_EVENTS};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const MAX_ID_CHARS: usize = 160;
pub const MAX_KIND_CHARS: usize = 32;
pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DETAIL_CHARS: usize = 400;
pub const MAX_DIR_CHARS: usize = 16;
pub const MAX_STATUS_CHARS: usize = 32;

/// Kind used when an event does not name one
pub const DEFAULT_KIND: &str = "event";

/// Normalizer for the snapshot event timeline
pub struct EventNormalizer;

impl EventNormalizer {
    /// Normalize a raw `events` section.
    ///
    /// `now` (ms) is substituted for missing or invalid timestamps. Entries
    /// that are not JSON objects are skipped.
    pub fn normalize(section: Option<&Value>, now: i64) -> Vec<Event> {
        let raw_events = match section {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Vec::new(),
        };

        let canonical = raw_events
            .iter()
            .filter_map(Value::as_object)
            .map(|raw| canonicalize(raw, now));

        let mut events = upsert_by_id(canonical);

        // Stable: events sharing a timestamp keep their first-seen order
        events.sort_by_key(|e| e.ts);

        if events.len() > MAX_EVENTS {
            events.drain(..events.len() - MAX_EVENTS);
        }
        events
    }
}

/// Map one raw object to the canonical event shape
fn canonicalize(raw: &Map<String, Value>, now: i64) -> Event {
    let ts = coerce_timestamp(raw.get("ts")).unwrap_or(now);

    let mut kind = trimmed(coerce_string(raw.get("kind"), MAX_KIND_CHARS));
    if kind.is_empty() {
        kind = DEFAULT_KIND.to_string();
    }

    let mut title = trimmed(coerce_string(raw.get("title"), MAX_TITLE_CHARS));
    if title.is_empty() {
        title = kind.clone();
    }

    let mut id = trimmed(coerce_string(raw.get("id"), MAX_ID_CHARS));
    if id.is_empty() {
        id = fallback_id(ts, &kind, &title);
    }

    Event {
        id,
        ts,
        kind,
        title,
        detail: coerce_string(raw.get("detail"), MAX_DETAIL_CHARS),
        value: coerce_number(raw.get("value")),
        dir: coerce_string(raw.get("dir"), MAX_DIR_CHARS),
        status: coerce_string(raw.get("status"), MAX_STATUS_CHARS),
    }
}

/// Deterministic id for events submitted without one.
///
/// Distinct events with the same timestamp, kind and title collide and
/// merge into one.
pub fn fallback_id(ts: i64, kind: &str, title: &str) -> String {
    let composite = format!("{ts}:{kind}:{title}");
    let collapsed = composite.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_ID_CHARS)
}

/// Keep one event per id. The last submission's fields win and take the
/// position where the id was first seen.
fn upsert_by_id(events: impl Iterator<Item = Event>) -> Vec<Event> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Event> = Vec::new();

    for event in events {
        match slots.get(&event.id) {
            Some(&idx) => out[idx] = event,
            None => {
                slots.insert(event.id.clone(), out.len());
                out.push(event);
            }
        }
    }
    out
}

fn trimmed(s: String) -> String {
    let t = s.trim();
    if t.len() == s.len() {
        s
    } else {
        t.to_string()
    }
}
