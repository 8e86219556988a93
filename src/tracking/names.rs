//! Device display names

use crate::coerce::truncate_chars;
use crate::tracking::types::{NameDirectory, MAX_NAME_CHARS};
use serde_json::Value;
use tracing::warn;

impl NameDirectory {
    /// Decode a stored names document, keeping only string entries.
    ///
    /// Corrupt documents read as empty.
    pub fn from_json(key: &str, bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => NameDirectory(
                map.into_iter()
                    .filter_map(|(device_id, name)| match name {
                        Value::String(name) => Some((device_id, name)),
                        _ => None,
                    })
                    .collect(),
            ),
            Ok(_) => {
                warn!(key, "names document is not an object, starting empty");
                NameDirectory::default()
            }
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable names document");
                NameDirectory::default()
            }
        }
    }

    /// Insert or replace the name for a device.
    ///
    /// Returns the previous name, if any.
    pub fn upsert(&mut self, device_id: &str, name: &str) -> Option<String> {
        let name = truncate_chars(name.trim(), MAX_NAME_CHARS);
        self.0.insert(device_id.to_string(), name)
    }

    pub fn get(&self, device_id: &str) -> Option<&str> {
        self.0.get(device_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
