//! Document storage
//!
//! The service depends on two operations against a key/value blob store:
//! read the latest bytes for a key, and durably replace them. Backends
//! implement [`DocumentStore`]; writes are last-write-wins with no
//! compare-and-swap.

use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Size ceiling for request bodies and sequence documents
pub const MAX_DOCUMENT_BYTES: usize = 220_000;

/// Share of a sequence dropped per size-fallback pass (percent)
pub const FALLBACK_TRIM_PERCENT: usize = 30;

/// Key of the shared session collection
pub const SESSIONS_KEY: &str = "analytics/sessions.json";

/// Key of the shared device name directory
pub const NAMES_KEY: &str = "analytics/names.json";

/// Key of the snapshot for a validated address
pub fn snapshot_key(address: &str) -> String {
    format!("inj-points/{address}/data.json")
}

/// Acknowledgement of a durable write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub key: String,
    /// Location the document can be fetched from
    pub url: String,
    pub size: usize,
}

/// Key/value document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Latest bytes stored under `key`, or `None` if it was never written or
    /// cannot be read
    async fn read_document(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Replace the document at `key`
    async fn write_document(&self, key: &str, bytes: Bytes) -> Result<Committed, StoreError>;
}

/// Serialize a sequence, dropping its oldest entries until it fits `ceiling`.
///
/// Each pass removes `FALLBACK_TRIM_PERCENT` of the remaining entries (at
/// least one). `items` is left holding exactly what was encoded.
pub fn encode_sequence_within<T: Serialize>(
    items: &mut Vec<T>,
    ceiling: usize,
) -> Result<Vec<u8>, StoreError> {
    let mut encoded = serde_json::to_vec(items)?;
    while encoded.len() > ceiling && !items.is_empty() {
        let drop = (items.len() * FALLBACK_TRIM_PERCENT / 100).max(1);
        items.drain(..drop);
        debug!(
            dropped = drop,
            remaining = items.len(),
            size = encoded.len(),
            ceiling,
            "sequence document over size ceiling, trimming oldest entries"
        );
        encoded = serde_json::to_vec(items)?;
    }
    Ok(encoded)
}

/// Reject keys that could escape the store root
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn public_url(base: Option<&str>, key: &str) -> Option<String> {
    base.map(|base| format!("{}/{}", base.trim_end_matches('/'), key))
}

/// Documents stored as files under a root directory
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
        }
    }

    /// Report `base/key` as the document URL instead of a file URL
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base;
        self
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read_document(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(key, error = %e, "stored document is unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_document(&self, key: &str, bytes: Bytes) -> Result<Committed, StoreError> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(key, e))?;

        // Readers never observe a half-written document
        let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(key, e));
        }

        info!(key, size = bytes.len(), "document written");
        let url = public_url(self.public_base_url.as_deref(), key)
            .unwrap_or_else(|| format!("file://{}", path.display()));
        Ok(Committed {
            key: key.to_string(),
            url,
            size: bytes.len(),
        })
    }
}

/// Process-local document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Bytes>>,
    public_base_url: Option<String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base;
        self
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read_document(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        validate_key(key)?;
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(key).cloned())
    }

    async fn write_document(&self, key: &str, bytes: Bytes) -> Result<Committed, StoreError> {
        validate_key(key)?;
        let size = bytes.len();
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);

        let url = public_url(self.public_base_url.as_deref(), key)
            .unwrap_or_else(|| format!("memory://{key}"));
        Ok(Committed {
            key: key.to_string(),
            url,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keys() {
        assert_eq!(
            snapshot_key("inj1abcdefghijklmnopqrstuv"),
            "inj-points/inj1abcdefghijklmnopqrstuv/data.json"
        );
        assert!(validate_key(SESSIONS_KEY).is_ok());
        assert!(validate_key(NAMES_KEY).is_ok());
        for bad in ["", "/etc/passwd", "a/../b", "a//b", "./a", "a\\b", "a/"] {
            assert!(validate_key(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_encode_sequence_within_fits() {
        let mut items: Vec<String> = (0..10).map(|i| format!("item-{i}")).collect();
        let encoded = encode_sequence_within(&mut items, 1_000).unwrap();
        assert_eq!(items.len(), 10);
        assert_eq!(encoded, serde_json::to_vec(&items).unwrap());
    }

    #[test]
    fn test_encode_sequence_within_trims_oldest() {
        let mut items: Vec<String> = (0..100).map(|i| format!("{i:0>8}")).collect();
        // 100 entries encode to 1101 bytes
        let full = serde_json::to_vec(&items).unwrap().len();
        let encoded = encode_sequence_within(&mut items, full / 2).unwrap();

        assert!(encoded.len() <= full / 2);
        // 100 -> 70 -> 49
        assert_eq!(items.len(), 49);
        assert_eq!(items.first().map(String::as_str), Some("00000051"));
        assert_eq!(items.last().map(String::as_str), Some("00000099"));
    }

    #[test]
    fn test_encode_sequence_within_can_empty() {
        let mut items = vec!["x".repeat(100)];
        let encoded = encode_sequence_within(&mut items, 10).unwrap();
        assert!(items.is_empty());
        assert_eq!(encoded, b"[]".to_vec());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.read_document("a/b.json").await.unwrap(), None);

        let committed = store
            .write_document("a/b.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(committed.url, "memory://a/b.json");
        assert_eq!(committed.size, 2);

        store
            .write_document("a/b.json", Bytes::from_static(b"[1]"))
            .await
            .unwrap();
        assert_eq!(
            store.read_document("a/b.json").await.unwrap(),
            Some(Bytes::from_static(b"[1]"))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        assert_eq!(store.read_document(SESSIONS_KEY).await.unwrap(), None);

        let committed = store
            .write_document(SESSIONS_KEY, Bytes::from_static(b"[]"))
            .await
            .unwrap();
        assert!(committed.url.starts_with("file://"));
        assert!(dir.path().join("analytics").join("sessions.json").exists());

        store
            .write_document(SESSIONS_KEY, Bytes::from_static(b"[1,2]"))
            .await
            .unwrap();
        assert_eq!(
            store.read_document(SESSIONS_KEY).await.unwrap(),
            Some(Bytes::from_static(b"[1,2]"))
        );

        // No temp files left behind
        let leftovers = std::fs::read_dir(dir.path().join("analytics")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_fs_store_public_url_and_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path())
            .with_public_base_url(Some("https://blobs.example.com/".to_string()));

        let committed = store
            .write_document(NAMES_KEY, Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(committed.url, "https://blobs.example.com/analytics/names.json");

        assert!(matches!(
            store.read_document("../escape.json").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_unreadable_document_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        // A directory where the document should be cannot be read as bytes
        std::fs::create_dir_all(dir.path().join("analytics").join("sessions.json")).unwrap();
        assert_eq!(store.read_document(SESSIONS_KEY).await.unwrap(), None);

        // Writes over it still fail
        let result = store
            .write_document(SESSIONS_KEY, Bytes::from_static(b"[]"))
            .await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
