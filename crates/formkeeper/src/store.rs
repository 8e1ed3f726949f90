//! JSON-backed store for submitted form records.
//!
//! The store is a single JSON object on disk. Top-level keys are submission
//! timestamps; values are the flat field mappings of one submission each.
//! Every update reads the file in full, merges one new record in memory,
//! and rewrites the file in full. That is acceptable while the store stays
//! small; `upsert` is the single choke point if that ever changes.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Format for record keys: local wall-clock time at second resolution.
///
/// Two submissions inside the same second collide and the later one wins.
/// Acknowledged gap, kept as-is.
const KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Store for submitted form records.
///
/// Owns exclusive write access to the store file within the process: every
/// read-modify-write cycle runs under an internal mutex, so concurrent
/// upserts cannot lose updates. Other processes writing the same file are
/// not guarded against.
#[derive(Debug)]
pub struct JsonStore {
    /// Path to the store file.
    path: PathBuf,
    /// Serializes the read-modify-write cycle.
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open a store backed by the given file path.
    ///
    /// The file itself is created lazily by the first successful [`upsert`];
    /// only the parent directory is created here.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    ///
    /// [`upsert`]: JsonStore::upsert
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Store opened at {}", path.display());
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a submission under the current wall-clock timestamp.
    ///
    /// Returns the key the record was stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged store cannot be serialized or the file
    /// cannot be rewritten.
    pub async fn upsert(&self, fields: Map<String, Value>) -> Result<String> {
        let key = Local::now().format(KEY_FORMAT).to_string();
        self.upsert_at(key.clone(), fields).await?;
        Ok(key)
    }

    /// Insert a submission under an explicit key.
    ///
    /// An existing record under the same key is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged store cannot be serialized or the file
    /// cannot be rewritten.
    pub async fn upsert_at(&self, key: String, fields: Map<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load();
        records.insert(key, Value::Object(fields));
        self.persist(&records)?;

        info!(
            "Store now holds {} record(s) at {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the current store contents.
    ///
    /// Returns an empty mapping if the file is absent, empty, unreadable,
    /// or not a JSON object. Corrupt content is reported and then treated
    /// as a fresh store; the next successful upsert replaces it.
    #[must_use]
    pub(crate) fn snapshot(&self) -> Map<String, Value> {
        self.load()
    }

    fn load(&self) -> Map<String, Value> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(err) => {
                warn!(
                    "Could not read store file {}, starting fresh: {err}",
                    self.path.display()
                );
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(records)) => records,
            Ok(_) => {
                warn!(
                    "Store file {} is not a JSON object, starting fresh",
                    self.path.display()
                );
                Map::new()
            }
            Err(err) => {
                warn!(
                    "Store file {} holds invalid JSON, starting fresh: {err}",
                    self.path.display()
                );
                Map::new()
            }
        }
    }

    fn persist(&self, records: &Map<String, Value>) -> Result<()> {
        // serde_json leaves non-ASCII unescaped, so stored text stays readable
        let serialized = serde_json::to_string(records)?;
        std::fs::write(&self.path, serialized).map_err(|source| Error::StoreWrite {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_first_upsert_creates_file() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("data.json")).unwrap();

        let key = store.upsert(fields(&[("a", "1"), ("b", "2")])).await.unwrap();

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[key.as_str()], serde_json::json!({"a": "1", "b": "2"}));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/data.json");
        let store = JsonStore::open(&path).unwrap();

        store.upsert(fields(&[("x", "y")])).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_second_upsert_preserves_earlier_record() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("data.json")).unwrap();

        store
            .upsert_at("2026-08-30 10:00:00".into(), fields(&[("a", "1")]))
            .await
            .unwrap();
        store
            .upsert_at("2026-08-30 10:00:01".into(), fields(&[("b", "2")]))
            .await
            .unwrap();

        let records = store.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records["2026-08-30 10:00:00"], serde_json::json!({"a": "1"}));
        assert_eq!(records["2026-08-30 10:00:01"], serde_json::json!({"b": "2"}));
    }

    #[tokio::test]
    async fn test_same_key_overwrites() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("data.json")).unwrap();

        store
            .upsert_at("2026-08-30 10:00:00".into(), fields(&[("a", "1")]))
            .await
            .unwrap();
        store
            .upsert_at("2026-08-30 10:00:00".into(), fields(&[("a", "2")]))
            .await
            .unwrap();

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records["2026-08-30 10:00:00"], serde_json::json!({"a": "2"}));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced_by_next_upsert() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let store = JsonStore::open(&path).unwrap();
        store
            .upsert_at("2026-08-30 10:00:00".into(), fields(&[("a", "1")]))
            .await
            .unwrap();

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("2026-08-30 10:00:00"));
    }

    #[tokio::test]
    async fn test_non_object_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = JsonStore::open(&path).unwrap();
        store
            .upsert_at("k".into(), fields(&[("a", "1")]))
            .await
            .unwrap();

        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_treated_as_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "").unwrap();

        let store = JsonStore::open(&path).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_non_ascii_stored_unescaped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = JsonStore::open(&path).unwrap();

        store
            .upsert_at("k".into(), fields(&[("message", "привіт світ")]))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("привіт світ"));
        assert!(!raw.contains("\\u"));
    }

    #[tokio::test]
    async fn test_upsert_key_shape() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("data.json")).unwrap();

        let key = store.upsert(fields(&[("a", "1")])).await.unwrap();
        // "YYYY-MM-DD HH:MM:SS"
        assert_eq!(key.len(), 19);
        assert_eq!(&key[4..5], "-");
        assert_eq!(&key[10..11], " ");
    }
}
