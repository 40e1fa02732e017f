//! Local string-keyed persistence.
//!
//! The browser original kept everything in `localStorage`; here the same
//! contract is a trait with three backends:
//!
//! - [`MemoryStore`]: plain map, used by tests and `--ephemeral` runs
//! - [`JsonFileStore`]: one JSON object per file, the default
//! - [`SqliteStore`]: a two-column kv table for users who point several
//!   tools at the same database
//!
//! All reads are infallible: a missing or unreadable value is `None`, never
//! an error. Writes go through `Result` so callers can log a failing disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::DracoError;

/// Synchronous, origin-local, string-keyed storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), DracoError>;
    fn remove(&mut self, key: &str) -> Result<(), DracoError>;
}

// -- In-memory ----------------------------------------------------------------

/// Map-backed store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DracoError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), DracoError> {
        self.values.remove(key);
        Ok(())
    }
}

// -- JSON file ----------------------------------------------------------------

/// File-backed store holding a single JSON object of key → value.
///
/// The whole map is loaded at open and rewritten on every mutation, which
/// keeps each read-modify-write one atomic logical step for the single task
/// that owns it.
pub struct JsonFileStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`.
    ///
    /// A missing or corrupt file reads as an empty map.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), DracoError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string(&self.values)
            .map_err(|e| DracoError::Store(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DracoError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), DracoError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

// -- SQLite ---------------------------------------------------------------------

/// SQLite-backed store: one `kv(key, value)` table.
pub struct SqliteStore {
    conn: rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the kv table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DracoError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| DracoError::Store(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .map_err(|e| DracoError::Store(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DracoError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .map(|_| ())
            .map_err(|e| DracoError::Store(e.to_string()))
    }

    fn remove(&mut self, key: &str) -> Result<(), DracoError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .map(|_| ())
            .map_err(|e| DracoError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut s = MemoryStore::new();
        s.set("k", "v").unwrap();
        assert_eq!(s.get("k").as_deref(), Some("v"));
        s.remove("k").unwrap();
        assert!(s.get("k").is_none());
    }

    #[test]
    fn test_memory_store_overwrite() {
        let mut s = MemoryStore::new();
        s.set("k", "one").unwrap();
        s.set("k", "two").unwrap();
        assert_eq!(s.get("k").as_deref(), Some("two"));
    }

    #[test]
    fn test_json_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let mut s = JsonFileStore::open(&path);
            s.set("draco-theme", "dark-mode").unwrap();
        }
        let s = JsonFileStore::open(&path);
        assert_eq!(s.get("draco-theme").as_deref(), Some("dark-mode"));
    }

    #[test]
    fn test_json_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = JsonFileStore::open(dir.path().join("absent.json"));
        assert!(s.get("anything").is_none());
    }

    #[test]
    fn test_json_file_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{{{not json").unwrap();
        let s = JsonFileStore::open(&path);
        assert!(s.get("k").is_none());
    }

    #[test]
    fn test_json_file_store_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let mut s = JsonFileStore::open(&path);
            s.set("k", "v").unwrap();
            s.remove("k").unwrap();
        }
        let s = JsonFileStore::open(&path);
        assert!(s.get("k").is_none());
    }

    #[test]
    fn test_json_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/store.json");
        let mut s = JsonFileStore::open(&path);
        s.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = SqliteStore::open(dir.path().join("kv.db")).unwrap();
        s.set("k", "v").unwrap();
        assert_eq!(s.get("k").as_deref(), Some("v"));
        s.remove("k").unwrap();
        assert!(s.get("k").is_none());
    }

    #[test]
    fn test_sqlite_store_upsert_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = SqliteStore::open(dir.path().join("kv.db")).unwrap();
        s.set("k", "one").unwrap();
        s.set("k", "two").unwrap();
        assert_eq!(s.get("k").as_deref(), Some("two"));
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let mut s = SqliteStore::open(&path).unwrap();
            s.set("draco_memory_v2", "[]").unwrap();
        }
        let s = SqliteStore::open(&path).unwrap();
        assert_eq!(s.get("draco_memory_v2").as_deref(), Some("[]"));
    }
}
