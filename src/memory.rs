//! Rolling conversation memory.
//!
//! A bounded, newest-first trail of exchanged lines, persisted under the
//! `draco_memory_v2` key and independent of the backend's own history. The
//! cap (40 entries) holds after every append, including the very first; each
//! append is a full read-modify-write of the stored sequence.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DracoError;
use crate::render::Render;
use crate::store::KeyValueStore;

/// Storage key for the persisted memory sequence.
pub const MEMORY_KEY: &str = "draco_memory_v2";

/// Maximum number of retained entries.
pub const MAX_MEMORY: usize = 40;

/// One remembered line, newest entries first in the stored sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub time: DateTime<Utc>,
    pub text: String,
}

/// Render an entry the way the memory panel shows it.
pub fn format_line(entry: &MemoryEntry) -> String {
    let local = entry.time.with_timezone(&Local);
    format!("{} — {}", local.format("%Y-%m-%d %H:%M:%S"), entry.text)
}

/// Bounded, persisted memory log over an injected [`KeyValueStore`].
pub struct MemoryLog {
    store: Box<dyn KeyValueStore>,
}

impl MemoryLog {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted sequence. Absence or corruption reads as empty.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.store
            .get(MEMORY_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Prepend an entry stamped with the current time, evict beyond the cap,
    /// and persist the full sequence.
    pub fn record(&mut self, text: impl Into<String>) -> Result<(), DracoError> {
        self.record_at(Utc::now(), text)
    }

    /// `record` with an explicit timestamp (tests drive this directly).
    pub fn record_at(
        &mut self,
        time: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Result<(), DracoError> {
        let mut entries = self.entries();
        entries.insert(
            0,
            MemoryEntry {
                time,
                text: text.into(),
            },
        );
        entries.truncate(MAX_MEMORY);
        let raw =
            serde_json::to_string(&entries).map_err(|e| DracoError::Store(e.to_string()))?;
        self.store.set(MEMORY_KEY, &raw)
    }

    /// Delete the persisted sequence entirely.
    pub fn clear(&mut self) -> Result<(), DracoError> {
        self.store.remove(MEMORY_KEY)
    }

    /// Rebuild the visible memory list from the persisted sequence.
    pub fn render(&self, out: &mut dyn Render) {
        out.memory(&self.entries());
    }
}
