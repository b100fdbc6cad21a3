//! History stores.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{LogEntry, LogSink};
use crate::core::config::Config;
use crate::core::error::{Error, Result};

const ENTRY_EXTENSION: &str = "json";

/// Stores each entry as a pretty-printed JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileLogStore {
    dir: PathBuf,
}

impl FileLogStore {
    /// Open a store in `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::DirectoryAccess {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// Open the store configured in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.history.history_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, entry: &LogEntry) -> PathBuf {
        let file_name = format!(
            "{}_{}.{}",
            entry.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            entry.id.simple(),
            ENTRY_EXTENSION
        );
        self.dir.join(file_name)
    }

    /// All readable entries, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<LogEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| Error::DirectoryAccess {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for item in read_dir.flatten() {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str::<LogEntry>(&text).map_err(|e| e.to_string()));
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => log::debug!("Skipping unreadable history file {}: {}", path.display(), e),
            }
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

impl LogSink for FileLogStore {
    fn save_log(&self, entry: &LogEntry) -> Result<()> {
        let path = self.entry_path(entry);
        let content = serde_json::to_string_pretty(entry)?;
        fs::write(&path, content).map_err(|e| Error::file_write(&path, e))?;
        log::debug!("Saved scan log {}", path.display());
        Ok(())
    }
}

/// Keeps entries in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogStore {
    fn save_log(&self, entry: &LogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("history store lock poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ScanResult;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileLogStore::open(temp_dir.path().join("logs")).unwrap();

        let mut older = LogEntry::from_scan(&ScanResult::error("/a", "boom"), Duration::ZERO);
        older.timestamp = older.timestamp - ChronoDuration::minutes(5);
        let newer = LogEntry::from_scan(&ScanResult::error("/b", "bang"), Duration::ZERO);

        store.save_log(&older).unwrap();
        store.save_log(&newer).unwrap();
        fs::write(store.dir().join("junk.json"), "not json").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].path, "/a");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryLogStore::new();
        assert!(store.is_empty());
        let entry = LogEntry::from_scan(&ScanResult::error("/x", "e"), Duration::ZERO);
        store.save_log(&entry).unwrap();
        assert_eq!(store.entries(), vec![entry]);
    }
}
