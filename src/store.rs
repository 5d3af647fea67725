// src/store.rs
//
// High-score persistence. One record survives restarts; it is replaced
// only by a strictly greater score (the controller enforces that rule,
// the store just reads and writes).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreRecord {
    pub score: u32,
    pub achieved_at: DateTime<Utc>,
}

impl HighScoreRecord {
    pub fn now(score: u32) -> Self {
        Self {
            score,
            achieved_at: Utc::now(),
        }
    }
}

pub trait ScoreStore: Send + Sync {
    fn load(&self) -> Result<Option<HighScoreRecord>, StoreError>;
    fn save(&self, record: &HighScoreRecord) -> Result<(), StoreError>;

    /// A record exists once the first session finishes, so its presence
    /// doubles as the has-played flag.
    fn has_played(&self) -> bool {
        matches!(self.load(), Ok(Some(_)))
    }
}

/// JSON file in the platform data directory.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn at_default_path() -> Result<Self, StoreError> {
        let dirs =
            directories::ProjectDirs::from("", "", "whackcam").ok_or(StoreError::NoProjectDir)?;
        Ok(Self::new(dirs.data_dir().join("highscore.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for JsonFileStore {
    fn load(&self) -> Result<Option<HighScoreRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // A corrupt record reads as "no high score yet" and is
                // overwritten on the next save.
                warn!(path = %self.path.display(), error = %e, "unreadable high score file");
                Ok(None)
            }
        }
    }

    fn save(&self, record: &HighScoreRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, content)?;
        info!(score = record.score, path = %self.path.display(), "high score saved");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<HighScoreRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: HighScoreRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl ScoreStore for MemoryStore {
    fn load(&self) -> Result<Option<HighScoreRecord>, StoreError> {
        Ok(self.record.lock().map(|r| *r).unwrap_or(None))
    }

    fn save(&self, record: &HighScoreRecord) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.record.lock() {
            *slot = Some(*record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("whackcam-store-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let store = JsonFileStore::new(temp_path("missing.json"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("roundtrip.json");
        let store = JsonFileStore::new(&path);
        let record = HighScoreRecord::now(42);
        store.save(&record).expect("save");
        assert_eq!(store.load().expect("load"), Some(record));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "not json {").expect("write");
        let store = JsonFileStore::new(&path);
        assert_eq!(store.load().expect("load"), None);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn has_played_follows_record_presence() {
        let store = MemoryStore::new();
        assert!(!store.has_played());
        store.save(&HighScoreRecord::now(0)).expect("save");
        assert!(store.has_played());
    }

    #[test]
    fn memory_store_keeps_the_latest_record() {
        let store = MemoryStore::new();
        assert_eq!(store.load().expect("load"), None);
        let first = HighScoreRecord::now(10);
        store.save(&first).expect("save");
        let second = HighScoreRecord::now(25);
        store.save(&second).expect("save");
        assert_eq!(store.load().expect("load"), Some(second));
    }
}
