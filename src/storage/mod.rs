// src/storage/mod.rs
use crate::markers::{Match, MatchRecord};
use crate::utils::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A record plus bookkeeping, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub seq: u64,
    pub stored_at: DateTime<Utc>,
    pub record: MatchRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_seq: u64,
    records: BTreeMap<String, StoredRecord>, // keyed by uid
}

/// Owns the location of a JSON record store.
///
/// The store is only ever touched inside [`StorageManager::session`].
pub struct StorageManager {
    path: PathBuf,
}

/// In-memory view of the store for the length of one session.
pub struct RecordStore {
    file: StoreFile,
    dirty: bool,
}

impl StorageManager {
    /// Creates a new StorageManager for the given store file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        // Create the parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::IoError)?;
            }
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the store, runs `op`, and writes changes back only if `op` succeeds.
    pub fn session<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut RecordStore) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut store = self.open()?;
        let value = op(&mut store)?;

        if store.dirty {
            self.write(&store)?;
        }
        Ok(value)
    }

    fn open(&self) -> Result<RecordStore, StorageError> {
        let file = if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            serde_json::from_str(&content)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?
        } else {
            StoreFile::default()
        };

        tracing::debug!("Opened record store {} ({} records)", self.path.display(), file.records.len());
        Ok(RecordStore { file, dirty: false })
    }

    fn write(&self, store: &RecordStore) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(&store.file)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        // Write beside the target, then swap it in
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;

        tracing::info!("Saved {} records to {}", store.file.records.len(), self.path.display());
        Ok(())
    }
}

impl RecordStore {
    /// Stores `m` under its uid, returning the record it replaced.
    pub fn insert(&mut self, m: &Match) -> Option<StoredRecord> {
        let stored = StoredRecord {
            seq: self.file.next_seq,
            stored_at: Utc::now(),
            record: m.pack(),
        };
        self.file.next_seq += 1;
        self.dirty = true;
        self.file.records.insert(m.uid.clone(), stored)
    }

    pub fn get(&self, uid: &str) -> Option<Match> {
        self.file
            .records
            .get(uid)
            .map(|stored| Match::reconstruct(stored.record.clone()))
    }

    pub fn remove(&mut self, uid: &str) -> Option<Match> {
        let removed = self.file.records.remove(uid)?;
        self.dirty = true;
        Some(Match::reconstruct(removed.record))
    }

    /// Drops every record, so the store holds only what this session inserts.
    pub fn clear(&mut self) -> usize {
        let dropped = self.file.records.len();
        if dropped > 0 {
            self.file.records.clear();
            self.dirty = true;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.file.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.records.is_empty()
    }

    pub fn collectors(&self) -> Vec<Match> {
        self.select(|r| matches!(r, MatchRecord::Collector(_)))
    }

    pub fn sections(&self) -> Vec<Match> {
        self.select(|r| matches!(r, MatchRecord::Section(_)))
    }

    pub fn removals(&self) -> Vec<Match> {
        self.select(|r| matches!(r, MatchRecord::Removal(_)))
    }

    /// Matching records in insertion order.
    fn select(&self, keep: impl Fn(&MatchRecord) -> bool) -> Vec<Match> {
        let mut stored: Vec<&StoredRecord> = self
            .file
            .records
            .values()
            .filter(|s| keep(&s.record))
            .collect();
        stored.sort_by_key(|s| s.seq);
        stored
            .into_iter()
            .map(|s| Match::reconstruct(s.record.clone()))
            .collect()
    }
}
