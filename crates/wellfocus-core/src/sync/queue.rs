//! Persistent upload queue.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::data_dir;
use crate::sync::types::SyncError;
use crate::timer::SessionRecord;

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    pending: Vec<SessionRecord>,
}

/// FIFO of records awaiting upload, deduplicated by record id.
#[derive(Debug)]
pub struct SyncQueue {
    pending: Vec<SessionRecord>,
    /// Persistent queue file path; `None` keeps the queue in memory only.
    queue_file: Option<PathBuf>,
}

impl SyncQueue {
    /// Queue stored at `<data dir>/sync_queue.json`, loading what is there.
    pub fn open() -> Result<Self, SyncError> {
        let dir = data_dir().map_err(|e| std::io::Error::other(e.to_string()))?;
        Self::open_at(dir.join("sync_queue.json"))
    }

    /// Queue stored at `path`, loading what is there.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let mut queue = Self {
            pending: Vec::new(),
            queue_file: Some(path.into()),
        };
        queue.load()?;
        Ok(queue)
    }

    pub fn in_memory() -> Self {
        Self {
            pending: Vec::new(),
            queue_file: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.queue_file.as_deref()
    }

    /// Add a record unless one with the same id is already waiting.
    /// Returns whether it was added.
    pub fn enqueue(&mut self, record: SessionRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.pending.push(record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|r| r.id == id)
    }

    /// Oldest `n` records, left in place.
    pub fn peek(&self, n: usize) -> Vec<SessionRecord> {
        self.pending.iter().take(n).cloned().collect()
    }

    /// Drop the records with the given ids.
    pub fn remove(&mut self, ids: &[String]) {
        self.pending.retain(|r| !ids.contains(&r.id));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Persist queue to disk.
    pub fn persist(&self) -> Result<(), SyncError> {
        let Some(path) = &self.queue_file else {
            return Ok(());
        };
        let file = QueueFile {
            pending: self.pending.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Replace the in-memory queue with the file's contents.
    pub fn load(&mut self) -> Result<(), SyncError> {
        let Some(path) = &self.queue_file else {
            return Ok(());
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let file: QueueFile = serde_json::from_str(&content)?;
        self.pending.clear();
        for record in file.pending {
            self.enqueue(record);
        }
        Ok(())
    }
}
