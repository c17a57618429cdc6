//! In-process session log for ephemeral runs and tests.

use std::sync::RwLock;

use super::store::SessionStore;
use crate::error::PersistenceError;
use crate::settings::Settings;
use crate::timer::SessionRecord;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<SessionRecord>>,
    settings: RwLock<Option<Settings>>,
    focus_total: RwLock<Option<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SessionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            settings: RwLock::new(None),
            focus_total: RwLock::new(None),
        }
    }
}

fn poisoned<T>(_: T) -> PersistenceError {
    PersistenceError::Unavailable("memory store lock poisoned".into())
}

impl SessionStore for MemoryStore {
    fn append(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let mut records = self.records.write().map_err(poisoned)?;
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record.clone());
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }

    fn page_before(
        &self,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<(i64, SessionRecord)>, PersistenceError> {
        let records = self.records.read().map_err(poisoned)?;
        // Positions are 1-based insertion indexes.
        let end = match before {
            Some(seq) => usize::try_from(seq.saturating_sub(1)).unwrap_or(0).min(records.len()),
            None => records.len(),
        };
        Ok(records[..end]
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(i, r)| (i as i64 + 1, r.clone()))
            .collect())
    }

    fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    fn load_settings(&self) -> Result<Option<Settings>, PersistenceError> {
        Ok(*self.settings.read().map_err(poisoned)?)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        *self.settings.write().map_err(poisoned)? = Some(*settings);
        Ok(())
    }

    fn load_focus_total(&self) -> Result<Option<u64>, PersistenceError> {
        Ok(*self.focus_total.read().map_err(poisoned)?)
    }

    fn save_focus_total(&self, total: u64) -> Result<(), PersistenceError> {
        *self.focus_total.write().map_err(poisoned)? = Some(total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SessionType;
    use chrono::{TimeZone, Utc};

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            session_type: SessionType::ShortBreak,
            duration_secs: 300,
            was_interrupted: false,
            intention: String::new(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn recent_walk_matches_sqlite_semantics() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append(&record(&format!("m{i}"))).unwrap();
        }
        let ids: Vec<_> = store
            .list_recent(4)
            .with_page_size(3)
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["m4", "m3", "m2", "m1"]);
    }

    #[test]
    fn append_is_idempotent_by_id() {
        let store = MemoryStore::new();
        store.append(&record("one")).unwrap();
        store.append(&record("one")).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn limit_zero_yields_nothing() {
        let store = MemoryStore::with_records(vec![record("a")]);
        assert_eq!(store.list_recent(0).count(), 0);
    }
}
