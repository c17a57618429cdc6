//! SQLite-backed session log.
//!
//! Provides persistent storage for:
//! - Finished and abandoned focus/break sessions (append-only)
//! - Timer settings
//! - Key-value store for application state

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::data_dir;
use super::migrations;
use super::store::SessionStore;
use crate::error::PersistenceError;
use crate::settings::Settings;
use crate::timer::{SessionRecord, SessionType};

const SETTINGS_KEY: &str = "settings";
const FOCUS_TOTAL_KEY: &str = "completed_focus_sessions";

/// SQLite database for session storage.
///
/// The connection sits behind a mutex: every operation acquires it for the
/// duration of one statement or transaction and releases it on all paths.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at `<data dir>/wellfocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Self::open_at(dir.join("wellfocus.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| PersistenceError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self::from_connection(conn, Some(path))?;
        debug!(path = ?db.path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, PersistenceError> {
        migrations::migrate(&conn).map_err(|e| PersistenceError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| PersistenceError::Unavailable("connection lock poisoned".into()))?;
        f(&mut conn)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }
}

type RawRow = (i64, String, String, i64, bool, String, String);

const SELECT_COLUMNS: &str =
    "SELECT seq, id, session_type, duration_secs, was_interrupted, intention, completed_at FROM focus_sessions";

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode((seq, id, session_type, duration_secs, was_interrupted, intention, completed_at): RawRow) -> Result<(i64, SessionRecord), PersistenceError> {
    let session_type = SessionType::parse(&session_type)
        .ok_or_else(|| PersistenceError::Corrupt(format!("row {seq}: unknown session type '{session_type}'")))?;
    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map_err(|e| PersistenceError::Corrupt(format!("row {seq}: bad timestamp: {e}")))?
        .with_timezone(&Utc);
    let duration_secs = u64::try_from(duration_secs)
        .map_err(|_| PersistenceError::Corrupt(format!("row {seq}: negative duration")))?;
    Ok((
        seq,
        SessionRecord {
            id,
            session_type,
            duration_secs,
            was_interrupted,
            intention,
            completed_at,
        },
    ))
}

impl SessionStore for Database {
    fn append(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let duration = i64::try_from(record.duration_secs)
            .map_err(|_| PersistenceError::QueryFailed("duration out of range".into()))?;
        self.with_conn(|conn| {
            // Dropping an uncommitted transaction rolls it back.
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO focus_sessions
                    (id, session_type, duration_secs, was_interrupted, intention, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.session_type.as_str(),
                    duration,
                    record.was_interrupted,
                    record.intention,
                    record.completed_at.to_rfc3339(),
                ],
            )?;
            tx.commit()?;
            if inserted == 0 {
                debug!(id = %record.id, "record already stored");
            } else {
                info!(
                    id = %record.id,
                    session_type = %record.session_type,
                    duration_secs = record.duration_secs,
                    was_interrupted = record.was_interrupted,
                    "session appended"
                );
            }
            Ok(())
        })
    }

    fn all(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq ASC"))?;
            let rows = stmt.query_map([], raw_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(decode(row?)?.1);
            }
            Ok(records)
        })
    }

    fn page_before(
        &self,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<(i64, SessionRecord)>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE seq < ?1 ORDER BY seq DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![before.unwrap_or(i64::MAX), limit], raw_row)?;
            let mut page = Vec::new();
            for row in rows {
                page.push(decode(row?)?);
            }
            Ok(page)
        })
    }

    fn count(&self) -> Result<usize, PersistenceError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM focus_sessions", [], |r| r.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        })
    }

    fn load_settings(&self) -> Result<Option<Settings>, PersistenceError> {
        match self.kv_get(SETTINGS_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt(format!("settings: {e}"))),
            None => Ok(None),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(settings)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        self.kv_set(SETTINGS_KEY, &json)
    }

    fn load_focus_total(&self) -> Result<Option<u64>, PersistenceError> {
        match self.kv_get(FOCUS_TOTAL_KEY)? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt(format!("{FOCUS_TOTAL_KEY}: {e}"))),
            None => Ok(None),
        }
    }

    fn save_focus_total(&self, total: u64) -> Result<(), PersistenceError> {
        self.kv_set(FOCUS_TOTAL_KEY, &total.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn record(id: &str, minutes: i64) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            session_type: SessionType::Focus,
            duration_secs: 1500,
            was_interrupted: false,
            intention: "read".into(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
                + TimeDelta::minutes(minutes),
        }
    }

    #[test]
    fn append_and_read_back_in_insertion_order() {
        let db = Database::open_memory().unwrap();
        db.append(&record("b", 30)).unwrap();
        db.append(&record("a", 0)).unwrap();
        let ids: Vec<_> = db.all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(db.all().unwrap()[0], record("b", 30));
    }

    #[test]
    fn duplicate_id_is_ignored() {
        let db = Database::open_memory().unwrap();
        db.append(&record("same", 0)).unwrap();
        db.append(&record("same", 5)).unwrap();
        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.all().unwrap()[0].completed_at, record("same", 0).completed_at);
    }

    #[test]
    fn list_recent_is_newest_first_and_lazy() {
        let db = Database::open_memory().unwrap();
        for i in 0..7 {
            db.append(&record(&format!("r{i}"), i)).unwrap();
        }
        let ids: Vec<_> = db
            .list_recent(5)
            .with_page_size(2)
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["r6", "r5", "r4", "r3", "r2"]);
    }

    #[test]
    fn list_recent_restarts_from_newest() {
        let db = Database::open_memory().unwrap();
        for i in 0..3 {
            db.append(&record(&format!("r{i}"), i)).unwrap();
        }
        let mut walk = db.list_recent(10);
        assert_eq!(walk.next().unwrap().unwrap().id, "r2");
        assert_eq!(walk.next().unwrap().unwrap().id, "r1");
        walk.restart();
        let ids: Vec<_> = walk.map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["r2", "r1", "r0"]);
    }

    #[test]
    fn settings_round_trip_through_kv() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_settings().unwrap().is_none());
        let settings = Settings {
            focus_duration: 50,
            ..Settings::default()
        };
        db.save_settings(&settings).unwrap();
        assert_eq!(db.load_settings().unwrap(), Some(settings));
    }

    #[test]
    fn focus_total_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("total.db");
        {
            let db = Database::open_at(&path).unwrap();
            assert_eq!(db.load_focus_total().unwrap(), None);
            db.save_focus_total(7).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.load_focus_total().unwrap(), Some(7));
    }

    #[test]
    fn garbled_focus_total_is_corrupt() {
        let db = Database::open_memory().unwrap();
        db.kv_set(FOCUS_TOTAL_KEY, "many").unwrap();
        assert!(matches!(db.load_focus_total(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn unknown_session_type_is_reported_as_corrupt() {
        let db = Database::open_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO focus_sessions (id, session_type, duration_secs, was_interrupted, intention, completed_at)
                 VALUES ('x', 'nap', 60, 0, '', '2024-05-06T09:00:00+00:00')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(db.all(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.append(&record("keep", 0)).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.all().unwrap(), vec![record("keep", 0)]);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }
}
