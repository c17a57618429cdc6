//! The session log contract.
//!
//! The log is append-only: records are immutable once written and nothing in
//! this crate removes them. Insertion order is the source of truth; the
//! "most recent first" view is just that order reversed.

use std::collections::VecDeque;

use crate::error::PersistenceError;
use crate::settings::Settings;
use crate::timer::SessionRecord;

/// Rows fetched per round-trip by [`RecentSessions`].
const PAGE_SIZE: usize = 50;

/// Durable storage for session records and settings.
pub trait SessionStore: Send + Sync {
    /// Append one record. Returns only once the record is durable.
    ///
    /// Appending a record whose id is already stored succeeds without
    /// writing anything, so a retry can never duplicate history.
    fn append(&self, record: &SessionRecord) -> Result<(), PersistenceError>;

    /// Every record, in insertion order.
    fn all(&self) -> Result<Vec<SessionRecord>, PersistenceError>;

    /// Up to `limit` records inserted before position `before` (or the
    /// newest ones when `None`), newest first, each with its position.
    fn page_before(
        &self,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<(i64, SessionRecord)>, PersistenceError>;

    fn count(&self) -> Result<usize, PersistenceError>;

    fn load_settings(&self) -> Result<Option<Settings>, PersistenceError>;

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError>;

    /// Lifetime count of focus phases finished naturally or by skip.
    /// `None` until first saved.
    fn load_focus_total(&self) -> Result<Option<u64>, PersistenceError>;

    fn save_focus_total(&self, total: u64) -> Result<(), PersistenceError>;

    /// The newest `limit` records, most recent first, fetched lazily.
    fn list_recent(&self, limit: usize) -> RecentSessions<'_, Self>
    where
        Self: Sized,
    {
        RecentSessions::new(self, limit)
    }
}

/// Lazy, restartable most-recent-first walk over a [`SessionStore`].
///
/// Pages are fetched on demand; a failed fetch is yielded once as an `Err`
/// and ends the walk. [`RecentSessions::restart`] rewinds to the newest record.
pub struct RecentSessions<'a, S: SessionStore + ?Sized> {
    store: &'a S,
    limit: usize,
    page_size: usize,
    cursor: Option<i64>,
    yielded: usize,
    buffer: VecDeque<(i64, SessionRecord)>,
    exhausted: bool,
}

impl<'a, S: SessionStore + ?Sized> RecentSessions<'a, S> {
    pub fn new(store: &'a S, limit: usize) -> Self {
        Self {
            store,
            limit,
            page_size: PAGE_SIZE,
            cursor: None,
            yielded: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn restart(&mut self) {
        self.cursor = None;
        self.yielded = 0;
        self.buffer.clear();
        self.exhausted = false;
    }
}

impl<S: SessionStore + ?Sized> Iterator for RecentSessions<'_, S> {
    type Item = Result<SessionRecord, PersistenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.limit {
            return None;
        }
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            let want = self.page_size.min(self.limit - self.yielded);
            match self.store.page_before(self.cursor, want) {
                Ok(page) => {
                    if page.len() < want {
                        self.exhausted = true;
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        let (seq, record) = self.buffer.pop_front()?;
        self.cursor = Some(seq);
        self.yielded += 1;
        Some(Ok(record))
    }
}
