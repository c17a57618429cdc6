//! Queue plus client: the piece the controller and CLI talk to.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::storage::{SessionStore, SyncConfig};
use crate::sync::client::RemoteClient;
use crate::sync::queue::SyncQueue;
use crate::sync::types::{SyncError, SyncReport, SyncStatus};
use crate::timer::SessionRecord;

struct Inner {
    queue: SyncQueue,
    last_flush_at: Option<DateTime<Utc>>,
}

pub struct SyncAdapter {
    client: RemoteClient,
    batch_size: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl SyncAdapter {
    pub fn new(client: RemoteClient, queue: SyncQueue, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            clock: Arc::new(SystemClock),
            inner: Mutex::new(Inner {
                queue,
                last_flush_at: None,
            }),
        }
    }

    /// Build from configuration with the default queue file. Fails with
    /// [`SyncError::NotConfigured`] when sync is disabled or has no URL.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::from_config_with_queue(config, SyncQueue::open()?)
    }

    pub fn from_config_with_queue(config: &SyncConfig, queue: SyncQueue) -> Result<Self, SyncError> {
        if !config.enabled || config.base_url.trim().is_empty() {
            return Err(SyncError::NotConfigured);
        }
        let client = RemoteClient::new(config.base_url.trim(), &config.token)?;
        Ok(Self::new(client, queue, config.batch_size as usize))
    }

    /// Clock used to stamp flushes. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// Queue a finished record for upload and persist the queue.
    pub async fn enqueue(&self, record: SessionRecord) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().await;
        if inner.queue.enqueue(record) {
            inner.queue.persist()?;
        }
        Ok(())
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn status(&self) -> SyncStatus {
        let inner = self.inner.lock().await;
        SyncStatus {
            enabled: true,
            base_url: Some(self.client.base_url().to_string()),
            pending_count: inner.queue.len(),
            last_flush_at: inner.last_flush_at,
        }
    }

    /// Push up to one batch. Accepted records leave the queue; failed ones
    /// stay for the next flush.
    pub async fn flush(&self) -> Result<SyncReport, SyncError> {
        let mut inner = self.inner.lock().await;
        let batch = inner.queue.peek(self.batch_size);
        let mut report = SyncReport::default();
        let mut pushed_ids = Vec::with_capacity(batch.len());

        for record in &batch {
            match self.client.push_session(record).await {
                Ok(()) => pushed_ids.push(record.id.clone()),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "sync push failed");
                    report.errors.push(format!("{}: {e}", record.id));
                    report.failed += 1;
                    // Credentials will not get better within this batch.
                    if matches!(e, SyncError::Unauthorized) {
                        report.failed = batch.len() - pushed_ids.len();
                        break;
                    }
                }
            }
        }

        report.pushed = pushed_ids.len();
        inner.queue.remove(&pushed_ids);
        inner.queue.persist()?;
        inner.last_flush_at = Some(self.clock.now());
        report.remaining = inner.queue.len();
        tracing::info!(pushed = report.pushed, failed = report.failed, remaining = report.remaining, "sync flush");
        Ok(report)
    }

    /// Pull up to `limit` remote records and append the ones the local log
    /// does not have. Returns how many were added.
    pub async fn restore<S>(&self, store: &S, limit: usize) -> Result<usize, SyncError>
    where
        S: SessionStore + ?Sized,
    {
        let mut remote = self.client.fetch_sessions(limit).await?;
        // Oldest first so local order follows completion order.
        remote.sort_by_key(|r| r.completed_at);
        let before = store.count()?;
        for record in &remote {
            store.append(record)?;
        }
        let added = store.count()?.saturating_sub(before);
        tracing::info!(fetched = remote.len(), added, "sync restore");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use crate::timer::SessionType;
    use chrono::TimeZone;

    fn record(id: &str, minute: u32) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            session_type: SessionType::Focus,
            duration_secs: 1500,
            was_interrupted: false,
            intention: String::new(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, 6, 10, minute, 0).unwrap(),
        }
    }

    fn config(url: &str) -> SyncConfig {
        SyncConfig {
            enabled: true,
            base_url: url.into(),
            token: "t".into(),
            batch_size: 2,
        }
    }

    #[test]
    fn disabled_config_is_not_configured() {
        let mut cfg = config("http://localhost");
        cfg.enabled = false;
        assert!(matches!(
            SyncAdapter::from_config_with_queue(&cfg, SyncQueue::in_memory()),
            Err(SyncError::NotConfigured)
        ));
        let cfg = config("  ");
        assert!(matches!(
            SyncAdapter::from_config_with_queue(&cfg, SyncQueue::in_memory()),
            Err(SyncError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn flush_pushes_one_batch_and_keeps_the_rest() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/focus/sessions")
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let adapter =
            SyncAdapter::from_config_with_queue(&config(&server.url()), SyncQueue::in_memory()).unwrap();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            adapter.enqueue(record(id, i as u32)).await.unwrap();
        }
        adapter.enqueue(record("a", 0)).await.unwrap();

        let report = adapter.flush().await.unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(report.remaining, 1);
        assert!(report.is_clean());
        mock.assert_async().await;
        assert!(adapter.status().await.last_flush_at.is_some());
    }

    #[tokio::test]
    async fn flush_is_stamped_by_the_given_clock() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/focus/sessions")
            .with_status(201)
            .create_async()
            .await;

        let at = Utc.with_ymd_and_hms(2031, 1, 2, 3, 4, 5).unwrap();
        let clock = ManualClock::new(at);
        let adapter = SyncAdapter::from_config_with_queue(&config(&server.url()), SyncQueue::in_memory())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        adapter.enqueue(record("a", 0)).await.unwrap();
        adapter.flush().await.unwrap();
        assert_eq!(adapter.status().await.last_flush_at, Some(at));

        clock.advance_secs(90);
        adapter.flush().await.unwrap();
        assert_eq!(adapter.status().await.last_flush_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn failed_pushes_stay_queued() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/focus/sessions")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_queue.json");
        let adapter = SyncAdapter::from_config_with_queue(
            &config(&server.url()),
            SyncQueue::open_at(&path).unwrap(),
        )
        .unwrap();
        adapter.enqueue(record("a", 0)).await.unwrap();

        let report = adapter.flush().await.unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(SyncQueue::open_at(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_stops_the_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/focus/sessions")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let adapter =
            SyncAdapter::from_config_with_queue(&config(&server.url()), SyncQueue::in_memory()).unwrap();
        adapter.enqueue(record("a", 0)).await.unwrap();
        adapter.enqueue(record("b", 1)).await.unwrap();

        let report = adapter.flush().await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.remaining, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn restore_appends_only_unknown_records() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::to_string(&vec![record("new", 5), record("known", 1)]).unwrap();
        server
            .mock("GET", "/api/focus/sessions")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let store = MemoryStore::with_records(vec![record("known", 1)]);
        let adapter =
            SyncAdapter::from_config_with_queue(&config(&server.url()), SyncQueue::in_memory()).unwrap();

        assert_eq!(adapter.restore(&store, 50).await.unwrap(), 1);
        assert_eq!(adapter.restore(&store, 50).await.unwrap(), 0);
        assert_eq!(store.count().unwrap(), 2);
    }
}
