//! HTTP client for the focus API.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::stats::Stats;
use crate::sync::types::SyncError;
use crate::timer::SessionRecord;

const SESSIONS_PATH: &str = "api/focus/sessions";
const STATS_PATH: &str = "api/focus/stats";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The sessions listing comes back either bare or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum SessionsPayload {
    Bare(Vec<SessionRecord>),
    Wrapped { sessions: Vec<SessionRecord> },
}

/// Focus API client.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RemoteClient {
    /// Create a client for the API rooted at `base_url`. An empty token
    /// sends unauthenticated requests.
    pub fn new(base_url: &str, token: &str) -> Result<Self, SyncError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let token = (!token.is_empty()).then(|| token.to_string());
        Ok(Self { http, base, token })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Upload one finished record.
    pub async fn push_session(&self, record: &SessionRecord) -> Result<(), SyncError> {
        let url = self.endpoint(SESSIONS_PATH)?;
        let resp = self.authorize(self.http.post(url)).json(record).send().await?;
        Self::check(resp).await?;
        tracing::debug!(id = %record.id, "pushed session");
        Ok(())
    }

    /// Most recent remote records, newest first.
    pub async fn fetch_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, SyncError> {
        let mut url = self.endpoint(SESSIONS_PATH)?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self.authorize(self.http.get(url)).send().await?;
        let payload: SessionsPayload = Self::check(resp).await?.json().await?;
        Ok(match payload {
            SessionsPayload::Bare(records) | SessionsPayload::Wrapped { sessions: records } => records,
        })
    }

    /// Aggregates as computed by the remote.
    pub async fn fetch_stats(&self) -> Result<Stats, SyncError> {
        let url = self.endpoint(STATS_PATH)?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SessionType;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            session_type: SessionType::Focus,
            duration_secs: 1500,
            was_interrupted: false,
            intention: "write".into(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 25, 0).unwrap(),
        }
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = RemoteClient::new("https://api.example.com/v2", "").unwrap();
        assert_eq!(
            client.endpoint(SESSIONS_PATH).unwrap().as_str(),
            "https://api.example.com/v2/api/focus/sessions"
        );
    }

    #[test]
    fn rejects_relative_base() {
        assert!(matches!(
            RemoteClient::new("not a url", ""),
            Err(SyncError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn push_sends_bearer_and_camel_case_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/focus/sessions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": "r1",
                "type": "focus",
                "durationSeconds": 1500,
                "wasInterrupted": false,
            })))
            .with_status(201)
            .create_async()
            .await;

        let client = RemoteClient::new(&server.url(), "secret").unwrap();
        client.push_session(&record("r1")).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_maps_to_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/focus/sessions")
            .with_status(500)
            .with_body("db down")
            .create_async()
            .await;

        let client = RemoteClient::new(&server.url(), "").unwrap();
        let err = client.push_session(&record("r1")).await.unwrap_err();
        match err {
            SyncError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "db down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_distinct() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/focus/stats")
            .with_status(401)
            .create_async()
            .await;

        let client = RemoteClient::new(&server.url(), "expired").unwrap();
        assert!(matches!(client.fetch_stats().await, Err(SyncError::Unauthorized)));
    }

    #[tokio::test]
    async fn fetch_sessions_accepts_wrapped_payload() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({ "sessions": [record("a"), record("b")] });
        let mock = server
            .mock("GET", "/api/focus/sessions")
            .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = RemoteClient::new(&server.url(), "").unwrap();
        let records = client.fetch_sessions(5).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_stats_decodes_camel_case() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/focus/stats")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"todaySessions":4,"todayMinutes":100,"completedSessions":3,"currentStreak":7}"#,
            )
            .create_async()
            .await;

        let client = RemoteClient::new(&server.url(), "").unwrap();
        let stats = client.fetch_stats().await.unwrap();
        assert_eq!(stats.today_minutes, 100);
        assert_eq!(stats.current_streak, 7);
    }
}
