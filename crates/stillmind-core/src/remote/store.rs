//! Remote document store client.
//!
//! [`RemoteStore`] is the typed façade over the network-accessible document
//! store. [`HttpRemoteStore`] talks to the real service over a document REST
//! API: per-document GET/PATCH with merge semantics, owner-scoped query
//! endpoints, and a `:batch` commit endpoint that applies a set of writes
//! atomically. Every operation returns a typed result; a network failure is
//! an error value, never a silent no-op.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::remote::documents::{DocTimestamp, SessionDoc, StatisticsDoc, SyncStatusDoc, UserDoc};
use crate::sync::types::{SyncError, SyncStatusKind};

/// Typed façade over the remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn save_user(&self, user: &UserDoc) -> Result<(), SyncError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>, SyncError>;
    /// Touch the user's last_sync and last_login markers.
    async fn update_last_sync(&self, user_id: &str) -> Result<(), SyncError>;

    /// Upsert a single session document. Merge semantics: fields absent
    /// from the payload are left untouched on the server.
    async fn save_session(&self, session: &SessionDoc) -> Result<(), SyncError>;
    /// Atomic batch upsert: all sessions are committed or none are.
    async fn save_sessions_batch(&self, sessions: &[SessionDoc]) -> Result<(), SyncError>;
    async fn get_sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionDoc>, SyncError>;
    async fn get_sessions_in_range(
        &self,
        user_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<SessionDoc>, SyncError>;

    async fn save_statistics(&self, stats: &StatisticsDoc) -> Result<(), SyncError>;
    async fn get_statistics_for_user(&self, user_id: &str)
        -> Result<Vec<StatisticsDoc>, SyncError>;

    async fn update_sync_status(
        &self,
        user_id: &str,
        status: SyncStatusKind,
        pending_syncs: i64,
    ) -> Result<(), SyncError>;
    async fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatusDoc>, SyncError>;

    /// Batch-delete all sessions, statistics and sync-status documents for
    /// a user. Account wipe only; normal logout never calls this.
    async fn delete_user_data(&self, user_id: &str) -> Result<(), SyncError>;
}

/// HTTP implementation of [`RemoteStore`].
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Create a client for the store at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn patch_doc<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), SyncError> {
        let resp = self
            .client
            .patch(self.url(path))
            .json(body)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn get_doc<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SyncError> {
        let resp = self.client.get(self.url(path)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        Ok(Some(resp.json::<T>().await?))
    }

    async fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, SyncError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = check_status(resp).await?;
        Ok(resp.json::<Vec<T>>().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(SyncError::RemoteApi {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn save_user(&self, user: &UserDoc) -> Result<(), SyncError> {
        self.patch_doc(&format!("users/{}", user.user_id), user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>, SyncError> {
        self.get_doc(&format!("users/{user_id}")).await
    }

    async fn update_last_sync(&self, user_id: &str) -> Result<(), SyncError> {
        let now = DocTimestamp::now();
        self.patch_doc(
            &format!("users/{user_id}"),
            &json!({ "last_sync": now, "last_login": now }),
        )
        .await
    }

    async fn save_session(&self, session: &SessionDoc) -> Result<(), SyncError> {
        self.patch_doc(&format!("sessions/{}", session.session_id), session)
            .await
    }

    async fn save_sessions_batch(&self, sessions: &[SessionDoc]) -> Result<(), SyncError> {
        if sessions.is_empty() {
            return Ok(());
        }
        let writes: Vec<serde_json::Value> = sessions
            .iter()
            .map(|s| json!({ "collection": "sessions", "id": s.session_id, "doc": s }))
            .collect();
        let resp = self
            .client
            .post(self.url("batch"))
            .json(&json!({ "writes": writes }))
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn get_sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionDoc>, SyncError> {
        self.get_list("sessions", &[("user_id", user_id.to_string())])
            .await
    }

    async fn get_sessions_in_range(
        &self,
        user_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<SessionDoc>, SyncError> {
        let start = DocTimestamp::from_millis(start_millis);
        let end = DocTimestamp::from_millis(end_millis);
        self.get_list(
            "sessions",
            &[
                ("user_id", user_id.to_string()),
                ("start_seconds", start.seconds.to_string()),
                ("start_nanos", start.nanos.to_string()),
                ("end_seconds", end.seconds.to_string()),
                ("end_nanos", end.nanos.to_string()),
            ],
        )
        .await
    }

    async fn save_statistics(&self, stats: &StatisticsDoc) -> Result<(), SyncError> {
        self.patch_doc(&format!("statistics/{}", stats.stat_id), stats)
            .await
    }

    async fn get_statistics_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<StatisticsDoc>, SyncError> {
        self.get_list("statistics", &[("user_id", user_id.to_string())])
            .await
    }

    async fn update_sync_status(
        &self,
        user_id: &str,
        status: SyncStatusKind,
        pending_syncs: i64,
    ) -> Result<(), SyncError> {
        let doc = SyncStatusDoc {
            user_id: user_id.to_string(),
            last_sync_time: DocTimestamp::now(),
            last_sync_status: status.as_str().to_string(),
            pending_syncs,
            sync_version: 1,
        };
        self.patch_doc(&format!("sync_status/{user_id}"), &doc).await
    }

    async fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatusDoc>, SyncError> {
        self.get_doc(&format!("sync_status/{user_id}")).await
    }

    async fn delete_user_data(&self, user_id: &str) -> Result<(), SyncError> {
        let resp = self
            .client
            .delete(self.url(&format!("users/{user_id}/data")))
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }
}
