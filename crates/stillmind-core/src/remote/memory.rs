//! In-process [`RemoteStore`] backend.
//!
//! Backs the remote façade with plain maps so the sync engine can run
//! against a fully functional "remote" without a network. Used by the test
//! suite and by offline development; `set_offline(true)` makes every
//! operation fail the way an unreachable store would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::remote::documents::{DocTimestamp, SessionDoc, StatisticsDoc, SyncStatusDoc, UserDoc};
use crate::remote::store::RemoteStore;
use crate::sync::types::{SyncError, SyncStatusKind};

#[derive(Default)]
struct Collections {
    users: HashMap<String, UserDoc>,
    sessions: HashMap<String, SessionDoc>,
    statistics: HashMap<String, StatisticsDoc>,
    sync_status: HashMap<String, SyncStatusDoc>,
}

/// Map-backed remote store.
#[derive(Default)]
pub struct MemoryRemoteStore {
    inner: Mutex<Collections>,
    offline: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a network outage: all operations return
    /// [`SyncError::RemoteUnavailable`] until turned back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::RemoteUnavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Number of session documents held for a user.
    pub fn session_count(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn save_user(&self, user: &UserDoc) -> Result<(), SyncError> {
        self.check_online()?;
        self.inner
            .lock()
            .unwrap()
            .users
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>, SyncError> {
        self.check_online()?;
        Ok(self.inner.lock().unwrap().users.get(user_id).cloned())
    }

    async fn update_last_sync(&self, user_id: &str) -> Result<(), SyncError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(user_id) {
            let now = DocTimestamp::now();
            user.last_sync = now;
            user.last_login = now;
        }
        Ok(())
    }

    async fn save_session(&self, session: &SessionDoc) -> Result<(), SyncError> {
        self.check_online()?;
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn save_sessions_batch(&self, sessions: &[SessionDoc]) -> Result<(), SyncError> {
        // Single lock over the whole batch keeps it atomic.
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        for session in sessions {
            inner
                .sessions
                .insert(session.session_id.clone(), session.clone());
        }
        Ok(())
    }

    async fn get_sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionDoc>, SyncError> {
        self.check_online()?;
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<SessionDoc> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.completion_millis()));
        Ok(sessions)
    }

    async fn get_sessions_in_range(
        &self,
        user_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<SessionDoc>, SyncError> {
        let sessions = self.get_sessions_for_user(user_id).await?;
        Ok(sessions
            .into_iter()
            .filter(|s| {
                let ts = s.completion_millis();
                ts >= start_millis && ts <= end_millis
            })
            .collect())
    }

    async fn save_statistics(&self, stats: &StatisticsDoc) -> Result<(), SyncError> {
        self.check_online()?;
        self.inner
            .lock()
            .unwrap()
            .statistics
            .insert(stats.stat_id.clone(), stats.clone());
        Ok(())
    }

    async fn get_statistics_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<StatisticsDoc>, SyncError> {
        self.check_online()?;
        let inner = self.inner.lock().unwrap();
        let mut stats: Vec<StatisticsDoc> = inner
            .statistics
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        stats.sort_by_key(|s| std::cmp::Reverse(s.period_start.seconds));
        Ok(stats)
    }

    async fn update_sync_status(
        &self,
        user_id: &str,
        status: SyncStatusKind,
        pending_syncs: i64,
    ) -> Result<(), SyncError> {
        self.check_online()?;
        self.inner.lock().unwrap().sync_status.insert(
            user_id.to_string(),
            SyncStatusDoc {
                user_id: user_id.to_string(),
                last_sync_time: DocTimestamp::now(),
                last_sync_status: status.as_str().to_string(),
                pending_syncs,
                sync_version: 1,
            },
        );
        Ok(())
    }

    async fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatusDoc>, SyncError> {
        self.check_online()?;
        Ok(self.inner.lock().unwrap().sync_status.get(user_id).cloned())
    }

    async fn delete_user_data(&self, user_id: &str) -> Result<(), SyncError> {
        self.check_online()?;
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.retain(|_, s| s.user_id != user_id);
        inner.statistics.retain(|_, s| s.user_id != user_id);
        inner.sync_status.remove(user_id);
        Ok(())
    }
}
