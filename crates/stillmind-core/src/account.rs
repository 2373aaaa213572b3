//! Account lifecycle flows: login, logout, identity migration and wipe.
//!
//! Authentication itself happens outside this crate; these flows take the
//! already-verified identity and reconcile the data stores around it. The
//! [`SessionContext`] is plain injected state owned by the composition
//! root, never read from a global.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::{DocTimestamp, RemoteStore, UserDoc};
use crate::storage::{Database, UserRecord};
use crate::sync::{SyncEngine, SyncMode, SyncStatusKind};

/// Marker `auth_uid` for the single pre-login local identity.
const ANONYMOUS_AUTH_UID: &str = "anonymous";

/// Current authentication state, injected into the service by its host.
///
/// Logout clears only the `logged_in` flag; the identity fields stay so the
/// local data remains attributable to its owner.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub logged_in: bool,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl SessionContext {
    pub fn login(
        &mut self,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        photo_url: impl Into<String>,
    ) {
        self.logged_in = true;
        self.user_id = Some(user_id.into());
        self.display_name = Some(display_name.into());
        self.email = Some(email.into());
        self.photo_url = Some(photo_url.into());
    }

    /// Clear the authenticated flag, preserving identity fields.
    pub fn logout(&mut self) {
        self.logged_in = false;
    }

    pub fn current_user(&self) -> Option<&str> {
        if self.logged_in {
            self.user_id.as_deref()
        } else {
            None
        }
    }
}

/// Drives the data-side effects of account transitions.
pub struct AccountManager {
    db: Arc<Mutex<Database>>,
    remote: Arc<dyn RemoteStore>,
    engine: Arc<SyncEngine>,
}

impl AccountManager {
    pub fn new(
        db: Arc<Mutex<Database>>,
        remote: Arc<dyn RemoteStore>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self { db, remote, engine }
    }

    /// Find or create the local pre-login identity. Sessions recorded
    /// before authentication attach to it and move over through
    /// [`AccountManager::migrate_identity`] on first login.
    pub fn ensure_local_identity(&self) -> Result<String> {
        let db = self.db.lock().unwrap();
        if let Some(user) = db.get_user_by_auth_uid(ANONYMOUS_AUTH_UID)? {
            return Ok(user.user_id);
        }
        let now = Utc::now().timestamp_millis();
        let user_id = format!("local_{}", uuid::Uuid::new_v4());
        db.upsert_user(&UserRecord {
            user_id: user_id.clone(),
            auth_uid: ANONYMOUS_AUTH_UID.to_string(),
            display_name: String::new(),
            email: String::new(),
            photo_url: String::new(),
            created_at: now,
            last_login: now,
        })?;
        Ok(user_id)
    }

    /// Persist the logged-in identity locally, mirror it to the remote and
    /// run a full sync pass. Returns whether the local user row was
    /// verified after the write.
    pub async fn handle_login(
        &self,
        user_id: &str,
        display_name: &str,
        email: &str,
        photo_url: &str,
    ) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let verified = {
            let db = self.db.lock().unwrap();
            let created_at = db
                .get_user(user_id)?
                .map(|u| u.created_at)
                .unwrap_or(now);
            db.upsert_user(&UserRecord {
                user_id: user_id.to_string(),
                auth_uid: user_id.to_string(),
                display_name: display_name.to_string(),
                email: email.to_string(),
                photo_url: photo_url.to_string(),
                created_at,
                last_login: now,
            })?;
            db.get_user(user_id)?.is_some()
        };

        let doc = UserDoc {
            user_id: user_id.to_string(),
            auth_uid: user_id.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            photo_url: photo_url.to_string(),
            created_at: DocTimestamp::from_millis(now),
            last_login: DocTimestamp::from_millis(now),
            ..UserDoc::default()
        };
        if let Err(e) = self.remote.save_user(&doc).await {
            warn!(user_id, error = %e, "user mirror to remote failed");
        }

        // Full pass so a fresh install pulls the whole history.
        let report = self.engine.run_pass(user_id, SyncMode::Full).await?;
        info!(
            user_id,
            sync_ok = report.success,
            sessions = report.synced_sessions,
            "login handled"
        );
        Ok(verified)
    }

    /// Run the final logout sync in the background. Authentication state is
    /// the caller's to clear first; this only flushes data and walks the
    /// tracker through LOGOUT_SYNC_IN_PROGRESS to LOGOUT_COMPLETE. Never
    /// blocks the caller on a slow remote.
    pub fn handle_logout(&self, user_id: &str) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let user = user_id.to_string();
        tokio::spawn(async move {
            let tracker = engine.tracker().clone();
            let pending = tracker.pending_count(&user);
            if let Err(e) = tracker
                .set_status(&user, SyncStatusKind::LogoutSyncInProgress, pending)
                .await
            {
                warn!(user_id = %user, error = %e, "logout status write failed");
            }

            match engine.reconcile(&user, SyncMode::Full).await {
                Ok(report) if report.success => {
                    info!(user_id = %user, sessions = report.synced_sessions,
                          "final logout sync complete");
                }
                Ok(report) => {
                    warn!(user_id = %user, error = ?report.error,
                          "final logout sync failed, local data kept");
                }
                Err(e) => {
                    warn!(user_id = %user, error = %e, "final logout sync errored");
                }
            }

            if let Err(e) = tracker
                .set_status(&user, SyncStatusKind::LogoutComplete, 0)
                .await
            {
                warn!(user_id = %user, error = %e, "logout status write failed");
            }
        })
    }

    /// Move all sessions from one owner to another, typically from an
    /// anonymous local identity to an authenticated one. Stale rollups for
    /// both owners are dropped and the new owner's recomputed. Returns the
    /// number of sessions moved.
    pub async fn migrate_identity(&self, old_owner: &str, new_uid: &str) -> Result<usize> {
        let moved = {
            let db = self.db.lock().unwrap();
            let moved = db.reassign_sessions(old_owner, new_uid)?;
            db.delete_statistics_for_owner(old_owner)?;
            db.delete_statistics_for_owner(new_uid)?;
            db.delete_sync_state(old_owner)?;
            db.delete_user(old_owner)?;
            moved
        };

        self.engine
            .aggregator()
            .refresh_current(new_uid, new_uid)
            .await?;

        info!(old_owner, new_uid, moved, "identity migrated");
        Ok(moved)
    }

    /// Remove every trace of a user, remote first so a failure there can be
    /// retried while the local copy still exists.
    pub async fn wipe_account(&self, user_id: &str) -> Result<()> {
        self.remote.delete_user_data(user_id).await?;

        let db = self.db.lock().unwrap();
        db.delete_sessions_for_owner(user_id)?;
        db.delete_statistics_for_owner(user_id)?;
        db.delete_sync_state(user_id)?;
        db.delete_user(user_id)?;
        info!(user_id, "account wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use crate::storage::SessionStatus;
    use crate::sync::SyncStatusTracker;

    const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

    fn manager_fixture() -> (AccountManager, Arc<Mutex<Database>>, Arc<MemoryRemoteStore>) {
        let db = Arc::new(Mutex::new(Database::open_memory().unwrap()));
        let remote = Arc::new(MemoryRemoteStore::new());
        let tracker = SyncStatusTracker::new(db.clone(), remote.clone());
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            remote.clone(),
            tracker,
            THIRTY_DAYS_MS,
        ));
        (AccountManager::new(db.clone(), remote.clone(), engine), db, remote)
    }

    #[tokio::test]
    async fn login_persists_user_and_pulls_history() {
        let (manager, db, remote) = manager_fixture();
        let now = Utc::now().timestamp_millis();
        remote
            .save_session(&crate::remote::SessionDoc::from_record(
                &crate::storage::SessionRecord {
                    session_id: 0,
                    owner_id: "u1".to_string(),
                    completion_timestamp: now,
                    work_duration: 60_000,
                    status: SessionStatus::Completed,
                },
            ))
            .await
            .unwrap();

        let verified = manager
            .handle_login("u1", "Ada", "ada@example.com", "")
            .await
            .unwrap();

        assert!(verified);
        let db = db.lock().unwrap();
        assert!(db.get_user("u1").unwrap().is_some());
        assert_eq!(db.sessions_for_owner("u1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_keeps_original_created_at() {
        let (manager, db, _remote) = manager_fixture();
        db.lock()
            .unwrap()
            .upsert_user(&UserRecord {
                user_id: "u1".to_string(),
                auth_uid: "u1".to_string(),
                display_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                photo_url: String::new(),
                created_at: 42,
                last_login: 42,
            })
            .unwrap();

        manager
            .handle_login("u1", "Ada L.", "ada@example.com", "")
            .await
            .unwrap();

        let user = db.lock().unwrap().get_user("u1").unwrap().unwrap();
        assert_eq!(user.created_at, 42);
        assert_eq!(user.display_name, "Ada L.");
    }

    #[tokio::test]
    async fn logout_flushes_and_walks_tracker_states() {
        let (manager, db, remote) = manager_fixture();
        let now = Utc::now().timestamp_millis();
        db.lock()
            .unwrap()
            .insert_session("u1", now, 60_000, SessionStatus::Completed)
            .unwrap();

        manager.handle_logout("u1").await.unwrap();

        assert_eq!(remote.session_count("u1"), 1);
        let state = db.lock().unwrap().get_sync_state("u1").unwrap().unwrap();
        assert_eq!(
            state.last_sync_status,
            SyncStatusKind::LogoutComplete.as_str()
        );
    }

    #[tokio::test]
    async fn logout_with_remote_down_keeps_local_data() {
        let (manager, db, remote) = manager_fixture();
        let now = Utc::now().timestamp_millis();
        db.lock()
            .unwrap()
            .insert_session("u1", now, 60_000, SessionStatus::Completed)
            .unwrap();
        remote.set_offline(true);

        manager.handle_logout("u1").await.unwrap();

        let db = db.lock().unwrap();
        assert_eq!(db.sessions_for_owner("u1").unwrap().len(), 1);
        let state = db.get_sync_state("u1").unwrap().unwrap();
        assert_eq!(
            state.last_sync_status,
            SyncStatusKind::LogoutComplete.as_str()
        );
    }

    #[tokio::test]
    async fn migrate_identity_moves_sessions_and_recomputes() {
        let (manager, db, _remote) = manager_fixture();
        let now = Utc::now().timestamp_millis();
        {
            let db = db.lock().unwrap();
            db.upsert_user(&UserRecord {
                user_id: "anon".to_string(),
                auth_uid: "anon".to_string(),
                display_name: String::new(),
                email: String::new(),
                photo_url: String::new(),
                created_at: now,
                last_login: now,
            })
            .unwrap();
            db.insert_session("anon", now, 60_000, SessionStatus::Completed)
                .unwrap();
            db.insert_session("anon", now - 1_000, 90_000, SessionStatus::Completed)
                .unwrap();
        }

        let moved = manager.migrate_identity("anon", "u1").await.unwrap();

        assert_eq!(moved, 2);
        let db = db.lock().unwrap();
        assert_eq!(db.sessions_for_owner("anon").unwrap().len(), 0);
        assert_eq!(db.sessions_for_owner("u1").unwrap().len(), 2);
        assert!(db.get_user("anon").unwrap().is_none());
        assert_eq!(db.statistics_for_user("u1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wipe_account_clears_both_stores() {
        let (manager, db, remote) = manager_fixture();
        let now = Utc::now().timestamp_millis();
        manager
            .handle_login("u1", "Ada", "ada@example.com", "")
            .await
            .unwrap();
        db.lock()
            .unwrap()
            .insert_session("u1", now, 60_000, SessionStatus::Completed)
            .unwrap();
        manager.engine.reconcile("u1", SyncMode::Full).await.unwrap();
        assert_eq!(remote.session_count("u1"), 1);

        manager.wipe_account("u1").await.unwrap();

        assert_eq!(remote.session_count("u1"), 0);
        let db = db.lock().unwrap();
        assert!(db.get_user("u1").unwrap().is_none());
        assert_eq!(db.sessions_for_owner("u1").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn ensure_local_identity_is_stable_across_calls() {
        let (manager, _db, _remote) = manager_fixture();
        let first = manager.ensure_local_identity().unwrap();
        let second = manager.ensure_local_identity().unwrap();
        assert!(first.starts_with("local_"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn anonymous_sessions_follow_the_first_login() {
        let (manager, db, _remote) = manager_fixture();
        let anon = manager.ensure_local_identity().unwrap();
        let now = Utc::now().timestamp_millis();
        db.lock()
            .unwrap()
            .insert_session(&anon, now, 60_000, SessionStatus::Completed)
            .unwrap();

        let moved = manager.migrate_identity(&anon, "u1").await.unwrap();

        assert_eq!(moved, 1);
        let db = db.lock().unwrap();
        assert!(db.get_user_by_auth_uid("anonymous").unwrap().is_none());
        assert_eq!(db.sessions_for_owner("u1").unwrap().len(), 1);
    }

    #[test]
    fn session_context_logout_preserves_identity() {
        let mut ctx = SessionContext::default();
        ctx.login("u1", "Ada", "ada@example.com", "");
        assert_eq!(ctx.current_user(), Some("u1"));

        ctx.logout();
        assert_eq!(ctx.current_user(), None);
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
        assert_eq!(ctx.display_name.as_deref(), Some("Ada"));
    }
}
