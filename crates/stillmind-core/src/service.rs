//! The composition root wiring storage, remote client, reconciliation,
//! statistics and scheduling into one service surface.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::account::{AccountManager, SessionContext};
use crate::error::Result;
use crate::remote::{RemoteStore, SessionDoc};
use crate::stats::today_range;
use crate::storage::{
    Database, SessionRecord, SessionStatus, StatisticsRecord, SyncConfig,
};
use crate::sync::{
    Connectivity, JobOutcome, SyncEngine, SyncMode, SyncReport, SyncScheduler,
    SyncStatusTracker,
};

/// One service instance per local database. All remote traffic flows
/// through the injected [`RemoteStore`].
pub struct SyncService {
    db: Arc<Mutex<Database>>,
    remote: Arc<dyn RemoteStore>,
    engine: Arc<SyncEngine>,
    scheduler: Arc<SyncScheduler>,
    account: AccountManager,
    context: Mutex<SessionContext>,
    // One reconcile pass in flight per user.
    in_flight: Mutex<HashSet<String>>,
}

impl SyncService {
    pub fn new(
        db: Database,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
        config: &SyncConfig,
    ) -> Self {
        let db = Arc::new(Mutex::new(db));
        let tracker = SyncStatusTracker::new(db.clone(), remote.clone());
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            remote.clone(),
            tracker,
            config.lookback_millis(),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            engine.clone(),
            connectivity,
            Duration::from_secs(config.sync_interval_min * 60),
            Duration::from_secs(config.sync_slack_min * 60),
        ));
        let account = AccountManager::new(db.clone(), remote.clone(), engine.clone());
        Self {
            db,
            remote,
            engine,
            scheduler,
            account,
            context: Mutex::new(SessionContext::default()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn account(&self) -> &AccountManager {
        &self.account
    }

    pub fn context(&self) -> SessionContext {
        self.context.lock().unwrap().clone()
    }

    /// Record a finished focus interval: local write first, then a
    /// best-effort remote save, then refreshed day and week rollups. A
    /// remote failure only bumps the pending counter.
    pub async fn record_session(
        &self,
        user_id: &str,
        work_duration: i64,
        status: SessionStatus,
        goal: Option<&str>,
    ) -> Result<SessionRecord> {
        let now = Utc::now().timestamp_millis();
        let session_id = {
            let db = self.db.lock().unwrap();
            db.insert_session(user_id, now, work_duration, status)?
        };
        let record = SessionRecord {
            session_id,
            owner_id: user_id.to_string(),
            completion_timestamp: now,
            work_duration,
            status,
        };

        let mut doc = SessionDoc::from_record(&record);
        if let Some(goal) = goal {
            doc.goal_name = goal.to_string();
        }
        if let Err(e) = self.remote.save_session(&doc).await {
            warn!(user_id, error = %e, "session save to remote failed");
            self.engine.tracker().bump_pending(user_id)?;
        }

        self.engine.aggregator().refresh_current(user_id, user_id).await?;
        Ok(record)
    }

    /// Run a full sync pass now. A second trigger while one is already
    /// running for the same user is refused with a failed report rather
    /// than queued.
    pub async fn trigger_immediate_sync(&self, user_id: &str) -> Result<SyncReport> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(user_id.to_string()) {
                return Ok(SyncReport {
                    success: false,
                    error: Some("sync already in progress".to_string()),
                    ..SyncReport::default()
                });
            }
        }
        let result = self.engine.run_pass(user_id, SyncMode::Full).await;
        self.in_flight.lock().unwrap().remove(user_id);
        result
    }

    pub async fn get_sync_status(&self, user_id: &str) -> String {
        self.engine.tracker().status_string(user_id).await
    }

    pub fn schedule_periodic_sync(&self, user_id: &str) {
        self.scheduler.schedule_periodic_sync(user_id);
    }

    pub fn cancel_sync(&self, user_id: &str) {
        self.scheduler.cancel_sync(user_id);
    }

    pub async fn run_one_shot_sync(&self, user_id: &str, immediate: bool) -> JobOutcome {
        match self.scheduler.run_one_shot_sync(user_id, immediate).await {
            Ok(outcome) => outcome,
            Err(_) => JobOutcome::Retry,
        }
    }

    /// Log a verified identity in: persist it, pull history, start the
    /// periodic schedule.
    pub async fn login(
        &self,
        user_id: &str,
        display_name: &str,
        email: &str,
        photo_url: &str,
    ) -> Result<bool> {
        let verified = self
            .account
            .handle_login(user_id, display_name, email, photo_url)
            .await?;
        self.context
            .lock()
            .unwrap()
            .login(user_id, display_name, email, photo_url);
        self.scheduler.schedule_periodic_sync(user_id);
        Ok(verified)
    }

    /// Log out: clear the authenticated flag and scheduled work first, then
    /// flush remaining data in the background. Returns the handle of the
    /// background flush.
    pub fn logout(&self) -> Option<tokio::task::JoinHandle<()>> {
        let user_id = {
            let mut ctx = self.context.lock().unwrap();
            let user = ctx.current_user().map(str::to_string);
            ctx.logout();
            user
        }?;
        self.scheduler.cancel_sync(&user_id);
        Some(self.account.handle_logout(&user_id))
    }

    /// Recompute the current day and week rollups without a sync pass.
    pub async fn refresh_statistics(&self, user_id: &str) -> Result<usize> {
        self.engine.aggregator().refresh_current(user_id, user_id).await
    }

    pub fn sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        Ok(self.db.lock().unwrap().sessions_for_owner(user_id)?)
    }

    pub fn sessions_today(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let (start, end) = today_range();
        Ok(self.db.lock().unwrap().sessions_in_range(user_id, start, end)?)
    }

    pub fn statistics(&self, user_id: &str) -> Result<Vec<StatisticsRecord>> {
        Ok(self.db.lock().unwrap().statistics_for_user(user_id)?)
    }

    pub fn session_count(&self, user_id: &str) -> Result<i64> {
        Ok(self.db.lock().unwrap().session_count(user_id)?)
    }
}
