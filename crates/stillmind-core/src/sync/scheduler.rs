//! Background scheduling of sync work.
//!
//! Per-user state machine: {Unscheduled} -> schedule_periodic_sync ->
//! {Periodic}, or run_one_shot_sync -> {OneShot}; cancel_sync drives any
//! state back to {Unscheduled}. Scheduling a user again replaces the prior
//! instance (unique-named work), which serializes concurrent triggers for
//! the same user.
//!
//! The scheduler owns retry timing: a failed pass reports
//! [`JobOutcome::Retry`] and the periodic loop simply runs again on its
//! next tick. The engine itself never backs off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::sync::engine::SyncEngine;
use crate::sync::types::SyncMode;

/// Host-supplied execution constraints, the equivalent of the platform's
/// network/battery work constraints.
pub trait Connectivity: Send + Sync {
    fn network_available(&self) -> bool;
    fn battery_low(&self) -> bool;
}

/// Constraint source that always permits work. Useful for tests and for
/// hosts without battery or connectivity signals.
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn network_available(&self) -> bool {
        true
    }
    fn battery_low(&self) -> bool {
        false
    }
}

/// Scheduling state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Unscheduled,
    Periodic,
    OneShot,
}

/// Signal returned to the scheduling host after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// The pass failed; the host should run it again later.
    Retry,
}

struct Job {
    state: ScheduleState,
    abort: AbortHandle,
}

/// Schedules periodic and one-shot sync passes per user.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    connectivity: Arc<dyn Connectivity>,
    period: Duration,
    jobs: Mutex<HashMap<String, Job>>,
}

impl SyncScheduler {
    /// `interval` is the periodic cadence, `slack` the flexible window the
    /// host may shift each run by; the loop ticks at `interval + slack`.
    pub fn new(
        engine: Arc<SyncEngine>,
        connectivity: Arc<dyn Connectivity>,
        interval: Duration,
        slack: Duration,
    ) -> Self {
        Self {
            engine,
            connectivity,
            period: interval + slack,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Current scheduling state for a user. A job whose task has already
    /// finished counts as unscheduled, whether or not its map entry has
    /// been reaped yet.
    pub fn state(&self, user_id: &str) -> ScheduleState {
        self.jobs
            .lock()
            .unwrap()
            .get(user_id)
            .filter(|j| !j.abort.is_finished())
            .map(|j| j.state)
            .unwrap_or(ScheduleState::Unscheduled)
    }

    /// Schedule periodic background sync for a user, replacing any prior
    /// scheduled work for the same user.
    pub fn schedule_periodic_sync(&self, user_id: &str) {
        let engine = self.engine.clone();
        let connectivity = self.connectivity.clone();
        let period = self.period;
        let user = user_id.to_string();

        let handle: JoinHandle<()> = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; skip it so the first pass runs
            // one full period after scheduling.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !connectivity.network_available() || connectivity.battery_low() {
                    debug!(user_id = %user, "periodic sync skipped, constraints not met");
                    continue;
                }
                match execute_pass(&engine, &user, SyncMode::Windowed).await {
                    JobOutcome::Success => {}
                    JobOutcome::Retry => {
                        debug!(user_id = %user, "periodic sync will retry on next tick");
                    }
                }
            }
        });

        self.register(user_id, ScheduleState::Periodic, handle.abort_handle());
        info!(user_id, "periodic sync scheduled");
    }

    /// Run a single sync pass in the background (network constraint only).
    /// `immediate` selects a full-history pass instead of the windowed one.
    ///
    /// The returned handle resolves to the pass outcome; the host decides
    /// whether and when to retry on [`JobOutcome::Retry`].
    ///
    /// A finished one-shot reads as unscheduled through [`Self::state`];
    /// its map entry is dropped on the next schedule or cancel for the
    /// same user.
    pub fn run_one_shot_sync(&self, user_id: &str, immediate: bool) -> JoinHandle<JobOutcome> {
        let engine = self.engine.clone();
        let connectivity = self.connectivity.clone();
        let user = user_id.to_string();

        let handle = tokio::spawn(async move {
            if !connectivity.network_available() {
                return JobOutcome::Retry;
            }
            let mode = if immediate {
                SyncMode::Full
            } else {
                SyncMode::Windowed
            };
            execute_pass(&engine, &user, mode).await
        });

        self.register(user_id, ScheduleState::OneShot, handle.abort_handle());
        handle
    }

    /// Cancel any scheduled or in-flight sync for a user. Called on logout;
    /// an aborted pass leaves local data intact and converges on the next
    /// reconciliation.
    pub fn cancel_sync(&self, user_id: &str) {
        if let Some(job) = self.jobs.lock().unwrap().remove(user_id) {
            job.abort.abort();
            info!(user_id, "sync cancelled");
        }
    }

    fn register(&self, user_id: &str, state: ScheduleState, abort: AbortHandle) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.insert(user_id.to_string(), Job { state, abort }) {
            old.abort.abort();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for job in self.jobs.lock().unwrap().values() {
            job.abort.abort();
        }
    }
}

async fn execute_pass(engine: &SyncEngine, user_id: &str, mode: SyncMode) -> JobOutcome {
    match engine.run_pass(user_id, mode).await {
        Ok(report) if report.success => JobOutcome::Success,
        Ok(report) => {
            debug!(user_id, error = ?report.error, "sync pass failed");
            JobOutcome::Retry
        }
        Err(e) => {
            error!(user_id, error = %e, "sync pass hit local store failure");
            JobOutcome::Retry
        }
    }
}
