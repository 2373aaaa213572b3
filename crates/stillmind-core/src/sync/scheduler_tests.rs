use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::remote::MemoryRemoteStore;
use crate::storage::{Database, SessionStatus};
use crate::sync::engine::SyncEngine;
use crate::sync::scheduler::{
    AlwaysConnected, Connectivity, JobOutcome, ScheduleState, SyncScheduler,
};
use crate::sync::status::SyncStatusTracker;

const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

struct ToggleConnectivity {
    online: AtomicBool,
    battery_low: AtomicBool,
}

impl ToggleConnectivity {
    fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            battery_low: AtomicBool::new(false),
        }
    }
}

impl Connectivity for ToggleConnectivity {
    fn network_available(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
    fn battery_low(&self) -> bool {
        self.battery_low.load(Ordering::SeqCst)
    }
}

fn scheduler_fixture(
    connectivity: Arc<dyn Connectivity>,
    interval: Duration,
) -> (Arc<SyncScheduler>, Arc<Mutex<Database>>, Arc<MemoryRemoteStore>) {
    let db = Arc::new(Mutex::new(Database::open_memory().unwrap()));
    let remote = Arc::new(MemoryRemoteStore::new());
    let tracker = SyncStatusTracker::new(db.clone(), remote.clone());
    let engine = Arc::new(SyncEngine::new(
        db.clone(),
        remote.clone(),
        tracker,
        THIRTY_DAYS_MS,
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        engine,
        connectivity,
        interval,
        Duration::ZERO,
    ));
    (scheduler, db, remote)
}

#[tokio::test(start_paused = true)]
async fn periodic_sync_runs_on_cadence() {
    let (scheduler, db, remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(60));
    let now = Utc::now().timestamp_millis();
    db.lock()
        .unwrap()
        .insert_session("u1", now, 60_000, SessionStatus::Completed)
        .unwrap();

    scheduler.schedule_periodic_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Periodic);
    assert_eq!(remote.session_count("u1"), 0);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(remote.session_count("u1"), 1);
    // Still periodic after a pass.
    assert_eq!(scheduler.state("u1"), ScheduleState::Periodic);
}

#[tokio::test(start_paused = true)]
async fn periodic_sync_waits_for_constraints() {
    let connectivity = Arc::new(ToggleConnectivity::new());
    connectivity.battery_low.store(true, Ordering::SeqCst);
    let (scheduler, db, remote) =
        scheduler_fixture(connectivity.clone(), Duration::from_secs(60));
    let now = Utc::now().timestamp_millis();
    db.lock()
        .unwrap()
        .insert_session("u1", now, 60_000, SessionStatus::Completed)
        .unwrap();

    scheduler.schedule_periodic_sync("u1");
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(remote.session_count("u1"), 0);

    connectivity.battery_low.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.session_count("u1"), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_periodic_sync() {
    let (scheduler, db, remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(60));
    let now = Utc::now().timestamp_millis();
    db.lock()
        .unwrap()
        .insert_session("u1", now, 60_000, SessionStatus::Completed)
        .unwrap();

    scheduler.schedule_periodic_sync("u1");
    scheduler.cancel_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Unscheduled);

    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(remote.session_count("u1"), 0);
}

#[tokio::test]
async fn one_shot_sync_reports_outcome_and_clears_state() {
    let (scheduler, db, remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(3600));
    let now = Utc::now().timestamp_millis();
    db.lock()
        .unwrap()
        .insert_session("u1", now, 60_000, SessionStatus::Completed)
        .unwrap();

    let outcome = scheduler.run_one_shot_sync("u1", true).await.unwrap();

    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(remote.session_count("u1"), 1);
    assert_eq!(scheduler.state("u1"), ScheduleState::Unscheduled);
}

#[tokio::test]
async fn one_shot_without_network_signals_retry() {
    let connectivity = Arc::new(ToggleConnectivity::new());
    connectivity.online.store(false, Ordering::SeqCst);
    let (scheduler, _db, remote) =
        scheduler_fixture(connectivity, Duration::from_secs(3600));

    let outcome = scheduler.run_one_shot_sync("u1", false).await.unwrap();

    assert_eq!(outcome, JobOutcome::Retry);
    assert_eq!(remote.session_count("u1"), 0);
}

#[tokio::test]
async fn one_shot_retries_when_remote_is_down() {
    let (scheduler, db, remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(3600));
    let now = Utc::now().timestamp_millis();
    db.lock()
        .unwrap()
        .insert_session("u1", now, 60_000, SessionStatus::Completed)
        .unwrap();
    remote.set_offline(true);

    let outcome = scheduler.run_one_shot_sync("u1", false).await.unwrap();

    assert_eq!(outcome, JobOutcome::Retry);
}

#[tokio::test]
async fn fast_one_shot_never_lingers_as_scheduled() {
    let (scheduler, _db, _remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(3600));

    // Empty store: the pass completes almost immediately, possibly before
    // the caller observes the returned handle.
    let outcome = scheduler.run_one_shot_sync("u1", false).await.unwrap();
    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(scheduler.state("u1"), ScheduleState::Unscheduled);

    // A later schedule replaces whatever entry the finished pass left.
    scheduler.schedule_periodic_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Periodic);
    scheduler.cancel_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Unscheduled);
}

#[tokio::test(start_paused = true)]
async fn rescheduling_replaces_the_previous_job() {
    let (scheduler, _db, _remote) =
        scheduler_fixture(Arc::new(AlwaysConnected), Duration::from_secs(60));

    scheduler.schedule_periodic_sync("u1");
    scheduler.schedule_periodic_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Periodic);

    scheduler.cancel_sync("u1");
    assert_eq!(scheduler.state("u1"), ScheduleState::Unscheduled);
}
