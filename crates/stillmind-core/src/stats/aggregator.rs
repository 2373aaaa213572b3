//! Per-period rollup computation and persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use tracing::{debug, warn};

use crate::error::Result;
use crate::remote::{RemoteStore, StatisticsDoc};
use crate::storage::{Database, PeriodType, SessionRecord, SessionStatus, StatisticsRecord};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Weekday labels in grouping order; ties in [`most_productive_day`] break
/// toward the earlier entry, which makes the result deterministic.
const DAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Derived rollup fields for one period, before persistence metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub no_of_sessions: i64,
    pub focus_time: i64,
    pub average_session_time: i64,
    pub longest_session: i64,
    pub completion_rate: f32,
    pub most_productive_day: String,
}

/// Compute a rollup from every attempt in range (completed and cancelled).
///
/// All zero-denominator cases yield 0, not an error: zero attempts means a
/// 0% completion rate, zero completed sessions means a 0 average.
pub fn derive_rollup(attempts: &[SessionRecord]) -> Rollup {
    let completed: Vec<&SessionRecord> = attempts
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();

    let focus_time: i64 = completed.iter().map(|s| s.work_duration).sum();
    let count = completed.len() as i64;
    let average_session_time = if count > 0 { focus_time / count } else { 0 };
    let longest_session = completed.iter().map(|s| s.work_duration).max().unwrap_or(0);
    let completion_rate = if attempts.is_empty() {
        0.0
    } else {
        completed.len() as f32 / attempts.len() as f32 * 100.0
    };

    Rollup {
        no_of_sessions: count,
        focus_time,
        average_session_time,
        longest_session,
        completion_rate,
        most_productive_day: most_productive_day(&completed),
    }
}

/// Weekday label with the greatest summed duration among completed
/// sessions, bucketed in the local calendar. "N/A" when empty; exact ties
/// break toward the earlier weekday in Sun..Sat order.
fn most_productive_day(completed: &[&SessionRecord]) -> String {
    if completed.is_empty() {
        return "N/A".to_string();
    }

    let mut totals: HashMap<&'static str, i64> = HashMap::new();
    for session in completed {
        if let Some(label) = weekday_label(session.completion_timestamp) {
            *totals.entry(label).or_insert(0) += session.work_duration;
        }
    }

    let mut best: Option<(&'static str, i64)> = None;
    for label in DAY_LABELS {
        if let Some(&total) = totals.get(label) {
            if best.map_or(true, |(_, t)| total > t) {
                best = Some((label, total));
            }
        }
    }
    best.map(|(label, _)| label.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn weekday_label(ts_millis: i64) -> Option<&'static str> {
    let dt = match Local.timestamp_millis_opt(ts_millis) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => return None,
    };
    Some(match dt.weekday() {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    })
}

fn local_midnight_millis(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
        // Midnight skipped by a DST transition; fall back to UTC midnight.
        LocalResult::None => Utc.from_utc_datetime(&naive).timestamp_millis(),
    }
}

/// Inclusive 00:00:00.000..23:59:59.999 bounds of `date`, local calendar.
pub fn day_range(date: NaiveDate) -> (i64, i64) {
    let start = local_midnight_millis(date);
    (start, start + DAY_MILLIS - 1)
}

/// Inclusive bounds of the Monday-start week containing `date`.
pub fn week_range(date: NaiveDate) -> (i64, i64) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let start = local_midnight_millis(monday);
    let end = local_midnight_millis(monday + Duration::days(7)) - 1;
    (start, end)
}

/// Today's [`day_range`].
pub fn today_range() -> (i64, i64) {
    day_range(Local::now().date_naive())
}

/// This week's [`week_range`].
pub fn week_range_now() -> (i64, i64) {
    week_range(Local::now().date_naive())
}

/// Recomputes rollups from the record store and persists them to both
/// stores. The remote push is best-effort: the rollup is a cache for other
/// devices, so a remote failure never fails the recompute.
pub struct StatisticsAggregator {
    db: Arc<Mutex<Database>>,
    remote: Arc<dyn RemoteStore>,
}

impl StatisticsAggregator {
    pub fn new(db: Arc<Mutex<Database>>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { db, remote }
    }

    /// Recompute the rollup for one period window and upsert it.
    ///
    /// `start`/`end` must be timezone-consistent with how sessions are
    /// bucketed; use [`day_range`]/[`week_range`] to produce them.
    pub async fn recompute(
        &self,
        user_id: &str,
        auth_uid: &str,
        period_type: PeriodType,
        start: i64,
        end: i64,
    ) -> Result<StatisticsRecord> {
        let record = {
            let db = self.db.lock().unwrap();
            let attempts = db.sessions_in_range(user_id, start, end)?;
            let rollup = derive_rollup(&attempts);
            let record = StatisticsRecord {
                stat_id: 0,
                user_id: user_id.to_string(),
                auth_uid: auth_uid.to_string(),
                period_type,
                period_start: start,
                period_end: end,
                no_of_sessions: rollup.no_of_sessions,
                focus_time: rollup.focus_time,
                average_session_time: rollup.average_session_time,
                longest_session: rollup.longest_session,
                completion_rate: rollup.completion_rate,
                most_productive_day: rollup.most_productive_day,
                last_updated: Utc::now().timestamp_millis(),
            };
            db.upsert_statistics(&record)?;
            record
        };

        debug!(
            user_id,
            period = period_type.as_str(),
            sessions = record.no_of_sessions,
            "rollup recomputed"
        );

        if let Err(e) = self
            .remote
            .save_statistics(&StatisticsDoc::from_record(&record))
            .await
        {
            warn!(user_id, error = %e, "statistics push to remote failed");
        }

        Ok(record)
    }

    /// Recompute the current day and week rollups. Returns the number of
    /// rollups written. Called after every recorded session and after every
    /// reconciliation pass.
    pub async fn refresh_current(&self, user_id: &str, auth_uid: &str) -> Result<usize> {
        let (day_start, day_end) = today_range();
        self.recompute(user_id, auth_uid, PeriodType::Day, day_start, day_end)
            .await?;
        let (week_start, week_end) = week_range_now();
        self.recompute(user_id, auth_uid, PeriodType::Week, week_start, week_end)
            .await?;
        Ok(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session(ts: i64, duration: i64, status: SessionStatus) -> SessionRecord {
        SessionRecord {
            session_id: 0,
            owner_id: "u1".to_string(),
            completion_timestamp: ts,
            work_duration: duration,
            status,
        }
    }

    const MIN: i64 = 60_000;

    #[test]
    fn rollup_of_mixed_day() {
        // 10 attempts, 7 completed with the durations below, 3 cancelled.
        let durations = [25, 30, 20, 40, 15, 35, 28];
        let mut attempts: Vec<SessionRecord> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| session(1_000 + i as i64, d * MIN, SessionStatus::Completed))
            .collect();
        for i in 0..3 {
            attempts.push(session(2_000 + i, 5 * MIN, SessionStatus::Cancelled));
        }

        let rollup = derive_rollup(&attempts);
        assert_eq!(rollup.no_of_sessions, 7);
        assert_eq!(rollup.focus_time, 193 * MIN);
        assert_eq!(rollup.average_session_time, 193 * MIN / 7);
        assert_eq!(rollup.longest_session, 40 * MIN);
        assert!((rollup.completion_rate - 70.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_attempts_yield_zeroes() {
        let rollup = derive_rollup(&[]);
        assert_eq!(rollup.no_of_sessions, 0);
        assert_eq!(rollup.focus_time, 0);
        assert_eq!(rollup.average_session_time, 0);
        assert_eq!(rollup.longest_session, 0);
        assert_eq!(rollup.completion_rate, 0.0);
        assert_eq!(rollup.most_productive_day, "N/A");
    }

    #[test]
    fn all_cancelled_yields_zero_average() {
        let attempts = vec![
            session(1_000, 10 * MIN, SessionStatus::Cancelled),
            session(2_000, 20 * MIN, SessionStatus::Cancelled),
        ];
        let rollup = derive_rollup(&attempts);
        assert_eq!(rollup.no_of_sessions, 0);
        assert_eq!(rollup.average_session_time, 0);
        assert_eq!(rollup.completion_rate, 0.0);
        assert_eq!(rollup.most_productive_day, "N/A");
    }

    #[test]
    fn most_productive_day_picks_greatest_total() {
        // Two sessions on one weekday outweigh one longer session on another.
        let base = 1_700_000_000_000i64; // mid-November 2023
        let attempts = vec![
            session(base, 30 * MIN, SessionStatus::Completed),
            session(base + 60_000, 30 * MIN, SessionStatus::Completed),
            session(base + 3 * DAY_MILLIS, 45 * MIN, SessionStatus::Completed),
        ];
        let rollup = derive_rollup(&attempts);
        let expected = weekday_label(base).unwrap();
        assert_eq!(rollup.most_productive_day, expected);
    }

    #[test]
    fn day_range_spans_exactly_one_day() {
        let (start, end) = day_range(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(end - start, DAY_MILLIS - 1);
    }

    #[test]
    fn week_range_starts_monday_and_spans_seven_days() {
        // 2024-03-07 is a Thursday; its week starts Monday 2024-03-04.
        let thursday = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let (start, end) = week_range(thursday);
        let (monday_start, _) = day_range(monday);
        assert_eq!(start, monday_start);
        assert_eq!(end - start, 7 * DAY_MILLIS - 1);
        assert_eq!(week_range(monday), (start, end));
    }

    #[tokio::test]
    async fn recompute_is_idempotent_and_upserts() {
        let db = Arc::new(Mutex::new(Database::open_memory().unwrap()));
        let remote = Arc::new(MemoryRemoteStoreForTest::default());
        {
            let db = db.lock().unwrap();
            db.insert_session("u1", 500, 25 * MIN, SessionStatus::Completed)
                .unwrap();
            db.insert_session("u1", 600, 15 * MIN, SessionStatus::Cancelled)
                .unwrap();
        }
        let aggregator = StatisticsAggregator::new(db.clone(), remote);

        let first = aggregator
            .recompute("u1", "u1", PeriodType::Day, 0, DAY_MILLIS - 1)
            .await
            .unwrap();
        let second = aggregator
            .recompute("u1", "u1", PeriodType::Day, 0, DAY_MILLIS - 1)
            .await
            .unwrap();

        assert_eq!(first.no_of_sessions, second.no_of_sessions);
        assert_eq!(first.focus_time, second.focus_time);
        assert_eq!(first.average_session_time, second.average_session_time);
        assert_eq!(first.longest_session, second.longest_session);
        assert_eq!(first.completion_rate, second.completion_rate);
        assert_eq!(first.most_productive_day, second.most_productive_day);

        // Replace-on-conflict: still a single row for the window.
        let db = db.lock().unwrap();
        assert_eq!(db.statistics_for_user("u1").unwrap().len(), 1);
    }

    // Recompute must still succeed when the remote push fails.
    #[tokio::test]
    async fn remote_failure_does_not_fail_recompute() {
        let db = Arc::new(Mutex::new(Database::open_memory().unwrap()));
        let remote = Arc::new(crate::remote::MemoryRemoteStore::new());
        remote.set_offline(true);
        {
            let db = db.lock().unwrap();
            db.insert_session("u1", 500, 25 * MIN, SessionStatus::Completed)
                .unwrap();
        }
        let aggregator = StatisticsAggregator::new(db.clone(), remote);
        let record = aggregator
            .recompute("u1", "u1", PeriodType::Day, 0, DAY_MILLIS - 1)
            .await
            .unwrap();
        assert_eq!(record.no_of_sessions, 1);
    }

    type MemoryRemoteStoreForTest = crate::remote::MemoryRemoteStore;

    proptest! {
        // Rollup derivation depends only on the session set.
        #[test]
        fn derive_rollup_is_deterministic(
            sessions in prop::collection::vec(
                (0i64..10_000_000, 0i64..10_000_000, prop::bool::ANY),
                0..40,
            )
        ) {
            let attempts: Vec<SessionRecord> = sessions
                .iter()
                .map(|&(ts, dur, done)| session(
                    ts,
                    dur,
                    if done { SessionStatus::Completed } else { SessionStatus::Cancelled },
                ))
                .collect();
            let a = derive_rollup(&attempts);
            let b = derive_rollup(&attempts);
            prop_assert_eq!(a, b);
        }
    }
}
