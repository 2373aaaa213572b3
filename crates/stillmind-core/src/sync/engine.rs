//! Local-remote session reconciliation.
//!
//! The engine merges the local session set with the remote one for a user
//! and re-materializes the merged result into both stores. The merge is
//! keyed by `completion_timestamp`: two sessions with the same completion
//! instant for the same owner are the same logical event. Conflicts resolve
//! by keeping the larger `work_duration` (a longer recorded duration
//! reflects more-complete information about the interval; a shorter one for
//! the same instant is a partial or stale write).
//!
//! This is last-writer-wins-by-magnitude, not a causal merge: two genuinely
//! distinct sessions ending in the same millisecond collapse into one. That
//! collapse is accepted behavior; see DESIGN.md.
//!
//! A single pass is not reentrant-safe for the same user. Callers must
//! serialize or deduplicate concurrent passes per user; the scheduler's
//! replace-on-reschedule semantics and the service's in-flight guard both
//! do this.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::{RemoteStore, SessionDoc};
use crate::stats::StatisticsAggregator;
use crate::storage::{Database, SessionRecord, SessionStatus};
use crate::sync::status::SyncStatusTracker;
use crate::sync::types::{SyncMode, SyncReport, SyncStatusKind};

/// One entry of the merged session set, before re-materialization assigns
/// local surrogate ids.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSession {
    pub completion_timestamp: i64,
    pub work_duration: i64,
    pub status: SessionStatus,
}

/// Merge the two session sets by completion timestamp.
///
/// Returns the merged set (newest first) and the number of conflicts
/// resolved — every key present on both sides counts as one conflict.
pub fn merge_session_sets(
    local: &[SessionRecord],
    remote: &[SessionDoc],
) -> (Vec<MergedSession>, usize) {
    let local_map: BTreeMap<i64, &SessionRecord> = local
        .iter()
        .map(|s| (s.completion_timestamp, s))
        .collect();
    let remote_map: BTreeMap<i64, &SessionDoc> = remote
        .iter()
        .map(|s| (s.completion_millis(), s))
        .collect();

    let mut merged = Vec::new();
    let mut conflicts_resolved = 0;

    let mut keys: Vec<i64> = local_map
        .keys()
        .chain(remote_map.keys())
        .copied()
        .collect();
    keys.sort_unstable();
    keys.dedup();

    // Newest first, matching read order elsewhere.
    for &ts in keys.iter().rev() {
        match (local_map.get(&ts), remote_map.get(&ts)) {
            (Some(local), Some(remote)) => {
                // Conflict: larger duration wins, local wins ties.
                let winner = if local.work_duration >= remote.work_duration {
                    MergedSession {
                        completion_timestamp: ts,
                        work_duration: local.work_duration,
                        status: local.status,
                    }
                } else {
                    MergedSession {
                        completion_timestamp: ts,
                        work_duration: remote.work_duration,
                        status: remote.parsed_status(),
                    }
                };
                merged.push(winner);
                conflicts_resolved += 1;
            }
            (Some(local), None) => merged.push(MergedSession {
                completion_timestamp: ts,
                work_duration: local.work_duration,
                status: local.status,
            }),
            (None, Some(remote)) => merged.push(MergedSession {
                completion_timestamp: ts,
                work_duration: remote.work_duration,
                status: remote.parsed_status(),
            }),
            (None, None) => unreachable!("key came from one of the maps"),
        }
    }

    (merged, conflicts_resolved)
}

/// The reconciliation engine plus the aggregation handoff.
pub struct SyncEngine {
    db: Arc<Mutex<Database>>,
    remote: Arc<dyn RemoteStore>,
    tracker: SyncStatusTracker,
    aggregator: StatisticsAggregator,
    lookback_millis: i64,
}

impl SyncEngine {
    pub fn new(
        db: Arc<Mutex<Database>>,
        remote: Arc<dyn RemoteStore>,
        tracker: SyncStatusTracker,
        lookback_millis: i64,
    ) -> Self {
        let aggregator = StatisticsAggregator::new(db.clone(), remote.clone());
        Self {
            db,
            remote,
            tracker,
            aggregator,
            lookback_millis,
        }
    }

    pub fn tracker(&self) -> &SyncStatusTracker {
        &self.tracker
    }

    pub fn aggregator(&self) -> &StatisticsAggregator {
        &self.aggregator
    }

    /// Run one reconciliation pass for a user.
    ///
    /// Remote failures never escape: an unreadable remote set is treated as
    /// empty, and a failed batch write flags FAILED in the tracker and comes
    /// back in the report. Only a local store failure is a hard error.
    pub async fn reconcile(&self, user_id: &str, mode: SyncMode) -> Result<SyncReport> {
        let local_sessions = {
            let db = self.db.lock().unwrap();
            match mode {
                SyncMode::Full => db.sessions_for_owner(user_id)?,
                SyncMode::Windowed => {
                    let now = Utc::now().timestamp_millis();
                    db.sessions_in_range(user_id, now - self.lookback_millis, now)?
                }
            }
        };

        let remote_sessions = match self.remote.get_sessions_for_user(user_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                // Local data must never be blocked by a remote outage.
                warn!(user_id, error = %e, "remote read failed, merging against empty set");
                Vec::new()
            }
        };

        let (merged, conflicts_resolved) = merge_session_sets(&local_sessions, &remote_sessions);

        // Re-materialize locally; the natural-key upsert keeps exactly one
        // row per completion instant.
        {
            let db = self.db.lock().unwrap();
            for session in &merged {
                db.insert_session(
                    user_id,
                    session.completion_timestamp,
                    session.work_duration,
                    session.status,
                )?;
            }
        }

        let docs: Vec<SessionDoc> = merged
            .iter()
            .map(|s| {
                SessionDoc::from_record(&SessionRecord {
                    session_id: 0,
                    owner_id: user_id.to_string(),
                    completion_timestamp: s.completion_timestamp,
                    work_duration: s.work_duration,
                    status: s.status,
                })
            })
            .collect();

        if let Err(e) = self.remote.save_sessions_batch(&docs).await {
            warn!(user_id, error = %e, "remote batch write failed");
            self.tracker
                .set_status(user_id, SyncStatusKind::Failed, merged.len() as i64)
                .await?;
            return Ok(SyncReport {
                success: false,
                synced_sessions: 0,
                synced_stats: 0,
                conflicts_resolved,
                error: Some(e.to_string()),
            });
        }

        if let Err(e) = self.remote.update_last_sync(user_id).await {
            warn!(user_id, error = %e, "last_sync touch failed");
        }

        self.tracker
            .set_status(user_id, SyncStatusKind::Success, 0)
            .await?;

        info!(
            user_id,
            sessions = merged.len(),
            conflicts = conflicts_resolved,
            "reconciliation complete"
        );

        Ok(SyncReport {
            success: true,
            synced_sessions: merged.len(),
            synced_stats: 0,
            conflicts_resolved,
            error: None,
        })
    }

    /// One full sync pass: tracker to SYNC_IN_PROGRESS, reconcile, then
    /// recompute the day and week rollups. The returned report carries the
    /// rollup count in `synced_stats`.
    pub async fn run_pass(&self, user_id: &str, mode: SyncMode) -> Result<SyncReport> {
        self.tracker
            .set_status(
                user_id,
                SyncStatusKind::SyncInProgress,
                self.tracker.pending_count(user_id),
            )
            .await?;

        let mut report = self.reconcile(user_id, mode).await?;
        if report.success {
            report.synced_stats = self.aggregator.refresh_current(user_id, user_id).await?;
        }
        Ok(report)
    }
}
