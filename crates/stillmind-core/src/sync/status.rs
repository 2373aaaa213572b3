//! Per-user sync status tracking.
//!
//! The tracker persists the outcome of the last synchronization attempt and
//! the pending-operation counter, both locally (sync_state table) and
//! remotely (sync_status document). It is written at every phase boundary
//! of a sync pass and read by callers to render sync indicators.
//!
//! Tracker writes are themselves best-effort toward the remote: a sync pass
//! must never fail because its status could not be mirrored.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::remote::RemoteStore;
use crate::storage::{Database, SyncStateRecord};
use crate::sync::types::SyncStatusKind;

#[derive(Clone)]
pub struct SyncStatusTracker {
    db: Arc<Mutex<Database>>,
    remote: Arc<dyn RemoteStore>,
}

impl SyncStatusTracker {
    pub fn new(db: Arc<Mutex<Database>>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { db, remote }
    }

    /// Record a status transition locally and mirror it to the remote.
    pub async fn set_status(
        &self,
        user_id: &str,
        status: SyncStatusKind,
        pending_syncs: i64,
    ) -> Result<()> {
        {
            let db = self.db.lock().unwrap();
            let version = db
                .get_sync_state(user_id)?
                .map(|s| s.sync_version)
                .unwrap_or(1);
            db.put_sync_state(&SyncStateRecord {
                user_id: user_id.to_string(),
                last_sync_time: Utc::now().timestamp_millis(),
                last_sync_status: status.as_str().to_string(),
                pending_syncs,
                sync_version: version,
            })?;
        }

        if let Err(e) = self
            .remote
            .update_sync_status(user_id, status, pending_syncs)
            .await
        {
            warn!(user_id, status = status.as_str(), error = %e,
                  "sync status mirror to remote failed");
        }
        Ok(())
    }

    /// Current status as a string, preferring the remote copy (it reflects
    /// other devices too) and falling back to the local mirror.
    pub async fn status_string(&self, user_id: &str) -> String {
        match self.remote.get_sync_status(user_id).await {
            Ok(Some(doc)) => doc.last_sync_status,
            Ok(None) | Err(_) => {
                let local = {
                    let db = self.db.lock().unwrap();
                    db.get_sync_state(user_id).ok().flatten()
                };
                local
                    .map(|s| s.last_sync_status)
                    .unwrap_or_else(|| "UNKNOWN".to_string())
            }
        }
    }

    /// Count one more unsynced local write.
    pub fn bump_pending(&self, user_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let mut state = db.get_sync_state(user_id)?.unwrap_or(SyncStateRecord {
            user_id: user_id.to_string(),
            last_sync_time: 0,
            last_sync_status: SyncStatusKind::Pending.as_str().to_string(),
            pending_syncs: 0,
            sync_version: 1,
        });
        state.pending_syncs += 1;
        db.put_sync_state(&state)?;
        Ok(())
    }

    /// Pending unsynced writes for a user (0 when unknown).
    pub fn pending_count(&self, user_id: &str) -> i64 {
        let db = self.db.lock().unwrap();
        db.get_sync_state(user_id)
            .ok()
            .flatten()
            .map(|s| s.pending_syncs)
            .unwrap_or(0)
    }
}
