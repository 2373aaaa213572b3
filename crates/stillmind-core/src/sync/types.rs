//! Core types for local-remote synchronization.

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Per-user sync outcome, as tracked locally and mirrored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatusKind {
    Success,
    Failed,
    Pending,
    SyncInProgress,
    LogoutSyncInProgress,
    LogoutComplete,
}

impl SyncStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatusKind::Success => "SUCCESS",
            SyncStatusKind::Failed => "FAILED",
            SyncStatusKind::Pending => "PENDING",
            SyncStatusKind::SyncInProgress => "SYNC_IN_PROGRESS",
            SyncStatusKind::LogoutSyncInProgress => "LOGOUT_SYNC_IN_PROGRESS",
            SyncStatusKind::LogoutComplete => "LOGOUT_COMPLETE",
        }
    }

    pub fn parse(s: &str) -> Option<SyncStatusKind> {
        match s {
            "SUCCESS" => Some(SyncStatusKind::Success),
            "FAILED" => Some(SyncStatusKind::Failed),
            "PENDING" => Some(SyncStatusKind::Pending),
            "SYNC_IN_PROGRESS" => Some(SyncStatusKind::SyncInProgress),
            "LOGOUT_SYNC_IN_PROGRESS" => Some(SyncStatusKind::LogoutSyncInProgress),
            "LOGOUT_COMPLETE" => Some(SyncStatusKind::LogoutComplete),
            _ => None,
        }
    }
}

/// How much session history a reconciliation pass reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Bounded recent window (lookback per config) for unsynced detection.
    Windowed,
    /// Unbounded session history.
    Full,
}

/// Outcome of one reconciliation + aggregation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub synced_sessions: usize,
    pub synced_stats: usize,
    pub conflicts_resolved: usize,
    pub error: Option<String>,
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
