//! Wire documents for the remote document store.
//!
//! Every document is an explicit, versioned serde struct: missing fields on
//! the wire fill in through `#[serde(default)]` so partial documents decode
//! deterministically instead of failing or being reflected field-by-field.
//!
//! Time values cross the boundary as a seconds+nanoseconds pair; local time
//! values are epoch milliseconds. Conversion truncates sub-millisecond
//! remainders so that a round trip through the wire is idempotent.

use serde::{Deserialize, Serialize};

use crate::storage::{SessionRecord, SessionStatus, StatisticsRecord};

/// Current wire schema version, stamped into user documents.
pub const DOC_VERSION: i64 = 1;

/// Session-level sync marker carried on session documents.
pub const SYNC_MARK_SYNCED: &str = "SYNCED";
pub const SYNC_MARK_PENDING: &str = "PENDING";

/// A point in time on the wire: seconds since epoch plus nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTimestamp {
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl DocTimestamp {
    /// Convert epoch milliseconds to a seconds+nanos pair.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
        }
    }

    /// Convert back to epoch milliseconds, truncating sub-millisecond
    /// remainders (never rounding, so the conversion is idempotent).
    pub fn to_millis(self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos) / 1_000_000
    }

    pub fn now() -> Self {
        Self::from_millis(chrono::Utc::now().timestamp_millis())
    }
}

/// Per-user profile document, keyed by user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub auth_uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub created_at: DocTimestamp,
    #[serde(default)]
    pub last_login: DocTimestamp,
    #[serde(default)]
    pub last_sync: DocTimestamp,
    #[serde(default = "default_doc_version")]
    pub data_version: i64,
}

/// Per-session document, keyed by the session's stable derived id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionDoc {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub completion_timestamp: DocTimestamp,
    #[serde(default)]
    pub work_duration: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default = "default_goal_name")]
    pub goal_name: String,
    #[serde(default)]
    pub last_updated: DocTimestamp,
    #[serde(default = "default_sync_mark")]
    pub sync_status: String,
}

impl SessionDoc {
    /// Stable document id derived from the session's natural key, so the
    /// same logical session maps to the same document on every device.
    pub fn derived_id(user_id: &str, completion_millis: i64) -> String {
        format!("session_{user_id}_{completion_millis}")
    }

    /// Build a wire document from a local session row.
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            session_id: Self::derived_id(&record.owner_id, record.completion_timestamp),
            user_id: record.owner_id.clone(),
            completion_timestamp: DocTimestamp::from_millis(record.completion_timestamp),
            work_duration: record.work_duration,
            status: record.status.as_str().to_string(),
            goal_name: default_goal_name(),
            last_updated: DocTimestamp::now(),
            sync_status: SYNC_MARK_SYNCED.to_string(),
        }
    }

    pub fn completion_millis(&self) -> i64 {
        self.completion_timestamp.to_millis()
    }

    pub fn parsed_status(&self) -> SessionStatus {
        SessionStatus::parse(&self.status)
    }
}

/// Per-statistics document, keyed by (user, period type, period start).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsDoc {
    #[serde(default)]
    pub stat_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub period_type: String,
    #[serde(default)]
    pub period_start: DocTimestamp,
    #[serde(default)]
    pub period_end: DocTimestamp,
    #[serde(default)]
    pub no_of_sessions: i64,
    #[serde(default)]
    pub focus_time: i64,
    #[serde(default)]
    pub average_session_time: i64,
    #[serde(default)]
    pub longest_session: i64,
    #[serde(default)]
    pub completion_rate: f32,
    #[serde(default = "default_productive_day")]
    pub most_productive_day: String,
    #[serde(default)]
    pub last_updated: DocTimestamp,
}

impl StatisticsDoc {
    pub fn derived_id(user_id: &str, period_type: &str, period_start: DocTimestamp) -> String {
        format!("stat_{user_id}_{period_type}_{}", period_start.seconds)
    }

    pub fn from_record(record: &StatisticsRecord) -> Self {
        let period_start = DocTimestamp::from_millis(record.period_start);
        Self {
            stat_id: Self::derived_id(&record.user_id, record.period_type.as_str(), period_start),
            user_id: record.user_id.clone(),
            period_type: record.period_type.as_str().to_string(),
            period_start,
            period_end: DocTimestamp::from_millis(record.period_end),
            no_of_sessions: record.no_of_sessions,
            focus_time: record.focus_time,
            average_session_time: record.average_session_time,
            longest_session: record.longest_session,
            completion_rate: record.completion_rate,
            most_productive_day: record.most_productive_day.clone(),
            last_updated: DocTimestamp::from_millis(record.last_updated),
        }
    }
}

/// Per-user sync status document, keyed by user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatusDoc {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub last_sync_time: DocTimestamp,
    #[serde(default = "default_sync_status")]
    pub last_sync_status: String,
    #[serde(default)]
    pub pending_syncs: i64,
    #[serde(default = "default_doc_version")]
    pub sync_version: i64,
}

fn default_doc_version() -> i64 {
    DOC_VERSION
}

fn default_goal_name() -> String {
    "Focus Time".to_string()
}

fn default_sync_mark() -> String {
    SYNC_MARK_SYNCED.to_string()
}

fn default_sync_status() -> String {
    "SUCCESS".to_string()
}

fn default_productive_day() -> String {
    "N/A".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_millis_roundtrip() {
        for millis in [0i64, 1, 999, 1_000, 1_695_000_123_456, -1_500] {
            let ts = DocTimestamp::from_millis(millis);
            assert_eq!(ts.to_millis(), millis, "roundtrip failed for {millis}");
        }
    }

    #[test]
    fn timestamp_truncates_sub_millisecond() {
        // 123_456 ns is below a millisecond; truncation must drop it and
        // stay stable across repeated conversions.
        let ts = DocTimestamp {
            seconds: 10,
            nanos: 123_456,
        };
        let millis = ts.to_millis();
        assert_eq!(millis, 10_000);
        assert_eq!(DocTimestamp::from_millis(millis).to_millis(), millis);
    }

    #[test]
    fn session_doc_id_is_stable() {
        let a = SessionDoc::derived_id("u1", 1_000);
        let b = SessionDoc::derived_id("u1", 1_000);
        assert_eq!(a, b);
        assert_ne!(a, SessionDoc::derived_id("u1", 1_001));
        assert_ne!(a, SessionDoc::derived_id("u2", 1_000));
    }

    #[test]
    fn partial_session_doc_fills_defaults() {
        let doc: SessionDoc = serde_json::from_str(
            r#"{"user_id":"u1","completion_timestamp":{"seconds":1,"nanos":0}}"#,
        )
        .unwrap();
        assert_eq!(doc.goal_name, "Focus Time");
        assert_eq!(doc.sync_status, SYNC_MARK_SYNCED);
        assert_eq!(doc.work_duration, 0);
        assert_eq!(doc.completion_millis(), 1_000);
    }

    #[test]
    fn partial_user_doc_fills_defaults() {
        let doc: UserDoc = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert_eq!(doc.data_version, DOC_VERSION);
        assert_eq!(doc.display_name, "");
        assert_eq!(doc.last_login.to_millis(), 0);
    }
}
