//! SQLite-based record store for users, focus sessions, and statistics.
//!
//! This is the on-device system of record: session rows are append-only
//! (no update, no delete except bulk-by-owner for migration and account
//! wipe), statistics rows are replace-on-conflict rollups, and a small
//! sync_state table mirrors the per-user sync outcome locally.
//!
//! All timestamps are stored as milliseconds since the Unix epoch.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

use super::data_dir;

/// Terminal state of a recorded focus interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse from database string; unknown values count as cancelled
    /// attempts rather than silently inflating completion stats.
    pub fn parse(s: &str) -> SessionStatus {
        match s {
            "COMPLETED" => SessionStatus::Completed,
            _ => SessionStatus::Cancelled,
        }
    }
}

/// Rollup period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    Day,
    Week,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Day => "day",
            PeriodType::Week => "week",
        }
    }

    pub fn parse(s: &str) -> PeriodType {
        match s {
            "week" => PeriodType::Week,
            _ => PeriodType::Day,
        }
    }
}

/// A user identity row. One per authenticated identity; created on first
/// login, updated on every login, removed only by account wipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub auth_uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: String,
    pub created_at: i64,
    pub last_login: i64,
}

/// One completed or abandoned focus interval.
///
/// `completion_timestamp` is the natural key within an owner's timeline;
/// the surrogate `session_id` is local-only and never crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: i64,
    pub owner_id: String,
    pub completion_timestamp: i64,
    pub work_duration: i64,
    pub status: SessionStatus,
}

/// A derived per-period rollup, uniquely identified by
/// (user, period_type, period_start, period_end) and always replaced whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub stat_id: i64,
    pub user_id: String,
    pub auth_uid: String,
    pub period_type: PeriodType,
    pub period_start: i64,
    pub period_end: i64,
    pub no_of_sessions: i64,
    pub focus_time: i64,
    pub average_session_time: i64,
    pub longest_session: i64,
    pub completion_rate: f32,
    pub most_productive_day: String,
    pub last_updated: i64,
}

/// Local mirror of the per-user sync outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStateRecord {
    pub user_id: String,
    pub last_sync_time: i64,
    pub last_sync_status: String,
    pub pending_syncs: i64,
    pub sync_version: i64,
}

/// SQLite database holding users, sessions, statistics, and sync state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/stillmind/stillmind.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
            .join("stillmind.db");
        Self::open_at(&path)
    }

    /// Open (and migrate) a database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    user_id      TEXT PRIMARY KEY,
                    auth_uid     TEXT NOT NULL,
                    display_name TEXT NOT NULL DEFAULT '',
                    email        TEXT NOT NULL DEFAULT '',
                    photo_url    TEXT NOT NULL DEFAULT '',
                    created_at   INTEGER NOT NULL,
                    last_login   INTEGER NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_users_auth_uid ON users(auth_uid);

                CREATE TABLE IF NOT EXISTS focus_sessions (
                    session_id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_id             TEXT NOT NULL,
                    completion_timestamp INTEGER NOT NULL,
                    work_duration        INTEGER NOT NULL,
                    status               TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_owner ON focus_sessions(owner_id);
                -- Natural key: one session per owner per completion instant.
                CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_owner_completed
                    ON focus_sessions(owner_id, completion_timestamp);

                CREATE TABLE IF NOT EXISTS user_statistics (
                    stat_id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id              TEXT NOT NULL,
                    auth_uid             TEXT NOT NULL DEFAULT '',
                    period_type          TEXT NOT NULL,
                    period_start         INTEGER NOT NULL,
                    period_end           INTEGER NOT NULL,
                    no_of_sessions       INTEGER NOT NULL,
                    focus_time           INTEGER NOT NULL,
                    average_session_time INTEGER NOT NULL,
                    longest_session      INTEGER NOT NULL,
                    completion_rate      REAL NOT NULL,
                    most_productive_day  TEXT NOT NULL,
                    last_updated         INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_statistics_user ON user_statistics(user_id);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_statistics_period
                    ON user_statistics(user_id, period_type, period_start, period_end);

                CREATE TABLE IF NOT EXISTS sync_state (
                    user_id          TEXT PRIMARY KEY,
                    last_sync_time   INTEGER NOT NULL,
                    last_sync_status TEXT NOT NULL,
                    pending_syncs    INTEGER NOT NULL DEFAULT 0,
                    sync_version     INTEGER NOT NULL DEFAULT 1
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // === Users ===

    /// Insert or update a user row, keyed by user_id.
    pub fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO users
                 (user_id, auth_uid, display_name, email, photo_url, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.user_id,
                user.auth_uid,
                user.display_name,
                user.email,
                user.photo_url,
                user.created_at,
                user.last_login,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let user = self
            .conn
            .prepare(
                "SELECT user_id, auth_uid, display_name, email, photo_url, created_at, last_login
                 FROM users WHERE user_id = ?1",
            )?
            .query_row(params![user_id], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_auth_uid(&self, auth_uid: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let user = self
            .conn
            .prepare(
                "SELECT user_id, auth_uid, display_name, email, photo_url, created_at, last_login
                 FROM users WHERE auth_uid = ?1",
            )?
            .query_row(params![auth_uid], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Remove a user row. Only the account-wipe path calls this.
    pub fn delete_user(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    // === Sessions ===

    /// Insert a session, replacing any row with the same
    /// (owner, completion_timestamp) natural key. Returns the row id.
    pub fn insert_session(
        &self,
        owner_id: &str,
        completion_timestamp: i64,
        work_duration: i64,
        status: SessionStatus,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO focus_sessions
                 (owner_id, completion_timestamp, work_duration, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, completion_timestamp, work_duration, status.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn sessions_for_owner(&self, owner_id: &str) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, owner_id, completion_timestamp, work_duration, status
             FROM focus_sessions WHERE owner_id = ?1
             ORDER BY completion_timestamp DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], row_to_session)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Sessions whose completion falls in [start, end] (inclusive bounds).
    pub fn sessions_in_range(
        &self,
        owner_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, owner_id, completion_timestamp, work_duration, status
             FROM focus_sessions
             WHERE owner_id = ?1 AND completion_timestamp BETWEEN ?2 AND ?3
             ORDER BY completion_timestamp DESC",
        )?;
        let rows = stmt.query_map(params![owner_id, start, end], row_to_session)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn completed_sessions_in_range(
        &self,
        owner_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, owner_id, completion_timestamp, work_duration, status
             FROM focus_sessions
             WHERE owner_id = ?1 AND status = 'COMPLETED'
               AND completion_timestamp BETWEEN ?2 AND ?3",
        )?;
        let rows = stmt.query_map(params![owner_id, start, end], row_to_session)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn session_count(&self, owner_id: &str) -> Result<i64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM focus_sessions WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Bulk delete by owner, for migration cleanup and account wipe.
    pub fn delete_sessions_for_owner(&self, owner_id: &str) -> Result<usize, DatabaseError> {
        let n = self.conn.execute(
            "DELETE FROM focus_sessions WHERE owner_id = ?1",
            params![owner_id],
        )?;
        Ok(n)
    }

    /// Reassign session ownership during identity migration
    /// (anonymous -> authenticated). Returns the number of rows moved.
    pub fn reassign_sessions(&self, from_owner: &str, to_owner: &str) -> Result<usize, DatabaseError> {
        let n = self.conn.execute(
            "UPDATE OR REPLACE focus_sessions SET owner_id = ?2 WHERE owner_id = ?1",
            params![from_owner, to_owner],
        )?;
        Ok(n)
    }

    // === Statistics ===

    /// Replace-on-conflict upsert keyed by (user, period_type, start, end).
    pub fn upsert_statistics(&self, stats: &StatisticsRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_statistics
                 (user_id, auth_uid, period_type, period_start, period_end,
                  no_of_sessions, focus_time, average_session_time, longest_session,
                  completion_rate, most_productive_day, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                stats.user_id,
                stats.auth_uid,
                stats.period_type.as_str(),
                stats.period_start,
                stats.period_end,
                stats.no_of_sessions,
                stats.focus_time,
                stats.average_session_time,
                stats.longest_session,
                stats.completion_rate,
                stats.most_productive_day,
                stats.last_updated,
            ],
        )?;
        Ok(())
    }

    pub fn get_statistics(
        &self,
        user_id: &str,
        period_type: PeriodType,
        period_start: i64,
        period_end: i64,
    ) -> Result<Option<StatisticsRecord>, DatabaseError> {
        let stats = self
            .conn
            .prepare(
                "SELECT stat_id, user_id, auth_uid, period_type, period_start, period_end,
                        no_of_sessions, focus_time, average_session_time, longest_session,
                        completion_rate, most_productive_day, last_updated
                 FROM user_statistics
                 WHERE user_id = ?1 AND period_type = ?2
                   AND period_start = ?3 AND period_end = ?4",
            )?
            .query_row(
                params![user_id, period_type.as_str(), period_start, period_end],
                row_to_statistics,
            )
            .optional()?;
        Ok(stats)
    }

    pub fn statistics_for_user(&self, user_id: &str) -> Result<Vec<StatisticsRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT stat_id, user_id, auth_uid, period_type, period_start, period_end,
                    no_of_sessions, focus_time, average_session_time, longest_session,
                    completion_rate, most_productive_day, last_updated
             FROM user_statistics WHERE user_id = ?1
             ORDER BY period_start DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_statistics)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_statistics_for_owner(&self, user_id: &str) -> Result<usize, DatabaseError> {
        let n = self.conn.execute(
            "DELETE FROM user_statistics WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(n)
    }

    // === Sync state ===

    pub fn get_sync_state(&self, user_id: &str) -> Result<Option<SyncStateRecord>, DatabaseError> {
        let state = self
            .conn
            .prepare(
                "SELECT user_id, last_sync_time, last_sync_status, pending_syncs, sync_version
                 FROM sync_state WHERE user_id = ?1",
            )?
            .query_row(params![user_id], |row| {
                Ok(SyncStateRecord {
                    user_id: row.get(0)?,
                    last_sync_time: row.get(1)?,
                    last_sync_status: row.get(2)?,
                    pending_syncs: row.get(3)?,
                    sync_version: row.get(4)?,
                })
            })
            .optional()?;
        Ok(state)
    }

    pub fn put_sync_state(&self, state: &SyncStateRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state
                 (user_id, last_sync_time, last_sync_status, pending_syncs, sync_version)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                state.user_id,
                state.last_sync_time,
                state.last_sync_status,
                state.pending_syncs,
                state.sync_version,
            ],
        )?;
        Ok(())
    }

    pub fn delete_sync_state(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM sync_state WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row) -> Result<UserRecord, rusqlite::Error> {
    Ok(UserRecord {
        user_id: row.get(0)?,
        auth_uid: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        photo_url: row.get(4)?,
        created_at: row.get(5)?,
        last_login: row.get(6)?,
    })
}

fn row_to_session(row: &rusqlite::Row) -> Result<SessionRecord, rusqlite::Error> {
    let status: String = row.get(4)?;
    Ok(SessionRecord {
        session_id: row.get(0)?,
        owner_id: row.get(1)?,
        completion_timestamp: row.get(2)?,
        work_duration: row.get(3)?,
        status: SessionStatus::parse(&status),
    })
}

fn row_to_statistics(row: &rusqlite::Row) -> Result<StatisticsRecord, rusqlite::Error> {
    let period_type: String = row.get(3)?;
    Ok(StatisticsRecord {
        stat_id: row.get(0)?,
        user_id: row.get(1)?,
        auth_uid: row.get(2)?,
        period_type: PeriodType::parse(&period_type),
        period_start: row.get(4)?,
        period_end: row.get(5)?,
        no_of_sessions: row.get(6)?,
        focus_time: row.get(7)?,
        average_session_time: row.get(8)?,
        longest_session: row.get(9)?,
        completion_rate: row.get(10)?,
        most_productive_day: row.get(11)?,
        last_updated: row.get(12)?,
    })
}
