//! # Stillmind Core Library
//!
//! Core data engine for the Stillmind focus timer: a local SQLite record
//! store, a remote document-store client, and the reconciliation machinery
//! that keeps the two converged across devices. The CLI binary is a thin
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite session/statistics/sync-state persistence and
//!   TOML-based configuration
//! - **Remote**: document models plus the [`RemoteStore`] trait with an
//!   HTTP implementation and an in-memory one for tests
//! - **Sync**: timestamp-keyed session reconciliation, background
//!   scheduling and per-user status tracking
//! - **Stats**: idempotent day/week rollups derived from raw sessions
//! - **Account**: login/logout/migration flows around the data stores
//!
//! ## Key Components
//!
//! - [`SyncService`]: composition root exposing the whole surface
//! - [`SyncEngine`]: one reconciliation pass, local-first
//! - [`Database`]: the local record store
//! - [`RemoteStore`]: trait boundary for the remote document store

pub mod account;
pub mod error;
pub mod remote;
pub mod service;
pub mod stats;
pub mod storage;
pub mod sync;

pub use account::{AccountManager, SessionContext};
pub use error::{ConfigError, CoreError, DatabaseError, Result};
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
pub use service::SyncService;
pub use stats::{Rollup, StatisticsAggregator};
pub use storage::{
    Database, PeriodType, SessionRecord, SessionStatus, StatisticsRecord, SyncConfig,
};
pub use sync::{
    AlwaysConnected, Connectivity, JobOutcome, ScheduleState, SyncEngine, SyncError,
    SyncMode, SyncReport, SyncScheduler, SyncStatusKind, SyncStatusTracker,
};
