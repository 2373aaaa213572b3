//! Synchronization between the local session store and the remote
//! document store.
//!
//! `engine` reconciles the two session sets, `scheduler` drives passes in
//! the background, `status` tracks outcomes per user, and `types` carries
//! the shared report and error types.

pub mod engine;
pub mod scheduler;
mod status;
pub mod types;

#[cfg(test)]
mod scheduler_tests;

pub use engine::{merge_session_sets, MergedSession, SyncEngine};
pub use scheduler::{AlwaysConnected, Connectivity, JobOutcome, ScheduleState, SyncScheduler};
pub use status::SyncStatusTracker;
pub use types::{SyncError, SyncMode, SyncReport, SyncStatusKind};
