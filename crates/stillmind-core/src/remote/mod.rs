//! Remote document store façade.
//!
//! Translates local records to versioned wire documents and back, and hides
//! the network behind the [`RemoteStore`] trait so the engine can run against
//! either the HTTP backend or the in-process one.

pub mod documents;
mod memory;
mod store;

pub use documents::{DocTimestamp, SessionDoc, StatisticsDoc, SyncStatusDoc, UserDoc};
pub use memory::MemoryRemoteStore;
pub use store::{HttpRemoteStore, RemoteStore};
