pub mod account;
pub mod session;
pub mod stats;
pub mod sync;

use std::sync::Arc;

use stillmind_core::{AlwaysConnected, Database, HttpRemoteStore, SyncConfig, SyncService};

pub(crate) type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn open_service() -> Result<SyncService, Box<dyn std::error::Error>> {
    let config = SyncConfig::load()?;
    let remote = Arc::new(HttpRemoteStore::new(config.remote_url.clone()));
    let db = Database::open()?;
    Ok(SyncService::new(
        db,
        remote,
        Arc::new(AlwaysConnected),
        &config,
    ))
}
