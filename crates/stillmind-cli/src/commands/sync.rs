use clap::Subcommand;
use stillmind_core::JobOutcome;

use super::CmdResult;

#[derive(Subcommand)]
pub enum SyncAction {
    /// Run a full sync pass now
    Now { user: String },
    /// Show the last sync status
    Status { user: String },
    /// Run a single constrained background pass
    OneShot {
        user: String,
        /// Sync the full history instead of the recent window
        #[arg(long)]
        full: bool,
    },
}

pub async fn run(action: SyncAction) -> CmdResult {
    let service = super::open_service()?;

    match action {
        SyncAction::Now { user } => {
            let report = service.trigger_immediate_sync(&user).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SyncAction::Status { user } => {
            println!("{}", service.get_sync_status(&user).await);
        }
        SyncAction::OneShot { user, full } => {
            match service.run_one_shot_sync(&user, full).await {
                JobOutcome::Success => println!("ok"),
                JobOutcome::Retry => {
                    eprintln!("sync did not complete, retry later");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
