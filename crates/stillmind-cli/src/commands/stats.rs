use clap::Subcommand;

use super::CmdResult;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Recompute and show the current day and week rollups
    Refresh { user: String },
    /// All stored rollups
    List { user: String },
}

pub async fn run(action: StatsAction) -> CmdResult {
    let service = super::open_service()?;

    match action {
        StatsAction::Refresh { user } => {
            service.refresh_statistics(&user).await?;
            let stats = service.statistics(&user)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::List { user } => {
            let stats = service.statistics(&user)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
