use clap::Subcommand;
use stillmind_core::SessionStatus;

use super::CmdResult;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Record a finished focus session
    Record {
        user: String,
        /// Session length in minutes
        #[arg(long, default_value_t = 25)]
        minutes: i64,
        /// Record the session as cancelled instead of completed
        #[arg(long)]
        cancelled: bool,
        /// Goal label attached to the session
        #[arg(long)]
        goal: Option<String>,
    },
    /// List all sessions, newest first
    List { user: String },
    /// Sessions completed today
    Today { user: String },
}

pub async fn run(action: SessionAction) -> CmdResult {
    let service = super::open_service()?;

    match action {
        SessionAction::Record {
            user,
            minutes,
            cancelled,
            goal,
        } => {
            let status = if cancelled {
                SessionStatus::Cancelled
            } else {
                SessionStatus::Completed
            };
            let record = service
                .record_session(&user, minutes * 60 * 1000, status, goal.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        SessionAction::List { user } => {
            let sessions = service.sessions(&user)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Today { user } => {
            let sessions = service.sessions_today(&user)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
