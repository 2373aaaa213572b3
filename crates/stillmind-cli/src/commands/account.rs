use clap::Subcommand;

use super::CmdResult;

#[derive(Subcommand)]
pub enum AccountAction {
    /// Print the local pre-login identity, creating it if needed
    Init,
    /// Register a verified identity and pull its history
    Login {
        user: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Flush remaining data and mark the account logged out
    Logout { user: String },
    /// Move sessions from one owner to another
    Migrate { from: String, to: String },
    /// Delete all data for a user, locally and remotely
    Wipe { user: String },
}

pub async fn run(action: AccountAction) -> CmdResult {
    let service = super::open_service()?;

    match action {
        AccountAction::Init => {
            println!("{}", service.account().ensure_local_identity()?);
        }
        AccountAction::Login { user, name, email } => {
            let verified = service.login(&user, &name, &email, "").await?;
            println!("logged in (local persistence verified: {verified})");
        }
        AccountAction::Logout { user } => {
            service.account().handle_logout(&user).await?;
            println!("{}", service.get_sync_status(&user).await);
        }
        AccountAction::Migrate { from, to } => {
            let moved = service.account().migrate_identity(&from, &to).await?;
            println!("moved {moved} sessions");
        }
        AccountAction::Wipe { user } => {
            service.account().wipe_account(&user).await?;
            println!("account data removed");
        }
    }
    Ok(())
}
