use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stillmind-cli", version, about = "Stillmind sync engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus session recording and queries
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Synchronization control
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Statistics rollups
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Account lifecycle
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action).await,
        Commands::Sync { action } => commands::sync::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Account { action } => commands::account::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
