use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod fixture;

#[derive(Parser)]
#[command(name = "calsync", version, about = "Calendar/Notion sync and time-block scheduling")]
struct Cli {
    /// Configuration file (default: $CALSYNC_CONFIG or ~/.config/calsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import upcoming calendar events into the schedule database
    Pull(commands::PassArgs),
    /// Export schedule records without a calendar event
    Push(commands::PassArgs),
    /// Pull, then push
    Sync(commands::PassArgs),
    /// Fill free time blocks with pending work items
    Schedule {
        /// Shared secret; must match API_KEY
        #[arg(long)]
        key: Option<String>,
        #[command(flatten)]
        pass: commands::PassArgs,
    },
    /// Check record-store connectivity and which credentials are set
    Status {
        /// Check a JSON fixture instead of the live services
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Pull(args) => commands::sync::run(commands::sync::PassKind::Pull, config, args),
        Commands::Push(args) => commands::sync::run(commands::sync::PassKind::Push, config, args),
        Commands::Sync(args) => commands::sync::run(commands::sync::PassKind::Sync, config, args),
        Commands::Schedule { key, pass } => commands::schedule::run(config, key, pass),
        Commands::Status { fixture } => commands::status::run(config, fixture.as_deref()),
        Commands::Config { action } => commands::config::run(config, action),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
