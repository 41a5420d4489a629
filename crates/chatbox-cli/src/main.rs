use anyhow::Result;
use chatbox_core::session::SessionType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "chatbox")]
#[command(about = "Chatbox session store - migrate, inspect and edit local chat sessions", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the store to the latest schema version without loading it
    Migrate,
    /// Run startup and print a summary of the store
    Status,
    /// List and edit sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Run startup and report what the storage cleanup removed
    Gc,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Print every session in list order
    List,
    /// Create a session and make it current
    New {
        name: String,
        #[arg(long = "type", default_value = "chat")]
        session_type: SessionType,
    },
    /// Make a session current
    Switch { id: String },
    /// Duplicate a session
    Copy { id: String },
    /// Toggle a session's star
    Star { id: String },
    /// Rename a session
    Rename { id: String, name: String },
    /// Delete a session
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.data_dir)?;
    logging::init_logging(&config.log_level);
    tracing::debug!("Using configuration: {:?}", config);

    match cli.command {
        Commands::Migrate => commands::migrate::run(&config).await?,
        Commands::Status => commands::status::run(&config).await?,
        Commands::Gc => commands::gc::run(&config).await?,
        Commands::Sessions { action } => {
            let action = match action {
                SessionsAction::List => commands::sessions::Action::List,
                SessionsAction::New { name, session_type } => {
                    commands::sessions::Action::New { name, session_type }
                }
                SessionsAction::Switch { id } => commands::sessions::Action::Switch(id),
                SessionsAction::Copy { id } => commands::sessions::Action::Copy(id),
                SessionsAction::Star { id } => commands::sessions::Action::Star(id),
                SessionsAction::Rename { id, name } => commands::sessions::Action::Rename { id, name },
                SessionsAction::Remove { id } => commands::sessions::Action::Remove(id),
            };
            commands::sessions::run(&config, action).await?
        }
    }

    Ok(())
}
