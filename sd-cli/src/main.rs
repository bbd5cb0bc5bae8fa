//! StreamDemo CLI - Command-line client for StreamDemo live rooms.
//!
//! Lists and manages live rooms over the REST API and joins a room's
//! real-time channel from the terminal: incoming chat is printed, stdin
//! lines are sent as chat.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use sd_core::config::{AppConfig, ConfigHandle};
use sd_core::error::SdResult;
use sd_core::logging;

/// StreamDemo - live-room client.
#[derive(Parser)]
#[command(
    name = "streamdemo",
    version,
    about = "StreamDemo live-room client CLI",
    long_about = "A command-line client for StreamDemo live rooms.\n\
                   Browse and manage rooms, or join a room to watch its chat and talk."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room's live channel. Lines typed on stdin are sent as chat.
    Watch {
        /// Room id.
        room_id: String,
        /// Credential (overrides the saved one).
        #[arg(short, long)]
        token: Option<String>,
        /// Server address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// Save the server address to the config file.
        #[arg(long)]
        save: bool,
    },
    /// List and manage live rooms.
    Rooms {
        #[command(subcommand)]
        action: commands::rooms::RoomsAction,
    },
    /// Manage the saved credential.
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

#[tokio::main]
async fn main() -> SdResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(std::path::Path::new(path))?,
        None => AppConfig::load_default()?,
    };

    // Initialize logging
    let _guard = logging::init_from_config(&config, cli.verbose)?;

    let config_handle = ConfigHandle::new(config);

    info!("StreamDemo CLI v{}", sd_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Watch {
            room_id,
            token,
            address,
            save,
        } => commands::watch::run(config_handle, room_id, token, address, save, cli.format).await,
        Commands::Rooms { action } => commands::rooms::run(config_handle, action, cli.format).await,
        Commands::Auth { action } => commands::auth::run(action, cli.format).await,
    }
}
