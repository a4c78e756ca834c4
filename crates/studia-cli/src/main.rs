use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use studia_infrastructure::logging::init_logging;
use studia_infrastructure::{ConfigService, StudiaPaths};

mod commands;

#[derive(Parser)]
#[command(name = "studia")]
#[command(about = "Studia CLI - streaming conversation engine tools", long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted event stream through the engine and print the
    /// resulting transcript
    Replay {
        /// Path to the replay script (JSON)
        script: PathBuf,

        /// Also save the main transcript to the sessions directory
        #[arg(long)]
        save: bool,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let mut config = service.get_config();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    let paths = StudiaPaths::new(None);
    let _log_guard = init_logging(&config.logging, &paths)?;

    match cli.command {
        Commands::Replay { script, save } => {
            commands::replay::run(&script, &config, &paths, save).await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config::show(&service)?,
            ConfigAction::Path => commands::config::path(&service)?,
            ConfigAction::Init => commands::config::init(&service)?,
        },
    }

    Ok(())
}
