//! hidconsole CLI
//!
//! Exchange raw reports with allow-listed HID devices.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use hidconsole::ConsoleConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands, ShortcutCommands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(ConsoleConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let config = ConsoleConfig::load(&config_path)?;

    match cli.command {
        None | Some(Commands::List) => commands::device::list(&config).await,
        Some(Commands::Encode { hex }) => commands::chunk::encode(&config, &hex),
        Some(Commands::Send { hex, device, wait }) => {
            commands::device::send(&config, &hex, device, wait).await
        }
        Some(Commands::Batch {
            hex,
            file,
            interval,
            device,
        }) => {
            commands::batch::run(&config, hex.as_deref(), file.as_deref(), interval, device).await
        }
        Some(Commands::Chunk { file, size }) => commands::chunk::chunk(&config, &file, size),
        Some(Commands::Shortcut(cmd)) => match cmd {
            ShortcutCommands::List => commands::shortcut::list(),
            ShortcutCommands::Add { name, command } => {
                commands::shortcut::add(&config, &name, &command)
            }
            ShortcutCommands::Remove { name } => commands::shortcut::remove(&name),
            ShortcutCommands::Send { name, device } => {
                commands::shortcut::send(&config, &name, device).await
            }
        },
        Some(Commands::Console { device }) => commands::console::run(&config, device).await,
    }
}
