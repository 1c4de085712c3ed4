// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hidconsole")]
#[command(author, version, about = "Raw HID report console")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/hidconsole/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List allow-listed devices that are attached
    #[command(visible_alias = "ls")]
    List,

    /// Frame hex text into one report and print it
    #[command(visible_alias = "enc")]
    Encode {
        /// Hex payload, whitespace ignored (e.g. "F5 05 31")
        hex: String,
    },

    /// Send one report and print the inbound reports that follow
    Send {
        /// Hex payload
        hex: String,
        /// Device index from `list` (prompt if omitted)
        #[arg(short, long)]
        device: Option<usize>,
        /// How long to print inbound reports after sending (ms)
        #[arg(short, long, default_value = "500")]
        wait: u64,
    },

    /// Send a hex payload or a file as a paced sequence of reports
    Batch {
        /// Hex payload, split into report-sized chunks
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        hex: Option<String>,
        /// Binary file to send instead of hex text
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Interval between reports in ms (default from config)
        #[arg(short, long)]
        interval: Option<u64>,
        /// Device index from `list` (prompt if omitted)
        #[arg(short, long)]
        device: Option<usize>,
    },

    /// Print a file as report-sized hex chunks
    Chunk {
        file: PathBuf,
        /// Chunk size in bytes (default: report size)
        #[arg(short, long)]
        size: Option<usize>,
    },

    /// Manage saved send-area commands
    #[command(subcommand, visible_alias = "sc")]
    Shortcut(ShortcutCommands),

    /// Interactive console with hot-plug reconnect
    #[command(visible_alias = "c")]
    Console {
        /// Device index from `list` (reconnect last paired device if omitted)
        #[arg(short, long)]
        device: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ShortcutCommands {
    /// List saved shortcuts
    List,

    /// Add a shortcut or replace its command
    Add {
        /// Name (up to 20 characters)
        name: String,
        /// Hex command
        command: String,
    },

    /// Remove a shortcut
    #[command(visible_alias = "rm")]
    Remove { name: String },

    /// Send a saved shortcut
    Send {
        name: String,
        /// Device index from `list` (prompt if omitted)
        #[arg(short, long)]
        device: Option<usize>,
    },
}
