//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Conversion queue - deferred ad conversion store
#[derive(Parser, Debug)]
#[command(name = "convq", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.convq/data/conversion_queue.db)
    #[arg(long, global = true, env = "CONVQ_DB")]
    pub db: Option<PathBuf>,

    /// Rows per INSERT statement when saving (default: 50)
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database or upgrade it to the current schema
    Migrate {
        /// Treat the database as being at this legacy version
        #[arg(long)]
        from: Option<u32>,
    },

    /// Save queue items from a JSON array (`-` reads stdin)
    Save {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List every queued item, earliest first
    List,

    /// Show the next item due for processing
    Next,

    /// Show items for a creative instance
    Get {
        /// Creative instance ID
        creative_instance_id: String,
    },

    /// Mark a creative instance's items as processed
    MarkProcessed {
        /// Creative instance ID
        creative_instance_id: String,
    },

    /// Delete a creative instance's items
    Delete {
        /// Creative instance ID
        creative_instance_id: String,
    },

    /// Print version information
    Version,
}
