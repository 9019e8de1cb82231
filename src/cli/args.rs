//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// annotool - Client-side data layer for timeline video annotation
#[derive(Parser, Debug)]
#[command(name = "annotool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tracks of a video and which of them are visible
    Tracks {
        /// Video ID
        #[arg(long)]
        video: String,

        /// Show these track IDs instead of the default set (comma separated)
        #[arg(long, value_delimiter = ',')]
        show: Vec<String>,
    },

    /// List the annotations of a track
    Annotations {
        /// Video ID
        #[arg(long)]
        video: String,

        /// Track ID
        #[arg(long)]
        track: String,
    },

    /// Print the loop windows for a video duration
    Loops {
        /// Video duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Loop length in seconds (defaults to the configured partition)
        #[arg(short, long)]
        length: Option<f64>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
