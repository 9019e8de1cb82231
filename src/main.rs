//! annotool - Client-side data layer for timeline video annotation
//!
//! Entry point for the annotool CLI application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use annotool::cli::{Cli, Commands};
use annotool::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        annotool::cli::completions::print(shell);
        return Ok(());
    }

    // Load configuration only for runtime commands.
    let settings = Settings::load()?;

    // Initialize logging
    let default_level = if cli.verbose {
        "debug"
    } else {
        settings.general.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Tracks { video, show } => {
            annotool::cli::commands::list_tracks(&settings, &video, show).await?;
        }
        Commands::Annotations { video, track } => {
            annotool::cli::commands::list_annotations(&settings, &video, &track).await?;
        }
        Commands::Loops { duration, length } => {
            annotool::cli::commands::print_loops(&settings, duration, length)?;
        }
        Commands::Config(config_cmd) => {
            annotool::cli::commands::config_command(&settings, config_cmd)?;
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
