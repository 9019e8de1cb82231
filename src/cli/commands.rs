//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cli::args::ConfigCommand;
use crate::config::Settings;
use crate::context::AppContext;
use crate::looping::LoopController;
use crate::resource::{Annotation, Persistable};
use crate::sync::SyncDispatcher;
use crate::tracks::{AnnotationSource, Tracks};

/// List the tracks of a video, loading annotations for the visible ones
pub async fn list_tracks(settings: &Settings, video: &str, show: Vec<String>) -> Result<()> {
    let ctx = AppContext::from_settings(settings.clone()).shared();
    let dispatcher = Arc::new(SyncDispatcher::from_context(Arc::clone(&ctx))?);
    let source: Arc<dyn AnnotationSource> = dispatcher.clone();

    let mut tracks = Tracks::new(ctx, source, format!("videos/{video}/tracks"));
    tracks
        .fetch(&dispatcher)
        .await
        .with_context(|| format!("Failed to load tracks of video {video}"))?;

    if tracks.is_empty() {
        println!("No tracks found");
        return Ok(());
    }

    if show.is_empty() {
        tracks.show_initial().await;
    } else {
        tracks.show_tracks_by_id(&show).await;
    }

    let selected = tracks.selected().and_then(|t| t.id()).map(str::to_string);

    println!(
        "{:<10} {:<30} {:<6} {:<8} {:<12}",
        "ID", "Name", "Order", "Visible", "Annotations"
    );
    println!("{}", "-".repeat(70));

    for track in tracks.iter() {
        let id = track.id().unwrap_or("-");
        let marker = if selected.as_deref() == Some(id) { "*" } else { "" };
        let annotations = if track.annotations_loaded {
            track.annotations.len().to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:<10} {:<30} {:<6} {:<8} {:<12}",
            format!("{id}{marker}"),
            truncate(&track.name, 28),
            track.order,
            if track.visible { "yes" } else { "no" },
            annotations
        );
    }

    Ok(())
}

/// List the annotations of one track
pub async fn list_annotations(settings: &Settings, video: &str, track: &str) -> Result<()> {
    let ctx = AppContext::from_settings(settings.clone()).shared();
    let dispatcher = SyncDispatcher::from_context(ctx)?;

    let url = format!("videos/{video}/tracks/{track}/annotations");
    let mut annotations: Vec<Annotation> = dispatcher
        .fetch_all(&url)
        .await
        .with_context(|| format!("Failed to load annotations of track {track}"))?;

    if annotations.is_empty() {
        println!("No annotations found");
        return Ok(());
    }

    annotations.sort_by(|a, b| a.start.total_cmp(&b.start));

    println!("{:<10} {:<10} {:<10} {:<20} {}", "ID", "Start", "End", "Label", "Text");
    println!("{}", "-".repeat(70));

    for annotation in &annotations {
        let label = annotation
            .label
            .as_ref()
            .map(|l| l.value.as_str())
            .unwrap_or("");
        println!(
            "{:<10} {:<10} {:<10} {:<20} {}",
            annotation.id().unwrap_or("-"),
            format_clock(annotation.start),
            format_clock(annotation.end()),
            truncate(label, 18),
            annotation.text.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Print the loop partition of a video
pub fn print_loops(settings: &Settings, duration: f64, length: Option<f64>) -> Result<()> {
    let mut controller = LoopController::new(duration, settings.looping.clone())?;
    if let Some(length) = length {
        controller = controller.with_length(length)?;
    }

    let windows = controller.plan();
    println!(
        "Loop length: {}s ({} loops)",
        controller.loop_length(),
        windows.len()
    );
    println!("{:<6} {:<10} {:<10}", "#", "Start", "End");

    for (index, window) in windows.iter().enumerate() {
        println!(
            "{:<6} {:<10} {:<10}",
            index,
            format_clock(window.start),
            format_clock(window.end)
        );
    }

    Ok(())
}

/// Handle config commands
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(settings)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

// Helper functions

fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0);
    let whole = total as u64;
    let minutes = whole / 60;
    let seconds = total - (minutes * 60) as f64;

    if minutes >= 60 {
        format!("{}:{:02}:{:04.1}", minutes / 60, minutes % 60, seconds)
    } else {
        format!("{:02}:{:04.1}", minutes, seconds)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
