//! Replay Demo
//!
//! Plays a synthetic repository history on a background tick thread:
//! - Ramps speed up mid-run, then snaps to a preset
//! - Follows the configured boundary mode (ping-pong in playback.toml)
//! - Prints the final diagnostics snapshot as JSON
//!
//! Run with: cargo run -p reel_playback --example replay -- crates/reel_playback/examples/playback.toml

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use reel_playback::{PlaybackConfig, SpeedPreset, Timed, TimelinePlayer};

#[derive(Debug)]
struct Commit {
    author: &'static str,
    summary: String,
}

fn history() -> Vec<Timed<Commit>> {
    const AUTHORS: [&str; 3] = ["ana", "bo", "chen"];
    (0..24)
        .map(|i| {
            Timed::new(
                i as f64 * 0.2,
                Commit {
                    author: AUTHORS[i % AUTHORS.len()],
                    summary: format!("change #{i}"),
                },
            )
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => PlaybackConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PlaybackConfig::default(),
    };
    tracing::info!(?config, "starting replay");

    let player = TimelinePlayer::builder(history())
        .config(config)
        .build()
        .context("Failed to build player")?;

    player.on_event(|event| {
        println!(
            "{:>6.2}s  {:<5} {}",
            event.time, event.payload.author, event.payload.summary
        );
    });
    player.on_loop_completed(|n| println!("-- boundary #{n}"));
    player.on_state_changed(|state| println!("-- {state}"));

    player.play()?;
    thread::sleep(Duration::from_millis(600));

    player.set_target_speed(12.0)?;
    thread::sleep(Duration::from_millis(600));

    player.apply_speed_preset(SpeedPreset::HalfSpeed)?;
    thread::sleep(Duration::from_millis(400));

    if let Err(err) = player.pause() {
        tracing::warn!(%err, "playback ended before pause");
    }
    println!("{}", player.diagnostics().to_json()?);
    player.stop();
    Ok(())
}
