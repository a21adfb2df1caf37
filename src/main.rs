mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use cli::Cli;
use pcmscope::config::{self, EngineConfig};
use pcmscope::{NullSink, PlaybackEvent, Player, StopReason};

const POLL_INTERVAL: Duration = Duration::from_millis(33);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Config: explicit --config path, or auto-detect pcmscope.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("pcmscope.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("pcmscope").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("pcmscope").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut engine_config = EngineConfig::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            engine_config = cfg;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Merge: CLI values win only when moved off their defaults
    if cli.fft_size != 2048 { engine_config.analysis.fft_size = cli.fft_size; }
    if cli.bands != 64 { engine_config.analysis.band_count = cli.bands; }
    if cli.smoothing != 0.85 { engine_config.analysis.smoothing = cli.smoothing; }
    if cli.peak_hold_ms != 500 { engine_config.analysis.peak_hold_ms = cli.peak_hold_ms; }
    if cli.fast { engine_config.playback.realtime = false; }

    log::info!("pcmscope - playback position and spectrum tracker");
    log::info!("Input: {}", cli.input.display());

    // 1. Start the engine
    let player = Player::new(&engine_config, Box::new(NullSink::new()))
        .context("Failed to start player")?;
    let events = player.subscribe();

    // 2. Load (walks the whole file once to measure its real length)
    let meta = player
        .load_file(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    log::info!(
        "Duration: {:.3}s (declared {}), {}Hz, {} ch",
        meta.duration,
        meta.declared_duration
            .map_or_else(|| "unknown".to_string(), |d| format!("{:.3}s", d)),
        meta.sample_rate,
        meta.channels
    );

    if let Some(seconds) = cli.seek {
        player.seek(seconds).context("Seek failed")?;
    }

    let mut frames_out = match cli.frames_out {
        Some(ref path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => None,
    };

    // 3. Play, tracking position until the stream stops
    let pb = ProgressBar::new((meta.duration * 1000.0).round() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    player.play().context("Failed to start playback")?;

    let mut last_frame_time = f64::NEG_INFINITY;
    let mut stop_reason = None;
    while stop_reason.is_none() {
        std::thread::sleep(POLL_INTERVAL);

        let position = player.current_position();
        let frame = player.latest_frame();
        let level = frame.as_ref().map_or(0.0, |f| f.max_band());
        pb.set_position((position * 1000.0).round() as u64);
        pb.set_message(format!(
            "{:.2}s / {:.2}s  level {:.2}",
            position,
            player.duration(),
            level
        ));

        if let Some(frame) = frame {
            if frame.time != last_frame_time {
                last_frame_time = frame.time;
                if let Some(ref mut out) = frames_out {
                    serde_json::to_writer(&mut *out, &frame)?;
                    out.write_all(b"\n")?;
                }
            }
        }

        for event in events.try_iter() {
            log::debug!("Event: {:?}", event);
            if let PlaybackEvent::Stopped(reason) = event {
                stop_reason = Some(reason);
            }
        }
    }

    pb.finish();

    if let Some(mut out) = frames_out {
        out.flush()?;
    }

    // 4. Report
    match stop_reason {
        Some(StopReason::Error(msg)) => anyhow::bail!("Playback failed: {}", msg),
        _ => {
            log::info!(
                "Done at {:.3}s of {:.3}s (at end: {})",
                player.current_position(),
                player.duration(),
                player.is_at_end()
            );
        }
    }

    Ok(())
}
