//! Strand player - headless engine front end
//!
//! Renders the demo sequence offline to WAV, or plays it live through
//! the default output device.

mod demo;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use strand_core::config::{default_config_path, load_config, EngineConfig};
use strand_core::engine::Engine;
use strand_core::export::{default_export_path, render_offline};
use strand_core::soundcard::cpal_backend;
use strand_core::thread::start_audio_loop;

#[derive(Parser, Debug)]
#[command(name = "strand-player", about = "Pattern sequencer engine player")]
struct Args {
    /// Render offline to this WAV file instead of playing live
    #[arg(long)]
    render: Option<PathBuf>,

    /// Render/play duration in seconds
    #[arg(long, default_value_t = 8.0)]
    seconds: f64,

    /// Engine config file (defaults to the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render offline to a timestamped file in the working directory
    #[arg(long)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config: EngineConfig = load_config(&config_path);
    log::info!(
        "config: {} Hz, {} frame periods, {} bpm",
        config.samplerate,
        config.buffer_size,
        config.bpm
    );

    if args.render.is_some() || args.offline {
        let path = args.render.unwrap_or_else(default_export_path);
        render(&config, args.seconds, &path)
    } else {
        play_live(&config, args.seconds)
    }
}

fn render(config: &EngineConfig, seconds: f64, path: &std::path::Path) -> anyhow::Result<()> {
    let (mut engine, _handles) = Engine::offline(config);
    let kit = demo::build(&mut engine);
    demo::start(&mut engine, kit)?;

    let frames = (seconds * config.samplerate as f64) as u64;
    render_offline(&mut engine, frames, path)
        .with_context(|| format!("rendering to {}", path.display()))?;
    println!("rendered {:.1}s to {}", seconds, path.display());
    Ok(())
}

fn play_live(config: &EngineConfig, seconds: f64) -> anyhow::Result<()> {
    let (output_handle, soundcard) = cpal_backend::start_output(config.presets())
        .context("starting audio output")?;

    let (mut engine, handles) = Engine::new(config, Box::new(soundcard));
    let kit = demo::build(&mut engine);
    demo::start(&mut engine, kit)?;

    let loop_handle = start_audio_loop(engine);
    println!(
        "playing live at {} Hz for {:.1}s...",
        output_handle.sample_rate(),
        seconds
    );
    std::thread::sleep(Duration::from_secs_f64(seconds));

    let peak = handles
        .atomics
        .master_peak_milli
        .load(std::sync::atomic::Ordering::Relaxed);
    log::info!("last master peak: {:.3}", peak as f64 / 1000.0);

    loop_handle.stop();
    Ok(())
}
