mod audio;
mod cli;
mod config;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use audio::{ClockTransport, SpectrumConfig, SpectrumUpdateDriver};
use cli::Cli;

const BAR_GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect spectro.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("spectro.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("spectro").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.bars == 64 { cli.bars = cfg.spectrum.bars; }
            if cli.fft_size == 1024 { cli.fft_size = cfg.spectrum.fft_size; }
            if cli.floor_db == 60.0 { cli.floor_db = cfg.spectrum.floor_db; }
            if cli.interval_ms == 100 { cli.interval_ms = cfg.driver.interval_ms; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !audio::decode::is_valid_audio_file(input) {
        anyhow::bail!("Not a readable audio file: {}", input.display());
    }

    log::info!("spectro - audio spectrum visualizer");
    log::info!("Input: {}", input.display());
    log::info!(
        "Bars: {}, FFT size: {}, interval: {}ms, floor: -{}dB",
        cli.bars,
        cli.fft_size,
        cli.interval_ms,
        cli.floor_db
    );

    let spectrum_config = SpectrumConfig {
        fft_size: cli.fft_size,
        bars: cli.bars,
        floor_db: cli.floor_db,
    };

    let transport = Arc::new(ClockTransport::new());
    let driver = SpectrumUpdateDriver::new(
        transport.clone(),
        &spectrum_config,
        Duration::from_millis(cli.interval_ms),
    )?;

    let info = driver.load(input)?;
    transport.set_duration(info.duration);

    let start = Duration::from_secs_f64(cli.start);
    transport.seek(start);

    driver.subscribe(|frame| {
        let mut line = String::with_capacity(frame.len() * 3 + 1);
        line.push('\r');
        for &bar in frame {
            line.push(render_glyph(bar));
        }
        print!("{}", line);
        let _ = std::io::stdout().flush();
    });

    let run_for = match cli.seconds {
        Some(seconds) => Duration::from_secs_f64(seconds),
        None if info.duration > start => info.duration - start,
        None => {
            log::warn!("Unknown or exhausted duration, visualizing 10s");
            Duration::from_secs(10)
        }
    };
    log::info!(
        "Visualizing {:.1}s from {:.1}s",
        run_for.as_secs_f64(),
        start.as_secs_f64()
    );

    transport.play();
    driver.play();

    std::thread::sleep(run_for);

    driver.pause();
    transport.pause();
    println!();

    driver.unload();
    log::info!("Done");
    Ok(())
}

fn render_glyph(value: f32) -> char {
    let clamped = value.clamp(0.0, 1.0);
    BAR_GLYPHS[(clamped * (BAR_GLYPHS.len() - 1) as f32).round() as usize]
}
