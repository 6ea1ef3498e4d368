use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spectrum: SpectrumSection,
    #[serde(default)]
    pub driver: DriverSection,
}

#[derive(Debug, Deserialize)]
pub struct SpectrumSection {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_bars")]
    pub bars: usize,
    #[serde(default = "default_floor_db")]
    pub floor_db: f32,
}

#[derive(Debug, Deserialize)]
pub struct DriverSection {
    /// Tick interval in milliseconds. 100-250ms keeps the display
    /// responsive without outpacing the FFT.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SpectrumSection {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            bars: default_bars(),
            floor_db: default_floor_db(),
        }
    }
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_fft_size() -> usize { 1024 }
fn default_bars() -> usize { 64 }
fn default_floor_db() -> f32 { 60.0 }
fn default_interval_ms() -> u64 { 100 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
