use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectro", about = "Audio player spectrum analyzer with terminal bar display")]
pub struct Cli {
    /// Input audio file (MP3, WAV, FLAC, OGG, AAC, ...)
    pub input: Option<PathBuf>,

    /// Number of spectrum bars
    #[arg(long, default_value_t = 64)]
    pub bars: usize,

    /// FFT size in samples (power of two)
    #[arg(long, default_value_t = 1024)]
    pub fft_size: usize,

    /// Spectrum update interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    /// Dynamic range floor in dB
    #[arg(long, default_value_t = 60.0)]
    pub floor_db: f32,

    /// Playback start position in seconds
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// How many seconds to visualize (default: until end of file)
    #[arg(short, long)]
    pub seconds: Option<f64>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
