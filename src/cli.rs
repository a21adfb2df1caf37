use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pcmscope", about = "Play an audio file headless while tracking position and spectrum")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Config file (defaults to pcmscope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// FFT window size (power of two)
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Number of spectrum bands (32, 48, 64 or 128)
    #[arg(long, default_value_t = 64)]
    pub bands: usize,

    /// Smoothing factor for the spectrum (0.0-1.0)
    #[arg(long, default_value_t = 0.85)]
    pub smoothing: f32,

    /// Peak hold time in milliseconds
    #[arg(long, default_value_t = 500)]
    pub peak_hold_ms: u64,

    /// Start playback at this position (seconds)
    #[arg(long)]
    pub seek: Option<f64>,

    /// Deliver as fast as possible instead of at the stream's sample rate
    #[arg(long)]
    pub fast: bool,

    /// Write each published spectrum frame as a JSON line
    #[arg(long)]
    pub frames_out: Option<PathBuf>,
}
