//! Playback position tracking and live spectrum analysis for a decoded PCM
//! stream.
//!
//! Samples flow decoder -> [`CaptureStage`] -> output sink. The capture stage
//! counts every delivered sample (the authoritative playback position) and
//! keeps a rolling window of the newest ones, which a periodic analysis tick
//! turns into a smoothed, peak-held band spectrum.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use analysis::features::SpectrumFrame;
pub use analysis::SpectrumPipeline;
pub use audio::capture::CaptureStage;
pub use audio::decode::SymphoniaSource;
pub use audio::position::{PlaybackClock, PositionCounter};
pub use audio::source::{MemorySource, PcmSource};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use playback::controller::{PlaybackController, PreparedSource, PumpOutcome};
pub use playback::player::Player;
pub use playback::sink::{AudioSink, NullSink};
pub use playback::state::{Metadata, PlaybackEvent, PlaybackState, StopReason};
