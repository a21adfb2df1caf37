use serde::Deserialize;
use std::path::Path;

use crate::analysis::bands::SUPPORTED_BAND_COUNTS;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// FFT window in samples (power of two)
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Number of visual bands (32, 48, 64 or 128)
    #[serde(default = "default_band_count")]
    pub band_count: usize,
    /// Temporal smoothing (0.0-1.0, higher = slower response)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// How long a peak is held before it starts to fall
    #[serde(default = "default_peak_hold_ms")]
    pub peak_hold_ms: u64,
    /// Analysis tick period
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Capacity of the rolling sample window (rounded up to a power of two)
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Frames pulled from the source per delivery
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,
    /// Pace delivery at the stream's sample rate instead of as fast as possible
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            band_count: default_band_count(),
            smoothing: default_smoothing(),
            peak_hold_ms: default_peak_hold_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            block_frames: default_block_frames(),
            realtime: default_realtime(),
        }
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_band_count() -> usize { 64 }
fn default_smoothing() -> f32 { 0.85 }
fn default_peak_hold_ms() -> u64 { 500 }
fn default_tick_ms() -> u64 { 16 }
fn default_window_capacity() -> usize { 8192 }
fn default_block_frames() -> usize { 1024 }
fn default_realtime() -> bool { true }

impl EngineConfig {
    /// Reject settings the engine cannot run with. Nothing is modified.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        let p = &self.playback;

        if p.window_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "window_capacity must be greater than 0".into(),
            ));
        }
        let capacity = p.window_capacity.next_power_of_two();
        if a.fft_size == 0 || !a.fft_size.is_power_of_two() || a.fft_size > capacity {
            return Err(EngineError::InvalidWindowSize(a.fft_size));
        }
        if !SUPPORTED_BAND_COUNTS.contains(&a.band_count) {
            return Err(EngineError::InvalidConfig(format!(
                "band_count {} is not one of {:?}",
                a.band_count, SUPPORTED_BAND_COUNTS
            )));
        }
        if !a.smoothing.is_finite() || !(0.0..=1.0).contains(&a.smoothing) {
            return Err(EngineError::InvalidConfig(format!(
                "smoothing {} must be within 0.0-1.0",
                a.smoothing
            )));
        }
        if a.tick_ms == 0 {
            return Err(EngineError::InvalidConfig("tick_ms must be greater than 0".into()));
        }
        if p.block_frames == 0 {
            return Err(EngineError::InvalidConfig(
                "block_frames must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Option<EngineConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.analysis.fft_size, 2048);
        assert_eq!(cfg.analysis.band_count, 64);
        assert_eq!(cfg.playback.window_capacity, 8192);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [analysis]
            band_count = 32
            smoothing = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.band_count, 32);
        assert_eq!(cfg.analysis.smoothing, 0.5);
        assert_eq!(cfg.analysis.fft_size, 2048);
        assert!(cfg.playback.realtime);
    }

    #[test]
    fn rejects_bad_fft_size() {
        let mut cfg = EngineConfig::default();
        cfg.analysis.fft_size = 3;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidWindowSize(3))));

        cfg.analysis.fft_size = 16384;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidWindowSize(16384))));
    }

    #[test]
    fn rejects_out_of_range_smoothing_and_bands() {
        let mut cfg = EngineConfig::default();
        cfg.analysis.smoothing = 1.5;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));

        let mut cfg = EngineConfig::default();
        cfg.analysis.smoothing = f32::NAN;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));

        let mut cfg = EngineConfig::default();
        cfg.analysis.band_count = 50;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn missing_file_yields_none() {
        assert!(load_config(Path::new("/nonexistent/pcmscope.toml")).is_none());
    }
}
