pub mod bands;
pub mod features;
pub mod smoothing;
pub mod spectrum;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::capture::CaptureStage;
use crate::config::AnalysisConfig;
use crate::error::{EngineError, Result};
use bands::{BandAggregator, SUPPORTED_BAND_COUNTS};
use features::SpectrumFrame;
use smoothing::SmoothingEngine;
use spectrum::SpectrumAnalyzer;

/// Analyze -> aggregate -> smooth, once per tick, on the consumer thread.
pub struct SpectrumPipeline {
    capture: Arc<CaptureStage>,
    analyzer: SpectrumAnalyzer,
    aggregator: BandAggregator,
    smoother: SmoothingEngine,
    fft_size: usize,
    band_count: usize,
    last: Option<SpectrumFrame>,
}

impl SpectrumPipeline {
    pub fn new(capture: Arc<CaptureStage>, config: &AnalysisConfig) -> Result<Self> {
        let fft_size = config.fft_size;
        if fft_size == 0 || !fft_size.is_power_of_two() || fft_size > capture.window_capacity() {
            return Err(EngineError::InvalidWindowSize(fft_size));
        }
        if !SUPPORTED_BAND_COUNTS.contains(&config.band_count) {
            return Err(EngineError::InvalidConfig(format!(
                "band_count {} is not one of {:?}",
                config.band_count, SUPPORTED_BAND_COUNTS
            )));
        }
        let smoother = SmoothingEngine::new(
            config.band_count,
            config.smoothing,
            Duration::from_millis(config.peak_hold_ms),
        )?;

        Ok(Self {
            capture,
            analyzer: SpectrumAnalyzer::new(),
            aggregator: BandAggregator::new(),
            smoother,
            fft_size,
            band_count: config.band_count,
            last: None,
        })
    }

    /// Run one tick. Returns `None` when the tick was skipped, in which case
    /// the previous frame stays current.
    pub fn tick(&mut self, now: Instant, time: f64) -> Option<&SpectrumFrame> {
        if self.capture.buffered() == 0 {
            log::debug!("Skipping analysis tick: sample window is empty");
            return None;
        }
        match self.compute(now, time) {
            Ok(frame) => {
                self.last = Some(frame);
                self.last.as_ref()
            }
            Err(err) => {
                log::debug!("Skipping analysis tick: {}", err);
                None
            }
        }
    }

    fn compute(&mut self, now: Instant, time: f64) -> Result<SpectrumFrame> {
        let raw = self.analyzer.analyze(&self.capture, self.fft_size)?;
        let bands = self.aggregator.aggregate(&raw, self.band_count)?;
        let (bands, peaks) = self.smoother.apply(bands, now)?;
        Ok(SpectrumFrame { bands, peaks, time })
    }

    pub fn last_frame(&self) -> Option<&SpectrumFrame> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::position::PositionCounter;

    fn pipeline(band_count: usize) -> (Arc<CaptureStage>, SpectrumPipeline) {
        let capture = Arc::new(CaptureStage::new(4096, Arc::new(PositionCounter::new())).unwrap());
        let config = AnalysisConfig {
            fft_size: 1024,
            band_count,
            smoothing: 0.5,
            ..AnalysisConfig::default()
        };
        let pipeline = SpectrumPipeline::new(Arc::clone(&capture), &config).unwrap();
        (capture, pipeline)
    }

    #[test]
    fn empty_window_skips_tick() {
        let (_capture, mut pipeline) = pipeline(64);
        assert!(pipeline.tick(Instant::now(), 0.0).is_none());
        assert!(pipeline.last_frame().is_none());
    }

    #[test]
    fn tone_produces_bounded_frame() {
        let (capture, mut pipeline) = pipeline(32);
        let tone: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * 40.0 * i as f32 / 1024.0).sin())
            .collect();
        capture.on_samples_delivered(&tone);

        let frame = pipeline.tick(Instant::now(), 1.5).unwrap();
        assert_eq!(frame.bands.len(), 32);
        assert_eq!(frame.peaks.len(), 32);
        assert_eq!(frame.time, 1.5);
        assert!(frame.bands.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(frame.max_band() > 0.0);
    }

    #[test]
    fn silence_after_signal_keeps_frames_finite() {
        let (capture, mut pipeline) = pipeline(48);
        capture.on_samples_delivered(&[0.5; 1024]);
        pipeline.tick(Instant::now(), 0.0).unwrap();

        capture.on_samples_delivered(&[0.0; 4096]);
        let frame = pipeline.tick(Instant::now(), 0.1).unwrap();
        assert!(frame.bands.iter().all(|v| v.is_finite()));
        assert!(frame.peaks.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_fft_larger_than_window() {
        let capture = Arc::new(CaptureStage::new(512, Arc::new(PositionCounter::new())).unwrap());
        let config = AnalysisConfig::default();
        assert!(matches!(
            SpectrumPipeline::new(capture, &config),
            Err(EngineError::InvalidWindowSize(2048))
        ));
    }
}
