use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::capture::CaptureStage;
use crate::error::{EngineError, Result};

/// Windowed FFT over the newest samples in the capture window.
///
/// Scratch buffers are reused between calls; they only grow when the window
/// size changes.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    hann: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            hann: Vec::new(),
            samples: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Magnitudes of the first `window_size / 2` bins of the newest
    /// `window_size` captured samples. The capture lock is held only for the copy.
    pub fn analyze(&mut self, capture: &CaptureStage, window_size: usize) -> Result<Vec<f32>> {
        validate_window_size(window_size, capture.window_capacity())?;

        self.samples.resize(window_size, 0.0);
        capture.snapshot(&mut self.samples);

        Ok(self.transform(window_size))
    }

    /// Same transform applied to caller-provided samples.
    pub fn analyze_samples(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let window_size = samples.len();
        validate_window_size(window_size, usize::MAX)?;

        self.samples.clear();
        self.samples.extend_from_slice(samples);

        Ok(self.transform(window_size))
    }

    fn transform(&mut self, n: usize) -> Vec<f32> {
        if self.hann.len() != n {
            self.hann = hann_window(n);
        }

        self.buffer.clear();
        self.buffer.extend(
            self.samples
                .iter()
                .zip(self.hann.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0)),
        );

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.buffer);

        self.buffer[..n / 2].iter().map(|c| c.norm()).collect()
    }
}

fn validate_window_size(window_size: usize, capacity: usize) -> Result<()> {
    if window_size == 0 || !window_size.is_power_of_two() || window_size > capacity {
        return Err(EngineError::InvalidWindowSize(window_size));
    }
    Ok(())
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::position::PositionCounter;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn capture_with(samples: &[f32], capacity: usize) -> CaptureStage {
        let capture = CaptureStage::new(capacity, Arc::new(PositionCounter::new())).unwrap();
        capture.on_samples_delivered(samples);
        capture
    }

    #[test]
    fn returns_half_the_window() {
        let capture = capture_with(&[0.25; 4096], 4096);
        let mut analyzer = SpectrumAnalyzer::new();
        for n in [2usize, 64, 1024, 4096] {
            assert_eq!(analyzer.analyze(&capture, n).unwrap().len(), n / 2);
        }
    }

    #[test]
    fn rejects_invalid_sizes() {
        let capture = capture_with(&[0.0; 16], 1024);
        let mut analyzer = SpectrumAnalyzer::new();
        for n in [0usize, 3, 100, 2048] {
            assert!(matches!(
                analyzer.analyze(&capture, n),
                Err(EngineError::InvalidWindowSize(m)) if m == n
            ));
        }
    }

    #[test]
    fn empty_window_is_all_zero() {
        let capture = capture_with(&[], 1024);
        let mut analyzer = SpectrumAnalyzer::new();
        let mags = analyzer.analyze(&capture, 256).unwrap();
        assert!(mags.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let n = 1024;
        let bin = 64;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut analyzer = SpectrumAnalyzer::new();
        let mags = analyzer.analyze_samples(&samples).unwrap();

        let loudest = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, bin);
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let w = hann_window(8);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[7], 0.0, epsilon = 1e-6);
        assert!(w[3] > 0.9 && w[4] > 0.9);
    }
}
