//! Folds raw FFT magnitudes into a handful of visual bands.
//!
//! Only the lower 60% of bins are used. Each frame is normalized by its own
//! maximum (auto-gain) and compressed with a 0.7 power curve so quiet content
//! stays visible. Silent frames leave the previous output untouched.

use crate::error::{EngineError, Result};

pub const SUPPORTED_BAND_COUNTS: [usize; 4] = [32, 48, 64, 128];

/// Share of the spectrum that feeds the bands
const BIN_FRACTION: f32 = 0.6;
/// Frames whose loudest bin is at or below this are treated as silence
const SILENCE_THRESHOLD: f32 = 1e-6;
const COMPRESSION_EXPONENT: f32 = 0.7;

#[derive(Debug, Default)]
pub struct BandAggregator {
    output: Vec<f32>,
}

impl BandAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(&mut self, raw: &[f32], band_count: usize) -> Result<&[f32]> {
        if !SUPPORTED_BAND_COUNTS.contains(&band_count) {
            return Err(EngineError::InvalidConfig(format!(
                "band_count {} is not one of {:?}",
                band_count, SUPPORTED_BAND_COUNTS
            )));
        }
        if self.output.len() != band_count {
            self.output = vec![0.0; band_count];
        }

        let max_index = (raw.len() as f32 * BIN_FRACTION) as usize;
        let used = &raw[..max_index];

        let max_value = used.iter().copied().fold(0.0f32, f32::max);
        if max_value <= SILENCE_THRESHOLD {
            return Ok(&self.output);
        }

        for (band, out) in self.output.iter_mut().enumerate() {
            let start = band * max_index / band_count;
            let end = ((band + 1) * max_index / band_count).max(start + 1).min(max_index);
            let start = start.min(end - 1);

            let group = &used[start..end];
            let average = group.iter().sum::<f32>() / group.len() as f32;
            *out = (average / max_value).powf(COMPRESSION_EXPONENT).clamp(0.0, 1.0);
        }

        Ok(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn silence_keeps_previous_frame() {
        let mut agg = BandAggregator::new();
        let loud: Vec<f32> = (0..512).map(|i| (i % 7) as f32).collect();
        let before = agg.aggregate(&loud, 32).unwrap().to_vec();

        let after = agg.aggregate(&vec![0.0; 512], 32).unwrap();
        assert_eq!(after, before.as_slice());
        assert!(after.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn first_silent_frame_is_zeroes() {
        let mut agg = BandAggregator::new();
        let out = agg.aggregate(&vec![0.0; 256], 64).unwrap();
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn ignores_upper_forty_percent() {
        let mut agg = BandAggregator::new();
        let mut raw = vec![1.0; 1000];
        // Huge energy above the cut must not affect normalization
        for v in raw.iter_mut().skip(600) {
            *v = 1000.0;
        }
        let out = agg.aggregate(&raw, 32).unwrap();
        for &v in out {
            assert_relative_eq!(v, 1.0);
        }
    }

    #[test]
    fn normalizes_and_compresses() {
        let mut agg = BandAggregator::new();
        // 320 bins used -> 10 bins per band over 32 bands
        let mut raw = vec![0.0; 534];
        for v in raw[..10].iter_mut() {
            *v = 4.0;
        }
        for v in raw[10..20].iter_mut() {
            *v = 1.0;
        }
        let out = agg.aggregate(&raw, 32).unwrap();
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 0.25f32.powf(0.7), epsilon = 1e-6);
        assert_eq!(out[2], 0.0);
        assert!(out[1] > 0.25);
    }

    #[test]
    fn more_bands_than_bins_still_fills_every_band() {
        let mut agg = BandAggregator::new();
        let raw = vec![0.5; 64];
        let out = agg.aggregate(&raw, 128).unwrap();
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn rejects_unsupported_band_count() {
        let mut agg = BandAggregator::new();
        assert!(matches!(
            agg.aggregate(&[1.0; 64], 20),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
