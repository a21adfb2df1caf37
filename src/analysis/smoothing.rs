use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// Fraction a peak loses per tick once its hold time has run out.
///
/// Per tick rather than per second, so the fall speed follows the analysis
/// tick rate.
pub const PEAK_DECAY_PER_TICK: f32 = 0.05;

/// Per-band peak value and when it was last raised.
#[derive(Debug, Clone)]
pub struct PeakHoldState {
    pub peaks: Vec<f32>,
    pub raised_at: Vec<Instant>,
}

impl PeakHoldState {
    pub fn new(band_count: usize, now: Instant) -> Self {
        Self {
            peaks: vec![0.0; band_count],
            raised_at: vec![now; band_count],
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

fn validate_smoothing(smoothing_factor: f32) -> Result<()> {
    if !smoothing_factor.is_finite() || !(0.0..=1.0).contains(&smoothing_factor) {
        return Err(EngineError::InvalidConfig(format!(
            "smoothing factor {} must be within 0.0-1.0",
            smoothing_factor
        )));
    }
    Ok(())
}

/// One smoothing step.
///
/// Each band moves from `previous` toward `new_values` by `1 - smoothing_factor`.
/// A band that rises above its peak raises the peak and restarts its hold
/// timer; a band that reaches its peak again also restarts it. A peak not
/// raised for longer than `hold` decays geometrically.
pub fn smooth(
    band_count: usize,
    new_values: &[f32],
    previous_values: &[f32],
    peak_state: &mut PeakHoldState,
    smoothing_factor: f32,
    hold: Duration,
    now: Instant,
) -> Result<(Vec<f32>, Vec<f32>)> {
    validate_smoothing(smoothing_factor)?;
    if new_values.len() != band_count
        || previous_values.len() != band_count
        || peak_state.len() != band_count
    {
        return Err(EngineError::InvalidConfig(format!(
            "band count mismatch: expected {}, got new={} previous={} peaks={}",
            band_count,
            new_values.len(),
            previous_values.len(),
            peak_state.len()
        )));
    }

    let response = 1.0 - smoothing_factor;
    let mut current = Vec::with_capacity(band_count);

    for i in 0..band_count {
        let value = previous_values[i] + (new_values[i] - previous_values[i]) * response;
        current.push(value);

        if value >= peak_state.peaks[i] {
            peak_state.peaks[i] = value;
            peak_state.raised_at[i] = now;
        } else if now.saturating_duration_since(peak_state.raised_at[i]) > hold {
            peak_state.peaks[i] *= 1.0 - PEAK_DECAY_PER_TICK;
        }
    }

    Ok((current, peak_state.peaks.clone()))
}

/// Holds the previous frame and peak state between ticks.
#[derive(Debug)]
pub struct SmoothingEngine {
    smoothing_factor: f32,
    hold: Duration,
    previous: Vec<f32>,
    peaks: PeakHoldState,
}

impl SmoothingEngine {
    pub fn new(band_count: usize, smoothing_factor: f32, hold: Duration) -> Result<Self> {
        validate_smoothing(smoothing_factor)?;
        Ok(Self {
            smoothing_factor,
            hold,
            previous: vec![0.0; band_count],
            peaks: PeakHoldState::new(band_count, Instant::now()),
        })
    }

    /// Smooth `new_values` against the previous tick and return
    /// `(current, peaks)`. A change in band count restarts from zero.
    pub fn apply(&mut self, new_values: &[f32], now: Instant) -> Result<(Vec<f32>, Vec<f32>)> {
        let band_count = new_values.len();
        if self.previous.len() != band_count {
            self.previous = vec![0.0; band_count];
            self.peaks = PeakHoldState::new(band_count, now);
        }

        let (current, peaks) = smooth(
            band_count,
            new_values,
            &self.previous,
            &mut self.peaks,
            self.smoothing_factor,
            self.hold,
            now,
        )?;
        self.previous.clone_from(&current);
        Ok((current, peaks))
    }
}
