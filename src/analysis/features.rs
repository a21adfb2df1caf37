use serde::Serialize;

/// One published analysis result, ready for a renderer.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SpectrumFrame {
    /// Smoothed band magnitudes (0.0-1.0), lowest frequency first
    pub bands: Vec<f32>,
    /// Peak-hold value per band (0.0-1.0), same length as `bands`
    pub peaks: Vec<f32>,
    /// Playback position the frame was computed at, in seconds
    pub time: f64,
}

impl SpectrumFrame {
    /// Loudest smoothed band, handy for meters.
    pub fn max_band(&self) -> f32 {
        self.bands.iter().copied().fold(0.0f32, f32::max)
    }
}
