use crate::error::Result;

/// A producer of decoded, interleaved f32 samples.
pub trait PcmSource: Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Duration reported by the container, if any. May be wrong for VBR streams.
    fn declared_duration(&self) -> Option<f64>;

    /// Fill `out` with the next interleaved samples. Returns the number
    /// written; 0 means end of stream. Implementations return whole frames.
    fn read(&mut self, out: &mut [f32]) -> Result<usize>;

    /// Return to the first frame.
    fn rewind(&mut self) -> Result<()>;

    /// Position the next read at `seconds` into the stream.
    fn seek(&mut self, seconds: f64) -> Result<()>;
}

/// Interleaved samples held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    declared_duration: Option<f64>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
            declared_duration: None,
            cursor: 0,
        }
    }

    /// Report a container duration that need not match the samples.
    pub fn with_declared_duration(mut self, seconds: f64) -> Self {
        self.declared_duration = Some(seconds);
        self
    }
}

impl PcmSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn declared_duration(&self) -> Option<f64> {
        self.declared_duration.or_else(|| {
            let frames = self.samples.len() / self.channels as usize;
            Some(frames as f64 / self.sample_rate as f64)
        })
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.channels as usize;
        let remaining = self.samples.len() - self.cursor;
        let n = (out.len().min(remaining) / channels) * channels;
        out[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let channels = self.channels as usize;
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        self.cursor = (frame * channels).min(self.samples.len() / channels * channels);
        Ok(())
    }
}
