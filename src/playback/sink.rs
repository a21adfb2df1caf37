/// Destination for delivered audio, e.g. an OS output device.
///
/// Blocks arrive unmodified, after the capture stage has observed them.
pub trait AudioSink: Send {
    fn write(&mut self, block: &[f32]);

    /// Drop anything queued; called on seek and stop.
    fn reset(&mut self) {}
}

/// Discards audio. Used headless and in tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, _block: &[f32]) {}
}
