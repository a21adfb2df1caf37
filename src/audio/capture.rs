//! Tap between the decoder and the output sink.
//!
//! Every delivered block advances the position counter and is copied into the
//! rolling sample window. This runs on the audio-delivery thread, so it does
//! no allocation and no analysis; the window lock is held only for the copy.

use parking_lot::Mutex;
use std::sync::Arc;

use super::position::PositionCounter;
use super::window::SampleWindow;
use crate::error::Result;

#[derive(Debug)]
pub struct CaptureStage {
    window: Mutex<SampleWindow>,
    position: Arc<PositionCounter>,
}

impl CaptureStage {
    pub fn new(window_capacity: usize, position: Arc<PositionCounter>) -> Result<Self> {
        Ok(Self {
            window: Mutex::new(SampleWindow::new(window_capacity)?),
            position,
        })
    }

    /// Observe a block on its way to the output. Returns the sample count.
    pub fn on_samples_delivered(&self, block: &[f32]) -> usize {
        let count = block.len();
        // Position first and unconditionally: it is the authoritative clock
        self.position.advance(count as u64);
        self.window.lock().push_slice(block);
        count
    }

    /// Copy the newest `dest.len()` samples, oldest first. Returns how many
    /// were real samples rather than zero padding.
    pub fn snapshot(&self, dest: &mut [f32]) -> usize {
        self.window.lock().copy_latest(dest)
    }

    pub fn window_capacity(&self) -> usize {
        self.window.lock().capacity()
    }

    pub fn buffered(&self) -> usize {
        self.window.lock().len()
    }

    pub fn position(&self) -> &Arc<PositionCounter> {
        &self.position
    }

    /// Seek barrier: clear the window and move the counter to `target_samples`
    /// while holding the window lock, so no reader sees stale samples paired
    /// with the new position.
    pub fn resync(&self, target_samples: u64) {
        let mut window = self.window.lock();
        window.clear();
        self.position.set(target_samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(capacity: usize) -> CaptureStage {
        CaptureStage::new(capacity, Arc::new(PositionCounter::new())).unwrap()
    }

    #[test]
    fn position_equals_sum_of_block_sizes() {
        let capture = stage(64);
        let sizes = [3usize, 0, 128, 7, 64];
        let mut total = 0;
        for n in sizes {
            let block = vec![0.1; n];
            assert_eq!(capture.on_samples_delivered(&block), n);
            total += n as u64;
        }
        assert_eq!(capture.position().get(), total);
    }

    #[test]
    fn capacity_samples_round_trip_in_order() {
        let capture = stage(16);
        let written: Vec<f32> = (0..16).map(|i| (i as f32 * 0.37).sin()).collect();
        for chunk in written.chunks(5) {
            capture.on_samples_delivered(chunk);
        }

        let mut read = vec![0.0; 16];
        assert_eq!(capture.snapshot(&mut read), 16);
        assert_eq!(read, written);
    }

    #[test]
    fn resync_clears_window_and_sets_counter() {
        let capture = stage(16);
        capture.on_samples_delivered(&[1.0; 12]);
        capture.resync(220_500);

        assert_eq!(capture.position().get(), 220_500);
        assert_eq!(capture.buffered(), 0);
        let mut read = [5.0; 8];
        assert_eq!(capture.snapshot(&mut read), 0);
        assert_eq!(read, [0.0; 8]);
    }
}
