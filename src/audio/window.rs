//! Fixed-capacity circular buffer holding the most recent samples.
//!
//! Capacity is rounded up to a power of two so indices wrap with a mask.
//! The window has no locking of its own; [`CaptureStage`](super::capture::CaptureStage)
//! owns the critical section around it.

use crate::error::{EngineError, Result};

#[derive(Debug)]
pub struct SampleWindow {
    buffer: Vec<f32>,
    /// Next slot to overwrite
    write_idx: usize,
    /// Samples written since the last clear, saturating at capacity
    filled: usize,
    mask: usize,
}

impl SampleWindow {
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "sample window capacity must be greater than 0".into(),
            ));
        }
        let capacity = requested_capacity.next_power_of_two();
        Ok(Self {
            buffer: vec![0.0; capacity],
            write_idx: 0,
            filled: 0,
            mask: capacity - 1,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid samples, at most `capacity()`.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Append samples, overwriting the oldest once full. Never allocates.
    pub fn push_slice(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        // Only the tail of an oversized block can survive
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };
        let n = samples.len();
        if n == 0 {
            return;
        }

        let start = self.write_idx;
        if start + n <= capacity {
            self.buffer[start..start + n].copy_from_slice(samples);
        } else {
            let first_part = capacity - start;
            self.buffer[start..].copy_from_slice(&samples[..first_part]);
            self.buffer[..n - first_part].copy_from_slice(&samples[first_part..]);
        }

        self.write_idx = (start + n) & self.mask;
        self.filled = (self.filled + n).min(capacity);
    }

    /// Copy the most recent `dest.len()` samples into `dest`, oldest first.
    ///
    /// When fewer samples are buffered, the front of `dest` is zero-filled so
    /// the newest sample always lands in the last slot. Returns the number of
    /// real samples copied.
    pub fn copy_latest(&self, dest: &mut [f32]) -> usize {
        let capacity = self.capacity();
        let want = dest.len().min(capacity);
        let available = want.min(self.filled);
        let pad = dest.len() - available;

        dest[..pad].fill(0.0);
        if available == 0 {
            return 0;
        }

        let out = &mut dest[pad..];
        let start = (self.write_idx + capacity - available) & self.mask;
        if start + available <= capacity {
            out.copy_from_slice(&self.buffer[start..start + available]);
        } else {
            let first_part = capacity - start;
            out[..first_part].copy_from_slice(&self.buffer[start..]);
            out[first_part..].copy_from_slice(&self.buffer[..available - first_part]);
        }
        available
    }

    /// Forget all samples without releasing the allocation.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_idx = 0;
        self.filled = 0;
    }
}
