//! Sample-accurate playback position.
//!
//! `PositionCounter` counts interleaved samples handed to the output since the
//! last reset. Reads and increments are plain atomics so position polling from
//! the UI never contends with the audio path. Only `set` (seek/stop) takes a
//! lock, serializing resyncs against each other.
//!
//! `PlaybackClock` pairs the counter with the stream layout and authoritative
//! length so position, duration and end-of-stream can be answered lock-free.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct PositionCounter {
    samples: AtomicU64,
    resync: Mutex<()>,
}

impl PositionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` delivered samples.
    #[inline]
    pub fn advance(&self, count: u64) {
        self.samples.fetch_add(count, Ordering::AcqRel);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }

    /// Jump to an absolute sample count. The only way the counter goes back.
    pub fn set(&self, samples: u64) {
        let _guard = self.resync.lock();
        self.samples.store(samples, Ordering::Release);
    }

    pub fn reset(&self) {
        self.set(0);
    }
}

#[derive(Debug, Default)]
pub struct PlaybackClock {
    counter: Arc<PositionCounter>,
    /// sample_rate * channels of the loaded stream, 0 when nothing is loaded
    samples_per_second: AtomicU64,
    /// Authoritative interleaved sample count of the loaded stream
    total_samples: AtomicU64,
    playing: AtomicBool,
}

impl PlaybackClock {
    pub fn new(counter: Arc<PositionCounter>) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }

    pub fn counter(&self) -> &Arc<PositionCounter> {
        &self.counter
    }

    pub(crate) fn set_stream(&self, sample_rate: u32, channels: u16, total_samples: u64) {
        self.samples_per_second
            .store(sample_rate as u64 * channels as u64, Ordering::Release);
        self.total_samples.store(total_samples, Ordering::Release);
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        self.samples_per_second.load(Ordering::Acquire) > 0
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Acquire)
    }

    /// Delivered samples converted to seconds, clamped to the stream length.
    pub fn position_seconds(&self) -> f64 {
        let sps = self.samples_per_second.load(Ordering::Acquire);
        if sps == 0 {
            return 0.0;
        }
        let delivered = self.counter.get().min(self.total_samples());
        delivered as f64 / sps as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        let sps = self.samples_per_second.load(Ordering::Acquire);
        if sps == 0 {
            return 0.0;
        }
        self.total_samples() as f64 / sps as f64
    }

    /// True once the reported position has reached the duration. Always
    /// false when no stream is loaded.
    pub fn is_at_end(&self) -> bool {
        self.is_loaded() && self.position_seconds() >= self.duration_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn counter_sums_every_block() {
        let counter = PositionCounter::new();
        for n in [512u64, 0, 17, 4096, 1] {
            counter.advance(n);
        }
        assert_eq!(counter.get(), 512 + 17 + 4096 + 1);
    }

    #[test]
    fn set_replaces_instead_of_adding() {
        let counter = PositionCounter::new();
        counter.advance(1000);
        counter.set(250);
        assert_eq!(counter.get(), 250);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let counter = Arc::new(PositionCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.advance(3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.get(), 4 * 10_000 * 3);
    }

    #[test]
    fn clock_clamps_overshoot_to_duration() {
        let counter = Arc::new(PositionCounter::new());
        let clock = PlaybackClock::new(Arc::clone(&counter));
        clock.set_stream(44_100, 2, 88_200);

        counter.advance(44_100);
        assert_relative_eq!(clock.position_seconds(), 0.5);
        assert!(!clock.is_at_end());

        counter.advance(90_000);
        assert_relative_eq!(clock.position_seconds(), 1.0);
        assert_relative_eq!(clock.duration_seconds(), 1.0);
        assert!(clock.is_at_end());
    }

    #[test]
    fn unloaded_clock_reports_zero_and_not_at_end() {
        let clock = PlaybackClock::new(Arc::new(PositionCounter::new()));
        assert_eq!(clock.position_seconds(), 0.0);
        assert_eq!(clock.duration_seconds(), 0.0);
        assert!(!clock.is_at_end());
    }
}
