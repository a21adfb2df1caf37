//! Threaded runtime around [`PlaybackController`].
//!
//! Two worker threads:
//! - delivery: pumps blocks from the source through the capture stage to the
//!   sink, paced at the stream rate when `realtime` is set
//! - analysis: every `tick_ms`, turns the capture window into a
//!   [`SpectrumFrame`]; ticks are skipped (never queued) while not playing
//!
//! Position queries go through the lock-free [`PlaybackClock`] and never
//! touch the controller mutex.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::controller::{PlaybackController, PreparedSource, PumpOutcome};
use super::sink::AudioSink;
use super::state::{Metadata, PlaybackEvent, PlaybackState};
use crate::analysis::features::SpectrumFrame;
use crate::analysis::spectrum::SpectrumAnalyzer;
use crate::analysis::SpectrumPipeline;
use crate::audio::capture::CaptureStage;
use crate::audio::decode::SymphoniaSource;
use crate::audio::position::PlaybackClock;
use crate::audio::source::PcmSource;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crossbeam_channel::Receiver;

/// Sleep between polls while there is nothing to deliver
const IDLE_POLL: Duration = Duration::from_millis(5);

pub struct Player {
    controller: Arc<Mutex<PlaybackController>>,
    clock: Arc<PlaybackClock>,
    capture: Arc<CaptureStage>,
    analyzer: Mutex<SpectrumAnalyzer>,
    latest: Arc<Mutex<Option<SpectrumFrame>>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Player {
    pub fn new(config: &EngineConfig, sink: Box<dyn AudioSink>) -> Result<Self> {
        config.validate()?;

        let controller = PlaybackController::new(&config.playback, sink)?;
        let clock = controller.clock();
        let capture = controller.capture();
        let pipeline = SpectrumPipeline::new(Arc::clone(&capture), &config.analysis)?;

        let controller = Arc::new(Mutex::new(controller));
        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let delivery = {
            let controller = Arc::clone(&controller);
            let running = Arc::clone(&running);
            let realtime = config.playback.realtime;
            thread::Builder::new()
                .name("pcmscope-delivery".into())
                .spawn(move || delivery_loop(controller, running, realtime))
                .map_err(|e| EngineError::Thread("delivery", e))?
        };

        let analysis = {
            let clock = Arc::clone(&clock);
            let latest = Arc::clone(&latest);
            let running_flag = Arc::clone(&running);
            let tick = Duration::from_millis(config.analysis.tick_ms);
            let spawned = thread::Builder::new()
                .name("pcmscope-analysis".into())
                .spawn(move || analysis_loop(pipeline, clock, latest, running_flag, tick));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    running.store(false, Ordering::Release);
                    let _ = delivery.join();
                    return Err(EngineError::Thread("analysis", e));
                }
            }
        };

        log::info!(
            "Player started: fft={} bands={} tick={}ms realtime={}",
            config.analysis.fft_size,
            config.analysis.band_count,
            config.analysis.tick_ms,
            config.playback.realtime
        );

        Ok(Self {
            controller,
            clock,
            capture,
            analyzer: Mutex::new(SpectrumAnalyzer::new()),
            latest,
            running,
            threads: vec![delivery, analysis],
        })
    }

    /// Measure `source` without holding the controller lock, then install it.
    pub fn load(&self, source: Box<dyn PcmSource>) -> Result<Metadata> {
        let prepared = PreparedSource::prepare(source)?;
        Ok(self.controller.lock().install(prepared))
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Metadata> {
        let source = SymphoniaSource::open(path)?;
        self.load(Box::new(source))
    }

    pub fn play(&self) -> Result<()> {
        self.controller.lock().play()
    }

    pub fn pause(&self) {
        self.controller.lock().pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.controller.lock().stop()
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.controller.lock().seek(seconds)
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.lock().state()
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.controller.lock().subscribe()
    }

    /// Raw FFT magnitudes of the newest `fft_size` delivered samples.
    pub fn fft_data(&self, fft_size: usize) -> Result<Vec<f32>> {
        self.analyzer.lock().analyze(&self.capture, fft_size)
    }

    pub fn current_position(&self) -> f64 {
        self.clock.position_seconds()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration_seconds()
    }

    pub fn is_at_end(&self) -> bool {
        self.clock.is_at_end()
    }

    /// Most recent published spectrum, if any tick has completed.
    pub fn latest_frame(&self) -> Option<SpectrumFrame> {
        self.latest.lock().clone()
    }

    /// Stop both worker threads and wait for them.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("Player worker thread panicked");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn delivery_loop(controller: Arc<Mutex<PlaybackController>>, running: Arc<AtomicBool>, realtime: bool) {
    while running.load(Ordering::Acquire) {
        let outcome = controller.lock().pump();
        match outcome {
            Ok(PumpOutcome::Delivered { seconds, .. }) => {
                if realtime {
                    thread::sleep(Duration::from_secs_f64(seconds));
                } else {
                    thread::yield_now();
                }
            }
            Ok(PumpOutcome::Idle) | Ok(PumpOutcome::EndOfStream) => thread::sleep(IDLE_POLL),
            Err(err) => {
                log::warn!("Playback stopped: {}", err);
                thread::sleep(IDLE_POLL);
            }
        }
    }
}

fn analysis_loop(
    mut pipeline: SpectrumPipeline,
    clock: Arc<PlaybackClock>,
    latest: Arc<Mutex<Option<SpectrumFrame>>>,
    running: Arc<AtomicBool>,
    tick: Duration,
) {
    let mut next = Instant::now();
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next {
            thread::sleep(next - now);
            continue;
        }
        // Missed ticks are dropped, not replayed
        next = now + tick;

        if !clock.is_playing() {
            continue;
        }
        if let Some(frame) = pipeline.tick(now, clock.position_seconds()) {
            *latest.lock() = Some(frame.clone());
        }
    }
}
