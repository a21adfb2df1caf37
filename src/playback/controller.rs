//! Load/play/pause/stop/seek state machine.
//!
//! The controller owns the source, the sink and the capture stage. `pump`
//! moves one block from the source through the capture stage to the sink and
//! is called from the audio-delivery thread; everything else is control.

use std::path::Path;
use std::sync::Arc;

use super::sink::AudioSink;
use super::state::{EventBus, Metadata, PlaybackEvent, PlaybackState, StopReason};
use crate::audio::capture::CaptureStage;
use crate::audio::decode::SymphoniaSource;
use crate::audio::position::{PlaybackClock, PositionCounter};
use crate::audio::source::PcmSource;
use crate::config::PlaybackConfig;
use crate::error::{EngineError, Result};
use crossbeam_channel::Receiver;

/// Declared and decoded durations further apart than this get a warning
const DURATION_MISMATCH_WARN_SECS: f64 = 0.010;
const WALK_BUFFER_SAMPLES: usize = 16 * 1024;

/// A source whose authoritative length has been measured and which has been
/// rewound to its first frame, ready to install.
pub struct PreparedSource {
    source: Box<dyn PcmSource>,
    metadata: Metadata,
}

impl PreparedSource {
    /// Decode the whole stream once to count its samples, then rewind.
    ///
    /// Container durations of VBR streams can be off by hundreds of
    /// milliseconds, so the count is the only length we trust.
    pub fn prepare(mut source: Box<dyn PcmSource>) -> Result<Self> {
        let sample_rate = source.sample_rate();
        let channels = source.channels();
        if sample_rate == 0 || channels == 0 {
            return Err(EngineError::Decode(format!(
                "invalid stream layout: {}Hz, {} channels",
                sample_rate, channels
            )));
        }

        let mut buf = vec![0.0f32; WALK_BUFFER_SAMPLES];
        let mut total_samples = 0u64;
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            total_samples += n as u64;
        }
        source.rewind()?;

        let duration = total_samples as f64 / (sample_rate as f64 * channels as f64);
        let declared_duration = source.declared_duration();

        log::info!(
            "Measured stream: {} samples, {}Hz, {} ch, {:.3}s",
            total_samples,
            sample_rate,
            channels,
            duration
        );
        if let Some(declared) = declared_duration {
            if (declared - duration).abs() > DURATION_MISMATCH_WARN_SECS {
                log::warn!(
                    "Declared duration {:.3}s differs from decoded {:.3}s; using decoded",
                    declared,
                    duration
                );
            }
        }

        Ok(Self {
            source,
            metadata: Metadata {
                sample_rate,
                channels,
                declared_duration,
                total_samples,
                duration,
            },
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Result of one `pump` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpOutcome {
    /// Not playing; nothing was read.
    Idle,
    /// A block went to the sink. `seconds` is its playback length.
    Delivered { samples: usize, seconds: f64 },
    /// The source ran dry and playback stopped.
    EndOfStream,
}

pub struct PlaybackController {
    state: PlaybackState,
    loaded: Option<PreparedSource>,
    sink: Box<dyn AudioSink>,
    capture: Arc<CaptureStage>,
    clock: Arc<PlaybackClock>,
    events: EventBus,
    block: Vec<f32>,
    block_frames: usize,
    /// Set after end of stream or a decode failure; the next play starts over
    restart_on_play: bool,
}

impl PlaybackController {
    pub fn new(config: &PlaybackConfig, sink: Box<dyn AudioSink>) -> Result<Self> {
        if config.block_frames == 0 {
            return Err(EngineError::InvalidConfig(
                "block_frames must be greater than 0".into(),
            ));
        }
        let counter = Arc::new(PositionCounter::new());
        let capture = Arc::new(CaptureStage::new(config.window_capacity, Arc::clone(&counter))?);
        let clock = Arc::new(PlaybackClock::new(counter));

        Ok(Self {
            state: PlaybackState::Idle,
            loaded: None,
            sink,
            capture,
            clock,
            events: EventBus::default(),
            block: Vec::new(),
            block_frames: config.block_frames,
            restart_on_play: false,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.loaded.as_ref().map(|l| &l.metadata)
    }

    pub fn capture(&self) -> Arc<CaptureStage> {
        Arc::clone(&self.capture)
    }

    pub fn clock(&self) -> Arc<PlaybackClock> {
        Arc::clone(&self.clock)
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Metadata> {
        let source = SymphoniaSource::open(path)?;
        self.load(Box::new(source))
    }

    /// Measure `source` and make it current. On error the previous source and
    /// state are left untouched.
    pub fn load(&mut self, source: Box<dyn PcmSource>) -> Result<Metadata> {
        let prepared = PreparedSource::prepare(source)?;
        Ok(self.install(prepared))
    }

    /// Replace the current source with an already measured one.
    pub fn install(&mut self, prepared: PreparedSource) -> Metadata {
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            self.transition_stopped(StopReason::Requested);
        }

        let metadata = prepared.metadata.clone();
        self.block.clear();
        self.block
            .resize(self.block_frames * metadata.channels as usize, 0.0);
        self.clock.set_stream(
            metadata.sample_rate,
            metadata.channels,
            metadata.total_samples,
        );
        self.capture.resync(0);
        self.sink.reset();
        self.loaded = Some(prepared);
        self.restart_on_play = false;
        self.state = PlaybackState::Loaded;
        self.clock.set_playing(false);

        log::info!("Loaded source: {:.3}s", metadata.duration);
        metadata
    }

    pub fn play(&mut self) -> Result<()> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(EngineError::NotLoaded);
        };
        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        if self.restart_on_play {
            loaded.source.rewind()?;
            self.capture.resync(0);
            self.sink.reset();
            self.restart_on_play = false;
        }

        self.state = PlaybackState::Playing;
        self.clock.set_playing(true);
        self.events.publish(PlaybackEvent::Started);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Paused;
        self.clock.set_playing(false);
        self.events.publish(PlaybackEvent::Paused);
    }

    /// Stop and return to the start. Unlike pause, the position is lost.
    ///
    /// The controller is `Stopped` afterwards even if the source fails to
    /// rewind; that error is returned and the rewind is retried on `play`.
    pub fn stop(&mut self) -> Result<()> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Ok(());
        };
        let rewound = loaded.source.rewind();
        self.capture.resync(0);
        self.sink.reset();
        self.restart_on_play = rewound.is_err();

        if self.state != PlaybackState::Stopped {
            self.transition_stopped(StopReason::Requested);
        }
        if let Err(ref err) = rewound {
            log::warn!("Rewind on stop failed: {}", err);
        }
        rewound
    }

    /// Move the read point to `seconds`, clamped to the stream. Play/pause
    /// state is unchanged and the reported position is the target at once.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "seek target {} is not a finite number of seconds",
                seconds
            )));
        }
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(EngineError::NotLoaded);
        };

        let meta = &loaded.metadata;
        let target = seconds.clamp(0.0, meta.duration);
        loaded.source.seek(target)?;

        let frame = (target * meta.sample_rate as f64).round() as u64;
        let target_samples = (frame * meta.channels as u64).min(meta.total_samples);
        self.capture.resync(target_samples);
        self.sink.reset();
        self.restart_on_play = false;

        log::info!("Seek to {:.3}s (sample {})", target, target_samples);
        Ok(())
    }

    /// Deliver one block: source -> capture stage -> sink.
    ///
    /// A read failure stops playback with [`StopReason::Error`] and is also
    /// returned to the caller.
    pub fn pump(&mut self) -> Result<PumpOutcome> {
        if self.state != PlaybackState::Playing {
            return Ok(PumpOutcome::Idle);
        }
        let Some(loaded) = self.loaded.as_mut() else {
            return Ok(PumpOutcome::Idle);
        };
        let samples_per_second =
            loaded.metadata.sample_rate as f64 * loaded.metadata.channels as f64;

        match loaded.source.read(&mut self.block) {
            Ok(0) => {
                log::info!("End of stream at {:.3}s", self.clock.position_seconds());
                self.restart_on_play = true;
                self.transition_stopped(StopReason::EndOfStream);
                Ok(PumpOutcome::EndOfStream)
            }
            Ok(n) => {
                let block = &self.block[..n];
                self.capture.on_samples_delivered(block);
                self.sink.write(block);
                Ok(PumpOutcome::Delivered {
                    samples: n,
                    seconds: n as f64 / samples_per_second,
                })
            }
            Err(err) => {
                log::warn!("Decode failed mid-stream: {}", err);
                self.restart_on_play = true;
                self.transition_stopped(StopReason::Error(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn position_seconds(&self) -> f64 {
        self.clock.position_seconds()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.clock.duration_seconds()
    }

    pub fn is_at_end(&self) -> bool {
        self.clock.is_at_end()
    }

    fn transition_stopped(&mut self, reason: StopReason) {
        self.state = PlaybackState::Stopped;
        self.clock.set_playing(false);
        self.events.publish(PlaybackEvent::Stopped(reason));
    }
}
