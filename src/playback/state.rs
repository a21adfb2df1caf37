use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Requested,
    EndOfStream,
    Error(String),
}

/// Published once per state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlaybackEvent {
    Started,
    Paused,
    Stopped(StopReason),
}

/// What `load` learned about a source.
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub sample_rate: u32,
    pub channels: u16,
    /// Container-declared duration, possibly wrong
    pub declared_duration: Option<f64>,
    /// Interleaved samples counted by decoding the whole stream
    pub total_samples: u64,
    /// Duration derived from `total_samples`
    pub duration: f64,
}

/// Fan-out of playback events to every subscriber.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlaybackEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to everyone still listening; dropped receivers are pruned.
    pub fn publish(&mut self, event: PlaybackEvent) {
        log::debug!("Playback event: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
