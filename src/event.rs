//! The single inbound event queue every source feeds into.
//!
//! MIDI input callbacks, player notifications and timers all push [`Event`]s into one unbounded
//! tokio channel. The [`Dispatcher`](crate::Dispatcher) drains it one event at a time.

use tokio::sync::mpsc;

use crate::artwork::Artwork;
use crate::player::{AudioAnalysis, PlayerNotification};

pub type Sender = mpsc::UnboundedSender<Event>;
pub type Receiver = mpsc::UnboundedReceiver<Event>;

pub fn channel() -> (Sender, Receiver) {
    mpsc::unbounded_channel()
}

/// What an input port is listened to for
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PortRole {
    /// Presses on the controlled UI
    #[default]
    Controls,
    /// Only layout announcements; presses on the device's native layouts arrive here too
    Announcements,
}

/// Undecoded bytes as delivered by an input port
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawMessage {
    pub timestamp: u64,
    /// Name of the port the bytes arrived on
    pub source: String,
    pub role: PortRole,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum Event {
    Input(RawMessage),
    Player(PlayerNotification),
    /// One period of the BPM clock elapsed
    ClockTick,
    /// One period of the 20 ms beat-matching timer elapsed
    BeatTick,
    /// The beat flash has been shown long enough
    BeatFlashOff,
    ColorWheelTick,
    /// Delayed tempo indicator after a BPM change
    TempoFlash,
    /// The queue-change letter has been shown long enough
    QueueFlashEnd,
    ArtworkLoaded {
        generation: u64,
        /// Pad that receives the average color
        position: u8,
        artwork: crate::Result<Artwork>,
    },
    AnalysisLoaded {
        generation: u64,
        analysis: crate::Result<AudioAnalysis>,
    },
    Shutdown,
}
