use std::collections::HashMap;

use super::SYSEX_HEADER;
use crate::event::PortRole;
use crate::InputDevice;

/// The main Pro MK3 port, carrying pad and button presses
pub struct Input;

impl InputDevice for Input {
    const MIDI_CONNECTION_NAME: &'static str = "Launchpad Remote input";
    const MIDI_DEVICE_KEYWORD: &'static str = "LPProMK3 MIDI";
}

/// The DAW port, on which the device announces layout switches made on its own UI
pub struct DawInput;

impl InputDevice for DawInput {
    const MIDI_CONNECTION_NAME: &'static str = "Launchpad Remote DAW input";
    const MIDI_DEVICE_KEYWORD: &'static str = "MIDIIN3 (LPProMK3 MIDI)";
    const ROLE: PortRole = PortRole::Announcements;
}

/// Coarse classification of an incoming message by its status byte
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum Action {
    NoteOff,
    NoteOn,
    ControlChange,
    ProgramChange,
    /// Channel or polyphonic pressure
    Aftertouch,
    /// Any system message except the realtime clock
    SysEx,
    Clock,
    /// Pitch bend, or an empty message
    Unknown,
}

impl Action {
    pub fn from_status(status: u8) -> Self {
        if status == crate::pro_mk3::CLOCK_TICK {
            return Action::Clock;
        }

        match status >> 4 {
            0x8 => Action::NoteOff,
            0x9 => Action::NoteOn,
            0xA | 0xD => Action::Aftertouch,
            0xB => Action::ControlChange,
            0xC => Action::ProgramChange,
            0xF => Action::SysEx,
            _ => Action::Unknown,
        }
    }

    fn is_channel_voice(self) -> bool {
        !matches!(self, Action::SysEx | Action::Clock | Action::Unknown)
    }
}

/// Logical state of a note, as last reported by the device
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum NoteState {
    On,
    Off,
}

/// Remembers the last logical state of every `(channel, note)` pair, so that repeated or retained
/// presses can be told apart from fresh ones.
///
/// Only note-on and note-off messages update the table; a note-on with velocity 0 counts as a
/// note-off.
#[derive(Debug, Clone, Default)]
pub struct NoteStateTable {
    states: HashMap<(u8, u8), NoteState>,
}

impl NoteStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: u8, number: u8) -> Option<NoteState> {
        self.states.get(&(channel, number)).copied()
    }

    /// Record a message and return the state that was stored before it
    fn record(&mut self, action: Action, channel: u8, number: u8, velocity: u8) -> Option<NoteState> {
        let previous = self.get(channel, number);
        let state = match action {
            Action::NoteOn if velocity != 0 => NoteState::On,
            Action::NoteOn | Action::NoteOff => NoteState::Off,
            _ => return previous,
        };
        self.states.insert((channel, number), state);
        previous
    }
}

/// Layouts the Pro MK3 firmware can report switching to
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum DeviceLayout {
    Session,
    Fader,
    Chord,
    Custom,
    Other(u8),
}

impl From<u8> for DeviceLayout {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Session,
            1 => Self::Fader,
            2 => Self::Chord,
            3 => Self::Custom,
            other => Self::Other(other),
        }
    }
}

/// Emitted by the device when the user switches its built-in layout
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct LayoutAnnouncement {
    pub layout: DeviceLayout,
    pub page: u8,
}

/// A SysEx message carrying the Pro MK3 header
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct DeviceSysEx {
    /// Everything after the six header bytes, terminator included
    pub payload: Vec<u8>,
    pub layout: Option<LayoutAnnouncement>,
}

impl DeviceSysEx {
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() <= SYSEX_HEADER.len() || data[..SYSEX_HEADER.len()] != SYSEX_HEADER {
            return None;
        }

        let payload = data[SYSEX_HEADER.len()..].to_vec();
        let layout = match payload.as_slice() {
            &[0, layout, page, _, _] => Some(LayoutAnnouncement {
                layout: layout.into(),
                page,
            }),
            _ => None,
        };

        Some(Self { payload, layout })
    }
}

/// One classified incoming MIDI message
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MidiEvent {
    pub timestamp: u64,
    /// Name of the port the message arrived on
    pub source: String,
    pub status: u8,
    pub action: Action,
    /// Present for channel-voice messages
    pub channel: Option<u8>,
    pub number: Option<u8>,
    pub velocity: Option<u8>,
    /// The state recorded for `(channel, number)` before this message arrived
    pub previous: Option<NoteState>,
    /// Present for SysEx messages that carry the Pro MK3 header
    pub sysex: Option<DeviceSysEx>,
}

impl MidiEvent {
    /// Classify a raw message and update `states` with it.
    ///
    /// Decoding never fails: anything that doesn't match a known shape yields an event with just
    /// the coarse [`Action`].
    pub fn decode(data: &[u8], timestamp: u64, source: &str, states: &mut NoteStateTable) -> Self {
        let status = data.first().copied().unwrap_or(0);
        let action = if data.is_empty() {
            Action::Unknown
        } else {
            Action::from_status(status)
        };

        let mut event = Self {
            timestamp,
            source: source.to_owned(),
            status,
            action,
            channel: None,
            number: None,
            velocity: None,
            previous: None,
            sysex: None,
        };

        if action == Action::SysEx {
            event.sysex = DeviceSysEx::parse(data);
        } else if action.is_channel_voice() {
            let channel = status & 0x0F;
            event.channel = Some(channel);
            event.number = data.get(1).copied();
            event.velocity = data.get(2).copied();

            if let Some(number) = event.number {
                event.previous =
                    states.record(action, channel, number, event.velocity.unwrap_or(0));
            }
        }

        event
    }

    /// Whether this message repeats the state already recorded for its `(channel, number)`.
    ///
    /// A fresh press (rising edge) has `was_on() == Some(false)`. Undefined for SysEx.
    pub fn was_on(&self) -> Option<bool> {
        match self.action {
            Action::SysEx => None,
            Action::NoteOn => Some(self.previous == Some(NoteState::On)),
            Action::NoteOff => Some(self.previous == Some(NoteState::Off)),
            _ => Some(false),
        }
    }

    pub fn layout_announcement(&self) -> Option<LayoutAnnouncement> {
        self.sysex.as_ref().and_then(|sysex| sysex.layout)
    }

    /// `(channel, number, velocity)` of a note-on or control change
    pub fn triplet(&self) -> Option<(u8, u8, u8)> {
        Some((self.channel?, self.number?, self.velocity?))
    }
}
