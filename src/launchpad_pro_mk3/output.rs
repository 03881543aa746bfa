use super::{SYSEX_HEADER, SYSEX_STOP};
use crate::{MidiSink, OutputDevice, Rgb};

/// Leading byte of a lighting command body
const LIGHTING_COMMAND: u8 = 3;

/// Body of the "select layout" command that switches the device into programmer mode
const PROGRAMMER_MODE: [u8; 2] = [14, 1];

/// MIDI realtime clock byte. Sending 24 of these per beat sets the device's flash/pulse tempo.
pub const CLOCK_TICK: u8 = 0xF8;

/// The description of one pad light, as understood by the Pro MK3 lighting SysEx command.
///
/// Positions use the programmer-mode numbering: `row * 10 + column` where rows and columns of
/// the main grid run from 1 to 8 (11 is the bottom-left pad), the right-hand column is 19..89,
/// the top row is 91..98, the bottom rows are 1..8 and 101..108.
///
/// Every variant has a fixed light type that determines the payload arity:
///
/// | variant    | light type | payload               |
/// |------------|------------|-----------------------|
/// | `Static`   | 0          | one palette index     |
/// | `Flashing` | 1          | two palette indices   |
/// | `Pulsing`  | 2          | one palette index     |
/// | `Rgb`      | 3          | three 0..=127 values  |
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum ColorSpec {
    Static { position: u8, color: u8 },
    Flashing { position: u8, color_a: u8, color_b: u8 },
    Pulsing { position: u8, color: u8 },
    Rgb { position: u8, color: Rgb },
}

impl ColorSpec {
    pub fn palette(position: u8, color: u8) -> Self {
        ColorSpec::Static { position, color }
    }

    /// Flash between palette colors `color_a` and `color_b`
    pub fn flashing(position: u8, color_a: u8, color_b: u8) -> Self {
        ColorSpec::Flashing {
            position,
            color_a,
            color_b,
        }
    }

    pub fn pulsing(position: u8, color: u8) -> Self {
        ColorSpec::Pulsing { position, color }
    }

    pub fn rgb(position: u8, color: Rgb) -> Self {
        ColorSpec::Rgb { position, color }
    }

    /// Light the pad black
    pub fn off(position: u8) -> Self {
        Self::palette(position, 0)
    }

    pub fn light_type(&self) -> u8 {
        match self {
            ColorSpec::Static { .. } => 0,
            ColorSpec::Flashing { .. } => 1,
            ColorSpec::Pulsing { .. } => 2,
            ColorSpec::Rgb { .. } => 3,
        }
    }

    pub fn position(&self) -> u8 {
        match *self {
            ColorSpec::Static { position, .. }
            | ColorSpec::Flashing { position, .. }
            | ColorSpec::Pulsing { position, .. }
            | ColorSpec::Rgb { position, .. } => position,
        }
    }

    /// The same light, stamped onto another pad.
    ///
    /// ```rust
    /// # use launchpad_remote::pro_mk3::ColorSpec;
    /// let template = ColorSpec::flashing(20, 5, 0);
    /// assert_eq!(template.at(11), ColorSpec::flashing(11, 5, 0));
    /// ```
    pub fn at(self, position: u8) -> Self {
        match self {
            ColorSpec::Static { color, .. } => ColorSpec::Static { position, color },
            ColorSpec::Flashing {
                color_a, color_b, ..
            } => ColorSpec::Flashing {
                position,
                color_a,
                color_b,
            },
            ColorSpec::Pulsing { color, .. } => ColorSpec::Pulsing { position, color },
            ColorSpec::Rgb { color, .. } => ColorSpec::Rgb { position, color },
        }
    }

    /// Clone this spec, optionally overriding the position
    pub fn copy(&self, position: Option<u8>) -> Self {
        match position {
            Some(position) => self.at(position),
            None => *self,
        }
    }

    /// The payload following light type and position
    pub fn color_data(&self) -> Vec<u8> {
        match *self {
            ColorSpec::Static { color, .. } | ColorSpec::Pulsing { color, .. } => vec![color],
            ColorSpec::Flashing {
                color_a, color_b, ..
            } => vec![color_a, color_b],
            ColorSpec::Rgb { color, .. } => vec![color.r, color.g, color.b],
        }
    }

    /// `[light type, position, ...payload]`
    pub fn sysex_message(&self) -> Vec<u8> {
        let mut bytes = vec![self.light_type(), self.position()];
        bytes.extend(self.color_data());
        bytes
    }
}

/// An ordered set of lights sent as one lighting command
#[derive(Debug, Clone, Default, Hash, Eq, PartialEq)]
pub struct ColorSysexMessage {
    pub specs: Vec<ColorSpec>,
}

impl ColorSysexMessage {
    pub fn new(specs: Vec<ColorSpec>) -> Self {
        Self { specs }
    }

    /// The command body, without header or terminator: `[3, ...each spec]`
    pub fn body(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 5 * self.specs.len());
        bytes.push(LIGHTING_COMMAND);
        for spec in &self.specs {
            bytes.extend(spec.sysex_message());
        }
        bytes
    }

    /// The complete message, ready to be sent
    pub fn encode(&self) -> Vec<u8> {
        sysex(&self.body())
    }
}

impl From<Vec<ColorSpec>> for ColorSysexMessage {
    fn from(specs: Vec<ColorSpec>) -> Self {
        Self::new(specs)
    }
}

/// Wrap a command body into a complete Pro MK3 SysEx message
pub fn sysex(body: &[u8]) -> Vec<u8> {
    [&SYSEX_HEADER[..], body, &[SYSEX_STOP]].concat()
}

/// Encode a set of lights into one lighting SysEx message.
///
/// ```rust
/// # use launchpad_remote::pro_mk3::{encode, ColorSpec};
/// assert_eq!(
///     encode(&[ColorSpec::palette(5, 10)]),
///     [240, 0, 32, 41, 2, 14, 3, 0, 5, 10, 247],
/// );
/// ```
pub fn encode(specs: &[ColorSpec]) -> Vec<u8> {
    ColorSysexMessage::new(specs.to_vec()).encode()
}

/// The object handling any messages _to_ the Launchpad Pro MK3.
///
/// The device connection itself is abstracted behind a [`MidiSink`], so that the same output can
/// be backed by a real port or by a [`MockSink`](crate::MockSink) in tests.
pub struct Output {
    sink: Box<dyn MidiSink>,
}

impl OutputDevice for Output {
    const MIDI_CONNECTION_NAME: &'static str = "Launchpad Remote output";
    const MIDI_DEVICE_KEYWORD: &'static str = "LPProMK3 MIDI";

    fn from_connection(connection: midir::MidiOutputConnection) -> crate::Result<Self> {
        Ok(Self::from_sink(connection))
    }

    fn send(&mut self, bytes: &[u8]) -> crate::Result<()> {
        log::trace!("-> {:?}", bytes);
        self.sink.send(bytes)
    }
}

impl Output {
    pub fn from_sink(sink: impl MidiSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Light multiple pads in one SysEx message. Nothing is sent for an empty set.
    ///
    /// For example to light the bottom-left pad red and flash the one above it:
    /// ```rust
    /// # use launchpad_remote::{MockSink, pro_mk3::{ColorSpec, Output}};
    /// let sink = MockSink::default();
    /// let mut output = Output::from_sink(sink.clone());
    /// output.set_buttons(&[ColorSpec::palette(11, 5), ColorSpec::flashing(21, 5, 0)])?;
    /// assert_eq!(sink.messages().len(), 1);
    /// # Ok::<(), launchpad_remote::Error>(())
    /// ```
    pub fn set_buttons(&mut self, specs: &[ColorSpec]) -> crate::Result<()> {
        if specs.is_empty() {
            return Ok(());
        }
        self.send(&encode(specs))
    }

    /// Light a single pad
    pub fn light(&mut self, spec: ColorSpec) -> crate::Result<()> {
        self.set_buttons(&[spec])
    }

    /// Switch the device to programmer mode, in which every pad is addressable by position
    pub fn enter_programmer_mode(&mut self) -> crate::Result<()> {
        self.send(&sysex(&PROGRAMMER_MODE))
    }

    /// Send one realtime clock tick. At 24 ticks per beat the device flashes and pulses in time.
    pub fn send_clock_tick(&mut self) -> crate::Result<()> {
        self.send(&[CLOCK_TICK])
    }
}
