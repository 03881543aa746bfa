use std::sync::{Arc, Mutex};

use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc::UnboundedSender;

use crate::event::{Event, PortRole, RawMessage};
use crate::ok_or_continue;
use crate::{Error, Result};


/// Exact name matches win over substring matches: "LPProMK3 MIDI" is also contained in the name of
/// the DAW port "MIDIIN3 (LPProMK3 MIDI)".
fn guess_port<T: midir::MidiIO>(midi_io: &T, keyword: &str) -> Option<T::Port> {
	let mut fallback = None;
	for port in midi_io.ports() {
		let name = ok_or_continue!(midi_io.port_name(&port));

		if name == keyword {
			return Some(port);
		}
		if fallback.is_none() && name.contains(keyword) {
			fallback = Some(port);
		}
	}

	return fallback;
}

/// Anything outgoing device messages can be written to
pub trait MidiSink: Send {
	fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

impl MidiSink for MidiOutputConnection {
	fn send(&mut self, bytes: &[u8]) -> Result<()> {
		MidiOutputConnection::send(self, bytes)?;
		return Ok(());
	}
}

/// A sink that records every message instead of sending it anywhere. Clones share the same
/// recording, so keep one clone around to inspect what an [`Output`](crate::pro_mk3::Output) sent.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
	sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockSink {
	fn recorded(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
		// a poisoned recording is still a usable recording
		return self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
	}

	/// All messages sent so far, oldest first
	pub fn messages(&self) -> Vec<Vec<u8>> {
		return self.recorded().clone();
	}

	/// Return all messages sent so far and forget them
	pub fn take(&self) -> Vec<Vec<u8>> {
		return std::mem::take(&mut *self.recorded());
	}

	pub fn clear(&self) {
		self.recorded().clear();
	}
}

impl MidiSink for MockSink {
	fn send(&mut self, bytes: &[u8]) -> Result<()> {
		self.recorded().push(bytes.to_vec());
		return Ok(());
	}
}

pub trait OutputDevice where Self: Sized {
	const MIDI_CONNECTION_NAME: &'static str;
	const MIDI_DEVICE_KEYWORD: &'static str;

	/// Initiate from an existing midir connection.
	fn from_connection(connection: MidiOutputConnection) -> Result<Self>;

	fn send(&mut self, bytes: &[u8]) -> Result<()>;

	/// Connect to the first output port whose name contains [`Self::MIDI_DEVICE_KEYWORD`]
	fn guess() -> Result<Self> {
		return Self::guess_named(Self::MIDI_DEVICE_KEYWORD);
	}

	/// Connect to the first output port whose name contains `keyword`
	fn guess_named(keyword: &str) -> Result<Self> {
		let midi_output = MidiOutput::new(crate::APPLICATION_NAME)?;

		let port = guess_port(&midi_output, keyword)
				.ok_or_else(|| Error::NoPortFound { keyword: keyword.to_owned() })?;

		let connection = midi_output.connect(&port, Self::MIDI_CONNECTION_NAME)?;
		log::info!("connected output '{}'", keyword);

		return Self::from_connection(connection);
	}
}

/// Keeps an input connection alive. Dropping the handler closes the port.
pub struct InputDeviceHandler {
	#[allow(dead_code)]
	connection: MidiInputConnection<()>,
	port_name: String,
}

impl InputDeviceHandler {
	pub fn port_name(&self) -> &str {
		&self.port_name
	}
}

/// An input port feeding raw messages into the event queue.
///
/// Decoding happens on the consumer side, where the note state table lives; the midir callback
/// only forwards bytes tagged with the port they came from.
pub trait InputDevice {
	const MIDI_CONNECTION_NAME: &'static str;
	const MIDI_DEVICE_KEYWORD: &'static str;
	const ROLE: PortRole = PortRole::Controls;

	#[must_use = "If not saved, the connection will be immediately dropped"]
	fn from_port(midi_input: MidiInput, port: &MidiInputPort, events: UnboundedSender<Event>)
			-> Result<InputDeviceHandler> {

		let port_name = midi_input.port_name(port)?;
		let source = port_name.clone();

		let midir_callback = move |timestamp: u64, data: &[u8], _: &mut ()| {
			let message = RawMessage {
				timestamp,
				source: source.clone(),
				role: Self::ROLE,
				bytes: data.to_vec(),
			};
			if events.send(Event::Input(message)).is_err() {
				log::debug!("event queue closed, dropping input from '{}'", source);
			}
		};

		let connection = midi_input.connect(port, Self::MIDI_CONNECTION_NAME, midir_callback, ())?;
		log::info!("connected input '{}'", port_name);

		return Ok(InputDeviceHandler { connection, port_name });
	}

	/// Search the midi devices and choose the first one matching [`Self::MIDI_DEVICE_KEYWORD`].
	#[must_use = "If not saved, the connection will be immediately dropped"]
	fn guess(events: UnboundedSender<Event>) -> Result<InputDeviceHandler> {
		return Self::guess_named(Self::MIDI_DEVICE_KEYWORD, events);
	}

	/// Search the midi devices and choose the first one whose name contains `keyword`.
	#[must_use = "If not saved, the connection will be immediately dropped"]
	fn guess_named(keyword: &str, events: UnboundedSender<Event>) -> Result<InputDeviceHandler> {
		let midi_input = MidiInput::new(crate::APPLICATION_NAME)?;

		let port = guess_port(&midi_input, keyword)
				.ok_or_else(|| Error::NoPortFound { keyword: keyword.to_owned() })?;

		return Self::from_port(midi_input, &port, events);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mock_sink_clones_share_recording() {
		let sink = MockSink::default();
		let mut writer = sink.clone();
		writer.send(&[0xF8]).unwrap();
		writer.send(&[1, 2, 3]).unwrap();

		assert_eq!(sink.messages(), vec![vec![0xF8], vec![1, 2, 3]]);
		assert_eq!(sink.take().len(), 2);
		assert!(sink.messages().is_empty());
	}
}
