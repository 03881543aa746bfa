#[derive(Debug)]
pub enum Error {
	// Only the kind is kept; the returned MIDI client isn't thread-safe on every backend
	InputConnectError(midir::ConnectErrorKind),
	OutputConnectError(midir::ConnectErrorKind),
	InitError(midir::InitError),
	PortInfoError(midir::PortInfoError),
	SendError(midir::SendError),
	NoPortFound {
		// The keyword that was searched for
		keyword: String,
	},
	Storage(std::io::Error),
	Serialization(serde_json::Error),
	Player(String),
	Artwork(String),
	Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InputConnectError(kind) => write!(f, "connecting to MIDI input port failed: {}", kind),
			Self::OutputConnectError(kind) => write!(f, "connecting to MIDI output port failed: {}", kind),
			Self::InitError(_) => f.write_str("MIDI context initialization failed"),
			Self::PortInfoError(_) => f.write_str("MIDI Port retrieval failed"),
			Self::SendError(_) => f.write_str("sending MIDI message failed"),
			Self::NoPortFound { keyword } => write!(f, "couldn't find a port for {:?}", keyword),
			Self::Storage(_) => f.write_str("storage backend I/O failed"),
			Self::Serialization(_) => f.write_str("stored value couldn't be (de)serialized"),
			Self::Player(msg) => write!(f, "player request failed: {}", msg),
			Self::Artwork(msg) => write!(f, "artwork unavailable: {}", msg),
			Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::InitError(e) => Some(e),
			Self::PortInfoError(e) => Some(e),
			Self::SendError(e) => Some(e),
			Self::Storage(e) => Some(e),
			Self::Serialization(e) => Some(e),
			Self::InputConnectError(_)
			| Self::OutputConnectError(_)
			| Self::NoPortFound { .. }
			| Self::Player(_)
			| Self::Artwork(_)
			| Self::Config(_) => None,
		}
	}
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
	fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
		Self::InputConnectError(e.kind())
	}
}

impl From<midir::ConnectError<midir::MidiOutput>> for Error {
	fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
		Self::OutputConnectError(e.kind())
	}
}

impl From<midir::InitError> for Error {
	fn from(e: midir::InitError) -> Self {
		Self::InitError(e)
	}
}

impl From<midir::PortInfoError> for Error {
	fn from(e: midir::PortInfoError) -> Self {
		Self::PortInfoError(e)
	}
}

impl From<midir::SendError> for Error {
	fn from(e: midir::SendError) -> Self {
		Self::SendError(e)
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Self::Storage(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Self::Serialization(e)
	}
}
