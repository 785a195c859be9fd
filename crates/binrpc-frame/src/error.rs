use binrpc_codec::CodecError;
use binrpc_transport::TransportError;

use crate::dispatch::HandlerError;

/// Errors that can occur while framing, dispatching or handling messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Payload encoding or decoding failed.
    #[error("payload codec error: {0}")]
    Codec(#[from] CodecError),

    /// The received header could not be parsed.
    #[error("malformed message header: {0}")]
    MalformedHeader(CodecError),

    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A received header declared an empty body.
    #[error("message body is empty")]
    EmptyBody,

    /// A received header declared a body larger than the maximum message size.
    #[error("message body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// A message encoded to zero bytes. Nothing was sent.
    #[error("message encoded to an empty body")]
    EmptyMessage,

    /// A message encoded to more bytes than may be sent.
    #[error("encoded message too large ({size} bytes, max {max})")]
    EncodedTooLarge { size: usize, max: usize },

    /// No decoder is registered for the received message code.
    #[error("unknown message (command {command}, version {version})")]
    UnknownCode { command: u16, version: u16 },

    /// No handler is registered for the received message code.
    #[error("no handler for message (command {command}, version {version})")]
    NoHandler { command: u16, version: u16 },

    /// A registered handler returned an error.
    #[error("handler for command {command} version {version} failed: {source}")]
    Handler {
        command: u16,
        version: u16,
        source: HandlerError,
    },
}

impl FrameError {
    /// True when the failure leaves the stream in an unknown state, so the
    /// connection must be replaced before it is used again. Encode-side
    /// failures happen before any I/O and never reset.
    pub fn resets_connection(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::MalformedHeader(_)
                | Self::EmptyBody
                | Self::BodyTooLarge { .. }
        )
    }

    /// True for dispatch-table misses.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::UnknownCode { .. } | Self::NoHandler { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
