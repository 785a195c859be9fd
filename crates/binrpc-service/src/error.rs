use std::io;

use binrpc_frame::FrameError;
use binrpc_pool::PoolError;
use binrpc_transport::{ContextError, TransportError};

use crate::panic::PanicError;

/// A configuration value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid duration {input:?}: {reason}")]
    Duration { input: String, reason: &'static str },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors returned by [`Client`](crate::Client) calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Acquiring or renewing a pooled connection failed.
    #[error(transparent)]
    Pool(PoolError),

    /// Encoding, sending, receiving or decoding a frame failed.
    #[error(transparent)]
    Frame(FrameError),

    /// The encoded request body is larger than `max_msg_size`.
    #[error("request too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The response decoded to a different message type than requested.
    #[error("unexpected response message (command {command}, version {version})")]
    UnexpectedMessage { command: u16, version: u16 },

    /// The call context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(ContextError),

    /// The call panicked; the connection it used has been discarded.
    #[error(transparent)]
    Panic(#[from] PanicError),

    /// Retrying ended without an error to report.
    #[error("unknown client error")]
    Unknown,
}

impl ClientError {
    /// True when a fresh connection may succeed where this attempt failed.
    ///
    /// Transport failures (dial, send, receive, socket timeout) and frame
    /// header or size violations are recoverable. Encoding, oversize
    /// requests, dispatch misses, decode errors, panics and context errors
    /// are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Frame(err) => err.resets_connection(),
            Self::Pool(PoolError::Transport(_)) => true,
            _ => false,
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(TransportError::Context(ctx)) => Self::Context(ctx),
            other => Self::Frame(other),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::from(FrameError::Transport(err))
    }
}

impl From<PoolError> for ClientError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Context(ctx) => Self::Context(ctx),
            other => Self::Pool(other),
        }
    }
}

impl From<ContextError> for ClientError {
    fn from(err: ContextError) -> Self {
        Self::Context(err)
    }
}

/// Errors returned by [`Server`](crate::Server) setup and its accept loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding the listener failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A server thread could not be started.
    #[error("failed to spawn server thread: {0}")]
    Spawn(#[source] io::Error),

    /// The accept loop stopped on a non-transient error.
    #[error("accept loop stopped: {0}")]
    Accept(#[source] TransportError),

    /// The accept loop gave up after too many transient errors in a row.
    #[error("accept loop gave up after {retries} retries: {source}")]
    AcceptRetriesExhausted {
        retries: u32,
        #[source]
        source: TransportError,
    },

    /// The accept loop thread panicked.
    #[error(transparent)]
    Panic(#[from] PanicError),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
