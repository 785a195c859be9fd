use std::io;

use crate::context::ContextError;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind { address: String, source: io::Error },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect { address: String, source: io::Error },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream before the expected bytes arrived.
    #[error("connection closed by peer")]
    Eof,

    /// The connection was already closed locally.
    #[error("use of closed connection")]
    Closed,

    /// The operation's context was cancelled or expired.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The listener has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// True for errors raised by the network stack itself.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. } | Self::Connect { .. } | Self::Accept(_) | Self::Io(_) | Self::Eof
        )
    }

    /// True for accept errors that are expected to clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Accept(err) => is_transient_accept_error(err),
            _ => false,
        }
    }

    /// True for read/write timeouts and expired deadlines.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            Self::Context(ContextError::DeadlineExceeded) => true,
            _ => false,
        }
    }
}

/// Classify an accept error as temporary (retry after a pause) or fatal.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    ) {
        return true;
    }

    #[cfg(unix)]
    {
        // Resource exhaustion: the listener stays valid once descriptors free up.
        matches!(
            err.raw_os_error(),
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
