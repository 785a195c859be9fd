use binrpc_transport::{ContextError, TransportError};

/// Errors that can occur while acquiring or managing pooled connections.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool has been closed.
    #[error("connection pool is closed")]
    Closed,

    /// A pool must hold at least one connection.
    #[error("pool capacity must be at least 1")]
    InvalidCapacity,

    /// Dialing or closing a connection failed.
    #[error("pool connection error: {0}")]
    Transport(#[source] TransportError),

    /// The caller's context was cancelled or expired while waiting.
    #[error(transparent)]
    Context(ContextError),
}

impl PoolError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}

impl From<TransportError> for PoolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Context(ctx) => Self::Context(ctx),
            other => Self::Transport(other),
        }
    }
}

impl From<ContextError> for PoolError {
    fn from(err: ContextError) -> Self {
        Self::Context(err)
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
