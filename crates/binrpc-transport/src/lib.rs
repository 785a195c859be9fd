//! Blocking transport abstraction for binrpc.
//!
//! Provides the duplex byte stream the RPC layers are written against:
//! - [`Connection`]: exact-length reads and writes with an optional deadline
//! - [`Dialer`]: opens new connections (used by the client pool)
//! - [`Listener`]: accepts connections (used by the server)
//! - [`Context`]: deadline and cancellation carried through one call
//!
//! TCP implementations of all three are provided in [`tcp`].

pub mod context;
pub mod error;
pub mod tcp;
pub mod traits;

pub use context::{CancelHandle, Context, ContextError};
pub use error::{is_transient_accept_error, Result, TransportError};
pub use tcp::{TcpConnection, TcpDialer, TcpListener};
pub use traits::{AcceptWaker, Connection, Dialer, Listener};
