//! RPC client and server for binrpc.
//!
//! - [`Client`]: pooled request/response calls with classified retry
//! - [`Server`]: accept loop with backoff, one thread per connection
//! - [`ClientConfig`] / [`ServerConfig`]: serde-loadable, validated settings
//!
//! Both sides share a frozen [`DispatchTable`](binrpc_frame::DispatchTable)
//! mapping message codes to decoders (and, on the server, handlers).

pub mod client;
pub mod config;
pub mod duration;
pub mod error;
pub mod panic;
pub mod scratch;
pub mod server;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::{ClientError, ConfigError, Result, ServerError};
pub use panic::{recover_panic, PanicError};
pub use scratch::{BufferPool, ScratchBuffer};
pub use server::{AcceptBackoff, Server, ServerHandle};
