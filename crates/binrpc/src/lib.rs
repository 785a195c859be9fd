//! Compact binary RPC over pooled TCP connections.
//!
//! binrpc sends length-prefixed binary frames between a pooled, blocking
//! client and a thread-per-connection server. Messages are plain structs
//! with hand-written [`Encode`](codec::Encode)/[`Decode`](codec::Decode)
//! impls, routed by a `(command, version)` code.
//!
//! # Crate Structure
//!
//! - [`codec`]: bounded little-endian binary encoding
//! - [`transport`]: blocking connection, dialer and listener traits with TCP implementations
//! - [`frame`]: wire header, frame I/O and the dispatch table
//! - [`pool`]: fixed-capacity connection pool
//! - [`service`]: RPC client and server
//! - [`echo`]: demo echo messages used by the `binrpc` CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use binrpc::echo::{self, EchoRequest, EchoResponse};
//! use binrpc::{Client, ClientConfig, Context, Server, ServerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new(ServerConfig::default(), Arc::new(echo::server_table()))?;
//! let handle = server.listen_and_serve("127.0.0.1:7000")?;
//!
//! let ctx = Context::background();
//! let client = Client::connect(&ctx, "127.0.0.1:7000", ClientConfig::default(), Arc::new(echo::client_table()))?;
//! let reply: EchoResponse = client.call_with_retry_as(&ctx, &EchoRequest::new(1, "hi"), 2)?;
//! assert_eq!(reply.text, "hi");
//!
//! handle.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod echo;

/// Re-export codec types.
pub mod codec {
    pub use binrpc_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use binrpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use binrpc_frame::*;
}

/// Re-export pool types.
pub mod pool {
    pub use binrpc_pool::*;
}

/// Re-export client and server types.
pub mod service {
    pub use binrpc_service::*;
}

pub use binrpc_frame::{DispatchTable, Message, MessageType};
pub use binrpc_service::{
    Client, ClientConfig, ClientError, Server, ServerConfig, ServerError, ServerHandle,
};
pub use binrpc_transport::Context;
