//! Message framing and dispatch for binrpc.
//!
//! Every message travels as one frame:
//! - a fixed 8-byte little-endian header: body size (`u32`), command (`u16`),
//!   version (`u16`)
//! - `body_size` bytes of codec-encoded payload
//!
//! `command | (version << 16)` is the message code, the key of the
//! [`DispatchTable`] that maps incoming frames to decoders and handlers.

pub mod dispatch;
pub mod error;
pub mod header;
pub mod io;
pub mod message;

pub use dispatch::{DispatchTable, DispatchTableBuilder, HandlerError};
pub use error::{FrameError, Result};
pub use header::{MessageHeader, HEADER_SIZE};
pub use io::{encode_frame, read_frame, write_frame};
pub use message::{code_of, AsAny, Message, MessageType};
