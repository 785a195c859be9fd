//! Bounds-checked binary codec for binrpc payloads.
//!
//! Every value is encoded little-endian with no padding or alignment:
//! - fixed-width primitives use their natural width (`bool` is one byte)
//! - floats are written as their raw bit pattern
//! - strings and arrays carry a `u32` count prefix followed by content
//!
//! All sizes are checked against a validated [`Limits`] before any
//! allocation or copy happens.

pub mod buffer;
pub mod error;
pub mod limits;
pub mod reader;
pub mod traits;
pub mod writer;

pub use buffer::extend;
pub use error::{CodecError, Result};
pub use limits::{Limits, MIN_LIMIT};
pub use reader::Reader;
pub use traits::{Decode, Encode};
pub use writer::Writer;
