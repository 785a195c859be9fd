use binrpc_codec::{Decode, Encode, Reader, Writer};

use crate::message::code_of;

/// Wire size of [`MessageHeader`]: body size (4) + command (2) + version (2).
pub const HEADER_SIZE: usize = 8;

/// The fixed-size prefix of every frame.
///
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬──────────────────┐
/// │ Body size    │ Command      │ Version      │ Body             │
/// │ (4B LE)      │ (2B LE)      │ (2B LE)      │ (body size bytes)│
/// └──────────────┴──────────────┴──────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub body_size: u32,
    pub command: u16,
    pub version: u16,
}

impl MessageHeader {
    pub fn new(body_size: u32, command: u16, version: u16) -> Self {
        Self {
            body_size,
            command,
            version,
        }
    }

    /// Dispatch key: `command | (version << 16)`.
    pub fn code(&self) -> u32 {
        code_of(self.command, self.version)
    }

    pub fn body_len(&self) -> usize {
        self.body_size as usize
    }
}

impl Encode for MessageHeader {
    fn encode(&self, writer: &mut Writer<'_>) -> binrpc_codec::Result<()> {
        writer.write_u32(self.body_size)?;
        writer.write_u16(self.command)?;
        writer.write_u16(self.version)
    }
}

impl Decode for MessageHeader {
    fn decode(reader: &mut Reader<'_>) -> binrpc_codec::Result<Self> {
        Ok(Self {
            body_size: reader.read_u32()?,
            command: reader.read_u16()?,
            version: reader.read_u16()?,
        })
    }
}
