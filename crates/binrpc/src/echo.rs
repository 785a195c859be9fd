//! Echo messages served by `binrpc serve` and sent by `binrpc call`.

use std::convert::Infallible;

use binrpc_codec::{Decode, Encode, Reader, Result, Writer};
use binrpc_frame::{DispatchTable, DispatchTableBuilder, MessageType};

pub const ECHO_COMMAND: u16 = 1;
pub const ECHO_REPLY_COMMAND: u16 = 2;
pub const ECHO_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EchoRequest {
    pub id: u64,
    pub text: String,
    pub tags: Vec<String>,
}

impl EchoRequest {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl Encode for EchoRequest {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u64(self.id)?;
        writer.write_str(&self.text)?;
        writer.write_array(&self.tags)
    }
}

impl Decode for EchoRequest {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u64()?,
            text: reader.read_string()?,
            tags: reader.read_array()?,
        })
    }
}

impl MessageType for EchoRequest {
    const COMMAND: u16 = ECHO_COMMAND;
    const VERSION: u16 = ECHO_VERSION;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EchoResponse {
    pub id: u64,
    pub text: String,
    pub tags: Vec<String>,
    /// Characters in `text` as counted by the server.
    pub chars: u32,
}

impl Encode for EchoResponse {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u64(self.id)?;
        writer.write_str(&self.text)?;
        writer.write_array(&self.tags)?;
        writer.write_u32(self.chars)
    }
}

impl Decode for EchoResponse {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u64()?,
            text: reader.read_string()?,
            tags: reader.read_array()?,
            chars: reader.read_u32()?,
        })
    }
}

impl MessageType for EchoResponse {
    const COMMAND: u16 = ECHO_REPLY_COMMAND;
    const VERSION: u16 = ECHO_VERSION;
}

/// The echo handler: returns the request with its character count.
pub fn echo(req: EchoRequest) -> std::result::Result<EchoResponse, Infallible> {
    let chars = u32::try_from(req.text.chars().count()).unwrap_or(u32::MAX);
    Ok(EchoResponse {
        id: req.id,
        text: req.text,
        tags: req.tags,
        chars,
    })
}

/// Add the echo handler to an existing server table.
pub fn register_server(builder: DispatchTableBuilder) -> DispatchTableBuilder {
    builder.handle(echo)
}

/// Add the echo response decoder to an existing client table.
pub fn register_client(builder: DispatchTableBuilder) -> DispatchTableBuilder {
    builder.register::<EchoResponse>()
}

pub fn server_table() -> DispatchTable {
    register_server(DispatchTable::builder()).build()
}

pub fn client_table() -> DispatchTable {
    register_client(DispatchTable::builder()).build()
}
