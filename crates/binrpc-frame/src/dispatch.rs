use std::collections::HashMap;
use std::fmt;

use binrpc_codec::{Limits, Reader};
use tracing::warn;

use crate::error::{FrameError, Result};
use crate::header::MessageHeader;
use crate::message::{Message, MessageType};

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type DecodeFn = fn(&mut Reader<'_>) -> binrpc_codec::Result<Box<dyn Message>>;
type HandleFn =
    Box<dyn Fn(Box<dyn Message>) -> std::result::Result<Box<dyn Message>, HandlerError> + Send + Sync>;

fn decode_boxed<M: MessageType>(reader: &mut Reader<'_>) -> binrpc_codec::Result<Box<dyn Message>> {
    Ok(Box::new(M::decode(reader)?))
}

/// Registers decoders and handlers, then freezes them into a [`DispatchTable`].
#[derive(Default)]
pub struct DispatchTableBuilder {
    decoders: HashMap<u32, DecodeFn>,
    handlers: HashMap<u32, HandleFn>,
}

impl DispatchTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for `M`. Clients register their response types,
    /// servers their request types.
    pub fn register<M: MessageType>(mut self) -> Self {
        if self.decoders.insert(M::CODE, decode_boxed::<M>).is_some() {
            warn!(
                command = M::COMMAND,
                version = M::VERSION,
                "replacing registered decoder"
            );
        }
        self
    }

    /// Register a decoder for `Req` and a handler producing `Resp`.
    pub fn handle<Req, Resp, F, E>(self, handler: F) -> Self
    where
        Req: MessageType,
        Resp: MessageType,
        F: Fn(Req) -> std::result::Result<Resp, E> + Send + Sync + 'static,
        E: Into<HandlerError>,
    {
        let mut builder = self.register::<Req>();
        let handle: HandleFn = Box::new(
            move |msg: Box<dyn Message>| -> std::result::Result<Box<dyn Message>, HandlerError> {
                let command = msg.command();
                let req = msg.downcast::<Req>().ok_or_else(|| -> HandlerError {
                    format!("handler expected command {} but got {}", Req::COMMAND, command).into()
                })?;
                let resp = handler(*req).map_err(|err| -> HandlerError { err.into() })?;
                Ok(Box::new(resp))
            },
        );
        if builder.handlers.insert(Req::CODE, handle).is_some() {
            warn!(
                command = Req::COMMAND,
                version = Req::VERSION,
                "replacing registered handler"
            );
        }
        builder
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            decoders: self.decoders,
            handlers: self.handlers,
        }
    }
}

/// Immutable `code -> decoder` and `code -> handler` maps.
///
/// Built once and shared behind an `Arc` by clients and servers.
pub struct DispatchTable {
    decoders: HashMap<u32, DecodeFn>,
    handlers: HashMap<u32, HandleFn>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::new()
    }

    /// Decode a frame body into the message type registered for its code.
    pub fn decode(
        &self,
        header: &MessageHeader,
        payload: &[u8],
        limits: &Limits,
    ) -> Result<Box<dyn Message>> {
        let decode = self
            .decoders
            .get(&header.code())
            .ok_or(FrameError::UnknownCode {
                command: header.command,
                version: header.version,
            })?;
        let mut reader = Reader::new(payload, limits)?;
        Ok(decode(&mut reader)?)
    }

    /// Run the handler registered for the message's code.
    pub fn handle(&self, msg: Box<dyn Message>) -> Result<Box<dyn Message>> {
        let (command, version) = (msg.command(), msg.version());
        let handler = self
            .handlers
            .get(&msg.code())
            .ok_or(FrameError::NoHandler { command, version })?;
        handler(msg).map_err(|source| FrameError::Handler {
            command,
            version,
            source,
        })
    }

    pub fn has_decoder(&self, code: u32) -> bool {
        self.decoders.contains_key(&code)
    }

    pub fn has_handler(&self, code: u32) -> bool {
        self.handlers.contains_key(&code)
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decoders: Vec<_> = self.decoders.keys().copied().collect();
        let mut handlers: Vec<_> = self.handlers.keys().copied().collect();
        decoders.sort_unstable();
        handlers.sort_unstable();
        f.debug_struct("DispatchTable")
            .field("decoders", &decoders)
            .field("handlers", &handlers)
            .finish()
    }
}
