use std::any::Any;
use std::fmt::Debug;

use binrpc_codec::{Decode, Encode};

/// Pack a command and version into a message code.
pub const fn code_of(command: u16, version: u16) -> u32 {
    command as u32 | ((version as u32) << 16)
}

/// Upcast to [`Any`] so boxed messages can be downcast to their concrete type.
pub trait AsAny: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A message that can be framed and sent: identity plus payload encoding.
///
/// Implemented automatically for every [`MessageType`]; the dispatch layer
/// handles messages as `Box<dyn Message>`.
pub trait Message: Encode + AsAny + Debug {
    fn command(&self) -> u16;
    fn version(&self) -> u16;

    fn code(&self) -> u32 {
        code_of(self.command(), self.version())
    }
}

/// A concrete message type with a fixed command and version.
///
/// ```
/// use binrpc_codec::{Decode, Encode, Reader, Result, Writer};
/// use binrpc_frame::MessageType;
///
/// #[derive(Debug)]
/// struct Ping(u64);
///
/// impl Encode for Ping {
///     fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
///         writer.write_u64(self.0)
///     }
/// }
///
/// impl Decode for Ping {
///     fn decode(reader: &mut Reader<'_>) -> Result<Self> {
///         Ok(Ping(reader.read_u64()?))
///     }
/// }
///
/// impl MessageType for Ping {
///     const COMMAND: u16 = 1;
///     const VERSION: u16 = 1;
/// }
/// ```
pub trait MessageType: Encode + Decode + Debug + Send + 'static {
    const COMMAND: u16;
    const VERSION: u16;
    const CODE: u32 = code_of(Self::COMMAND, Self::VERSION);
}

impl<T: MessageType> Message for T {
    fn command(&self) -> u16 {
        T::COMMAND
    }

    fn version(&self) -> u16 {
        T::VERSION
    }
}

impl dyn Message {
    pub fn is<T: MessageType>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: MessageType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete message, or `None` on a type mismatch.
    pub fn downcast<T: MessageType>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}
