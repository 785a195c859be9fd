use std::net::SocketAddr;
use std::time::Instant;

use crate::context::Context;
use crate::error::Result;

/// A connected duplex byte stream.
///
/// Reads and writes are exact: `write_all` sends the whole slice and
/// `read_full` fills the whole slice, or they fail. Implementations remember
/// when an operation failed so [`Connection::is_alive`] can report a broken
/// stream without touching the network again.
pub trait Connection: Send + 'static {
    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Fill the whole buffer.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Apply (or clear, with `None`) a deadline to subsequent reads and writes.
    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()>;

    /// Close the stream. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;

    /// False once the stream is closed, broken, or closed by the peer.
    fn is_alive(&mut self) -> bool;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_full(buf)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        (**self).set_deadline(deadline)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_alive(&mut self) -> bool {
        (**self).is_alive()
    }
}

/// Opens new connections to an address.
pub trait Dialer: Send + Sync + 'static {
    type Conn: Connection;

    fn dial(&self, ctx: &Context, address: &str) -> Result<Self::Conn>;
}

/// Unblocks a pending [`Listener::accept`] from another thread.
pub type AcceptWaker = Box<dyn Fn() + Send + Sync>;

/// Accepts incoming connections.
pub trait Listener: Send + 'static {
    type Conn: Connection;

    /// Block until the next connection arrives. Returns the connection and a
    /// printable peer address.
    fn accept(&self) -> Result<(Self::Conn, String)>;

    /// The bound socket address, when the listener has one.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// A hook that makes a blocked `accept` return so shutdown is noticed.
    ///
    /// Taken once, before the listener moves to the accept thread. Without
    /// one, a stopping server waits for the next `accept` to return by itself.
    fn waker(&self) -> Option<AcceptWaker> {
        None
    }
}
