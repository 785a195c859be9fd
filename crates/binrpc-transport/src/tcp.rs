use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::context::{Context, ContextError};
use crate::error::{Result, TransportError};
use crate::traits::{AcceptWaker, Connection, Dialer, Listener};

/// A TCP stream implementing [`Connection`].
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    closed: bool,
    broken: bool,
}

impl TcpConnection {
    /// Wrap an already-connected stream.
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream,
            peer,
            closed: false,
            broken: false,
        }
    }

    /// Address of the remote end, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn fail(&mut self, err: io::Error) -> TransportError {
        self.broken = true;
        if err.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Eof
        } else {
            TransportError::Io(err)
        }
    }

    /// Non-blocking peek: an idle request/response stream must have nothing
    /// to read, so EOF or stray bytes both mean the stream is unusable.
    fn probe(&self) -> bool {
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut byte = [0u8; 1];
        let alive = match self.stream.peek(&mut byte) {
            Ok(_) => false,
            Err(err) => err.kind() == io::ErrorKind::WouldBlock,
        };
        self.stream.set_nonblocking(false).is_ok() && alive
    }
}

impl Connection for TcpConnection {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.stream.write_all(buf).map_err(|err| self.fail(err))
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        self.stream.read_exact(buf).map_err(|err| self.fail(err))
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.ensure_open()?;
        // std sockets only take per-operation timeouts; the remaining time
        // until the deadline is applied to each read and write.
        let timeout = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ContextError::DeadlineExceeded.into());
                }
                Some(remaining)
            }
            None => None,
        };
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn is_alive(&mut self) -> bool {
        if self.closed || self.broken {
            return false;
        }
        if !self.probe() {
            self.broken = true;
        }
        !self.broken
    }
}

/// Dials TCP connections.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on dialed streams.
    pub nodelay: bool,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            nodelay: true,
        }
    }
}

impl TcpDialer {
    fn attempt_timeout(&self, ctx: &Context) -> Option<Duration> {
        match (ctx.remaining(), self.connect_timeout) {
            (Some(remaining), Some(limit)) => Some(remaining.min(limit)),
            (Some(remaining), None) => Some(remaining),
            (None, limit) => limit,
        }
    }
}

impl Dialer for TcpDialer {
    type Conn = TcpConnection;

    fn dial(&self, ctx: &Context, address: &str) -> Result<TcpConnection> {
        ctx.check()?;

        let connect_err = |source: io::Error| TransportError::Connect {
            address: address.to_string(),
            source,
        };

        let addrs = address.to_socket_addrs().map_err(connect_err)?;
        let mut last_err = None;
        for addr in addrs {
            let attempt = match self.attempt_timeout(ctx) {
                Some(timeout) if timeout.is_zero() => {
                    return Err(ContextError::DeadlineExceeded.into());
                }
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    if self.nodelay {
                        stream.set_nodelay(true).map_err(connect_err)?;
                    }
                    debug!(%addr, "dialed tcp connection");
                    return Ok(TcpConnection::new(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        })))
    }
}

/// A bound TCP listener implementing [`Listener`].
#[derive(Debug)]
pub struct TcpListener {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl TcpListener {
    /// Bind and listen on `address` (e.g. `127.0.0.1:7070`, port 0 for any).
    pub fn bind(address: &str) -> Result<Self> {
        let bind_err = |source: io::Error| TransportError::Bind {
            address: address.to_string(),
            source,
        };
        let listener = std::net::TcpListener::bind(address).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl Listener for TcpListener {
    type Conn = TcpConnection;

    fn accept(&self) -> Result<(TcpConnection, String)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((TcpConnection::new(stream), peer.to_string()))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }

    /// Wakes `accept` with a throwaway loopback connection.
    fn waker(&self) -> Option<AcceptWaker> {
        let addr = wake_address(self.local_addr);
        Some(Box::new(move || {
            if let Err(err) = TcpStream::connect_timeout(&addr, Duration::from_secs(1)) {
                debug!(%addr, error = %err, "accept wake-up connect failed");
            }
        }))
    }
}

/// Where to connect to reach a listener bound on `addr`.
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}
