use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use binrpc_frame::{encode_frame, read_frame, write_frame, DispatchTable, FrameError, HEADER_SIZE};
use binrpc_transport::{AcceptWaker, Connection, Listener, TcpListener, TransportError};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::panic;
use crate::scratch::BufferPool;

/// Doubling delay between accept retries.
///
/// Each transient failure waits `max(floor, previous * 2)`, capped at
/// `ceiling`. After more than `max_retries` consecutive failures
/// [`next_delay`](Self::next_delay) returns `None`. A successful accept
/// resets the sequence.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    floor: Duration,
    ceiling: Duration,
    max_retries: u32,
    delay: Duration,
    retries: u32,
}

impl AcceptBackoff {
    pub fn new(floor: Duration, ceiling: Duration, max_retries: u32) -> Self {
        Self {
            floor,
            ceiling,
            max_retries,
            delay: Duration::ZERO,
            retries: 0,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.accept_delay,
            config.accept_max_delay,
            config.accept_max_retry,
        )
    }

    /// Record one more failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.retries = self.retries.saturating_add(1);
        if self.retries > self.max_retries {
            return None;
        }
        self.delay = self
            .delay
            .saturating_mul(2)
            .max(self.floor)
            .min(self.ceiling);
        Some(self.delay)
    }

    pub fn reset(&mut self) {
        self.delay = Duration::ZERO;
        self.retries = 0;
    }

    /// Consecutive failures recorded since the last reset.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// State shared by every connection thread.
struct Dispatcher {
    table: Arc<DispatchTable>,
    buffers: BufferPool,
    config: ServerConfig,
}

impl Dispatcher {
    /// Serve requests until the peer hangs up or something fails.
    fn serve<C: Connection>(&self, conn: &mut C) -> std::result::Result<(), FrameError> {
        let limits = &self.config.limits;
        let max_msg_size = self.config.max_msg_size;
        let mut buf = self.buffers.take();

        loop {
            let header = match read_frame(conn, &mut buf, limits, max_msg_size) {
                Ok(header) => header,
                Err(FrameError::Transport(TransportError::Eof)) => return Ok(()),
                Err(err) => return Err(err),
            };
            let body = &buf[HEADER_SIZE..HEADER_SIZE + header.body_len()];
            let request = self.table.decode(&header, body, limits)?;
            let response = self.table.handle(request)?;

            let len = encode_frame(&mut buf, &*response, limits)?;
            let size = len - HEADER_SIZE;
            if size > max_msg_size {
                return Err(FrameError::EncodedTooLarge {
                    size,
                    max: max_msg_size,
                });
            }
            write_frame(conn, &buf, len)?;
        }
    }

    fn run<C: Connection>(&self, mut conn: C, peer: &str) {
        debug!(peer, "connection opened");
        match panic::catch(|| self.serve(&mut conn)) {
            Ok(Ok(())) => debug!(peer, "connection closed by peer"),
            Ok(Err(err)) if err.is_protocol() => {
                error!(peer, error = %err, "protocol error, closing connection");
            }
            Ok(Err(err @ FrameError::Handler { .. })) => {
                error!(peer, error = %err, "handler failed, closing connection");
            }
            Ok(Err(err)) => warn!(peer, error = %err, "closing connection"),
            Err(caught) => error!(
                peer,
                panic = caught.message(),
                backtrace = caught.backtrace(),
                "connection handler panicked"
            ),
        }
        if let Err(err) = conn.close() {
            debug!(peer, error = %err, "close failed");
        }
    }
}

/// An RPC server: a validated config plus the dispatch table it serves.
pub struct Server {
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: ServerConfig, table: Arc<DispatchTable>) -> Result<Self, ServerError> {
        config.validate()?;
        let buffers = BufferPool::new(config.buffer_size, config.buffer_recycle_size);
        Ok(Self {
            dispatcher: Arc::new(Dispatcher {
                table,
                buffers,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.dispatcher.config
    }

    /// Bind a TCP listener on `address` and start serving in the background.
    pub fn listen_and_serve(self, address: &str) -> Result<ServerHandle, ServerError> {
        let listener = TcpListener::bind(address)?;
        self.serve(listener)
    }

    /// Start the accept loop for `listener` on a background thread.
    ///
    /// [`ServerHandle::shutdown`] interrupts a blocked `accept` through
    /// [`Listener::waker`]. A listener without a waker is stopped only once
    /// its pending `accept` returns on its own.
    pub fn serve<L: Listener>(self, listener: L) -> Result<ServerHandle, ServerError> {
        let local_addr = listener.local_addr();
        let waker = listener.waker();
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener,
            dispatcher: self.dispatcher,
            shutdown: Arc::clone(&shutdown),
        };

        let thread = thread::Builder::new()
            .name("binrpc-accept".to_string())
            .spawn(move || accept_loop.run())
            .map_err(ServerError::Spawn)?;
        if let Some(addr) = local_addr {
            info!(%addr, "rpc server started");
        }

        Ok(ServerHandle {
            local_addr,
            shutdown,
            waker,
            thread,
        })
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.dispatcher.config)
            .field("table", &self.dispatcher.table)
            .finish()
    }
}

struct AcceptLoop<L> {
    listener: L,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<AtomicBool>,
}

impl<L: Listener> AcceptLoop<L> {
    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn run(self) -> Result<(), ServerError> {
        let mut backoff = AcceptBackoff::from_config(&self.dispatcher.config);
        let mut next_id: u64 = 0;

        loop {
            if self.stopping() {
                info!("rpc server shutting down");
                return Ok(());
            }

            match self.listener.accept() {
                Ok((mut conn, peer)) => {
                    if self.stopping() {
                        if let Err(err) = conn.close() {
                            debug!(peer = %peer, error = %err, "close during shutdown failed");
                        }
                        continue;
                    }
                    backoff.reset();
                    next_id += 1;
                    self.spawn_connection(next_id, conn, peer);
                }
                Err(err) if self.stopping() => {
                    debug!(error = %err, "accept interrupted by shutdown");
                }
                Err(err) if err.is_transient() => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            error = %err,
                            retry = backoff.retries(),
                            delay_us = delay.as_micros() as u64,
                            "transient accept error, backing off"
                        );
                        thread::sleep(delay);
                    }
                    None => {
                        error!(
                            error = %err,
                            retries = backoff.retries() - 1,
                            "accept retries exhausted, stopping server"
                        );
                        return Err(ServerError::AcceptRetriesExhausted {
                            retries: backoff.retries() - 1,
                            source: err,
                        });
                    }
                },
                Err(err) => {
                    error!(error = %err, "accept failed, stopping server");
                    return Err(ServerError::Accept(err));
                }
            }
        }
    }

    fn spawn_connection(&self, id: u64, conn: L::Conn, peer: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let spawned = thread::Builder::new()
            .name(format!("binrpc-conn-{id}"))
            .spawn(move || dispatcher.run(conn, &peer));
        if let Err(err) = spawned {
            // the closure (and the connection inside it) is dropped with the error
            error!(error = %err, "failed to spawn connection thread");
        }
    }
}

/// Control handle for a running server.
pub struct ServerHandle {
    local_addr: Option<SocketAddr>,
    shutdown: Arc<AtomicBool>,
    waker: Option<AcceptWaker>,
    thread: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    /// Address the listener is bound to, when it has one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Ask the accept loop to stop. Open connections are served until their
    /// peers disconnect.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the accept loop to stop and report why it stopped.
    pub fn join(self) -> Result<(), ServerError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(payload) => Err(panic::recover_panic(payload).into()),
        }
    }

    /// [`shutdown`](Self::shutdown) then [`join`](Self::join).
    pub fn stop(self) -> Result<(), ServerError> {
        self.shutdown();
        self.join()
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
            .field("waker", &self.waker.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn backoff_doubles_from_floor_to_ceiling() {
        let mut backoff = AcceptBackoff::new(micros(5), micros(40), 100);
        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(
            delays,
            vec![micros(5), micros(10), micros(20), micros(40), micros(40), micros(40)]
        );
    }

    #[test]
    fn backoff_gives_up_after_max_retries() {
        let mut backoff = AcceptBackoff::new(micros(5), micros(40), 3);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn backoff_reset_restarts_at_floor() {
        let mut backoff = AcceptBackoff::new(micros(5), micros(40), 3);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.retries(), 0);
        assert_eq!(backoff.next_delay(), Some(micros(5)));
    }
}
