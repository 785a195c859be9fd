use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use binrpc_transport::{Connection, Context, Dialer};
use tracing::{debug, warn};

use crate::error::{PoolError, Result};

/// Longest single condvar wait in [`Pool::get`]; bounds how late a
/// cancellation is noticed.
const WAIT_SLICE: Duration = Duration::from_millis(10);

struct State<C> {
    idle: VecDeque<C>,
    closed: bool,
}

struct Shared<D: Dialer> {
    state: Mutex<State<D::Conn>>,
    available: Condvar,
    dialer: D,
    address: String,
    capacity: usize,
}

impl<D: Dialer> Shared<D> {
    fn lock(&self) -> MutexGuard<'_, State<D::Conn>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand a slot back, or close it if the pool is gone.
    fn put_back(&self, mut conn: D::Conn) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            if let Err(err) = conn.close() {
                debug!(address = %self.address, error = %err, "close after pool shutdown failed");
            }
            return;
        }
        state.idle.push_back(conn);
        drop(state);
        self.available.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// A fixed set of connections to one address.
///
/// Cloning is cheap and yields a handle to the same pool.
pub struct Pool<D: Dialer> {
    shared: Arc<Shared<D>>,
}

impl<D: Dialer> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: Dialer> fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Pool")
            .field("address", &self.shared.address)
            .field("capacity", &self.shared.capacity)
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<D: Dialer> Pool<D> {
    /// Dial `capacity` connections to `address`.
    ///
    /// If any dial fails, every connection opened so far is closed and the
    /// dial error is returned.
    pub fn new(ctx: &Context, capacity: usize, dialer: D, address: impl Into<String>) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let address = address.into();

        let mut idle = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            match dialer.dial(ctx, &address) {
                Ok(conn) => idle.push_back(conn),
                Err(err) => {
                    warn!(%address, error = %err, opened = idle.len(), "pool dial failed");
                    for mut conn in idle {
                        if let Err(err) = conn.close() {
                            debug!(%address, error = %err, "closing pooled connection failed");
                        }
                    }
                    return Err(err.into());
                }
            }
        }
        debug!(%address, capacity, "connection pool ready");

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    idle,
                    closed: false,
                }),
                available: Condvar::new(),
                dialer,
                address,
                capacity,
            }),
        })
    }

    /// Check out a connection, blocking until one is idle.
    ///
    /// Fails with [`PoolError::Closed`] once the pool is closed and with a
    /// context error when `ctx` is cancelled or expires while waiting. A
    /// connection that is no longer alive is redialed first; if that fails the
    /// slot stays in the pool and the dial error is returned.
    pub fn get(&self, ctx: &Context) -> Result<PooledConn<D>> {
        let mut conn = self.take_idle(ctx)?;

        if !conn.is_alive() {
            debug!(address = %self.shared.address, "redialing dead pooled connection");
            match self.shared.dialer.dial(ctx, &self.shared.address) {
                Ok(fresh) => {
                    if let Err(err) = conn.close() {
                        debug!(address = %self.shared.address, error = %err, "closing dead connection failed");
                    }
                    conn = fresh;
                }
                Err(err) => {
                    warn!(address = %self.shared.address, error = %err, "redial failed");
                    self.shared.put_back(conn);
                    return Err(err.into());
                }
            }
        }

        Ok(PooledConn {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
        })
    }

    fn take_idle(&self, ctx: &Context) -> Result<D::Conn> {
        let mut state = self.shared.lock();
        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }
            ctx.check()?;
            if let Some(conn) = state.idle.pop_front() {
                return Ok(conn);
            }
            let wait = ctx
                .remaining()
                .map_or(WAIT_SLICE, |remaining| remaining.min(WAIT_SLICE));
            state = match self.shared.available.wait_timeout(state, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Close the pool and every idle connection.
    ///
    /// Waiters are woken and fail with [`PoolError::Closed`]; checked-out
    /// connections are closed when they are released. Closing twice is a
    /// no-op. Returns the first close error, if any.
    pub fn close(&self) -> Result<()> {
        let drained: Vec<D::Conn> = {
            let mut state = self.shared.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.shared.available.notify_all();
        debug!(address = %self.shared.address, idle = drained.len(), "closing connection pool");

        let mut first_err = None;
        for mut conn in drained {
            if let Err(err) = conn.close() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(PoolError::Transport(err)),
            None => Ok(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of connections currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.shared.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    pub fn dialer(&self) -> &D {
        &self.shared.dialer
    }
}

/// A checked-out connection. Returned to its pool on drop.
pub struct PooledConn<D: Dialer> {
    // Some until drop hands it back to the pool.
    conn: Option<D::Conn>,
    shared: Arc<Shared<D>>,
}

impl<D: Dialer> PooledConn<D> {
    /// Return the connection to the pool now. Equivalent to dropping it.
    pub fn release(self) {}

    /// Replace the connection with a freshly dialed one, closing the old one.
    pub fn renew(&mut self, ctx: &Context) -> Result<()> {
        if self.shared.is_closed() {
            return Err(PoolError::Closed);
        }
        let fresh = self.shared.dialer.dial(ctx, &self.shared.address)?;
        let mut old = std::mem::replace(&mut **self, fresh);
        if let Err(err) = old.close() {
            debug!(address = %self.shared.address, error = %err, "closing replaced connection failed");
        }
        debug!(address = %self.shared.address, "renewed pooled connection");
        Ok(())
    }

    /// Close the connection but keep the slot; the next checkout redials it.
    pub fn invalidate(&mut self) {
        if let Err(err) = (**self).close() {
            debug!(address = %self.shared.address, error = %err, "invalidating connection failed");
        }
    }
}

impl<D: Dialer> Deref for PooledConn<D> {
    type Target = D::Conn;

    fn deref(&self) -> &D::Conn {
        self.conn
            .as_ref()
            .expect("pooled connection is held until drop")
    }
}

impl<D: Dialer> DerefMut for PooledConn<D> {
    fn deref_mut(&mut self) -> &mut D::Conn {
        self.conn
            .as_mut()
            .expect("pooled connection is held until drop")
    }
}

impl<D: Dialer> Drop for PooledConn<D> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(conn);
        }
    }
}

impl<D: Dialer> fmt::Debug for PooledConn<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("address", &self.shared.address)
            .finish_non_exhaustive()
    }
}
