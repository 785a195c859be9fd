use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use binrpc_frame::{
    encode_frame, read_frame, write_frame, DispatchTable, Message, MessageType, HEADER_SIZE,
};
use binrpc_pool::{Pool, PooledConn};
use binrpc_transport::{Connection, Context, Dialer, TcpDialer};
use bytes::BytesMut;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::panic;
use crate::scratch::BufferPool;

/// A pooled RPC client.
///
/// Each call checks out one connection, sends one request frame and waits
/// for one response frame. Calls from many threads share the pool; a call
/// blocks while every connection is in use.
pub struct Client<D: Dialer = TcpDialer> {
    pool: Pool<D>,
    buffers: BufferPool,
    table: Arc<DispatchTable>,
    config: ClientConfig,
}

impl Client<TcpDialer> {
    /// Dial `config.pool_size` TCP connections to `address`.
    pub fn connect(
        ctx: &Context,
        address: &str,
        config: ClientConfig,
        table: Arc<DispatchTable>,
    ) -> Result<Self> {
        let dialer = TcpDialer {
            connect_timeout: config.connect_timeout,
            nodelay: true,
        };
        Self::with_dialer(ctx, address, config, table, dialer)
    }
}

impl<D: Dialer> Client<D> {
    /// Build a client over any [`Dialer`].
    pub fn with_dialer(
        ctx: &Context,
        address: &str,
        config: ClientConfig,
        table: Arc<DispatchTable>,
        dialer: D,
    ) -> Result<Self> {
        config.validate()?;
        let pool = Pool::new(ctx, config.pool_size, dialer, address)?;
        let buffers = BufferPool::new(config.buffer_size, config.buffer_recycle_size)
            .with_max_idle(config.pool_size);
        debug!(address, pool_size = config.pool_size, "rpc client connected");
        Ok(Self {
            pool,
            buffers,
            table,
            config,
        })
    }

    /// Send `msg` and return the decoded response. No retry.
    pub fn call(&self, ctx: &Context, msg: &dyn Message) -> Result<Box<dyn Message>> {
        let mut conn = self.pool.get(ctx)?;
        let mut buf = self.buffers.take();
        self.attempt(ctx, &mut conn, &mut buf, msg)
    }

    /// Send `msg`, retrying up to `retry_times` more times on recoverable
    /// failures.
    ///
    /// Before retry `i` (0-based) the client sleeps `retreat_time * (i + 1)`
    /// and replaces the connection. Non-recoverable errors are returned at
    /// once; a cancelled or expired context stops retrying.
    pub fn call_with_retry(
        &self,
        ctx: &Context,
        msg: &dyn Message,
        retry_times: usize,
    ) -> Result<Box<dyn Message>> {
        let mut conn = self.pool.get(ctx)?;
        let mut buf = self.buffers.take();
        let mut last_err = None;

        for attempt in 0..=retry_times {
            if attempt > 0 {
                if let Some(err) = ctx.err() {
                    debug!(attempt, error = %err, "context done, abandoning retries");
                    return Err(err.into());
                }
                self.retreat(ctx, attempt);
                if let Err(err) = conn.renew(ctx) {
                    let err = ClientError::from(err);
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    warn!(attempt, error = %err, "reconnect before retry failed");
                    last_err = Some(err);
                    continue;
                }
            }

            match self.attempt(ctx, &mut conn, &mut buf, msg) {
                Ok(resp) => return Ok(resp),
                Err(err) if err.is_recoverable() => {
                    debug!(attempt, retry_times, error = %err, "recoverable call failure");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(ClientError::Unknown))
    }

    /// [`call`](Self::call) and downcast the response to `Resp`.
    pub fn call_as<Resp: MessageType>(&self, ctx: &Context, msg: &dyn Message) -> Result<Resp> {
        expect_response(self.call(ctx, msg)?)
    }

    /// [`call_with_retry`](Self::call_with_retry) and downcast the response
    /// to `Resp`.
    pub fn call_with_retry_as<Resp: MessageType>(
        &self,
        ctx: &Context,
        msg: &dyn Message,
        retry_times: usize,
    ) -> Result<Resp> {
        expect_response(self.call_with_retry(ctx, msg, retry_times)?)
    }

    /// Close the connection pool. Calls in flight finish on their own
    /// connections; later calls fail.
    pub fn close(&self) -> Result<()> {
        self.pool.close()?;
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &Pool<D> {
        &self.pool
    }

    /// One exchange inside a panic boundary. A connection left in an unknown
    /// state is closed so the next checkout redials it.
    fn attempt(
        &self,
        ctx: &Context,
        conn: &mut PooledConn<D>,
        buf: &mut BytesMut,
        msg: &dyn Message,
    ) -> Result<Box<dyn Message>> {
        let outcome = panic::catch(|| self.exchange(ctx, &mut **conn, buf, msg));
        match outcome {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(err)) => {
                if err.is_recoverable() {
                    conn.invalidate();
                }
                Err(err)
            }
            Err(caught) => {
                error!(
                    command = msg.command(),
                    version = msg.version(),
                    panic = caught.message(),
                    backtrace = caught.backtrace(),
                    "rpc call panicked"
                );
                conn.invalidate();
                Err(caught.into())
            }
        }
    }

    fn exchange(
        &self,
        ctx: &Context,
        conn: &mut D::Conn,
        buf: &mut BytesMut,
        msg: &dyn Message,
    ) -> Result<Box<dyn Message>> {
        ctx.check()?;

        let limits = &self.config.limits;
        let len = encode_frame(buf, msg, limits)?;
        let size = len - HEADER_SIZE;
        if size > self.config.max_msg_size {
            return Err(ClientError::MessageTooLarge {
                size,
                max: self.config.max_msg_size,
            });
        }

        let deadline = ctx.deadline();
        if deadline.is_some() {
            conn.set_deadline(deadline)?;
        }
        let result = self.round_trip(conn, buf, len);
        if deadline.is_some() {
            let cleared = conn.set_deadline(None);
            if result.is_ok() {
                cleared?;
            }
        }
        result
    }

    fn round_trip(
        &self,
        conn: &mut D::Conn,
        buf: &mut BytesMut,
        len: usize,
    ) -> Result<Box<dyn Message>> {
        let limits = &self.config.limits;
        write_frame(conn, buf, len)?;
        let header = read_frame(conn, buf, limits, self.config.max_msg_size)?;
        let body = &buf[HEADER_SIZE..HEADER_SIZE + header.body_len()];
        Ok(self.table.decode(&header, body, limits)?)
    }

    fn retreat(&self, ctx: &Context, attempt: usize) {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        let mut pause = self.config.retreat_time.saturating_mul(factor);
        if let Some(remaining) = ctx.remaining() {
            pause = pause.min(remaining);
        }
        if pause > Duration::ZERO {
            thread::sleep(pause);
        }
    }
}

impl<D: Dialer> fmt::Debug for Client<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pool", &self.pool)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

fn expect_response<Resp: MessageType>(resp: Box<dyn Message>) -> Result<Resp> {
    let (command, version) = (resp.command(), resp.version());
    resp.downcast::<Resp>()
        .map(|resp| *resp)
        .ok_or(ClientError::UnexpectedMessage { command, version })
}
