use std::time::Duration;

use binrpc_codec::Limits;
use binrpc_frame::HEADER_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default initial scratch buffer size: 4 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

/// Default size above which scratch buffers are dropped instead of reused: 1 MiB.
pub const DEFAULT_BUFFER_RECYCLE_SIZE: usize = 1024 * 1024;

/// Default maximum message body size: 1 MiB.
pub const DEFAULT_MAX_MSG_SIZE: usize = 1024 * 1024;

/// Client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub limits: Limits,
    /// Initial size of each scratch buffer.
    pub buffer_size: usize,
    /// Scratch buffers that grew beyond this are not reused.
    pub buffer_recycle_size: usize,
    /// Largest request or response body accepted.
    pub max_msg_size: usize,
    /// Base pause between retries; attempt `i` waits `retreat_time * (i + 1)`.
    #[serde(with = "crate::duration")]
    pub retreat_time: Duration,
    /// Number of pooled connections.
    pub pool_size: usize,
    /// Per-dial connect timeout.
    #[serde(with = "crate::duration::option")]
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_recycle_size: DEFAULT_BUFFER_RECYCLE_SIZE,
            max_msg_size: DEFAULT_MAX_MSG_SIZE,
            retreat_time: Duration::from_millis(50),
            pool_size: 4,
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_buffers(
            &self.limits,
            self.buffer_size,
            self.buffer_recycle_size,
            self.max_msg_size,
        )?;
        if self.pool_size == 0 {
            return Err(ConfigError::invalid("pool_size", "must be at least 1"));
        }
        if self.connect_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::invalid(
                "connect_timeout",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub limits: Limits,
    /// Initial size of each connection's scratch buffer.
    pub buffer_size: usize,
    /// Scratch buffers that grew beyond this are not reused.
    pub buffer_recycle_size: usize,
    /// Largest request or response body accepted.
    pub max_msg_size: usize,
    /// First pause after a transient accept error.
    #[serde(with = "crate::duration")]
    pub accept_delay: Duration,
    /// Ceiling for the doubling accept pause.
    #[serde(with = "crate::duration")]
    pub accept_max_delay: Duration,
    /// Consecutive transient accept errors tolerated before the loop stops.
    pub accept_max_retry: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_recycle_size: DEFAULT_BUFFER_RECYCLE_SIZE,
            max_msg_size: DEFAULT_MAX_MSG_SIZE,
            accept_delay: Duration::from_micros(5),
            accept_max_delay: Duration::from_millis(200),
            accept_max_retry: 1000,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_buffers(
            &self.limits,
            self.buffer_size,
            self.buffer_recycle_size,
            self.max_msg_size,
        )?;
        if self.accept_delay.is_zero() {
            return Err(ConfigError::invalid("accept_delay", "must be greater than zero"));
        }
        if self.accept_max_delay < self.accept_delay {
            return Err(ConfigError::invalid(
                "accept_max_delay",
                "must not be shorter than accept_delay",
            ));
        }
        if self.accept_max_retry == 0 {
            return Err(ConfigError::invalid("accept_max_retry", "must be at least 1"));
        }
        Ok(())
    }
}

fn validate_buffers(
    limits: &Limits,
    buffer_size: usize,
    buffer_recycle_size: usize,
    max_msg_size: usize,
) -> Result<(), ConfigError> {
    if buffer_size < HEADER_SIZE {
        return Err(ConfigError::invalid(
            "buffer_size",
            format!("must be at least the {HEADER_SIZE}-byte header"),
        ));
    }
    if buffer_recycle_size < buffer_size {
        return Err(ConfigError::invalid(
            "buffer_recycle_size",
            "must not be smaller than buffer_size",
        ));
    }
    if max_msg_size == 0 {
        return Err(ConfigError::invalid("max_msg_size", "must be greater than zero"));
    }
    let frame_max = limits.data_max_len().min(u32::MAX as usize);
    if max_msg_size > frame_max - HEADER_SIZE {
        return Err(ConfigError::invalid(
            "max_msg_size",
            format!("must leave room for the header within data_max_len ({frame_max})"),
        ));
    }
    Ok(())
}
