use std::fmt;
use std::io;

use binrpc_frame::FrameError;
use binrpc_pool::PoolError;
use binrpc_service::{ClientError, ConfigError, ServerError};
use binrpc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::Context(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Codec(_)
        | FrameError::MalformedHeader(_)
        | FrameError::EmptyBody
        | FrameError::BodyTooLarge { .. }
        | FrameError::EmptyMessage
        | FrameError::EncodedTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Config(err) => config_error(context, err),
        ClientError::Pool(PoolError::Transport(err)) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::MessageTooLarge { .. } | ClientError::UnexpectedMessage { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::Context(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Config(err) => config_error(context, err),
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Spawn(err) => io_error(context, err),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}
