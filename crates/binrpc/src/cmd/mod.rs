use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;

use crate::exit::{io_error, CliError, CliResult, CONFIG_INVALID};
use crate::output::OutputFormat;

pub mod call;
pub mod config;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the echo server until interrupted.
    Serve(ServeArgs),
    /// Send one echo request and print the reply.
    Call(CallArgs),
    /// Print or check client/server configuration.
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Config(args) => config::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (use port 0 for an ephemeral port).
    #[arg(default_value = "127.0.0.1:7000")]
    pub address: String,
    /// JSON server config file.
    #[arg(long, value_name = "FILE", env = "BINRPC_SERVER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Largest request body accepted, in bytes.
    #[arg(long)]
    pub max_msg_size: Option<usize>,
    /// Consecutive transient accept errors tolerated before stopping.
    #[arg(long)]
    pub accept_max_retry: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server address.
    pub address: String,
    /// Text to echo.
    #[arg(long, short = 't')]
    pub text: String,
    /// Request id echoed back by the server.
    #[arg(long, default_value = "1")]
    pub id: u64,
    /// Tags to attach (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// Retries after a recoverable failure.
    #[arg(long, default_value = "2")]
    pub retries: usize,
    /// Overall call deadline (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Number of pooled connections.
    #[arg(long)]
    pub pool_size: Option<usize>,
    /// JSON client config file.
    #[arg(long, value_name = "FILE", env = "BINRPC_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ConfigSide {
    Client,
    Server,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Which configuration to work with.
    #[arg(value_enum)]
    pub side: ConfigSide,
    /// Validate this JSON file instead of printing defaults.
    #[arg(long, value_name = "FILE")]
    pub check: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// Read a JSON config file, or fall back to defaults when no path is given.
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> CliResult<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            CONFIG_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}
