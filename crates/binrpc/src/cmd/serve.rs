use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use binrpc::echo;
use binrpc_service::{Server, ServerConfig};
use tracing::info;

use crate::cmd::{load_config, ServeArgs};
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = server_config(&args)?;
    let server = Server::new(config, Arc::new(echo::server_table()))
        .map_err(|err| server_error("invalid server config", err))?;
    let handle = server
        .listen_and_serve(&args.address)
        .map_err(|err| server_error("listen failed", err))?;
    if let Some(addr) = handle.local_addr() {
        print_listening(addr, format);
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) && !handle.is_finished() {
        thread::sleep(POLL_INTERVAL);
    }
    if !running.load(Ordering::SeqCst) {
        info!("interrupted, stopping server");
    }

    handle
        .stop()
        .map_err(|err| server_error("server stopped", err))?;
    Ok(SUCCESS)
}

fn server_config(args: &ServeArgs) -> CliResult<ServerConfig> {
    let mut config: ServerConfig = load_config(args.config.as_deref())?;
    if let Some(max_msg_size) = args.max_msg_size {
        config.max_msg_size = max_msg_size;
    }
    if let Some(retries) = args.accept_max_retry {
        config.accept_max_retry = retries;
    }
    Ok(config)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
