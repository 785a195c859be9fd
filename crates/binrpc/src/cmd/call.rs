use std::sync::Arc;
use std::time::Instant;

use binrpc::echo::{self, EchoRequest, EchoResponse};
use binrpc_service::duration::parse_duration;
use binrpc_service::{Client, ClientConfig};
use binrpc_transport::Context;
use tracing::debug;

use crate::cmd::{load_config, CallArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout =
        parse_duration(&args.timeout).map_err(|err| CliError::new(USAGE, err.to_string()))?;
    if timeout.is_zero() {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }
    let config = client_config(&args)?;

    let ctx = Context::with_timeout(timeout);
    let client = Client::connect(&ctx, &args.address, config, Arc::new(echo::client_table()))
        .map_err(|err| client_error("connect failed", err))?;

    let request = EchoRequest::new(args.id, args.text).with_tags(args.tags);
    let started = Instant::now();
    let reply: EchoResponse = client
        .call_with_retry_as(&ctx, &request, args.retries)
        .map_err(|err| client_error("call failed", err))?;
    let elapsed = started.elapsed();
    debug!(id = reply.id, elapsed_us = elapsed.as_micros() as u64, "echo reply received");

    print_reply(&reply, args.retries, elapsed, format);
    if let Err(err) = client.close() {
        debug!(error = %err, "closing client failed");
    }
    Ok(SUCCESS)
}

fn client_config(args: &CallArgs) -> CliResult<ClientConfig> {
    let mut config: ClientConfig = load_config(args.config.as_deref())?;
    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(timeout: &str) -> CallArgs {
        CallArgs {
            address: "127.0.0.1:1".to_string(),
            text: "hi".to_string(),
            id: 1,
            tags: Vec::new(),
            retries: 0,
            timeout: timeout.to_string(),
            pool_size: Some(1),
            config: None,
        }
    }

    #[test]
    fn bad_timeout_is_a_usage_error() {
        let err = run(args("soon"), OutputFormat::Json).expect_err("timeout should be rejected");
        assert_eq!(err.code, USAGE);
        let err = run(args("0s"), OutputFormat::Json).expect_err("zero timeout should be rejected");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn pool_size_flag_overrides_config() {
        let config = client_config(&args("1s")).expect("config should build");
        assert_eq!(config.pool_size, 1);
    }
}
