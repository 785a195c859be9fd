use binrpc_service::{ClientConfig, ServerConfig};

use crate::cmd::{load_config, ConfigArgs, ConfigSide};
use crate::exit::{config_error, CliResult, SUCCESS};
use crate::output::print_json;

pub fn run(args: ConfigArgs) -> CliResult<i32> {
    let path = args.check.as_deref();
    match args.side {
        ConfigSide::Client => {
            let config: ClientConfig = load_config(path)?;
            config
                .validate()
                .map_err(|err| config_error("invalid client config", err))?;
            print_json(&config);
        }
        ConfigSide::Server => {
            let config: ServerConfig = load_config(path)?;
            config
                .validate()
                .map_err(|err| config_error("invalid server config", err))?;
            print_json(&config);
        }
    }
    Ok(SUCCESS)
}
