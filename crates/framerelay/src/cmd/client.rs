use std::fs::File;
use std::io::{BufReader, Read};

use framerelay_relay::RelayClient;

use crate::cmd::ClientArgs;
use crate::exit::{io_error, relay_error, CliResult, SUCCESS};
use crate::output::{print_client_report, OutputFormat};

pub fn run(args: ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.frame.relay_config()?;
    // Open the input before connecting so a bad path never reaches the bridge.
    let input: Box<dyn Read> = match &args.input {
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                io_error(&format!("failed opening {}", path.display()), err)
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(std::io::stdin().lock()),
    };

    let mut client = RelayClient::connect(&args.channel, config)
        .map_err(|err| relay_error("connect failed", err))?;
    let report = client
        .forward(input)
        .map_err(|err| relay_error("relay failed", err))?;

    print_client_report(&args.channel.display().to_string(), &report, format);
    Ok(SUCCESS)
}
