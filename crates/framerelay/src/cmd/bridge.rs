use framerelay_relay::{
    Bridge, BridgeConfig, SegmentTemplate, ShutdownHandle, TranscoderCommand, TranscoderConfig,
};
use tracing::{info, warn};

use crate::cmd::{parse_duration, BridgeArgs};
use crate::exit::{
    relay_error, supervisor_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS, USAGE,
};
use crate::output::{print_session_report, OutputFormat};

pub fn run(args: BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let relay = args.frame.relay_config()?;
    let drain_timeout = parse_duration(&args.drain_timeout)?;
    let command = transcoder_command(&args)?;
    let config = BridgeConfig::new(command)
        .with_relay(relay)
        .with_drain_timeout(drain_timeout);

    let bridge =
        Bridge::bind(&args.channel, config).map_err(|err| relay_error("bind failed", err))?;
    install_interrupt_handler(bridge.shutdown_handle())?;

    let session = bridge
        .run()
        .map_err(|err| relay_error("bridge failed", err))?;
    print_session_report(&args.channel.display().to_string(), &session, format);
    Ok(SUCCESS)
}

/// Resolve the transcoder command: JSON config, then flag overrides.
fn transcoder_command(args: &BridgeArgs) -> CliResult<TranscoderCommand> {
    if args.raw {
        let program = args
            .program
            .as_deref()
            .ok_or_else(|| CliError::new(USAGE, "--raw requires --program"))?;
        return Ok(TranscoderCommand::new(program).args(args.extra.iter().cloned()));
    }

    let mut config = match &args.config {
        Some(path) => TranscoderConfig::from_json_file(path)
            .map_err(|err| supervisor_error("config failed", err))?,
        None => TranscoderConfig::default(),
    };
    apply_overrides(&mut config, args)?;
    config
        .prepare_output()
        .map_err(|err| supervisor_error("output failed", err))?;
    info!(
        output = %config.output,
        first_segment = %config.output.render(0).display(),
        "segment output"
    );
    Ok(config.command())
}

fn apply_overrides(config: &mut TranscoderConfig, args: &BridgeArgs) -> CliResult<()> {
    if let Some(program) = &args.program {
        config.program = program.clone();
    }
    if let Some(output) = &args.output {
        config.output = SegmentTemplate::parse(output.clone())
            .map_err(|err| supervisor_error("invalid --output", err))?;
    }
    if let Some(seconds) = args.segment_time {
        if seconds == 0 {
            return Err(CliError::new(USAGE, "--segment-time must be greater than zero"));
        }
        config.segment_seconds = seconds;
    }
    if let Some(bitrate) = &args.bitrate {
        config.bitrate = bitrate.clone();
    }
    if let Some(codec) = &args.codec {
        config.codec = codec.clone();
    }
    if let Some(input_format) = &args.input_format {
        config.input_format = input_format.clone();
    }
    config.extra_args.extend(args.extra.iter().cloned());
    Ok(())
}

/// The bridge owns its socket file; the handler never unlinks it.
fn install_interrupt_handler(handle: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if handle.request() {
            info!("interrupt received; ending session");
            return;
        }
        warn!("interrupted while the pending accept could not be woken");
        std::process::exit(INTERRUPTED);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install Ctrl-C handler: {err}")))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cmd::Command;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn bridge_args(argv: &[&str]) -> BridgeArgs {
        let mut full = vec!["framerelay", "bridge", "/tmp/test.sock"];
        full.extend_from_slice(argv);
        match TestCli::try_parse_from(full).expect("bridge args should parse").command {
            Command::Bridge(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn raw_mode_runs_program_with_trailing_args_only() {
        let args = bridge_args(&["--raw", "--program", "sh", "--", "-c", "cat > out.bin"]);
        let command = transcoder_command(&args).unwrap();
        assert_eq!(command.program, "sh");
        assert_eq!(command.args, vec!["-c", "cat > out.bin"]);
    }

    #[test]
    fn flags_override_transcoder_defaults() {
        let mut config = TranscoderConfig::default();
        let args = bridge_args(&[
            "--codec",
            "h264_nvenc",
            "--bitrate",
            "5M",
            "--segment-time",
            "4",
            "--output",
            "/tmp/segments/part_%05d.ts",
            "--",
            "-an",
        ]);
        apply_overrides(&mut config, &args).unwrap();

        assert_eq!(config.codec, "h264_nvenc");
        assert_eq!(config.bitrate, "5M");
        assert_eq!(config.segment_seconds, 4);
        assert_eq!(config.output.as_str(), "/tmp/segments/part_%05d.ts");
        assert_eq!(config.extra_args, vec!["-an"]);
    }

    #[test]
    fn bad_output_template_is_a_usage_error() {
        let mut config = TranscoderConfig::default();
        let args = bridge_args(&["--output", "segments.mp4"]);
        assert_eq!(apply_overrides(&mut config, &args).unwrap_err().code, USAGE);
    }

    #[test]
    fn zero_segment_time_is_rejected() {
        let mut config = TranscoderConfig::default();
        let args = bridge_args(&["--segment-time", "0"]);
        assert_eq!(apply_overrides(&mut config, &args).unwrap_err().code, USAGE);
    }
}
