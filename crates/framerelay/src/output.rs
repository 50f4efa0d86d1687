use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framerelay_relay::{ExitOutcome, RelayEnd, RelayReport, SessionReport};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ClientOutput<'a> {
    role: &'static str,
    channel: &'a str,
    #[serde(flatten)]
    relay: &'a RelayReport,
}

#[derive(Serialize)]
struct BridgeOutput<'a> {
    role: &'static str,
    channel: &'a str,
    #[serde(flatten)]
    session: &'a SessionReport,
}

pub fn print_client_report(channel: &str, report: &RelayReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ClientOutput {
            role: "client",
            channel,
            relay: report,
        }),
        OutputFormat::Table => {
            let mut table = relay_table(report);
            table.add_row(vec!["CHANNEL".to_string(), channel.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("client channel={channel} {}", relay_summary(report));
        }
    }
}

pub fn print_session_report(channel: &str, session: &SessionReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BridgeOutput {
            role: "bridge",
            channel,
            session,
        }),
        OutputFormat::Table => {
            let mut table = relay_table(&session.relay);
            table
                .add_row(vec!["CHANNEL".to_string(), channel.to_string()])
                .add_row(vec!["ENDED".to_string(), end_label(&session.end)])
                .add_row(vec![
                    "TRANSCODER".to_string(),
                    outcome_label(&session.subprocess),
                ]);
            if let Some(pid) = session.peer_pid {
                table.add_row(vec!["PEER PID".to_string(), pid.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "bridge channel={channel} {} ended={} transcoder={}",
                relay_summary(&session.relay),
                end_label(&session.end),
                outcome_label(&session.subprocess)
            );
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn relay_table(report: &RelayReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"])
        .add_row(vec!["FRAMES".to_string(), report.frames.to_string()])
        .add_row(vec!["BYTES".to_string(), report.payload_bytes.to_string()])
        .add_row(vec!["REJECTED".to_string(), report.rejected.to_string()])
        .add_row(vec![
            "TRUNCATED BYTES".to_string(),
            report.truncated_bytes.to_string(),
        ])
        .add_row(vec!["ELAPSED MS".to_string(), report.elapsed_ms.to_string()])
        .add_row(vec!["FPS".to_string(), format!("{:.1}", report.fps)]);
    table
}

fn relay_summary(report: &RelayReport) -> String {
    format!(
        "frames={} bytes={} rejected={} truncated={} elapsed={}ms fps={:.1}",
        report.frames,
        report.payload_bytes,
        report.rejected,
        report.truncated_bytes,
        report.elapsed_ms,
        report.fps
    )
}

fn end_label(end: &RelayEnd) -> String {
    match end {
        RelayEnd::PeerClosed => "peer closed".to_string(),
        RelayEnd::ShutdownRequested => "shutdown requested".to_string(),
        RelayEnd::ChannelError(detail) => format!("channel error ({detail})"),
        RelayEnd::InvalidFrame(detail) => format!("invalid frame ({detail})"),
        RelayEnd::SubprocessWriteFailed(detail) => format!("transcoder write failed ({detail})"),
    }
}

fn outcome_label(outcome: &ExitOutcome) -> String {
    match outcome {
        ExitOutcome::Exited { code: Some(code) } => format!("exited {code}"),
        ExitOutcome::Exited { code: None } => "exited (signal)".to_string(),
        ExitOutcome::Killed => "killed after drain timeout".to_string(),
    }
}
