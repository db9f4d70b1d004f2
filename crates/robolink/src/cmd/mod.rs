use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use robolink_telemetry::TelemetryLog;
use robolink_transport::DEFAULT_BAUD_RATE;

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod client;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bridge TCP clients to the robot controller's UART.
    Serve(ServeArgs),
    /// Connect to a bridge, send a message, and print what comes back.
    Client(ClientArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, telemetry: Arc<TelemetryLog>) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format, telemetry),
        Command::Client(args) => client::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TCP address to accept clients on.
    #[arg(long, env = "ROBOLINK_BIND", default_value = "0.0.0.0:100")]
    pub bind: String,
    /// Serial device wired to the robot controller.
    #[arg(long, env = "ROBOLINK_UART", value_name = "DEVICE")]
    pub uart: Option<String>,
    /// Serial baud rate.
    #[arg(long, env = "ROBOLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Use an in-memory UART instead of a device (bench runs without a robot).
    #[arg(long)]
    pub mock_uart: bool,
    /// SSID reported to `{WA_detection}`; unset means not associated.
    #[arg(long, env = "ROBOLINK_SSID")]
    pub ssid: Option<String>,
    /// Station MAC reported to `{WA_detection}` when not associated.
    #[arg(long, env = "ROBOLINK_MAC", default_value = "00:00:00:00:00:00")]
    pub mac: String,
    /// Heartbeat period (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub heartbeat_interval: String,
    /// Unanswered heartbeats tolerated before the link is dropped.
    #[arg(long, default_value_t = robolink_bridge::DEFAULT_HEARTBEAT_THRESHOLD)]
    pub heartbeat_threshold: u32,
    /// Maximum message size in bytes, braces included.
    #[arg(long, default_value_t = robolink_frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame: usize,
    /// Drop spaces inside messages received from clients.
    #[arg(long)]
    pub strip_spaces: bool,
    /// Print and clear a telemetry snapshot at this period (e.g. 5s).
    #[arg(long, value_name = "DURATION")]
    pub report_every: Option<String>,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Bridge address.
    #[arg(default_value = "127.0.0.1:100")]
    pub addr: String,
    /// Message to send after connecting, e.g. '{"N":3,"D1":1}'.
    #[arg(long)]
    pub send: Option<String>,
    /// How long to stay connected (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub duration: String,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print heartbeats as well as data.
    #[arg(long)]
    pub show_heartbeats: bool,
    /// Do not answer heartbeats (the bridge will drop the link).
    #[arg(long)]
    pub no_ack: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
