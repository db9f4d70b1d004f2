use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use robolink_frame::Message;
use robolink_telemetry::{format_seconds, TelemetrySnapshot};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct MessageOutput<'a> {
    peer: &'a str,
    size: usize,
    message: String,
    timestamp: String,
}

pub fn print_message(message: &Message, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                peer,
                size: message.len(),
                message: message.text().into_owned(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "MESSAGE"])
                .add_row(vec![
                    peer.to_string(),
                    message.len().to_string(),
                    message.text().into_owned(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={} size={} message={}", peer, message.len(), message);
        }
        OutputFormat::Raw => {
            print_raw(message.as_bytes());
        }
    }
}

pub fn print_snapshot(snapshot: &TelemetrySnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", snapshot.to_json()),
        OutputFormat::Raw => {
            print_raw(snapshot.to_json().as_bytes());
            print_raw(b"\n");
        }
        OutputFormat::Table => {
            let status = &snapshot.status;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TIME", "OK", "TEXT"]);
            for cmd in &snapshot.sent {
                table.add_row(vec![
                    "sent".to_string(),
                    format_seconds(cmd.timestamp),
                    if cmd.confirmed { "yes" } else { "no" }.to_string(),
                    cmd.text.clone(),
                ]);
            }
            for entry in &snapshot.received {
                table.add_row(vec![
                    "recv".to_string(),
                    format_seconds(entry.timestamp),
                    String::new(),
                    entry.text.clone(),
                ]);
            }
            println!(
                "uptime={}s sent={}/{} recv={}/{}",
                status.uptime, status.sent_buf, status.sent_max, status.recv_buf, status.recv_max
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for line in pretty_snapshot(snapshot) {
                println!("{line}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn pretty_snapshot(snapshot: &TelemetrySnapshot) -> Vec<String> {
    let status = &snapshot.status;
    let mut lines = vec![format!(
        "uptime={}s sent={} recv={}",
        status.uptime, status.sent_buf, status.recv_buf
    )];
    for cmd in &snapshot.sent {
        let mark = if cmd.confirmed { ">" } else { "!" };
        lines.push(format!(
            "  {mark} {} {}",
            format_seconds(cmd.timestamp),
            cmd.text
        ));
    }
    for entry in &snapshot.received {
        lines.push(format!("  < {} {}", format_seconds(entry.timestamp), entry.text));
    }
    lines
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
