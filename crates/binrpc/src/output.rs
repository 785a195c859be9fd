use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::Duration;

use binrpc::echo::EchoResponse;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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
struct ReplyOutput<'a> {
    id: u64,
    text: &'a str,
    tags: &'a [String],
    chars: u32,
    attempts_allowed: usize,
    elapsed_us: u64,
}

pub fn print_reply(reply: &EchoResponse, retries: usize, elapsed: Duration, format: OutputFormat) {
    let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                id: reply.id,
                text: &reply.text,
                tags: &reply.tags,
                chars: reply.chars,
                attempts_allowed: retries.saturating_add(1),
                elapsed_us,
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
                .set_header(vec!["ID", "CHARS", "TAGS", "ELAPSED", "TEXT"])
                .add_row(vec![
                    reply.id.to_string(),
                    reply.chars.to_string(),
                    reply.tags.join(","),
                    format!("{elapsed:?}"),
                    reply.text.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} chars={} tags=[{}] elapsed={:?} text={}",
                reply.id,
                reply.chars,
                reply.tags.join(","),
                elapsed,
                reply.text
            );
        }
        OutputFormat::Raw => print_raw(reply.text.as_bytes()),
    }
}

#[derive(Serialize)]
struct ListeningOutput {
    event: &'static str,
    address: String,
}

pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                address: addr.to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => println!("listening on {addr}"),
    }
    // Scripts wait for this line before connecting.
    let _ = std::io::stdout().flush();
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
