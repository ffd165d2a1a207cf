// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// sentinel-ask: ask the relay a question and print the answer as it streams.
//
// Usage:
//   sentinel-ask "What changed in the 2024 report?"
//   sentinel-ask --no-stream "What changed?"
//   sentinel-ask --relay-url http://127.0.0.1:9810 --transcript-json "What changed?"

use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sentinel::client::RelayClient;
use sentinel::session::{ChatSession, Outcome};

#[derive(Parser)]
#[command(
    name = "sentinel-ask",
    about = "Ask the sentinel relay a question and stream the answer."
)]
struct Cli {
    /// The question to ask.
    question: String,

    /// Relay base address.
    #[arg(long, env = "SENTINEL_RELAY_URL", default_value = "http://127.0.0.1:9810")]
    relay_url: String,

    /// Wait for the complete answer instead of streaming it.
    #[arg(long)]
    no_stream: bool,

    /// Timeout for --no-stream requests, in seconds.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Print the final transcript as JSON after the answer.
    #[arg(long)]
    transcript_json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let client = RelayClient::new(&cli.relay_url, Duration::from_secs(cli.timeout_secs));

    let code = if cli.no_stream {
        ask_blocking(&client, &cli.question).await
    } else {
        ask_streaming(client, cli.question, cli.transcript_json).await
    };
    std::process::exit(code);
}

async fn ask_blocking(client: &RelayClient, question: &str) -> i32 {
    match client.ask(question).await {
        Ok(resp) => {
            println!("{}", resp.answer);
            for source in &resp.sources {
                match (&source.chunk_id, source.page) {
                    (Some(chunk), Some(page)) => println!("  source: {chunk} (p.{page})"),
                    (Some(chunk), None) => println!("  source: {chunk}"),
                    (None, Some(page)) => println!("  source: p.{page}"),
                    (None, None) => {}
                }
            }
            if let Some(meta) = resp.metadata {
                tracing::info!(
                    model = meta.model.as_deref().unwrap_or("-"),
                    chunks_used = meta.chunks_used,
                    latency_ms = meta.latency_ms,
                    "answer metadata"
                );
            }
            0
        }
        Err(e) => {
            tracing::error!("request failed: {e}");
            1
        }
    }
}

async fn ask_streaming(client: RelayClient, question: String, transcript_json: bool) -> i32 {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, stopping answer");
                cancel.cancel();
            }
        });
    }

    let mut session = ChatSession::new();
    let mut updates = session.subscribe();
    let op = match session.begin(question) {
        Ok(op) => op,
        Err(e) => {
            tracing::error!("{e}");
            return 1;
        }
    };
    let answer_id = op.message_id();

    // The session lives in its own task; dropping it there ends the update
    // loop below once the last snapshot has been printed.
    let driver = tokio::spawn(async move {
        let outcome = session.run(op, &client, &cancel).await;
        let json = if transcript_json {
            serde_json::to_string_pretty(session.transcript().messages()).ok()
        } else {
            None
        };
        (outcome, json)
    });

    let mut printed = 0usize;
    let mut stdout = std::io::stdout();
    while updates.changed().await.is_ok() {
        let view = updates.borrow_and_update();
        if let Some(message) = view.messages.iter().find(|m| m.id() == answer_id) {
            let text = message.text();
            if text.len() > printed {
                let _ = stdout.write_all(text[printed..].as_bytes());
                let _ = stdout.flush();
                printed = text.len();
            }
        }
    }
    println!();

    let (outcome, json) = match driver.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("answer task failed: {e}");
            return 1;
        }
    };
    if let Some(json) = json {
        println!("{json}");
    }

    match outcome {
        Ok(Outcome::Completed) => 0,
        Ok(Outcome::Cancelled) => 130,
        Ok(Outcome::Failed(_)) => 1,
        Err(e) => {
            tracing::error!("{e}");
            1
        }
    }
}
