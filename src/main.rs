//! Host entry point: a stdio message loop in front of the engine.
//!
//! The browser side talks to this process with one JSON message per line on
//! stdin and reads one JSON acknowledgment per line on stdout. The process is
//! short-lived by design: EOF on stdin tears everything down.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use dlbridge_core::{
    BridgeConfig, DispatchClient, JsonFileStore, MemoryStore, MessageRouter, SettingsCache,
    SettingsStore,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr: stdout carries the message protocol.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!(endpoint = %args.endpoint, "dlbridge host starting");

    let config = BridgeConfig {
        endpoint: args.endpoint.clone(),
        capture_delay: std::time::Duration::from_millis(args.capture_delay_ms),
        ..BridgeConfig::default()
    };

    let store: Arc<dyn SettingsStore> = match &args.settings {
        Some(path) => {
            info!(path = %path.display(), "using file-backed settings");
            Arc::new(JsonFileStore::new(path))
        }
        None => {
            info!("no settings path given; settings are in-memory for this run");
            Arc::new(MemoryStore::new())
        }
    };

    let dispatch = Arc::new(DispatchClient::new(&config));
    let settings = Arc::new(SettingsCache::load(store, Arc::clone(&dispatch), &config).await);

    if args.no_startup_refresh {
        debug!("startup catalog refresh skipped");
    } else {
        // Throttled; harmless when the application is not running yet.
        settings.refresh_supported_types(false).await;
    }

    let router = MessageRouter::new(dispatch);

    run_message_loop(&router).await?;

    info!("stdin closed; dlbridge host shutting down");
    Ok(())
}

/// Reads JSON messages line by line until EOF, answering each on stdout.
async fn run_message_loop(router: &MessageRouter) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str(trimmed) {
            Ok(message) => router.handle(&message).await,
            Err(e) => {
                warn!(error = %e, "discarding line that is not valid JSON");
                dlbridge_core::router::MessageResponse {
                    is_successful: false,
                    message: format!("invalid JSON message: {e}"),
                }
            }
        };

        let mut body = serde_json::to_vec(&response)?;
        body.push(b'\n');
        stdout.write_all(&body).await?;
        stdout.flush().await?;
    }

    Ok(())
}
