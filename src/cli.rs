//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use dlbridge_core::config::DEFAULT_ENDPOINT;

/// Hand browser downloads off to an external download manager.
///
/// dlbridge runs as a short-lived host process: it reads one JSON message per
/// stdin line, routes redirect requests to the download manager's local API,
/// and writes one JSON acknowledgment per stdout line.
#[derive(Parser, Debug)]
#[command(name = "dlbridge")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Base URL of the external application's local API
    #[arg(short = 'e', long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: Url,

    /// Path of the persisted settings document (omit for in-memory settings)
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    /// Delay before a download record is evaluated, in milliseconds (0-5000)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(0..=5000))]
    pub capture_delay_ms: u64,

    /// Skip the supported-type catalog refresh at startup
    #[arg(long)]
    pub no_startup_refresh: bool,
}
