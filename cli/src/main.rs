//! guestfetch CLI

use std::io;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use guestfetch::{Cli, HttpFetcher};
use guestfetch_hostapi::StdoutSink;
use guestfetch_sandbox::{Bridge, SandboxConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let fetcher = HttpFetcher::new(REQUEST_TIMEOUT);
    guestfetch::run(
        &cli,
        || Bridge::embedded(SandboxConfig::default()),
        Box::new(StdoutSink),
        &fetcher,
        &mut io::stdout(),
    )
}
