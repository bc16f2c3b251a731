//! guestfetch: pass a URL through a sandboxed WebAssembly guest, then fetch it.
//!
//! The guest decides the final URL (adding a scheme when missing) and logs the
//! raw input through the host `log` function. The host performs the request
//! and prints the body.

pub mod cli;
pub mod fetch;

use std::io::Write;

use guestfetch_hostapi::LogSink;
use guestfetch_sandbox::{Bridge, SandboxError};

pub use cli::Cli;
pub use fetch::{FetchResponse, Fetcher, HttpFetcher, NetworkError};

pub const USAGE: &str = "Please provide a URL using the --url flag.";

/// Run one request.
///
/// `load` is only called when there is a URL to process, and guest log lines
/// go to `sink`. Guest failures are fatal and returned; network failures are
/// printed to `out` and are not.
pub fn run<W, L>(
    cli: &Cli,
    load: L,
    sink: Box<dyn LogSink>,
    fetcher: &dyn Fetcher,
    out: &mut W,
) -> anyhow::Result<()>
where
    W: Write,
    L: FnOnce() -> Result<Bridge, SandboxError>,
{
    if cli.url.is_empty() {
        writeln!(out, "{USAGE}")?;
        return Ok(());
    }

    let bridge = load()?;
    let url = bridge.transform_with_sink(&cli.url, sink)?;
    tracing::info!(input = %cli.url, url = %url, "guest built url");

    writeln!(out, "Requesting URL: {url}")?;
    match fetcher.fetch(&url) {
        Ok(response) => writeln!(out, "{}", response.body)?,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "request failed");
            writeln!(out, "Error making request: {e}")?;
        }
    }
    Ok(())
}
