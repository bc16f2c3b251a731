//! Host capability traits.
//!
//! The sandbox publishes a fixed set of capabilities to the guest. Each one is
//! backed by a trait object that lives in the per-session host state, so the
//! embedding application decides where guest output actually goes.

use std::io::Write;

use crate::error::HostError;

/// Destination for the guest's `log(ptr, len)` host call.
///
/// The sandbox has already bounds-checked and copied the bytes out of guest
/// memory before `write` is called. The bytes are not guaranteed to be UTF-8.
pub trait LogSink: Send {
    fn write(&mut self, message: &[u8]) -> Result<(), HostError>;
}

/// Prints each guest log line to the process stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&mut self, message: &[u8]) -> Result<(), HostError> {
        let mut out = std::io::stdout().lock();
        out.write_all(message)
            .and_then(|_| out.write_all(b"\n"))
            .map_err(|e| HostError::sink(e.to_string()))
    }
}

/// Drops every guest log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&mut self, _message: &[u8]) -> Result<(), HostError> {
        Ok(())
    }
}
