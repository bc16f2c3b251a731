//! Per-session mutable state held in the Wasmtime Store.
//!
//! `HostState` combines the WASI compatibility context, the store limits, the
//! guest's log sink and the last host-side fault into a single struct that
//! lives inside `Store<HostState>` for the duration of one session.

use wasmtime::{StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

use guestfetch_hostapi::{HostError, LogSink};

use crate::config::SandboxConfig;

/// Per-session mutable state held in the Wasmtime `Store`.
///
/// Created fresh for each session. Dropped together with the guest instance.
pub struct HostState {
    /// WASI preview1 context backing the compatibility imports.
    pub wasi: WasiP1Ctx,
    /// Memory growth limits enforced by the store limiter.
    pub limits: StoreLimits,
    /// Destination for `env.log`.
    sink: Box<dyn LogSink>,
    /// Number of lines the guest has logged.
    log_lines: u64,
    /// Fault raised by a host function that trapped the guest.
    fault: Option<HostError>,
    /// Name of the guest's exported memory.
    memory_export: String,
}

impl HostState {
    pub fn new(config: &SandboxConfig, sink: Box<dyn LogSink>) -> Self {
        let mut builder = WasiCtxBuilder::new();
        if config.inherit_stderr {
            builder.inherit_stderr();
        }
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes() as usize)
            .instances(1)
            .memories(1)
            .build();
        Self {
            wasi: builder.build_p1(),
            limits,
            sink,
            log_lines: 0,
            fault: None,
            memory_export: config.abi.memory.clone(),
        }
    }

    pub fn memory_export(&self) -> &str {
        &self.memory_export
    }

    /// Forward one guest log line to the sink.
    pub fn log(&mut self, message: &[u8]) -> Result<(), HostError> {
        self.log_lines += 1;
        self.sink.write(message)
    }

    pub fn log_lines(&self) -> u64 {
        self.log_lines
    }

    /// Remember why a host function is about to trap the guest.
    ///
    /// Only the first fault is kept; it is the one that aborted the call.
    pub fn record_fault(&mut self, err: HostError) {
        if self.fault.is_none() {
            self.fault = Some(err);
        }
    }

    /// Take the pending fault, if any.
    pub fn take_fault(&mut self) -> Option<HostError> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestfetch_hostapi::{BoundsError, CaptureSink};

    fn test_host_state(sink: CaptureSink) -> HostState {
        HostState::new(&SandboxConfig::default(), Box::new(sink))
    }

    #[test]
    fn test_log_forwards_to_sink() {
        let sink = CaptureSink::new();
        let mut state = test_host_state(sink.clone());
        state.log(b"example.com").unwrap();
        assert_eq!(sink.text_lines(), vec!["example.com"]);
        assert_eq!(state.log_lines(), 1);
    }

    #[test]
    fn test_first_fault_wins() {
        let mut state = test_host_state(CaptureSink::new());
        state.record_fault(BoundsError::new(10, 10, 5).into());
        state.record_fault(HostError::sink("later"));
        assert_eq!(state.take_fault(), Some(HostError::Bounds(BoundsError::new(10, 10, 5))));
        assert_eq!(state.take_fault(), None);
    }
}
