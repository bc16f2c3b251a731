//! Host-side error types for the guest bridge.
//!
//! `BoundsError` is raised whenever the host is asked to touch a range of
//! guest linear memory that is not fully contained in the current memory size.
//! `HostError` is what host functions (the capabilities the guest imports)
//! report back to the sandbox when they cannot complete.

use std::fmt;

/// A `[offset, offset+len)` range that does not fit in guest linear memory.
///
/// Always fatal for the current invocation. There is no partial-read mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memory access out of range: offset {offset} + length {len} exceeds memory size {size}")]
pub struct BoundsError {
    /// Requested start offset.
    pub offset: u64,
    /// Requested length in bytes.
    pub len: u64,
    /// Linear memory size at the time of the access.
    pub size: u64,
}

impl BoundsError {
    pub fn new(offset: u64, len: u64, size: u64) -> Self {
        Self { offset, len, size }
    }

    /// One past the last requested byte, saturating on overflow.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len)
    }
}

/// Error returned by a host capability invoked by the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The guest passed a pointer/length pair outside its own memory.
    Bounds(BoundsError),
    /// The guest instance does not export the memory the capability needs.
    MissingMemory,
    /// The host-side sink refused the data (closed pipe, full buffer, ...).
    Sink(String),
}

impl HostError {
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// True if this error was caused by guest misbehavior rather than the host.
    pub fn is_guest_fault(&self) -> bool {
        matches!(self, Self::Bounds(_) | Self::MissingMemory)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounds(e) => write!(f, "host call rejected: {}", e),
            Self::MissingMemory => write!(f, "host call rejected: guest exports no memory"),
            Self::Sink(msg) => write!(f, "log sink failed: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<BoundsError> for HostError {
    fn from(e: BoundsError) -> Self {
        Self::Bounds(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_error_display() {
        let err = BoundsError::new(65_530, 10, 65_536);
        let s = format!("{}", err);
        assert!(s.contains("65530"));
        assert!(s.contains("65536"));
        assert_eq!(err.end(), 65_540);
    }

    #[test]
    fn test_bounds_error_end_saturates() {
        let err = BoundsError::new(u64::MAX, 1, 0);
        assert_eq!(err.end(), u64::MAX);
    }

    #[test]
    fn test_guest_fault_classification() {
        assert!(HostError::from(BoundsError::new(0, 1, 0)).is_guest_fault());
        assert!(HostError::MissingMemory.is_guest_fault());
        assert!(!HostError::sink("broken pipe").is_guest_fault());
    }

    #[test]
    fn test_display() {
        let s = format!("{}", HostError::sink("broken pipe"));
        assert!(s.contains("broken pipe"));
    }
}
