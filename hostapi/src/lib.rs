//! `guestfetch-hostapi`: host capability traits and wire types for the guest bridge.
//!
//! This crate defines the host side of the contract between the bridge and a
//! sandboxed guest module. It provides:
//!
//! - `LogSink` trait: where the guest's `env.log` calls end up
//! - `StdoutSink` / `NullSink` / `CaptureSink`: stock sinks
//! - `PackedResult` and `AllocationHandle`: the pointer/length wire types
//! - `GuestAbi`: names of the guest exports the bridge calls
//! - `BoundsError` / `HostError`: host-side error types

pub mod error;
pub mod types;
pub mod traits;
pub mod capture;

// Re-export commonly used types at the crate root.
pub use error::{BoundsError, HostError};
pub use types::{AllocationHandle, GuestAbi, PackedResult, HOST_LOG, HOST_MODULE, WASI_MODULE};
pub use traits::{LogSink, NullSink, StdoutSink};
pub use capture::CaptureSink;
