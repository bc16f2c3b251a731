//! `guestfetch-sandbox`: Wasmtime-based bridge to a sandboxed guest module.
//!
//! This crate loads a guest module, passes a string into its linear memory,
//! and reads a transformed string back. It provides:
//!
//! - **Loading:** one-time compilation, import validation, WASI preview1
//!   compatibility imports, startup export execution
//! - **Host functions:** a registry of capabilities (`env.log`) resolved by
//!   `(module, name)`
//! - **Memory access:** bounds-checked reads and writes, never growing memory
//! - **Marshaling:** allocate / write / read / free through the guest's own
//!   allocator, with every allocation released exactly once
//! - **Fuel metering:** instruction-level metering to stop runaway guests
//!
//! The primary entry points are [`Bridge::transform`] and [`Session::invoke`].

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod marshal;
pub mod artifact;
pub mod runtime;

pub use error::SandboxError;
pub use config::SandboxConfig;
pub use linker::{HostCapability, HostFunctionBinding, HostFunctionRegistry};
pub use runtime::{Bridge, Session, SessionState};
