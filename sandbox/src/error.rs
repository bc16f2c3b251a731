//! Sandbox error types.

use guestfetch_hostapi::{BoundsError, HostError};

use crate::runtime::SessionState;

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine creation or artifact compilation failed.
    #[error("failed to compile guest artifact: {0}")]
    Compile(#[source] anyhow::Error),

    /// The module cannot be linked or instantiated (unresolved import,
    /// missing memory, instantiation trap).
    #[error("failed to load guest: {0}")]
    Load(String),

    /// The startup export trapped or exited.
    #[error("guest startup export '{export}' failed: {reason}")]
    Startup { export: String, reason: String },

    /// A required export is missing or has the wrong signature.
    #[error("guest export '{name}' unavailable: {reason}")]
    MissingExport { name: String, reason: String },

    /// Host access outside the guest's linear memory.
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// The guest allocator returned a null pointer for a non-empty request.
    #[error("guest allocator returned null for {size} bytes")]
    AllocationFailed { size: u32 },

    /// The payload cannot be addressed by a 32-bit guest.
    #[error("payload of {len} bytes does not fit in guest address space")]
    PayloadTooLarge { len: usize },

    /// A guest export trapped.
    #[error("call to guest export '{export}' failed: {reason}")]
    Invocation { export: String, reason: String },

    /// The guest ran out of fuel.
    #[error("fuel exhausted in guest export '{export}'")]
    FuelExhausted { export: String },

    /// The guest called `proc_exit`.
    #[error("guest exited with code {code} in export '{export}'")]
    GuestExit { export: String, code: i32 },

    /// A host capability failed for a host-side reason.
    #[error(transparent)]
    HostError(HostError),

    /// The transform returned bytes that are not UTF-8.
    #[error("guest export '{export}' returned invalid UTF-8: {source}")]
    InvalidUtf8 {
        export: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Release of a pointer the host does not hold.
    #[error("pointer {ptr:#x} is not a live host-held allocation")]
    UnknownAllocation { ptr: u32 },

    /// Two host functions registered under the same import name.
    #[error("host function {module}::{name} registered twice")]
    DuplicateBinding { module: String, name: String },

    /// The session cannot accept another invocation.
    #[error("session is {state:?}, expected Ready")]
    NotReady { state: SessionState },
}

impl SandboxError {
    /// True for errors raised while bringing a guest up (before it is Ready).
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Compile(_) | Self::Load(_) | Self::Startup { .. } | Self::MissingExport { .. }
        )
    }
}

impl From<HostError> for SandboxError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Bounds(b) => Self::Bounds(b),
            other => Self::HostError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_bounds_maps_to_bounds() {
        let err: SandboxError = HostError::Bounds(BoundsError::new(1, 2, 3)).into();
        assert!(matches!(err, SandboxError::Bounds(b) if b == BoundsError::new(1, 2, 3)));
    }

    #[test]
    fn test_host_sink_maps_to_host_error() {
        let err: SandboxError = HostError::sink("closed").into();
        assert!(matches!(err, SandboxError::HostError(HostError::Sink(_))));
    }

    #[test]
    fn test_load_classification() {
        assert!(SandboxError::Load("x".into()).is_load_error());
        assert!(SandboxError::MissingExport { name: "malloc".into(), reason: "absent".into() }
            .is_load_error());
        assert!(!SandboxError::AllocationFailed { size: 4 }.is_load_error());
    }
}
