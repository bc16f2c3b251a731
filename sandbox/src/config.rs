//! Sandbox configuration.

use guestfetch_hostapi::GuestAbi;

/// Wasm page size in bytes.
pub const PAGE_SIZE: u64 = 65_536;

/// Configuration for the guest sandbox.
///
/// Controls memory limits, instruction fuel, and the export names the bridge
/// expects from the guest.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel per session (instruction metering).
    /// Prevents infinite loops in guest code.
    pub fuel_limit: u64,

    /// Guest export names.
    pub abi: GuestAbi,

    /// Pass the guest's WASI stderr through to the host process.
    pub inherit_stderr: bool,
}

impl SandboxConfig {
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_pages as u64 * PAGE_SIZE
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            fuel_limit: 100_000_000,
            abi: GuestAbi::default(),
            inherit_stderr: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.max_memory_pages, 256);
        assert_eq!(config.max_memory_bytes(), 16 * 1024 * 1024);
        assert_eq!(config.fuel_limit, 100_000_000);
        assert_eq!(config.abi, GuestAbi::default());
        assert!(config.inherit_stderr);
    }
}
