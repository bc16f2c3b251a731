//! Wire types shared by the host and the guest.
//!
//! These describe the calling convention between the bridge and the guest
//! module: where the guest's allocator lives, how buffers are returned, and
//! which import namespace host functions are published under.

/// Import module the guest uses for host functions.
pub const HOST_MODULE: &str = "env";

/// Import name of the logging host function.
pub const HOST_LOG: &str = "log";

/// Import module of the WASI preview1 compatibility layer.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// A `(pointer, size)` pair handed out by the guest allocator.
///
/// A zero `ptr` means "no allocation" and must never be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationHandle {
    pub ptr: u32,
    pub size: u32,
}

impl AllocationHandle {
    pub const fn new(ptr: u32, size: u32) -> Self {
        Self { ptr, size }
    }

    pub const fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// A guest return value encoding a buffer as one `u64`.
///
/// ```text
/// bits 63..32  pointer into guest linear memory
/// bits 31..0   length in bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedResult(u64);

impl PackedResult {
    pub const fn new(ptr: u32, len: u32) -> Self {
        Self(((ptr as u64) << 32) | len as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn ptr(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn len(&self) -> u32 {
        self.0 as u32
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn handle(&self) -> AllocationHandle {
        AllocationHandle::new(self.ptr(), self.len())
    }
}

impl From<u64> for PackedResult {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Names of the guest exports the bridge depends on.
///
/// Defaults match the shipped URL-building guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAbi {
    /// `(size: i32) -> ptr: i32`
    pub allocate: String,
    /// `(ptr: i32)`
    pub release: String,
    /// `(ptr: i32, len: i32)`, called for its side effect only.
    pub side_effect: String,
    /// `(ptr: i32, len: i32) -> packed: i64`
    pub transform: String,
    /// Run once right after instantiation, if exported.
    pub startup: String,
    /// Exported linear memory.
    pub memory: String,
}

impl Default for GuestAbi {
    fn default() -> Self {
        Self {
            allocate: "malloc".into(),
            release: "free".into(),
            side_effect: "message".into(),
            transform: "formatting".into(),
            startup: "_initialize".into(),
            memory: "memory".into(),
        }
    }
}
