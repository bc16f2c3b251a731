//! Allocate / write / read / free protocol on top of the guest's allocator.
//!
//! The host never picks addresses in guest memory itself. Every buffer it
//! writes comes from the guest's exported allocator, and every buffer the
//! guest hands back is adopted into a live ledger. A pointer leaves the ledger
//! exactly once, when it is passed to the guest's deallocator, so a pointer is
//! never freed twice and null is never freed at all.

use wasmtime::{Store, TypedFunc};

use guestfetch_hostapi::{AllocationHandle, GuestAbi, PackedResult};

use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::memory::GuestMemory;
use crate::runtime::handle_trap;

/// Marshals byte buffers across the guest memory boundary.
pub struct Marshaler {
    memory: GuestMemory,
    /// Guest allocator: `(size: i32) -> ptr: i32`.
    allocate: TypedFunc<u32, u32>,
    /// Guest deallocator: `(ptr: i32)`.
    release: TypedFunc<u32, ()>,
    allocate_name: String,
    release_name: String,
    /// Pointers the host owns and still has to release, oldest first.
    live: Vec<AllocationHandle>,
}

impl Marshaler {
    pub fn new(
        memory: GuestMemory,
        allocate: TypedFunc<u32, u32>,
        release: TypedFunc<u32, ()>,
        abi: &GuestAbi,
    ) -> Self {
        Self {
            memory,
            allocate,
            release,
            allocate_name: abi.allocate.clone(),
            release_name: abi.release.clone(),
            live: Vec::new(),
        }
    }

    pub fn memory(&self) -> GuestMemory {
        self.memory
    }

    /// Allocations the host still has to release.
    pub fn outstanding(&self) -> &[AllocationHandle] {
        &self.live
    }

    /// Ask the guest for `size` bytes.
    ///
    /// A null pointer is an allocation failure unless `size` is zero, in which
    /// case it means "nothing allocated" and is not tracked.
    pub fn allocate(
        &mut self,
        store: &mut Store<HostState>,
        size: u32,
    ) -> Result<AllocationHandle, SandboxError> {
        let result = self.allocate.call(&mut *store, size);
        let ptr = handle_trap(store, &self.allocate_name, result)?;
        if ptr == 0 {
            if size > 0 {
                return Err(SandboxError::AllocationFailed { size });
            }
            return Ok(AllocationHandle::new(0, 0));
        }
        let handle = AllocationHandle::new(ptr, size);
        tracing::trace!(ptr, size, "guest allocation");
        self.live.push(handle);
        Ok(handle)
    }

    /// Allocate a guest buffer and copy `bytes` into it.
    ///
    /// The returned handle is tracked and released by [`release`](Self::release)
    /// or [`release_all`](Self::release_all).
    pub fn marshal_in(
        &mut self,
        store: &mut Store<HostState>,
        bytes: &[u8],
    ) -> Result<AllocationHandle, SandboxError> {
        let size = u32::try_from(bytes.len())
            .map_err(|_| SandboxError::PayloadTooLarge { len: bytes.len() })?;
        let handle = self.allocate(store, size)?;
        if !handle.is_null() {
            self.memory.write(store, handle.ptr, bytes)?;
        }
        Ok(handle)
    }

    /// Decode a packed result and copy the buffer it points at.
    ///
    /// A non-null result pointer inside linear memory is owned by the host
    /// from here on. A result that points outside memory was never a guest
    /// allocation and is not adopted. A result that reuses a pointer already
    /// in the ledger (an in-place transform) stays a single entry.
    pub fn marshal_out(
        &mut self,
        store: &mut Store<HostState>,
        packed: PackedResult,
    ) -> Result<Vec<u8>, SandboxError> {
        let handle = packed.handle();
        let bytes = self.memory.read(&*store, handle.ptr, handle.size)?;
        if !handle.is_null() && !self.live.iter().any(|h| h.ptr == handle.ptr) {
            tracing::trace!(ptr = handle.ptr, size = handle.size, "adopted guest result");
            self.live.push(handle);
        }
        Ok(bytes)
    }

    /// Free one host-owned pointer. Null is a no-op.
    pub fn release(&mut self, store: &mut Store<HostState>, ptr: u32) -> Result<(), SandboxError> {
        if ptr == 0 {
            return Ok(());
        }
        let idx = self
            .live
            .iter()
            .rposition(|h| h.ptr == ptr)
            .ok_or(SandboxError::UnknownAllocation { ptr })?;
        self.live.remove(idx);
        self.free(store, ptr)
    }

    /// Free every outstanding pointer, newest first.
    ///
    /// Keeps going after a failed free and returns the first error.
    pub fn release_all(&mut self, store: &mut Store<HostState>) -> Result<(), SandboxError> {
        let mut first_err = None;
        while let Some(handle) = self.live.pop() {
            if let Err(e) = self.free(store, handle.ptr) {
                tracing::warn!(ptr = handle.ptr, error = %e, "failed to release guest allocation");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn free(&self, store: &mut Store<HostState>, ptr: u32) -> Result<(), SandboxError> {
        tracing::trace!(ptr, "guest release");
        let result = self.release.call(&mut *store, ptr);
        handle_trap(store, &self.release_name, result)
    }
}
