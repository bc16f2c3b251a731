//! Bounds-checked access to guest linear memory.
//!
//! The free functions operate on a plain byte slice (the memory's current
//! contents) and are what every host-side access goes through. `GuestMemory`
//! wraps a Wasmtime `Memory` so callers can pass a store instead of slicing
//! memory themselves.
//!
//! Access never grows memory. A range that does not fit in the current size
//! fails as a whole with `BoundsError`; there are no partial reads.

use wasmtime::{AsContext, AsContextMut, Memory};

use guestfetch_hostapi::BoundsError;

/// Check that `[offset, offset+len)` lies within a memory of `mem_size` bytes.
///
/// Returns the range as `usize` indices on success.
pub fn check_range(mem_size: usize, offset: u32, len: u64) -> Result<(usize, usize), BoundsError> {
    let oob = || BoundsError::new(offset as u64, len, mem_size as u64);
    let end = (offset as u64).checked_add(len).ok_or_else(oob)?;
    if end > mem_size as u64 {
        return Err(oob());
    }
    Ok((offset as usize, end as usize))
}

/// Read `len` bytes from `mem` at `offset`.
pub fn read_bytes(mem: &[u8], offset: u32, len: u32) -> Result<Vec<u8>, BoundsError> {
    let (start, end) = check_range(mem.len(), offset, len as u64)?;
    Ok(mem[start..end].to_vec())
}

/// Write `data` into `mem` at `offset`.
pub fn write_bytes(mem: &mut [u8], offset: u32, data: &[u8]) -> Result<(), BoundsError> {
    let (start, end) = check_range(mem.len(), offset, data.len() as u64)?;
    mem[start..end].copy_from_slice(data);
    Ok(())
}

/// The guest's exported linear memory.
#[derive(Debug, Clone, Copy)]
pub struct GuestMemory {
    memory: Memory,
}

impl GuestMemory {
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// Current size in bytes.
    pub fn size<S: AsContext>(&self, store: &S) -> usize {
        self.memory.data_size(store)
    }

    pub fn read<S: AsContext>(&self, store: &S, offset: u32, len: u32) -> Result<Vec<u8>, BoundsError> {
        read_bytes(self.memory.data(store), offset, len)
    }

    pub fn write<S: AsContextMut>(
        &self,
        store: &mut S,
        offset: u32,
        data: &[u8],
    ) -> Result<(), BoundsError> {
        write_bytes(self.memory.data_mut(store), offset, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_basic() {
        let mem = vec![10, 20, 30, 40, 50];
        let result = read_bytes(&mem, 1, 3).unwrap();
        assert_eq!(result, vec![20, 30, 40]);
    }

    #[test]
    fn test_read_bytes_out_of_bounds() {
        let mem = vec![10, 20, 30];
        let err = read_bytes(&mem, 1, 3).unwrap_err();
        assert_eq!(err, BoundsError::new(1, 3, 3));
        assert!(read_bytes(&mem, 4, 0).is_err());
        assert!(read_bytes(&mem, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_read_empty_range_at_end() {
        let mem = vec![1, 2, 3];
        assert_eq!(read_bytes(&mem, 3, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_write_bytes_basic() {
        let mut mem = vec![0; 8];
        write_bytes(&mut mem, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mem, vec![0, 0, 0xAA, 0xBB, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_bytes_out_of_bounds_leaves_memory_untouched() {
        let mut mem = vec![0; 4];
        assert!(write_bytes(&mut mem, 2, &[1, 2, 3]).is_err());
        assert_eq!(mem, vec![0; 4]);
    }

    #[test]
    fn test_check_range() {
        assert_eq!(check_range(100, 0, 100).unwrap(), (0, 100));
        assert!(check_range(100, 0, 101).is_err());
        assert!(check_range(100, 101, 0).is_err());
        assert!(check_range(0, 0, 0).is_ok());
    }

    #[test]
    fn test_check_range_no_overflow() {
        let err = check_range(usize::MAX, u32::MAX, u64::MAX).unwrap_err();
        assert_eq!(err.offset, u32::MAX as u64);
        assert_eq!(err.len, u64::MAX);
    }
}
