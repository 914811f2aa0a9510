//! Capability-tagged buffer allocation contract.

use core::ptr::NonNull;

use crate::error::DriverError;

bitflags::bitflags! {
    /// Memory capabilities a buffer must have.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemCaps: u32 {
        /// Reachable by DMA engines.
        const DMA      = 1 << 0;
        /// Large, slower memory tier.
        const L3       = 1 << 1;
        /// Served from the long-lived pool that is never compacted.
        const RESIDENT = 1 << 2;
    }
}

/// Buffer pools.
pub trait MemoryPools: Send + Sync {
    /// Allocates `size` bytes aligned to `align` with at least `caps`.
    fn alloc(&self, caps: MemCaps, size: usize, align: usize) -> Result<NonNull<u8>, DriverError>;

    /// Frees a buffer.
    ///
    /// # Safety
    ///
    /// `ptr`, `size` and `align` must match a previous [`alloc`](Self::alloc)
    /// and nothing may reference the buffer afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, size: usize, align: usize);
}
