//! Virtual-memory mapping and cache maintenance contract.
//!
//! Library segments live at fixed virtual addresses chosen by the image
//! packager. The firmware's memory driver backs those addresses with
//! physical pages on demand. Mapped memory is only reached through this
//! trait, so the same loader code runs against real page tables on the
//! target and a simulated address space on the host.

use core::ptr::NonNull;

use libmgr_core::addr::VirtAddr;

use crate::error::DriverError;

bitflags::bitflags! {
    /// Access permissions of a mapped region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemPerm: u32 {
        /// Region is readable.
        const READ  = 1 << 0;
        /// Region is writable.
        const WRITE = 1 << 1;
        /// Region is executable.
        const EXEC  = 1 << 2;
    }
}

impl MemPerm {
    /// Read-write data.
    pub const RW: Self = Self::READ.union(Self::WRITE);
    /// Read-execute code.
    pub const RX: Self = Self::READ.union(Self::EXEC);
}

/// Page mapping and cache maintenance over the module address space.
///
/// All ranges passed to `map_region` and `unmap_region` must be
/// page-aligned. `write` and `fill` are privileged copies into memory
/// that is currently mapped; they ignore the region's permissions.
pub trait MemoryDriver: Send + Sync {
    /// Maps `size` bytes at `vaddr` with `perm`.
    ///
    /// `phys_hint` requests specific backing pages; `None` lets the driver
    /// choose.
    fn map_region(
        &self,
        vaddr: VirtAddr,
        phys_hint: Option<usize>,
        size: usize,
        perm: MemPerm,
    ) -> Result<(), DriverError>;

    /// Unmaps `size` bytes at `vaddr` and releases the backing pages.
    fn unmap_region(&self, vaddr: VirtAddr, size: usize) -> Result<(), DriverError>;

    /// Copies `data` into mapped memory starting at `vaddr`.
    fn write(&self, vaddr: VirtAddr, data: &[u8]) -> Result<(), DriverError>;

    /// Sets `size` bytes of mapped memory at `vaddr` to `byte`.
    fn fill(&self, vaddr: VirtAddr, byte: u8, size: usize) -> Result<(), DriverError>;

    /// Writes dirty data cache lines covering the range back to memory.
    fn dcache_writeback(&self, vaddr: VirtAddr, size: usize);

    /// Invalidates instruction cache lines covering the range.
    fn icache_invalidate(&self, vaddr: VirtAddr, size: usize);

    /// Invalidates data cache lines covering a DMA buffer so that the next
    /// read observes what the device wrote.
    fn dcache_invalidate_buffer(&self, buf: NonNull<u8>, len: usize);
}
