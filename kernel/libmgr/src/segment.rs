//! Segment mapping.
//!
//! Provides [`SegmentMapper`], which populates and releases regions of the
//! module address space, and [`MapGuard`], which owns one mapped region
//! until it is either kept or unmapped.
//!
//! # Cache contract
//!
//! Mapping a region writes its contents back from the data cache before
//! returning, and executable regions also get their instruction cache
//! lines invalidated, so callers never issue cache maintenance themselves.
//! Unmapping writes dirty lines back before the pages are released.

use libmgr_core::addr::VirtAddr;
use libmgr_core::{kdebug, kerr, ktrace};
use libmgr_driver_api::{MemPerm, MemoryDriver};

use crate::config::PAGE_SIZE;
use crate::error::LoaderError;

// ---------------------------------------------------------------------------
// MapGuard
// ---------------------------------------------------------------------------

/// A mapped region owned by one segment or instance.
///
/// Unmaps the region on drop unless [`.keep()`](Self::keep) or
/// [`.unmap()`](Self::unmap) is called first.
#[must_use = "region is unmapped on drop; call .keep() to retain it"]
pub struct MapGuard<'a> {
    mem: &'a dyn MemoryDriver,
    vaddr: VirtAddr,
    size: usize,
    armed: bool,
}

impl<'a> MapGuard<'a> {
    fn new(mem: &'a dyn MemoryDriver, vaddr: VirtAddr, size: usize) -> Self {
        Self {
            mem,
            vaddr,
            size,
            armed: size != 0,
        }
    }

    /// Returns the base of the owned region.
    pub fn vaddr(&self) -> VirtAddr {
        self.vaddr
    }

    /// Returns the size of the owned region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Keeps the region mapped past the guard's lifetime.
    pub fn keep(mut self) {
        self.armed = false;
    }

    /// Unmaps the region now.
    ///
    /// # Errors
    ///
    /// Returns the unmap failure.
    pub fn unmap(mut self) -> Result<(), LoaderError> {
        self.armed = false;
        unmap_region(self.mem, self.vaddr, self.size)
    }
}

impl Drop for MapGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = unmap_region(self.mem, self.vaddr, self.size) {
            kerr!("rollback unmap of {} ({} bytes) failed: {e}", self.vaddr, self.size);
        }
    }
}

fn unmap_region(mem: &dyn MemoryDriver, vaddr: VirtAddr, size: usize) -> Result<(), LoaderError> {
    if size == 0 {
        return Ok(());
    }
    mem.dcache_writeback(vaddr, size);
    mem.unmap_region(vaddr, size).map_err(LoaderError::from)
}

// ---------------------------------------------------------------------------
// SegmentMapper
// ---------------------------------------------------------------------------

/// Maps and populates regions of the module address space.
#[derive(Clone, Copy)]
pub struct SegmentMapper<'a> {
    mem: &'a dyn MemoryDriver,
}

impl<'a> SegmentMapper<'a> {
    /// Creates a mapper over `mem`.
    pub fn new(mem: &'a dyn MemoryDriver) -> Self {
        Self { mem }
    }

    /// Maps `src.len()` bytes at `vaddr` with `perm` and copies `src` in.
    ///
    /// `vaddr` and `src.len()` must be page multiples. An empty `src` maps
    /// nothing and returns an inert guard.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] for a misaligned range, or
    /// [`LoaderError::OutOfMemory`] if mapping or copying fails. A region
    /// mapped before the copy failed is released again.
    pub fn load(
        &self,
        vaddr: VirtAddr,
        src: &[u8],
        perm: MemPerm,
    ) -> Result<MapGuard<'a>, LoaderError> {
        let guard = self.map(vaddr, src.len(), perm)?;
        if src.is_empty() {
            return Ok(guard);
        }
        self.mem.write(vaddr, src).map_err(|_| LoaderError::OutOfMemory)?;
        self.sync(vaddr, src.len(), perm);
        kdebug!("mapped {} bytes at {vaddr} ({perm:?})", src.len());
        Ok(guard)
    }

    /// Maps `size` bytes at `vaddr` with `perm` and zero-fills them.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load).
    pub fn zeroed(
        &self,
        vaddr: VirtAddr,
        size: usize,
        perm: MemPerm,
    ) -> Result<MapGuard<'a>, LoaderError> {
        let guard = self.map(vaddr, size, perm)?;
        if size == 0 {
            return Ok(guard);
        }
        self.mem.fill(vaddr, 0, size).map_err(|_| LoaderError::OutOfMemory)?;
        self.sync(vaddr, size, perm);
        ktrace!("zero-mapped {size} bytes at {vaddr}");
        Ok(guard)
    }

    /// Unmaps `size` bytes at `vaddr`.
    ///
    /// # Errors
    ///
    /// Returns the memory driver's unmap failure.
    pub fn unload(&self, vaddr: VirtAddr, size: usize) -> Result<(), LoaderError> {
        unmap_region(self.mem, vaddr, size)
    }

    fn map(&self, vaddr: VirtAddr, size: usize, perm: MemPerm) -> Result<MapGuard<'a>, LoaderError> {
        if !vaddr.is_aligned(PAGE_SIZE as u32) || size % PAGE_SIZE != 0 {
            return Err(LoaderError::InvalidArgument);
        }
        if size != 0 {
            self.mem
                .map_region(vaddr, None, size, perm)
                .map_err(|e| {
                    kerr!("map of {size} bytes at {vaddr} failed: {e}");
                    LoaderError::OutOfMemory
                })?;
        }
        Ok(MapGuard::new(self.mem, vaddr, size))
    }

    fn sync(&self, vaddr: VirtAddr, size: usize, perm: MemPerm) {
        self.mem.dcache_writeback(vaddr, size);
        if perm.contains(MemPerm::EXEC) {
            self.mem.icache_invalidate(vaddr, size);
        }
    }
}
