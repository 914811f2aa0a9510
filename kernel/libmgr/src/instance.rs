//! Per-instance working memory.
//!
//! A module's working-memory (bss) segment is split into
//! `instance_max_count` equal slices, one per instance id. Allocating an
//! instance maps its slice read-write and zero-fills it; freeing unmaps it.

use libmgr_core::addr::VirtAddr;
use libmgr_core::{kdebug, kerr};
use libmgr_driver_api::MemPerm;
use libmgr_manifest::{ModuleEntry, SegmentKind};

use crate::config::PAGE_SIZE;
use crate::error::LoaderError;
use crate::id::InstanceId;
use crate::segment::SegmentMapper;

/// The working-memory slice of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceSlice {
    /// Base address of the slice.
    pub vaddr: VirtAddr,
    /// Slice size in bytes.
    pub size: usize,
}

impl InstanceSlice {
    /// Computes the slice of `instance` in `entry`'s working memory.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if the module allows no
    /// instances, its working memory does not split evenly into whole
    /// pages per instance, or `instance` is not below the instance limit.
    pub fn of(entry: &ModuleEntry, instance: InstanceId) -> Result<Self, LoaderError> {
        let max = u32::from(entry.instance_max_count);
        let bss = entry.segment(SegmentKind::Bss);
        let pages = bss.length_pages();

        if max == 0 || pages % max != 0 || instance.as_u32() >= max {
            kerr!(
                "instance {instance} invalid for module with {pages} bss pages and {max} instances"
            );
            return Err(LoaderError::InvalidArgument);
        }

        let size = (pages / max) as usize * PAGE_SIZE;
        let vaddr = bss
            .v_base_addr
            .checked_add(instance.as_u32() as usize * size)
            .ok_or(LoaderError::InvalidArgument)?;
        Ok(Self { vaddr, size })
    }
}

/// Returns the working-memory base address of `instance`.
///
/// # Errors
///
/// As [`InstanceSlice::of`].
pub fn instance_address(entry: &ModuleEntry, instance: InstanceId) -> Result<VirtAddr, LoaderError> {
    InstanceSlice::of(entry, instance).map(|s| s.vaddr)
}

/// Maps and clears instance working memory.
#[derive(Clone, Copy)]
pub struct InstanceAllocator<'a> {
    mapper: SegmentMapper<'a>,
}

impl<'a> InstanceAllocator<'a> {
    /// Creates an allocator mapping through `mapper`.
    pub fn new(mapper: SegmentMapper<'a>) -> Self {
        Self { mapper }
    }

    /// Maps the working memory of `instance`, zero-filled, and returns the
    /// module's entry point.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::OutOfMemory`] without mapping anything if
    /// `requested_pages` exceeds the slice, otherwise as
    /// [`InstanceSlice::of`] or the mapper's error.
    pub fn allocate(
        &self,
        entry: &ModuleEntry,
        instance: InstanceId,
        requested_pages: u32,
    ) -> Result<u32, LoaderError> {
        let slice = InstanceSlice::of(entry, instance)?;
        let requested = (requested_pages as usize).saturating_mul(PAGE_SIZE);
        if requested > slice.size {
            kerr!(
                "instance {instance}: requested {requested} bytes, slice holds {}",
                slice.size
            );
            return Err(LoaderError::OutOfMemory);
        }

        self.mapper.zeroed(slice.vaddr, slice.size, MemPerm::RW)?.keep();
        kdebug!("instance {instance} at {} ({} bytes)", slice.vaddr, slice.size);
        Ok(entry.entry_point)
    }

    /// Unmaps the working memory of `instance`.
    ///
    /// # Errors
    ///
    /// As [`InstanceSlice::of`], or the unmap failure.
    pub fn free(&self, entry: &ModuleEntry, instance: InstanceId) -> Result<(), LoaderError> {
        let slice = InstanceSlice::of(entry, instance)?;
        self.mapper.unload(slice.vaddr, slice.size)
    }
}
