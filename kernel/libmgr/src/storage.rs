//! Buffers for library installation.
//!
//! [`TempBuffer`] owns a pool allocation for the duration of one install
//! and frees it on drop. Image storage from [`alloc_image_storage`] is a
//! `TempBuffer` too, until the installed image is committed and the buffer
//! is leaked.

use core::ptr::NonNull;

use libmgr_core::{kdebug, kerr};
use libmgr_driver_api::{MemCaps, MemoryPools};

use crate::config::{PAGE_SIZE, StorageTier};
use crate::error::LoaderError;

/// A pool allocation freed on drop.
pub struct TempBuffer<'a> {
    pools: &'a dyn MemoryPools,
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
}

impl<'a> TempBuffer<'a> {
    /// Allocates `size` bytes aligned to `align` with `caps`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::OutOfMemory`] if the pool refuses.
    pub fn alloc(
        pools: &'a dyn MemoryPools,
        caps: MemCaps,
        size: usize,
        align: usize,
    ) -> Result<Self, LoaderError> {
        let ptr = pools.alloc(caps, size, align).map_err(|e| {
            kerr!("{size}-byte buffer ({caps:?}) allocation failed: {e}");
            LoaderError::OutOfMemory
        })?;
        Ok(Self {
            pools,
            ptr,
            size,
            align,
        })
    }

    /// Returns the buffer start.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the buffer size.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the buffer contents.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: The pool returned `size` bytes at `ptr`, exclusively ours
        // until drop.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

impl TempBuffer<'_> {
    /// Gives up ownership: the allocation is never freed.
    pub fn leak(self) -> &'static mut [u8] {
        let this = core::mem::ManuallyDrop::new(self);
        // SAFETY: The pool returned `size` bytes at `ptr`, and with the
        // guard forgotten nothing frees them, so they live for `'static`.
        unsafe { core::slice::from_raw_parts_mut(this.ptr.as_ptr(), this.size) }
    }
}

impl Drop for TempBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: `ptr`, `size` and `align` come from the matching `alloc`,
        // and no borrow of the buffer outlives `self`.
        unsafe { self.pools.free(self.ptr, self.size, self.align) };
    }
}

/// Allocates page-aligned storage for an installed image.
///
/// The buffer is freed on drop like any other; [`TempBuffer::leak`] makes
/// it permanent once the image is committed.
///
/// # Errors
///
/// Returns [`LoaderError::OutOfMemory`] if the pool refuses.
pub fn alloc_image_storage(
    pools: &dyn MemoryPools,
    tier: StorageTier,
    size: usize,
) -> Result<TempBuffer<'_>, LoaderError> {
    let caps = match tier {
        StorageTier::L3 => MemCaps::L3 | MemCaps::RESIDENT,
        StorageTier::DmaCapable => MemCaps::DMA | MemCaps::RESIDENT,
    };
    let buf = TempBuffer::alloc(pools, caps, size, PAGE_SIZE)?;
    kdebug!("image storage at {:p}, {size} bytes ({tier:?})", buf.ptr.as_ptr());
    Ok(buf)
}
