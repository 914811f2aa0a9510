//! Counting buffer pools backed by the host allocator.

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;

use libmgr_driver_api::{DriverError, MemCaps, MemoryPools};

use crate::{Journal, lock};

#[derive(Default)]
struct State {
    live: HashMap<usize, MemCaps>,
    requests: Vec<(MemCaps, usize, usize)>,
    fail_next: usize,
    fail_size: Option<usize>,
}

/// Renders `caps` for the journal: flag names joined by `|`, or `-`.
fn caps_label(caps: MemCaps) -> String {
    let names: Vec<&str> = caps.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() { "-".into() } else { names.join("|") }
}

/// Fake of [`MemoryPools`].
///
/// Journals `pools.alloc <caps> <size>` and `pools.free <caps> <size>`.
/// Allocations are zeroed. Buffers that are never freed are leaked, so
/// storage handed out as `'static` stays valid for the whole test run.
#[derive(Default)]
pub struct FakePools {
    state: Mutex<State>,
    journal: Journal,
}

impl FakePools {
    /// Creates an empty pool set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty pool set recording into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    /// Refuses the next allocation.
    pub fn fail_next(&self) {
        lock(&self.state).fail_next += 1;
    }

    /// Refuses every allocation of exactly `size` bytes.
    pub fn fail_size(&self, size: usize) {
        lock(&self.state).fail_size = Some(size);
    }

    /// Returns the number of allocations not yet freed.
    pub fn live(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Returns every request as `(caps, size, align)`, refused ones
    /// included.
    pub fn requests(&self) -> Vec<(MemCaps, usize, usize)> {
        lock(&self.state).requests.clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<(MemCaps, usize, usize)> {
        lock(&self.state).requests.last().copied()
    }
}

impl MemoryPools for FakePools {
    fn alloc(&self, caps: MemCaps, size: usize, align: usize) -> Result<NonNull<u8>, DriverError> {
        let mut s = lock(&self.state);
        s.requests.push((caps, size, align));
        if s.fail_next > 0 {
            s.fail_next -= 1;
            return Err(DriverError::OutOfMemory);
        }
        if s.fail_size == Some(size) {
            return Err(DriverError::OutOfMemory);
        }
        let layout =
            Layout::from_size_align(size.max(1), align).map_err(|_| DriverError::InvalidArgument)?;
        // SAFETY: `layout` has a nonzero size.
        let ptr = NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
            .ok_or(DriverError::OutOfMemory)?;
        s.live.insert(ptr.as_ptr() as usize, caps);
        drop(s);
        self.journal
            .record(format!("pools.alloc {} {size}", caps_label(caps)));
        Ok(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        // SAFETY: Caller contract: `ptr` came from `alloc` with this size
        // and alignment, which built the same layout.
        unsafe {
            let layout = Layout::from_size_align_unchecked(size.max(1), align);
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
        let caps = lock(&self.state)
            .live
            .remove(&(ptr.as_ptr() as usize))
            .unwrap_or_else(|| panic!("free of unknown buffer {ptr:p}"));
        self.journal
            .record(format!("pools.free {} {size}", caps_label(caps)));
    }
}
