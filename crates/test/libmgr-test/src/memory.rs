//! Simulated module address space.

use std::collections::{BTreeMap, BTreeSet};
use std::ptr::NonNull;
use std::sync::Mutex;

use libmgr_core::addr::VirtAddr;
use libmgr_driver_api::{DriverError, MemPerm, MemoryDriver};

use crate::{Journal, lock};

const PAGE: u32 = 4096;

/// Byte pattern of a page that has never been mapped before.
const FRESH: u8 = 0xAA;

struct Page {
    perm: MemPerm,
    data: Vec<u8>,
}

#[derive(Default)]
struct State {
    pages: BTreeMap<u32, Page>,
    /// Contents of released pages, handed back when the page is remapped.
    stale: BTreeMap<u32, Vec<u8>>,
    map_calls: usize,
    unmap_calls: usize,
    writebacks: usize,
    icache: usize,
    buffer_invalidations: usize,
    fail_map: BTreeSet<u32>,
    fail_write: BTreeSet<u32>,
    fail_unmap: BTreeSet<u32>,
}

fn hits(set: &BTreeSet<u32>, vaddr: u32, size: usize) -> bool {
    let end = u64::from(vaddr) + size as u64;
    set.iter().any(|&a| u64::from(a) >= u64::from(vaddr) && u64::from(a) < end)
}

fn pages(vaddr: u32, size: usize) -> impl Iterator<Item = u32> {
    (0..size.div_ceil(PAGE as usize) as u32).map(move |i| vaddr + i * PAGE)
}

/// Page-granular fake of [`MemoryDriver`].
///
/// Released pages keep their contents and get them back when remapped,
/// like physical pages recycled by a real allocator. Pages never mapped
/// before read as `0xAA`.
#[derive(Default)]
pub struct FakeMemory {
    state: Mutex<State>,
    journal: Journal,
}

impl FakeMemory {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty address space recording into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    /// Makes any map covering `vaddr` fail.
    pub fn fail_map_at(&self, vaddr: VirtAddr) {
        lock(&self.state).fail_map.insert(vaddr.as_u32());
    }

    /// Makes any write or fill covering `vaddr` fail.
    pub fn fail_write_at(&self, vaddr: VirtAddr) {
        lock(&self.state).fail_write.insert(vaddr.as_u32());
    }

    /// Makes any unmap covering `vaddr` fail.
    pub fn fail_unmap_at(&self, vaddr: VirtAddr) {
        lock(&self.state).fail_unmap.insert(vaddr.as_u32());
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        let mut s = lock(&self.state);
        s.fail_map.clear();
        s.fail_write.clear();
        s.fail_unmap.clear();
    }

    /// Returns `true` if the page containing `vaddr` is mapped.
    pub fn is_mapped(&self, vaddr: VirtAddr) -> bool {
        lock(&self.state).pages.contains_key(&(vaddr.as_u32() & !(PAGE - 1)))
    }

    /// Returns the permissions of the page containing `vaddr`.
    pub fn perm(&self, vaddr: VirtAddr) -> Option<MemPerm> {
        lock(&self.state)
            .pages
            .get(&(vaddr.as_u32() & !(PAGE - 1)))
            .map(|p| p.perm)
    }

    /// Reads mapped memory.
    ///
    /// # Panics
    ///
    /// Panics if any byte is unmapped.
    pub fn read(&self, vaddr: VirtAddr, len: usize) -> Vec<u8> {
        let s = lock(&self.state);
        (0..len as u32)
            .map(|i| {
                let a = vaddr.as_u32() + i;
                let page = s
                    .pages
                    .get(&(a & !(PAGE - 1)))
                    .unwrap_or_else(|| panic!("read of unmapped address {a:#x}"));
                page.data[(a & (PAGE - 1)) as usize]
            })
            .collect()
    }

    /// Writes mapped memory directly, as a running module would.
    ///
    /// # Panics
    ///
    /// Panics if any byte is unmapped.
    pub fn write_raw(&self, vaddr: VirtAddr, data: &[u8]) {
        assert!(self.store(vaddr.as_u32(), data).is_ok(), "write of unmapped memory");
    }

    /// Returns the number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        lock(&self.state).pages.len()
    }

    /// Returns the number of successful and failed `map_region` calls.
    pub fn map_calls(&self) -> usize {
        lock(&self.state).map_calls
    }

    /// Returns the number of `unmap_region` calls.
    pub fn unmap_calls(&self) -> usize {
        lock(&self.state).unmap_calls
    }

    /// Returns the number of data cache writebacks.
    pub fn writebacks(&self) -> usize {
        lock(&self.state).writebacks
    }

    /// Returns the number of instruction cache invalidations.
    pub fn icache_invalidations(&self) -> usize {
        lock(&self.state).icache
    }

    /// Returns the number of DMA buffer invalidations.
    pub fn buffer_invalidations(&self) -> usize {
        lock(&self.state).buffer_invalidations
    }

    fn store(&self, vaddr: u32, data: &[u8]) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        for (i, &b) in data.iter().enumerate() {
            let a = vaddr + i as u32;
            let page = s
                .pages
                .get_mut(&(a & !(PAGE - 1)))
                .ok_or(DriverError::InvalidArgument)?;
            page.data[(a & (PAGE - 1)) as usize] = b;
        }
        Ok(())
    }
}

impl MemoryDriver for FakeMemory {
    fn map_region(
        &self,
        vaddr: VirtAddr,
        _phys_hint: Option<usize>,
        size: usize,
        perm: MemPerm,
    ) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        s.map_calls += 1;
        let base = vaddr.as_u32();
        if base % PAGE != 0 || size % PAGE as usize != 0 || size == 0 {
            return Err(DriverError::InvalidArgument);
        }
        if hits(&s.fail_map, base, size) {
            return Err(DriverError::OutOfMemory);
        }
        if pages(base, size).any(|p| s.pages.contains_key(&p)) {
            return Err(DriverError::Busy);
        }
        for p in pages(base, size) {
            let data = s.stale.remove(&p).unwrap_or_else(|| vec![FRESH; PAGE as usize]);
            s.pages.insert(p, Page { perm, data });
        }
        drop(s);
        self.journal.record(format!("mem.map {base:#x} {size}"));
        Ok(())
    }

    fn unmap_region(&self, vaddr: VirtAddr, size: usize) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        s.unmap_calls += 1;
        let base = vaddr.as_u32();
        if hits(&s.fail_unmap, base, size) {
            return Err(DriverError::IoError);
        }
        if !pages(base, size).all(|p| s.pages.contains_key(&p)) {
            return Err(DriverError::InvalidArgument);
        }
        for p in pages(base, size) {
            if let Some(page) = s.pages.remove(&p) {
                s.stale.insert(p, page.data);
            }
        }
        drop(s);
        self.journal.record(format!("mem.unmap {base:#x} {size}"));
        Ok(())
    }

    fn write(&self, vaddr: VirtAddr, data: &[u8]) -> Result<(), DriverError> {
        if hits(&lock(&self.state).fail_write, vaddr.as_u32(), data.len()) {
            return Err(DriverError::IoError);
        }
        self.store(vaddr.as_u32(), data)
    }

    fn fill(&self, vaddr: VirtAddr, byte: u8, size: usize) -> Result<(), DriverError> {
        if hits(&lock(&self.state).fail_write, vaddr.as_u32(), size) {
            return Err(DriverError::IoError);
        }
        self.store(vaddr.as_u32(), &vec![byte; size])
    }

    fn dcache_writeback(&self, _vaddr: VirtAddr, _size: usize) {
        lock(&self.state).writebacks += 1;
    }

    fn icache_invalidate(&self, _vaddr: VirtAddr, _size: usize) {
        lock(&self.state).icache += 1;
    }

    fn dcache_invalidate_buffer(&self, _buf: NonNull<u8>, _len: usize) {
        lock(&self.state).buffer_invalidations += 1;
    }
}
