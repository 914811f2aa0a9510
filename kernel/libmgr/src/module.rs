//! Module loading and shared-code reference counting.
//!
//! Loading a module maps its code and read-only segments. Every library
//! counts its loaded non-shared modules; the library's shared-code
//! modules are mapped when that count goes from 0 to 1 and unmapped when it
//! returns to 0. Shared modules therefore never count themselves, and
//! [`ModuleLoader::unload_module`] on a shared module only unmaps it.
//! Callers must not unload a shared module directly: its residency belongs
//! to the library counter.

use libmgr_core::addr::VirtAddr;
use libmgr_core::{kdebug, kerr, kinfo};
use libmgr_driver_api::MemPerm;
use libmgr_manifest::{FirmwareDesc, ManifestError, ModuleEntry, SegmentDesc, SegmentKind};
use planck_noalloc::vec::ArrayVec;

use crate::config::{MAX_SHARED_MODULES, PAGE_SIZE};
use crate::error::{LoaderError, first_error};
use crate::id::{LibraryId, ModuleId};
use crate::registry::Registry;
use crate::segment::{MapGuard, SegmentMapper};

/// Returns the length of a segment in bytes.
pub(crate) fn segment_size(seg: &SegmentDesc) -> Result<usize, LoaderError> {
    (seg.length_pages() as usize)
        .checked_mul(PAGE_SIZE)
        .ok_or(LoaderError::InvalidArgument)
}

/// Returns the bytes of a segment inside its installed image.
fn segment_source<'i>(image: &'i [u8], seg: &SegmentDesc) -> Result<&'i [u8], LoaderError> {
    let start = seg.file_offset as usize;
    let end = start
        .checked_add(segment_size(seg)?)
        .ok_or(ManifestError::InvalidOffset)?;
    Ok(image.get(start..end).ok_or(ManifestError::InvalidOffset)?)
}

/// Module loader over a locked registry.
pub struct ModuleLoader<'a> {
    registry: &'a mut Registry,
    mapper: SegmentMapper<'a>,
}

impl<'a> ModuleLoader<'a> {
    /// Creates a loader mutating `registry` and mapping through `mapper`.
    pub fn new(registry: &'a mut Registry, mapper: SegmentMapper<'a>) -> Self {
        Self { registry, mapper }
    }

    /// Returns the registry the loader works on.
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Loads a module, mapping the library's shared code first if this is
    /// the library's first resident non-shared module.
    ///
    /// On failure nothing this call mapped stays mapped and the library
    /// counter is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if the library is not
    /// installed, a manifest error for a bad module index or segment range,
    /// or the mapper's error.
    pub fn load_module(&mut self, id: ModuleId) -> Result<(), LoaderError> {
        let lib = id.library();
        let (desc, entry) = self.registry.resolve(id)?;
        let (text, rodata) = self.map_segments(&desc, &entry)?;

        if !entry.is_lib_code() && self.registry.acquire(lib)? == 1 {
            if let Err(e) = self.load_shared(lib, &desc) {
                self.registry.release(lib);
                return Err(e);
            }
        }

        text.keep();
        rodata.keep();
        kdebug!("module {id} loaded");
        Ok(())
    }

    /// Unloads a module, unmapping the library's shared code if this was
    /// the library's last resident non-shared module.
    ///
    /// Every unmap is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if the library is not
    /// installed, a manifest error for a bad module index, or the first
    /// unmap failure.
    pub fn unload_module(&mut self, id: ModuleId) -> Result<(), LoaderError> {
        let lib = id.library();
        let (_, entry) = self.registry.resolve(id)?;
        let mut result = self.unmap_segments(&entry);

        if entry.is_lib_code() {
            return result;
        }

        if self.registry.load_count(lib) > 0 && self.registry.release(lib) == 0 {
            result = first_error(result, self.unload_shared(lib));
        }
        kdebug!("module {id} unloaded");
        result
    }

    fn map_segments(
        &self,
        desc: &FirmwareDesc<'static>,
        entry: &ModuleEntry,
    ) -> Result<(MapGuard<'a>, MapGuard<'a>), LoaderError> {
        let image = desc.image();
        let text = entry.segment(SegmentKind::Text);
        let rodata = entry.segment(SegmentKind::Rodata);

        let text_guard = self.mapper.load(
            text.v_base_addr,
            segment_source(image, text)?,
            MemPerm::RX,
        )?;
        let rodata_guard = self.mapper.load(
            rodata.v_base_addr,
            segment_source(image, rodata)?,
            MemPerm::READ,
        )?;
        Ok((text_guard, rodata_guard))
    }

    fn unmap_segments(&self, entry: &ModuleEntry) -> Result<(), LoaderError> {
        let mut result = Ok(());
        for kind in [SegmentKind::Text, SegmentKind::Rodata] {
            let seg = entry.segment(kind);
            let unmapped = segment_size(seg).and_then(|size| self.unload(seg.v_base_addr, size));
            result = first_error(result, unmapped);
        }
        result
    }

    fn unload(&self, vaddr: VirtAddr, size: usize) -> Result<(), LoaderError> {
        self.mapper.unload(vaddr, size)
    }

    /// Loads every shared-code module of `lib`, unloading the ones already
    /// loaded if one fails.
    fn load_shared(&mut self, lib: LibraryId, desc: &FirmwareDesc<'static>) -> Result<(), LoaderError> {
        let mut loaded: ArrayVec<ModuleId, MAX_SHARED_MODULES> = ArrayVec::new();
        let mut result = Ok(());

        for index in desc.lib_code_indices() {
            let shared = ModuleId::new(lib, index as u32);
            if let Err(e) = self.load_module(shared) {
                kerr!("shared module {shared} failed to load: {e}");
                result = Err(e);
                break;
            }
            if loaded.try_push(shared).is_err() {
                kerr!("library {lib} declares more than {MAX_SHARED_MODULES} shared modules");
                if let Err(e) = self.unload_module(shared) {
                    kerr!("rollback of shared module {shared} failed: {e}");
                }
                result = Err(LoaderError::InvalidArgument);
                break;
            }
        }

        if result.is_err() {
            for &shared in loaded.as_slice().iter().rev() {
                if let Err(e) = self.unload_module(shared) {
                    kerr!("rollback of shared module {shared} failed: {e}");
                }
            }
        } else {
            kinfo!("library {lib}: {} shared modules resident", loaded.len());
        }
        result
    }

    fn unload_shared(&mut self, lib: LibraryId) -> Result<(), LoaderError> {
        let desc = self.registry.descriptor(lib)?;
        let mut result = Ok(());
        for index in desc.lib_code_indices() {
            result = first_error(result, self.unload_module(ModuleId::new(lib, index as u32)));
        }
        result
    }
}
