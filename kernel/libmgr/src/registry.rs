//! Library registry.
//!
//! Maps library ids to installed images and tracks, per library, how many
//! non-shared modules are currently loaded and, per module, how many of its
//! instances are allocated. Image storage is permanent:
//! installing over a slot replaces the reference without releasing the
//! previous image.

use libmgr_manifest::{FirmwareDesc, MAX_MODULE_ENTRIES, ModuleEntry};

use crate::config::MAX_LIBRARIES;
use crate::error::LoaderError;
use crate::id::{LibraryId, ModuleId};

#[derive(Debug, Clone, Copy)]
struct LibrarySlot {
    image: Option<&'static [u8]>,
    load_count: u32,
    instances: [u16; MAX_MODULE_ENTRIES],
}

impl LibrarySlot {
    const EMPTY: Self = Self {
        image: None,
        load_count: 0,
        instances: [0; MAX_MODULE_ENTRIES],
    };
}

/// Library registry.
#[derive(Debug)]
pub struct Registry {
    slots: [LibrarySlot; MAX_LIBRARIES],
}

impl Registry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            slots: [LibrarySlot::EMPTY; MAX_LIBRARIES],
        }
    }

    fn slot(&self, lib: LibraryId) -> Option<&LibrarySlot> {
        self.slots.get(lib.as_usize())
    }

    fn slot_mut(&mut self, lib: LibraryId) -> Option<&mut LibrarySlot> {
        self.slots.get_mut(lib.as_usize())
    }

    /// Returns the installed image of `lib`, if any.
    pub fn get(&self, lib: LibraryId) -> Option<&'static [u8]> {
        self.slot(lib).and_then(|s| s.image)
    }

    /// Installs `image` under `lib`, replacing any previous image.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if `lib` is out of range.
    pub fn install(&mut self, lib: LibraryId, image: &'static [u8]) -> Result<(), LoaderError> {
        let slot = self.slot_mut(lib).ok_or(LoaderError::InvalidArgument)?;
        slot.image = Some(image);
        Ok(())
    }

    /// Returns the parsed descriptor of an installed library.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if nothing is installed
    /// under `lib`, or the descriptor's parse error.
    pub fn descriptor(&self, lib: LibraryId) -> Result<FirmwareDesc<'static>, LoaderError> {
        let image = self.get(lib).ok_or(LoaderError::InvalidArgument)?;
        Ok(FirmwareDesc::parse(image)?)
    }

    /// Resolves a module id to its library descriptor and module entry.
    ///
    /// # Errors
    ///
    /// Fails as [`descriptor`](Self::descriptor) does, or with the entry's
    /// lookup error.
    pub fn resolve(
        &self,
        id: ModuleId,
    ) -> Result<(FirmwareDesc<'static>, ModuleEntry), LoaderError> {
        let desc = self.descriptor(id.library())?;
        let entry = desc.module(id.index())?;
        Ok((desc, entry))
    }

    /// Returns the number of loaded non-shared modules of `lib`.
    pub fn load_count(&self, lib: LibraryId) -> u32 {
        self.slot(lib).map_or(0, |s| s.load_count)
    }

    /// Increments the load counter of `lib` and returns the new value.
    pub(crate) fn acquire(&mut self, lib: LibraryId) -> Result<u32, LoaderError> {
        let slot = self.slot_mut(lib).ok_or(LoaderError::InvalidArgument)?;
        slot.load_count += 1;
        Ok(slot.load_count)
    }

    /// Decrements the load counter of `lib`, saturating at zero, and
    /// returns the new value.
    pub(crate) fn release(&mut self, lib: LibraryId) -> u32 {
        match self.slot_mut(lib) {
            Some(slot) => {
                slot.load_count = slot.load_count.saturating_sub(1);
                slot.load_count
            }
            None => 0,
        }
    }

    /// Returns the number of allocated instances of module `id`.
    pub fn instance_count(&self, id: ModuleId) -> u32 {
        self.slot(id.library())
            .and_then(|s| s.instances.get(id.index()))
            .map_or(0, |&n| u32::from(n))
    }

    /// Records one more allocated instance of `id` and returns the new count.
    pub(crate) fn attach_instance(&mut self, id: ModuleId) -> Result<u32, LoaderError> {
        let count = self
            .slot_mut(id.library())
            .and_then(|s| s.instances.get_mut(id.index()))
            .ok_or(LoaderError::InvalidArgument)?;
        *count = count.checked_add(1).ok_or(LoaderError::InvalidArgument)?;
        Ok(u32::from(*count))
    }

    /// Drops one allocated instance of `id`, saturating at zero, and
    /// returns the new count.
    pub(crate) fn detach_instance(&mut self, id: ModuleId) -> u32 {
        match self
            .slot_mut(id.library())
            .and_then(|s| s.instances.get_mut(id.index()))
        {
            Some(count) => {
                *count = count.saturating_sub(1);
                u32::from(*count)
            }
            None => 0,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
