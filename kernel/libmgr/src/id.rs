//! Type-safe identifiers for libraries, modules, and instances.
//!
//! A module id packs the owning library id above [`LIB_ID_SHIFT`] and the
//! module's index in that library's manifest below it. A component id, as
//! carried by instantiation requests, packs a module id in its low 16 bits
//! and an instance id in the bits above.

use core::fmt;

use crate::config::{LIB_ID_SHIFT, MAX_LIBRARIES, MODULE_INDEX_MASK};

/// Library identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct LibraryId(u32);

impl LibraryId {
    /// Creates a new `LibraryId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` (convenience for indexing).
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if this id names a loadable library slot.
    ///
    /// Id 0 is the base firmware and never loadable.
    pub const fn is_loadable(self) -> bool {
        self.0 != 0 && (self.0 as usize) < MAX_LIBRARIES
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Module identifier: library id and module index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Packs a library id and a module index.
    pub const fn new(lib: LibraryId, index: u32) -> Self {
        Self((lib.0 << LIB_ID_SHIFT) | (index & MODULE_INDEX_MASK))
    }

    /// Wraps a raw packed id.
    pub const fn from_raw(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the owning library.
    pub const fn library(self) -> LibraryId {
        LibraryId(self.0 >> LIB_ID_SHIFT)
    }

    /// Returns the index of the module in its library's manifest.
    pub const fn index(self) -> usize {
        (self.0 & MODULE_INDEX_MASK) as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} (lib {}, idx {})", self.0, self.library(), self.index())
    }
}

/// Instance identifier within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates a new `InstanceId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component identifier: module id in the low 16 bits, instance id in
/// bits 16..24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    const MODULE_MASK: u32 = 0xFFFF;
    const INSTANCE_SHIFT: u32 = 16;
    const INSTANCE_MASK: u32 = 0xFF;

    /// Packs a module id and an instance id.
    pub const fn new(module: ModuleId, instance: InstanceId) -> Self {
        Self(
            (module.0 & Self::MODULE_MASK)
                | ((instance.0 & Self::INSTANCE_MASK) << Self::INSTANCE_SHIFT),
        )
    }

    /// Wraps a raw packed id.
    pub const fn from_raw(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the module part.
    pub const fn module(self) -> ModuleId {
        ModuleId(self.0 & Self::MODULE_MASK)
    }

    /// Returns the instance part.
    pub const fn instance(self) -> InstanceId {
        InstanceId((self.0 >> Self::INSTANCE_SHIFT) & Self::INSTANCE_MASK)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
