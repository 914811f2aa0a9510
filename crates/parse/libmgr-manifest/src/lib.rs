//! Loadable library manifest parser.
//!
//! A loadable library image starts with a fixed-size manifest block. At a
//! fixed offset inside that block sits the firmware descriptor: a header
//! followed by a fixed-stride table of module entries, each describing the
//! module's code, read-only data, and working-memory segments.
//!
//! Parsing is copy-out and bounds-checked: [`FirmwareDesc::parse`] validates
//! the header and the extent of the module table once, and every accessor
//! after that returns owned, `Copy` records or a [`ManifestError`]. No
//! pointer casts into the image are performed.
//!
//! The `builder` feature adds [`builder::ImageBuilder`], which serializes
//! the same layout for tests and host-side packaging tools.

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "builder"))]
extern crate alloc;

#[cfg(any(test, feature = "builder"))]
pub mod builder;
mod desc;
mod header;
mod module;
mod uuid;

use core::fmt;

pub use desc::{FirmwareDesc, ModuleEntries};
pub use header::FwHeader;
pub use module::{ModuleEntry, ModuleType, SegmentDesc, SegmentFlags, SegmentKind};
pub use uuid::Uuid;

/// Size in bytes of the manifest block at the start of every image.
pub const MANIFEST_BLOCK_SIZE: usize = 38 * 1024;

/// Byte offset of the firmware descriptor from the start of the image.
pub const DESC_OFFSET: usize = 0x2000;

/// Size in bytes of the firmware descriptor header.
pub const HEADER_SIZE: usize = 52;

/// Stride in bytes of one module entry in the descriptor's module table.
pub const MODULE_ENTRY_SIZE: usize = 116;

/// Size in bytes of one segment descriptor inside a module entry.
pub const SEGMENT_DESC_SIZE: usize = 12;

/// Number of segment descriptors per module entry.
pub const SEGMENT_COUNT: usize = 3;

/// Page size the manifest expresses segment lengths and preload size in.
pub const MANIFEST_PAGE_SIZE: usize = 4096;

/// Most module entries that fit in the manifest block after the header.
pub const MAX_MODULE_ENTRIES: usize =
    (MANIFEST_BLOCK_SIZE - DESC_OFFSET - HEADER_SIZE) / MODULE_ENTRY_SIZE;

/// Returns the byte offset of module entry `index` from the start of the
/// firmware descriptor.
pub const fn module_offset(index: usize) -> usize {
    HEADER_SIZE + index * MODULE_ENTRY_SIZE
}

/// Errors that can occur when parsing a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestError {
    /// The input is too short for the declared structure.
    Truncated,
    /// The descriptor header does not start with `$AM1`.
    BadMagic,
    /// A module entry does not start with `$AME`.
    BadModuleMagic,
    /// The module table does not fit inside the manifest block.
    InvalidOffset,
    /// A module index is not below the descriptor's entry count.
    IndexOutOfRange,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "manifest data truncated"),
            Self::BadMagic => write!(f, "invalid firmware descriptor magic (expected $AM1)"),
            Self::BadModuleMagic => write!(f, "invalid module entry magic (expected $AME)"),
            Self::InvalidOffset => write!(f, "module table exceeds the manifest block"),
            Self::IndexOutOfRange => write!(f, "module index out of range"),
        }
    }
}

/// Reads a little-endian `u16` at `off`.
pub(crate) fn le_u16(data: &[u8], off: usize) -> Result<u16, ManifestError> {
    data.get(off..off + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or(ManifestError::Truncated)
}

/// Reads a little-endian `u32` at `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> Result<u32, ManifestError> {
    data.get(off..off + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(ManifestError::Truncated)
}

/// Copies `N` bytes starting at `off`.
pub(crate) fn bytes<const N: usize>(data: &[u8], off: usize) -> Result<[u8; N], ManifestError> {
    data.get(off..off + N)
        .and_then(|b| b.try_into().ok())
        .ok_or(ManifestError::Truncated)
}
