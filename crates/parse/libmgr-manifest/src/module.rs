//! Module entries and their segment descriptors.

use libmgr_core::addr::VirtAddr;

use crate::uuid::Uuid;
use crate::{MODULE_ENTRY_SIZE, ManifestError, SEGMENT_COUNT, SEGMENT_DESC_SIZE, bytes, le_u16, le_u32};

/// Module entry magic.
pub(crate) const MODULE_MAGIC: [u8; 4] = *b"$AME";

/// Byte offset of the segment table inside a module entry.
const SEGMENTS_OFFSET: usize = 80;

bitflags::bitflags! {
    /// Module type word.
    ///
    /// The low four bits hold the load type; the named flags are the
    /// single-bit attributes above it. Unknown bits are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleType: u32 {
        /// Started automatically once loaded.
        const AUTO_START = 1 << 4;
        /// Runs in the low-latency scheduling domain.
        const DOMAIN_LL  = 1 << 5;
        /// Runs in the data-processing scheduling domain.
        const DOMAIN_DP  = 1 << 6;
        /// Code shared by the other modules of the same library.
        const LIB_CODE   = 1 << 7;
    }
}

impl ModuleType {
    /// Returns the 4-bit load type field.
    pub const fn load_type(self) -> u8 {
        (self.bits() & 0xF) as u8
    }

    /// Returns `true` if this module is shared library code.
    pub const fn is_lib_code(self) -> bool {
        self.contains(Self::LIB_CODE)
    }
}

bitflags::bitflags! {
    /// Segment descriptor flag word.
    ///
    /// Bits 16..32 hold the segment length in pages; see
    /// [`SegmentFlags::length_pages`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Segment has file contents.
        const CONTENTS = 1 << 0;
        /// Segment occupies memory at run time.
        const ALLOC    = 1 << 1;
        /// Segment is loaded from the image.
        const LOAD     = 1 << 2;
        /// Segment is read-only.
        const READONLY = 1 << 3;
        /// Segment holds code.
        const CODE     = 1 << 4;
        /// Segment holds data.
        const DATA     = 1 << 5;
    }
}

impl SegmentFlags {
    /// Returns the segment length in pages.
    pub const fn length_pages(self) -> u32 {
        self.bits() >> 16
    }

    /// Returns the 4-bit segment type field.
    pub const fn segment_type(self) -> u8 {
        ((self.bits() >> 8) & 0xF) as u8
    }

    /// Builds a flag word from attribute flags and a page count.
    pub const fn with_length(attrs: Self, pages: u16) -> Self {
        Self::from_bits_retain((attrs.bits() & 0xFFFF) | ((pages as u32) << 16))
    }
}

/// Index of a segment inside a module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SegmentKind {
    /// Executable code (`.text`).
    Text = 0,
    /// Read-only data.
    Rodata = 1,
    /// Per-instance working memory (`.bss`).
    Bss = 2,
}

/// A segment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDesc {
    /// Flag word, including the length in pages.
    pub flags: SegmentFlags,
    /// Virtual base address the segment is mapped at.
    pub v_base_addr: VirtAddr,
    /// Byte offset of the segment contents from the start of the image.
    pub file_offset: u32,
}

impl SegmentDesc {
    fn parse(data: &[u8], off: usize) -> Result<Self, ManifestError> {
        Ok(Self {
            flags: SegmentFlags::from_bits_retain(le_u32(data, off)?),
            v_base_addr: VirtAddr::new(le_u32(data, off + 4)?),
            file_offset: le_u32(data, off + 8)?,
        })
    }

    /// Returns the segment length in pages.
    pub const fn length_pages(&self) -> u32 {
        self.flags.length_pages()
    }
}

/// A parsed module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Module name, NUL-padded.
    pub name: [u8; 8],
    /// Identifying tag used to bind the module to a driver class.
    pub uuid: Uuid,
    /// Module type word.
    pub module_type: ModuleType,
    /// Hash of the module contents.
    pub hash: [u8; 32],
    /// Entry-point address.
    pub entry_point: u32,
    /// Offset of the module's configuration table.
    pub cfg_offset: u16,
    /// Number of configurations.
    pub cfg_count: u16,
    /// Core affinity mask.
    pub affinity_mask: u32,
    /// Maximum number of simultaneous instances.
    pub instance_max_count: u16,
    /// Per-instance working-memory size as declared by the packager.
    pub instance_bss_size: u16,
    /// Segment descriptors, indexed by [`SegmentKind`].
    pub segments: [SegmentDesc; SEGMENT_COUNT],
}

impl ModuleEntry {
    /// Parses a module entry from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Truncated`] if `data` is shorter than one
    /// entry, or [`ManifestError::BadModuleMagic`] on a magic mismatch.
    pub fn parse(data: &[u8]) -> Result<Self, ManifestError> {
        if data.len() < MODULE_ENTRY_SIZE {
            return Err(ManifestError::Truncated);
        }
        if bytes::<4>(data, 0)? != MODULE_MAGIC {
            return Err(ManifestError::BadModuleMagic);
        }

        let mut segments = [SegmentDesc {
            flags: SegmentFlags::empty(),
            v_base_addr: VirtAddr::zero(),
            file_offset: 0,
        }; SEGMENT_COUNT];
        for (i, seg) in segments.iter_mut().enumerate() {
            *seg = SegmentDesc::parse(data, SEGMENTS_OFFSET + i * SEGMENT_DESC_SIZE)?;
        }

        Ok(Self {
            name: bytes(data, 4)?,
            uuid: Uuid::from_bytes(bytes(data, 12)?),
            module_type: ModuleType::from_bits_retain(le_u32(data, 28)?),
            hash: bytes(data, 32)?,
            entry_point: le_u32(data, 64)?,
            cfg_offset: le_u16(data, 68)?,
            cfg_count: le_u16(data, 70)?,
            affinity_mask: le_u32(data, 72)?,
            instance_max_count: le_u16(data, 76)?,
            instance_bss_size: le_u16(data, 78)?,
            segments,
        })
    }

    /// Returns the descriptor of one segment.
    pub const fn segment(&self, kind: SegmentKind) -> &SegmentDesc {
        &self.segments[kind as usize]
    }

    /// Returns `true` if this module is shared library code.
    pub const fn is_lib_code(&self) -> bool {
        self.module_type.is_lib_code()
    }

    /// Returns the module name with trailing NULs stripped, if it is UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).ok()
    }
}
