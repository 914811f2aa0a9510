//! Firmware descriptor header.

use crate::{HEADER_SIZE, ManifestError, bytes, le_u16, le_u32};

/// Descriptor header magic.
pub(crate) const HEADER_MAGIC: [u8; 4] = *b"$AM1";

/// Parsed firmware descriptor header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FwHeader {
    /// Declared header length in bytes.
    pub header_len: u32,
    /// Image name, NUL-padded.
    pub name: [u8; 8],
    /// Pages of the image that must be resident before any module runs.
    pub preload_page_count: u32,
    /// Image flags.
    pub fw_image_flags: u32,
    /// Feature mask.
    pub feature_mask: u32,
    /// Version as `(major, minor, hotfix, build)`.
    pub version: (u16, u16, u16, u16),
    /// Number of entries in the module table.
    pub num_module_entries: u32,
    /// Base address of the hardware buffer.
    pub hw_buf_base_addr: u32,
    /// Length of the hardware buffer.
    pub hw_buf_length: u32,
    /// Load offset of the image.
    pub load_offset: u32,
}

impl FwHeader {
    /// Parses a descriptor header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Truncated`] if `data` is shorter than the
    /// header, or [`ManifestError::BadMagic`] if the magic does not match.
    pub fn parse(data: &[u8]) -> Result<Self, ManifestError> {
        if data.len() < HEADER_SIZE {
            return Err(ManifestError::Truncated);
        }
        if bytes::<4>(data, 0)? != HEADER_MAGIC {
            return Err(ManifestError::BadMagic);
        }

        Ok(Self {
            header_len: le_u32(data, 4)?,
            name: bytes(data, 8)?,
            preload_page_count: le_u32(data, 16)?,
            fw_image_flags: le_u32(data, 20)?,
            feature_mask: le_u32(data, 24)?,
            version: (
                le_u16(data, 28)?,
                le_u16(data, 30)?,
                le_u16(data, 32)?,
                le_u16(data, 34)?,
            ),
            num_module_entries: le_u32(data, 36)?,
            hw_buf_base_addr: le_u32(data, 40)?,
            hw_buf_length: le_u32(data, 44)?,
            load_offset: le_u32(data, 48)?,
        })
    }

    /// Returns the image name with trailing NULs stripped, if it is UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).ok()
    }
}
