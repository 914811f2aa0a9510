//! Firmware descriptor view.

use crate::header::FwHeader;
use crate::module::ModuleEntry;
use crate::{DESC_OFFSET, MANIFEST_BLOCK_SIZE, ManifestError, module_offset};

/// A validated view over the firmware descriptor of one image.
///
/// Borrowing the image keeps the view tied to the storage it describes.
/// The view is valid for any slice that starts at the beginning of an
/// image: the bare manifest block, or the whole installed image.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareDesc<'a> {
    image: &'a [u8],
    header: FwHeader,
}

impl<'a> FirmwareDesc<'a> {
    /// Validates the descriptor inside `image`.
    ///
    /// Checks the header magic and that the whole module table lies inside
    /// both the manifest block and `image`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Truncated`] if `image` ends before the
    /// header, [`ManifestError::BadMagic`] on a magic mismatch, or
    /// [`ManifestError::InvalidOffset`] if the table overruns.
    pub fn parse(image: &'a [u8]) -> Result<Self, ManifestError> {
        let desc = image.get(DESC_OFFSET..).ok_or(ManifestError::Truncated)?;
        let header = FwHeader::parse(desc)?;

        let entries = usize::try_from(header.num_module_entries)
            .map_err(|_| ManifestError::InvalidOffset)?;
        let table_end = entries
            .checked_mul(crate::MODULE_ENTRY_SIZE)
            .and_then(|n| n.checked_add(DESC_OFFSET + crate::HEADER_SIZE))
            .ok_or(ManifestError::InvalidOffset)?;
        if table_end > MANIFEST_BLOCK_SIZE.min(image.len()) {
            return Err(ManifestError::InvalidOffset);
        }

        Ok(Self { image, header })
    }

    /// Returns the descriptor header.
    pub const fn header(&self) -> &FwHeader {
        &self.header
    }

    /// Returns the image this view was parsed from.
    pub const fn image(&self) -> &'a [u8] {
        self.image
    }

    /// Returns the number of module entries.
    pub const fn module_count(&self) -> usize {
        self.header.num_module_entries as usize
    }

    /// Returns the total size in bytes the image must occupy once
    /// resident, or `None` on overflow.
    pub fn preload_size(&self) -> Option<usize> {
        usize::try_from(self.header.preload_page_count)
            .ok()?
            .checked_mul(crate::MANIFEST_PAGE_SIZE)
    }

    /// Parses module entry `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::IndexOutOfRange`] if `index` is not below
    /// the entry count, or the entry's own parse error.
    pub fn module(&self, index: usize) -> Result<ModuleEntry, ManifestError> {
        if index >= self.module_count() {
            return Err(ManifestError::IndexOutOfRange);
        }
        let off = DESC_OFFSET + module_offset(index);
        ModuleEntry::parse(&self.image[off..])
    }

    /// Iterates over all module entries as `(index, entry)` pairs.
    pub fn modules(&self) -> ModuleEntries<'a> {
        ModuleEntries {
            desc: *self,
            next: 0,
        }
    }

    /// Iterates over the indices of modules flagged as shared library code.
    ///
    /// Entries that fail to parse are skipped.
    pub fn lib_code_indices(&self) -> impl Iterator<Item = usize> + 'a {
        self.modules()
            .filter_map(|(i, m)| m.ok().filter(ModuleEntry::is_lib_code).map(|_| i))
    }
}

/// Iterator over the module entries of a [`FirmwareDesc`].
#[derive(Debug, Clone)]
pub struct ModuleEntries<'a> {
    desc: FirmwareDesc<'a>,
    next: usize,
}

impl Iterator for ModuleEntries<'_> {
    type Item = (usize, Result<ModuleEntry, ManifestError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.desc.module_count() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        Some((i, self.desc.module(i)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.desc.module_count().saturating_sub(self.next);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ModuleEntries<'_> {}
