//! Manifest and image serializer.
//!
//! Produces byte-exact images in the layout the parser reads. Segment
//! addresses and file offsets are assigned automatically: code and
//! read-only data are packed into a code window, working memory into a
//! data window, and file contents follow the manifest block page by page.

use alloc::vec;
use alloc::vec::Vec;

use crate::header::HEADER_MAGIC;
use crate::module::{MODULE_MAGIC, ModuleType, SegmentFlags};
use crate::uuid::Uuid;
use crate::{
    DESC_OFFSET, HEADER_SIZE, MANIFEST_BLOCK_SIZE, MANIFEST_PAGE_SIZE, MODULE_ENTRY_SIZE,
    SEGMENT_DESC_SIZE, module_offset,
};

/// First virtual address handed out for code and read-only data.
pub const CODE_WINDOW: u32 = 0xA000_0000;
/// First virtual address handed out for working memory.
pub const DATA_WINDOW: u32 = 0xB000_0000;

/// Description of one module to serialize.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    name: [u8; 8],
    uuid: Uuid,
    lib_code: bool,
    instances: u16,
    text_pages: u16,
    rodata_pages: u16,
    bss_pages: Option<u16>,
    entry_offset: u32,
}

impl ModuleSpec {
    /// Creates a module with one code page, one read-only page, and one
    /// instance.
    pub fn new(name: &str, uuid: Uuid) -> Self {
        let mut raw = [0u8; 8];
        let n = name.len().min(raw.len());
        raw[..n].copy_from_slice(&name.as_bytes()[..n]);
        Self {
            name: raw,
            uuid,
            lib_code: false,
            instances: 1,
            text_pages: 1,
            rodata_pages: 1,
            bss_pages: None,
            entry_offset: 0,
        }
    }

    /// Marks the module as shared library code.
    #[must_use]
    pub fn lib_code(mut self) -> Self {
        self.lib_code = true;
        self
    }

    /// Sets the maximum instance count.
    #[must_use]
    pub fn instances(mut self, n: u16) -> Self {
        self.instances = n;
        self
    }

    /// Sets the code segment length in pages.
    #[must_use]
    pub fn text_pages(mut self, n: u16) -> Self {
        self.text_pages = n;
        self
    }

    /// Sets the read-only data segment length in pages.
    #[must_use]
    pub fn rodata_pages(mut self, n: u16) -> Self {
        self.rodata_pages = n;
        self
    }

    /// Sets the working-memory length in pages. Defaults to one page per
    /// instance.
    #[must_use]
    pub fn bss_pages(mut self, n: u16) -> Self {
        self.bss_pages = Some(n);
        self
    }

    /// Sets the entry point as a byte offset into the code segment.
    #[must_use]
    pub fn entry_offset(mut self, off: u32) -> Self {
        self.entry_offset = off;
        self
    }

    fn bss(&self) -> u16 {
        self.bss_pages.unwrap_or(self.instances)
    }
}

/// Placement of one module's segments, as written to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Code base address.
    pub text_addr: u32,
    /// Read-only data base address.
    pub rodata_addr: u32,
    /// Working-memory base address.
    pub bss_addr: u32,
    /// Code file offset.
    pub text_offset: u32,
    /// Read-only data file offset.
    pub rodata_offset: u32,
    /// Entry-point address.
    pub entry_point: u32,
}

/// Serializer for library images.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    preload_pages: u32,
    modules: Vec<ModuleSpec>,
}

impl ImageBuilder {
    /// Creates an image that declares `preload_pages` resident pages.
    pub fn new(preload_pages: u32) -> Self {
        Self {
            preload_pages,
            modules: Vec::new(),
        }
    }

    /// Appends a module entry.
    #[must_use]
    pub fn module(mut self, spec: ModuleSpec) -> Self {
        self.modules.push(spec);
        self
    }

    /// Returns the segment placement of every module, in entry order.
    pub fn placements(&self) -> Vec<Placement> {
        let page = MANIFEST_PAGE_SIZE as u32;
        let mut code = CODE_WINDOW;
        let mut data = DATA_WINDOW;
        let mut file = MANIFEST_BLOCK_SIZE.next_multiple_of(MANIFEST_PAGE_SIZE) as u32;

        self.modules
            .iter()
            .map(|m| {
                let text = u32::from(m.text_pages) * page;
                let rodata = u32::from(m.rodata_pages) * page;
                let p = Placement {
                    text_addr: code,
                    rodata_addr: code + text,
                    bss_addr: data,
                    text_offset: file,
                    rodata_offset: file + text,
                    entry_point: code + m.entry_offset,
                };
                code += text + rodata;
                file += text + rodata;
                data += u32::from(m.bss()) * page;
                p
            })
            .collect()
    }

    /// Serializes the manifest block alone.
    pub fn build_manifest(&self) -> Vec<u8> {
        let mut block = vec![0u8; MANIFEST_BLOCK_SIZE];
        self.write_descriptor(&mut block);
        block
    }

    /// Serializes the whole image: the manifest block followed by every
    /// module's code and read-only contents.
    ///
    /// The image is `preload_pages` long, or longer if the contents need
    /// more room. Code bytes of module `i` are `0xC0 | i`, read-only bytes
    /// are `0xD0 | i`.
    pub fn build(&self) -> Vec<u8> {
        let placements = self.placements();
        let contents_end = self
            .modules
            .iter()
            .zip(&placements)
            .map(|(m, p)| p.rodata_offset as usize + usize::from(m.rodata_pages) * MANIFEST_PAGE_SIZE)
            .max()
            .unwrap_or(MANIFEST_BLOCK_SIZE);
        let len = (self.preload_pages as usize * MANIFEST_PAGE_SIZE).max(contents_end);

        let mut image = vec![0u8; len];
        self.write_descriptor(&mut image);
        for (i, (m, p)) in self.modules.iter().zip(&placements).enumerate() {
            let tag = (i & 0xF) as u8;
            let text = p.text_offset as usize;
            let rodata = p.rodata_offset as usize;
            image[text..rodata].fill(0xC0 | tag);
            image[rodata..rodata + usize::from(m.rodata_pages) * MANIFEST_PAGE_SIZE]
                .fill(0xD0 | tag);
        }
        image
    }

    fn write_descriptor(&self, out: &mut [u8]) {
        let d = &mut out[DESC_OFFSET..];
        d[0..4].copy_from_slice(&HEADER_MAGIC);
        put_u32(d, 4, HEADER_SIZE as u32);
        d[8..14].copy_from_slice(b"libmgr");
        put_u32(d, 16, self.preload_pages);
        put_u32(d, 36, self.modules.len() as u32);

        for (i, (m, p)) in self.modules.iter().zip(self.placements()).enumerate() {
            let e = &mut d[module_offset(i)..module_offset(i) + MODULE_ENTRY_SIZE];
            e[0..4].copy_from_slice(&MODULE_MAGIC);
            e[4..12].copy_from_slice(&m.name);
            e[12..28].copy_from_slice(m.uuid.as_bytes());
            let ty = if m.lib_code {
                ModuleType::LIB_CODE
            } else {
                ModuleType::DOMAIN_LL
            };
            put_u32(e, 28, ty.bits());
            put_u32(e, 64, p.entry_point);
            put_u16(e, 76, m.instances);
            put_u16(e, 78, m.bss() / m.instances.max(1));

            let segs = [
                (
                    SegmentFlags::CONTENTS | SegmentFlags::LOAD | SegmentFlags::READONLY | SegmentFlags::CODE,
                    m.text_pages,
                    p.text_addr,
                    p.text_offset,
                ),
                (
                    SegmentFlags::CONTENTS | SegmentFlags::LOAD | SegmentFlags::READONLY | SegmentFlags::DATA,
                    m.rodata_pages,
                    p.rodata_addr,
                    p.rodata_offset,
                ),
                (SegmentFlags::ALLOC | SegmentFlags::DATA, m.bss(), p.bss_addr, 0),
            ];
            for (s, (attrs, pages, addr, offset)) in segs.into_iter().enumerate() {
                let off = 80 + s * SEGMENT_DESC_SIZE;
                put_u32(e, off, SegmentFlags::with_length(attrs, pages).bits());
                put_u32(e, off + 4, addr);
                put_u32(e, off + 8, offset);
            }
        }
    }
}

fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
