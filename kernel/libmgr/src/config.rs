//! Loader configuration.
//!
//! Compile-time limits of the module address space and image format,
//! plus the runtime [`LoaderConfig`] a manager is constructed with.

pub use libmgr_manifest::MANIFEST_BLOCK_SIZE;

/// Page size segment lengths and mapping requests are expressed in.
pub const PAGE_SIZE: usize = libmgr_manifest::MANIFEST_PAGE_SIZE;

/// Number of library slots. Library id 0 is reserved for the base
/// firmware, so valid loadable ids are `1..MAX_LIBRARIES`.
pub const MAX_LIBRARIES: usize = 16;

/// Position of the library id inside a module id.
pub const LIB_ID_SHIFT: u32 = 12;

/// Mask of the module index inside a module id.
pub const MODULE_INDEX_MASK: u32 = (1 << LIB_ID_SHIFT) - 1;

/// Most shared-code modules one library may declare.
pub const MAX_SHARED_MODULES: usize = 16;

/// Delay between two DMA status polls.
pub const DEFAULT_POLL_INTERVAL_US: u32 = 100;

/// Longest wait for one chunk of a library image to arrive.
pub const DEFAULT_TRANSFER_TIMEOUT_US: u64 = 1_000_000;

/// Device class requested when acquiring the host DMA engine.
pub const DEFAULT_DMA_DEVICE_CLASS: u32 = 1 << 1;

/// Memory tier permanent library storage is allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    /// Default DMA-capable pool, page-aligned.
    DmaCapable,
    /// Larger, slower L3 memory.
    L3,
}

impl StorageTier {
    /// The tier selected by the `l3-heap` feature.
    #[cfg(feature = "l3-heap")]
    pub const DEFAULT: Self = Self::L3;
    /// The tier selected by the `l3-heap` feature.
    #[cfg(not(feature = "l3-heap"))]
    pub const DEFAULT: Self = Self::DmaCapable;
}

/// Runtime loader settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Delay between DMA status polls, in microseconds.
    pub poll_interval_us: u32,
    /// Deadline for one chunk to arrive; `None` waits forever.
    pub transfer_timeout_us: Option<u64>,
    /// Tier for permanent library storage.
    pub storage_tier: StorageTier,
    /// Device class of the host DMA engine.
    pub dma_device_class: u32,
}

impl LoaderConfig {
    /// Default settings.
    pub const DEFAULT: Self = Self {
        poll_interval_us: DEFAULT_POLL_INTERVAL_US,
        transfer_timeout_us: Some(DEFAULT_TRANSFER_TIMEOUT_US),
        storage_tier: StorageTier::DEFAULT,
        dma_device_class: DEFAULT_DMA_DEVICE_CLASS,
    };

    /// Sets the DMA poll interval.
    #[must_use]
    pub const fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Sets the per-chunk transfer deadline.
    #[must_use]
    pub const fn with_transfer_timeout_us(mut self, us: Option<u64>) -> Self {
        self.transfer_timeout_us = us;
        self
    }

    /// Sets the storage tier.
    #[must_use]
    pub const fn with_storage_tier(mut self, tier: StorageTier) -> Self {
        self.storage_tier = tier;
        self
    }

    /// Sets the DMA device class.
    #[must_use]
    pub const fn with_dma_device_class(mut self, class: u32) -> Self {
        self.dma_device_class = class;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
