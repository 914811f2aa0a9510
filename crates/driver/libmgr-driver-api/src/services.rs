//! Firmware service bundle.
//!
//! The library manager is constructed with a `&'static dyn
//! FirmwareServices` and reaches every collaborator through it, without a
//! dependency on the firmware crate.

use crate::clock::ClockScaling;
use crate::component::ComponentRegistry;
use crate::dma::DmaController;
use crate::heap::MemoryPools;
use crate::memory::MemoryDriver;

/// Trait providing firmware services to the library manager.
pub trait FirmwareServices: Send + Sync {
    /// Returns the memory driver.
    fn memory(&self) -> &dyn MemoryDriver;

    /// Returns the DMA controller.
    fn dma(&self) -> &dyn DmaController;

    /// Returns the clock scaling service.
    fn clock(&self) -> &dyn ClockScaling;

    /// Returns the buffer pools.
    fn pools(&self) -> &dyn MemoryPools;

    /// Returns the component driver registry.
    fn components(&self) -> &dyn ComponentRegistry;

    /// Returns the id of the calling core.
    fn cpu_id(&self) -> u32;

    /// Busy-waits for `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Returns microseconds since boot.
    fn uptime_us(&self) -> u64;
}
