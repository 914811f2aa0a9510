//! A complete fake firmware.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use libmgr_driver_api::{
    ClockScaling, ComponentRegistry, DmaController, FirmwareServices, MemoryDriver, MemoryPools,
};

use crate::{FakeClock, FakeComponents, FakeDma, FakeMemory, FakePools, Journal};

/// Default maximum core clock, in kHz.
pub const MAX_CPU_KHZ: u32 = 400_000;

/// One of every fake, sharing a journal, behind [`FirmwareServices`].
///
/// Time only passes through [`FirmwareServices::delay_us`], so timeouts
/// are reached deterministically.
pub struct FakePlatform {
    /// Module address space.
    pub memory: FakeMemory,
    /// Host DMA engine.
    pub dma: FakeDma,
    /// Clock scaling.
    pub clock: FakeClock,
    /// Buffer pools.
    pub pools: FakePools,
    /// Component driver registry.
    pub components: FakeComponents,
    /// Journal shared by the fakes above.
    pub journal: Journal,
    cpu: AtomicU32,
    uptime_us: AtomicU64,
    delays: AtomicUsize,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    /// Creates a platform running on core 0.
    pub fn new() -> Self {
        let journal = Journal::new();
        Self {
            memory: FakeMemory::with_journal(journal.clone()),
            dma: FakeDma::with_journal(journal.clone()),
            clock: FakeClock::with_journal(MAX_CPU_KHZ, journal.clone()),
            pools: FakePools::with_journal(journal.clone()),
            components: FakeComponents::new(),
            journal,
            cpu: AtomicU32::new(0),
            uptime_us: AtomicU64::new(0),
            delays: AtomicUsize::new(0),
        }
    }

    /// Moves the caller to `core`.
    pub fn set_cpu(&self, core: u32) {
        self.cpu.store(core, Ordering::Relaxed);
    }

    /// Returns the number of `delay_us` calls.
    pub fn delays(&self) -> usize {
        self.delays.load(Ordering::Relaxed)
    }

    /// Leaks the platform for use as `&'static dyn FirmwareServices`.
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }
}

impl FirmwareServices for FakePlatform {
    fn memory(&self) -> &dyn MemoryDriver {
        &self.memory
    }

    fn dma(&self) -> &dyn DmaController {
        &self.dma
    }

    fn clock(&self) -> &dyn ClockScaling {
        &self.clock
    }

    fn pools(&self) -> &dyn MemoryPools {
        &self.pools
    }

    fn components(&self) -> &dyn ComponentRegistry {
        &self.components
    }

    fn cpu_id(&self) -> u32 {
        self.cpu.load(Ordering::Relaxed)
    }

    fn delay_us(&self, us: u32) {
        self.delays.fetch_add(1, Ordering::Relaxed);
        self.uptime_us.fetch_add(u64::from(us), Ordering::Relaxed);
    }

    fn uptime_us(&self) -> u64 {
        self.uptime_us.load(Ordering::Relaxed)
    }
}
