//! Streaming library installation.
//!
//! One install acquires, in order: a host DMA channel, a manifest buffer, a
//! DMA bounce buffer, a clock boost, and a running transfer. Each is held
//! by a guard, so every exit path releases them in the reverse order:
//! transfer stopped, boost reverted, bounce buffer freed, manifest buffer
//! freed, channel released. The stop and the boost revert are also run
//! explicitly on the normal path so their failures can be reported.

use libmgr_core::{kdebug, kerr, kinfo, kwarn};
use libmgr_driver_api::{
    DmaAccess, DmaAttribute, DmaBlockConfig, DmaChannel, DmaConfig, DmaDevice, DmaDirection,
    DmaRequest, FirmwareServices, MemCaps,
};
use libmgr_manifest::{FirmwareDesc, ManifestError};

use crate::config::{LoaderConfig, MANIFEST_BLOCK_SIZE};
use crate::error::{LoaderError, first_error};
use crate::id::LibraryId;
use crate::storage::{TempBuffer, alloc_image_storage};
use crate::transfer::Stream;

// ---------------------------------------------------------------------------
// DMA channel session
// ---------------------------------------------------------------------------

/// An acquired host DMA channel. Released on drop.
struct DmaSession<'a> {
    services: &'a dyn FirmwareServices,
    dev: DmaDevice,
    chan: DmaChannel,
}

impl<'a> DmaSession<'a> {
    fn open(
        services: &'a dyn FirmwareServices,
        config: &LoaderConfig,
        dma_id: u32,
    ) -> Result<Self, LoaderError> {
        let dma = services.dma();
        let dev = dma
            .acquire(&DmaRequest {
                direction: DmaDirection::HostToMemory,
                device_class: config.dma_device_class,
                access: DmaAccess::Exclusive,
            })
            .map_err(|e| {
                kerr!("no host DMA engine: {e}");
                LoaderError::DeviceError
            })?;
        match dma.request_channel(dev, dma_id) {
            Ok(chan) => Ok(Self { services, dev, chan }),
            Err(e) => {
                kerr!("DMA channel {dma_id} unavailable: {e}");
                dma.put(dev);
                Err(LoaderError::DeviceError)
            }
        }
    }

    /// Returns the buffer alignment the engine requires.
    fn alignment(&self) -> Result<usize, LoaderError> {
        let align = self
            .services
            .dma()
            .get_attribute(self.dev, DmaAttribute::BufferAddressAlignment)
            .map_err(LoaderError::device)?
            .max(1);
        if align.is_power_of_two() {
            Ok(align)
        } else {
            kerr!("DMA reports unusable buffer alignment {align}");
            Err(LoaderError::DeviceError)
        }
    }

    /// Configures repeated `block`-byte transfers into `bounce` and starts
    /// the channel.
    fn start(&self, bounce: &TempBuffer<'_>) -> Result<RunningDma<'_, 'a>, LoaderError> {
        let dma = self.services.dma();
        let config = DmaConfig {
            direction: DmaDirection::HostToMemory,
            source_width: 4,
            dest_width: 4,
            block: DmaBlockConfig {
                source: 0,
                dest: bounce.as_ptr().as_ptr() as usize,
                size: bounce.len(),
            },
        };
        dma.configure(self.dev, self.chan, &config)
            .map_err(LoaderError::device)?;
        dma.start(self.dev, self.chan).map_err(LoaderError::device)?;
        Ok(RunningDma {
            session: self,
            running: true,
        })
    }
}

impl Drop for DmaSession<'_> {
    fn drop(&mut self) {
        let dma = self.services.dma();
        dma.release_channel(self.dev, self.chan);
        dma.put(self.dev);
    }
}

/// A started channel. Stopped on drop if not stopped explicitly.
struct RunningDma<'s, 'a> {
    session: &'s DmaSession<'a>,
    running: bool,
}

impl RunningDma<'_, '_> {
    fn stop(mut self) -> Result<(), LoaderError> {
        self.running = false;
        let s = self.session;
        s.services.dma().stop(s.dev, s.chan).map_err(|e| {
            kerr!("DMA stop failed: {e}");
            LoaderError::device(e)
        })
    }
}

impl Drop for RunningDma<'_, '_> {
    fn drop(&mut self) {
        if !self.running {
            return;
        }
        let s = self.session;
        if let Err(e) = s.services.dma().stop(s.dev, s.chan) {
            kerr!("DMA stop failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Clock boost
// ---------------------------------------------------------------------------

/// A raised core clock request. Reverted on drop if not reverted
/// explicitly.
struct ClockBoost<'a> {
    services: &'a dyn FirmwareServices,
    core: u32,
    delta_khz: i32,
    active: bool,
}

impl<'a> ClockBoost<'a> {
    fn raise(services: &'a dyn FirmwareServices) -> Result<Self, LoaderError> {
        let core = services.cpu_id();
        let delta_khz = i32::try_from(services.clock().max_cpu_khz()).unwrap_or(i32::MAX);
        services.clock().adjust(core, delta_khz).map_err(|e| {
            kerr!("clock boost on core {core} failed: {e}");
            LoaderError::device(e)
        })?;
        kdebug!("core {core} boosted by {delta_khz} kHz");
        Ok(Self {
            services,
            core,
            delta_khz,
            active: true,
        })
    }

    fn revert(mut self) -> Result<(), LoaderError> {
        self.active = false;
        self.undo()
    }

    fn undo(&self) -> Result<(), LoaderError> {
        self.services
            .clock()
            .adjust(self.core, -self.delta_khz)
            .map_err(|e| {
                kerr!("clock boost revert on core {} failed: {e}", self.core);
                LoaderError::device(e)
            })
    }
}

impl Drop for ClockBoost<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.undo();
        }
    }
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

/// Streams library images from the host into permanent storage.
pub struct Installer<'a> {
    services: &'a dyn FirmwareServices,
    config: &'a LoaderConfig,
}

impl<'a> Installer<'a> {
    /// Creates an installer.
    pub fn new(services: &'a dyn FirmwareServices, config: &'a LoaderConfig) -> Self {
        Self { services, config }
    }

    /// Streams the image of library `lib` over host DMA stream `dma_id`
    /// and hands the installed image to `commit`.
    ///
    /// Blocks until the image is installed or the install fails. All
    /// transfer resources are released before returning, whatever the
    /// outcome; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] without touching any
    /// resource if `lib` is not a loadable slot. Otherwise returns the
    /// first DMA, allocation, clock, timeout, or manifest failure, or the
    /// error of `commit`.
    pub fn load_library(
        &self,
        dma_id: u32,
        lib: LibraryId,
        commit: impl FnOnce(&'static [u8]) -> Result<(), LoaderError>,
    ) -> Result<(), LoaderError> {
        if !lib.is_loadable() {
            kerr!("invalid library id {lib}");
            return Err(LoaderError::InvalidArgument);
        }

        let pools = self.services.pools();
        let channel = DmaSession::open(self.services, self.config, dma_id)?;
        let align = channel.alignment()?;
        let mut manifest = TempBuffer::alloc(pools, MemCaps::empty(), MANIFEST_BLOCK_SIZE, align)?;
        let bounce = TempBuffer::alloc(pools, MemCaps::DMA, MANIFEST_BLOCK_SIZE, align)?;
        let boost = ClockBoost::raise(self.services)?;
        let running = channel.start(&bounce)?;

        // SAFETY: The bounce buffer outlives `stream` and is only written
        // by the engine.
        let stream = unsafe {
            Stream::new(
                self.services,
                channel.dev,
                channel.chan,
                bounce.as_ptr(),
                bounce.len(),
                self.config.poll_interval_us,
                self.config.transfer_timeout_us,
            )
        };
        let result = self.stream_image(&stream, lib, manifest.as_mut_slice(), commit);

        let result = first_error(result, running.stop());
        first_error(result, boost.revert())
    }

    fn stream_image(
        &self,
        stream: &Stream<'_>,
        lib: LibraryId,
        manifest: &mut [u8],
        commit: impl FnOnce(&'static [u8]) -> Result<(), LoaderError>,
    ) -> Result<(), LoaderError> {
        stream.copy_into(manifest)?;

        let desc = FirmwareDesc::parse(manifest)?;
        let preload = desc.preload_size().ok_or(LoaderError::InvalidArgument)?;
        if desc.module_count() == 0 {
            kwarn!("library {lib} declares no modules");
        }

        let mut storage = alloc_image_storage(self.services.pools(), self.config.storage_tier, preload)?;
        if preload < MANIFEST_BLOCK_SIZE {
            kerr!("library {lib}: preload size {preload} smaller than its manifest");
            return Err(ManifestError::Truncated.into());
        }
        let (head, body) = storage.as_mut_slice().split_at_mut(MANIFEST_BLOCK_SIZE);
        head.copy_from_slice(manifest);
        let chunks = stream.copy_into(body)?;

        commit(storage.leak())?;
        kinfo!("library {lib} installed: {preload} bytes, {chunks} body chunks");
        Ok(())
    }
}
