//! Chunked host-to-device streaming.
//!
//! The host DMA engine fills a bounce buffer one block at a time. The
//! consumer waits until the channel reports at least one chunk pending,
//! invalidates the bounce buffer, copies the chunk out, and reloads the
//! descriptor to request the next block. The engine never signals
//! completion; readiness is only observed by polling.

use core::ptr::NonNull;

use libmgr_core::{kerr, ktrace};
use libmgr_driver_api::{DmaChannel, DmaDevice, FirmwareServices};

use crate::error::LoaderError;

/// Chunk sizes of a transfer of `total` bytes in blocks of at most `block`.
///
/// Yields `ceil(total / block)` sizes; every one is `block` except the
/// last, which is `total % block` when that is nonzero.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    remaining: usize,
    block: usize,
}

impl ChunkPlan {
    /// Plans a transfer. A zero `block` yields no chunks.
    pub const fn new(total: usize, block: usize) -> Self {
        Self {
            remaining: if block == 0 { 0 } else { total },
            block,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.remaining.min(self.block);
        self.remaining -= chunk;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.div_ceil(self.block.max(1));
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkPlan {}

/// A running stream from the host into a bounce buffer.
pub struct Stream<'a> {
    services: &'a dyn FirmwareServices,
    dev: DmaDevice,
    chan: DmaChannel,
    bounce: NonNull<u8>,
    block: usize,
    poll_interval_us: u32,
    timeout_us: Option<u64>,
}

impl<'a> Stream<'a> {
    /// Creates a stream over a started channel.
    ///
    /// # Safety
    ///
    /// `bounce` must be valid for reads of `block` bytes for the lifetime
    /// of the stream, and only the DMA engine may write to it.
    pub unsafe fn new(
        services: &'a dyn FirmwareServices,
        dev: DmaDevice,
        chan: DmaChannel,
        bounce: NonNull<u8>,
        block: usize,
        poll_interval_us: u32,
        timeout_us: Option<u64>,
    ) -> Self {
        Self {
            services,
            dev,
            chan,
            bounce,
            block,
            poll_interval_us,
            timeout_us,
        }
    }

    /// Fills `dest` from the stream and returns the number of chunks read.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::DeviceError`] if a status query or reload
    /// fails, or [`LoaderError::Timeout`] if a chunk does not arrive before
    /// the deadline.
    pub fn copy_into(&self, dest: &mut [u8]) -> Result<usize, LoaderError> {
        let mut copied = 0;
        let mut chunks = 0;
        for chunk in ChunkPlan::new(dest.len(), self.block) {
            self.wait_pending(chunk)?;

            self.services
                .memory()
                .dcache_invalidate_buffer(self.bounce, self.block);
            // SAFETY: `bounce` is valid for `block` bytes (`new` contract)
            // and `chunk <= block`. The engine does not write again until
            // the reload below.
            let src = unsafe { core::slice::from_raw_parts(self.bounce.as_ptr(), chunk) };
            dest[copied..copied + chunk].copy_from_slice(src);
            copied += chunk;
            chunks += 1;

            self.services
                .dma()
                .reload(self.dev, self.chan, 0, self.bounce.as_ptr() as usize, chunk)
                .map_err(LoaderError::device)?;
            ktrace!("streamed {copied}/{} bytes", dest.len());
        }
        Ok(chunks)
    }

    /// Polls until at least `need` bytes are pending in the bounce buffer.
    fn wait_pending(&self, need: usize) -> Result<(), LoaderError> {
        let start = self.services.uptime_us();
        loop {
            let status = self
                .services
                .dma()
                .get_status(self.dev, self.chan)
                .map_err(|e| {
                    kerr!("DMA status query failed: {e}");
                    LoaderError::device(e)
                })?;
            if status.pending_length >= need {
                return Ok(());
            }
            if let Some(limit) = self.timeout_us {
                if self.services.uptime_us().saturating_sub(start) >= limit {
                    kerr!(
                        "DMA stalled: {} of {need} bytes pending after {limit} us",
                        status.pending_length
                    );
                    return Err(LoaderError::Timeout);
                }
            }
            self.services.delay_us(self.poll_interval_us);
        }
    }
}
