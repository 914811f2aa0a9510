//! Host DMA channel simulation.

use std::sync::Mutex;

use libmgr_driver_api::{
    DmaAttribute, DmaChannel, DmaConfig, DmaController, DmaDevice, DmaRequest, DmaStatus,
    DriverError,
};

use crate::{Journal, lock};

/// Which operation to refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Acquire,
    RequestChannel,
    Attribute,
    Configure,
    Start,
    Stop,
    Reload,
}

struct State {
    host: Vec<u8>,
    sent: usize,
    dest: Option<(usize, usize)>,
    pending: usize,
    visible_after: usize,
    lag: usize,
    stall_after: Option<usize>,
    deliveries: usize,
    alignment: usize,
    failing: Vec<Op>,
    fail_status_at: Option<usize>,
    polls: usize,
    reloads: Vec<usize>,
    last_request: Option<DmaRequest>,
    last_config: Option<DmaConfig>,
    channel_id: Option<u32>,
    acquired: usize,
    channels: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            host: Vec::new(),
            sent: 0,
            dest: None,
            pending: 0,
            visible_after: 0,
            lag: 0,
            stall_after: None,
            deliveries: 0,
            alignment: 64,
            failing: Vec::new(),
            fail_status_at: None,
            polls: 0,
            reloads: Vec::new(),
            last_request: None,
            last_config: None,
            channel_id: None,
            acquired: 0,
            channels: 0,
        }
    }
}

impl State {
    fn refuses(&self, op: Op) -> bool {
        self.failing.contains(&op)
    }

    /// Copies the next block of the host image into the destination.
    fn deliver(&mut self) {
        let Some((dest, block)) = self.dest else {
            return;
        };
        if self.stall_after.is_some_and(|n| self.deliveries >= n) {
            return;
        }
        let n = block.min(self.host.len() - self.sent);
        if n == 0 {
            return;
        }
        // SAFETY: `dest` and `block` come from the channel configuration,
        // which the consumer promises describes a live buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(self.host[self.sent..].as_ptr(), dest as *mut u8, n);
        }
        self.sent += n;
        self.pending = n;
        self.deliveries += 1;
        self.visible_after = self.polls + self.lag;
    }
}

/// Fake of [`DmaController`] serving one host image.
///
/// Starting the channel delivers the first block of the image into the
/// configured destination; every reload delivers the next. A delivered
/// block becomes visible in [`DmaStatus::pending_length`] after the
/// configured number of status polls.
#[derive(Default)]
pub struct FakeDma {
    state: Mutex<State>,
    journal: Journal,
}

impl FakeDma {
    /// Creates an engine with an empty host image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine recording into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    /// Sets the image the host streams.
    pub fn set_host_image(&self, image: Vec<u8>) {
        let mut s = lock(&self.state);
        s.host = image;
        s.sent = 0;
    }

    /// Delays the visibility of every block by `polls` status queries.
    pub fn set_lag(&self, polls: usize) {
        lock(&self.state).lag = polls;
    }

    /// Stops delivering after `blocks` blocks.
    pub fn stall_after(&self, blocks: usize) {
        lock(&self.state).stall_after = Some(blocks);
    }

    /// Sets the reported buffer address alignment.
    pub fn set_alignment(&self, align: usize) {
        lock(&self.state).alignment = align;
    }

    /// Makes `acquire` fail.
    pub fn fail_acquire(&self) {
        lock(&self.state).failing.push(Op::Acquire);
    }

    /// Makes `request_channel` fail.
    pub fn fail_request_channel(&self) {
        lock(&self.state).failing.push(Op::RequestChannel);
    }

    /// Makes `get_attribute` fail.
    pub fn fail_attribute(&self) {
        lock(&self.state).failing.push(Op::Attribute);
    }

    /// Makes `configure` fail.
    pub fn fail_configure(&self) {
        lock(&self.state).failing.push(Op::Configure);
    }

    /// Makes `start` fail.
    pub fn fail_start(&self) {
        lock(&self.state).failing.push(Op::Start);
    }

    /// Makes `stop` fail.
    pub fn fail_stop(&self) {
        lock(&self.state).failing.push(Op::Stop);
    }

    /// Makes `reload` fail.
    pub fn fail_reload(&self) {
        lock(&self.state).failing.push(Op::Reload);
    }

    /// Makes the `n`th status query (counting from 1) fail.
    pub fn fail_status_at(&self, n: usize) {
        lock(&self.state).fail_status_at = Some(n);
    }

    /// Returns the number of status queries.
    pub fn polls(&self) -> usize {
        lock(&self.state).polls
    }

    /// Returns the consumed size passed to each reload.
    pub fn reloads(&self) -> Vec<usize> {
        lock(&self.state).reloads.clone()
    }

    /// Returns the number of host image bytes delivered so far.
    pub fn delivered(&self) -> usize {
        lock(&self.state).sent
    }

    /// Returns the last engine request.
    pub fn last_request(&self) -> Option<DmaRequest> {
        lock(&self.state).last_request
    }

    /// Returns the last channel configuration.
    pub fn last_config(&self) -> Option<DmaConfig> {
        lock(&self.state).last_config
    }

    /// Returns the id of the last requested channel.
    pub fn channel_id(&self) -> Option<u32> {
        lock(&self.state).channel_id
    }

    /// Returns `(engines, channels)` currently held.
    pub fn held(&self) -> (usize, usize) {
        let s = lock(&self.state);
        (s.acquired, s.channels)
    }
}

impl DmaController for FakeDma {
    fn acquire(&self, req: &DmaRequest) -> Result<DmaDevice, DriverError> {
        let mut s = lock(&self.state);
        s.last_request = Some(*req);
        if s.refuses(Op::Acquire) {
            return Err(DriverError::DeviceNotFound);
        }
        s.acquired += 1;
        drop(s);
        self.journal.record("dma.acquire");
        Ok(DmaDevice(0))
    }

    fn put(&self, _dev: DmaDevice) {
        lock(&self.state).acquired -= 1;
        self.journal.record("dma.put");
    }

    fn request_channel(&self, _dev: DmaDevice, id: u32) -> Result<DmaChannel, DriverError> {
        let mut s = lock(&self.state);
        s.channel_id = Some(id);
        if s.refuses(Op::RequestChannel) {
            return Err(DriverError::Busy);
        }
        s.channels += 1;
        drop(s);
        self.journal.record(format!("dma.request_channel {id}"));
        Ok(DmaChannel(id))
    }

    fn release_channel(&self, _dev: DmaDevice, _chan: DmaChannel) {
        lock(&self.state).channels -= 1;
        self.journal.record("dma.release_channel");
    }

    fn get_attribute(&self, _dev: DmaDevice, attr: DmaAttribute) -> Result<usize, DriverError> {
        let s = lock(&self.state);
        if s.refuses(Op::Attribute) {
            return Err(DriverError::IoError);
        }
        Ok(match attr {
            DmaAttribute::BufferAddressAlignment => s.alignment,
            DmaAttribute::BufferSizeAlignment | DmaAttribute::CopyAlignment => 4,
        })
    }

    fn configure(
        &self,
        _dev: DmaDevice,
        _chan: DmaChannel,
        config: &DmaConfig,
    ) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        if s.refuses(Op::Configure) {
            return Err(DriverError::InvalidArgument);
        }
        s.last_config = Some(*config);
        s.dest = Some((config.block.dest, config.block.size));
        drop(s);
        self.journal.record("dma.configure");
        Ok(())
    }

    fn start(&self, _dev: DmaDevice, _chan: DmaChannel) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        if s.refuses(Op::Start) {
            return Err(DriverError::IoError);
        }
        s.deliver();
        drop(s);
        self.journal.record("dma.start");
        Ok(())
    }

    fn stop(&self, _dev: DmaDevice, _chan: DmaChannel) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        s.dest = None;
        s.pending = 0;
        let refused = s.refuses(Op::Stop);
        drop(s);
        self.journal.record("dma.stop");
        if refused {
            Err(DriverError::IoError)
        } else {
            Ok(())
        }
    }

    fn get_status(&self, _dev: DmaDevice, _chan: DmaChannel) -> Result<DmaStatus, DriverError> {
        let mut s = lock(&self.state);
        s.polls += 1;
        if s.fail_status_at == Some(s.polls) {
            return Err(DriverError::IoError);
        }
        let pending = if s.polls > s.visible_after { s.pending } else { 0 };
        let block = s.dest.map_or(0, |(_, size)| size);
        Ok(DmaStatus {
            busy: s.dest.is_some(),
            pending_length: pending,
            free: block - pending,
        })
    }

    fn reload(
        &self,
        _dev: DmaDevice,
        _chan: DmaChannel,
        _source: usize,
        _dest: usize,
        size: usize,
    ) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        s.reloads.push(size);
        if s.refuses(Op::Reload) {
            return Err(DriverError::IoError);
        }
        s.pending = 0;
        s.deliver();
        Ok(())
    }
}
