//! DMA engine contract.
//!
//! Library images are streamed from the host through a single channel
//! configured for repeated fixed-size block transfers into a bounce
//! buffer. The consumer learns how much data has arrived by polling
//! [`DmaController::get_status`] and asks for the next block with
//! [`DmaController::reload`].

use crate::error::DriverError;

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// Host memory to local memory.
    HostToMemory,
    /// Local memory to host memory.
    MemoryToHost,
    /// Local memory to local memory.
    MemoryToMemory,
}

/// Channel sharing mode requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaAccess {
    /// Channel is owned by one user until released.
    Exclusive,
    /// Channel may be handed to several users.
    Shared,
}

/// Engine selection criteria for [`DmaController::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    /// Required transfer direction.
    pub direction: DmaDirection,
    /// Device class the engine must serve.
    pub device_class: u32,
    /// Requested sharing mode.
    pub access: DmaAccess,
}

/// Engine attributes queried with [`DmaController::get_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaAttribute {
    /// Required alignment of buffer addresses.
    BufferAddressAlignment,
    /// Required alignment of buffer sizes.
    BufferSizeAlignment,
    /// Required alignment of a single copy.
    CopyAlignment,
}

/// Handle to an acquired DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaDevice(pub u32);

/// A channel on a [`DmaDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannel(pub u32);

/// One transfer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaBlockConfig {
    /// Source address (host side for [`DmaDirection::HostToMemory`]).
    pub source: usize,
    /// Destination address.
    pub dest: usize,
    /// Block size in bytes.
    pub size: usize,
}

/// Channel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaConfig {
    /// Transfer direction.
    pub direction: DmaDirection,
    /// Source element width in bytes.
    pub source_width: u32,
    /// Destination element width in bytes.
    pub dest_width: u32,
    /// The block to transfer; repeated on every reload.
    pub block: DmaBlockConfig,
}

/// Channel status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaStatus {
    /// Channel is actively transferring.
    pub busy: bool,
    /// Bytes delivered into the destination and not yet consumed.
    pub pending_length: usize,
    /// Bytes of free space in the destination.
    pub free: usize,
}

/// DMA engine operations.
pub trait DmaController: Send + Sync {
    /// Acquires an engine matching `req`.
    fn acquire(&self, req: &DmaRequest) -> Result<DmaDevice, DriverError>;

    /// Returns an engine obtained from [`acquire`](Self::acquire).
    fn put(&self, dev: DmaDevice);

    /// Requests channel `id` on `dev`.
    fn request_channel(&self, dev: DmaDevice, id: u32) -> Result<DmaChannel, DriverError>;

    /// Releases a channel obtained from [`request_channel`](Self::request_channel).
    fn release_channel(&self, dev: DmaDevice, chan: DmaChannel);

    /// Queries an engine attribute.
    fn get_attribute(&self, dev: DmaDevice, attr: DmaAttribute) -> Result<usize, DriverError>;

    /// Configures a channel.
    fn configure(
        &self,
        dev: DmaDevice,
        chan: DmaChannel,
        config: &DmaConfig,
    ) -> Result<(), DriverError>;

    /// Starts a configured channel.
    fn start(&self, dev: DmaDevice, chan: DmaChannel) -> Result<(), DriverError>;

    /// Stops a running channel.
    fn stop(&self, dev: DmaDevice, chan: DmaChannel) -> Result<(), DriverError>;

    /// Returns the channel status.
    fn get_status(&self, dev: DmaDevice, chan: DmaChannel) -> Result<DmaStatus, DriverError>;

    /// Marks `size` bytes consumed and reissues the block descriptor.
    fn reload(
        &self,
        dev: DmaDevice,
        chan: DmaChannel,
        source: usize,
        dest: usize,
        size: usize,
    ) -> Result<(), DriverError>;
}
