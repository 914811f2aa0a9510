//! Collaborator contracts for the library manager.
//!
//! The library manager never touches hardware directly. Everything it
//! needs from the surrounding firmware is expressed here as a trait:
//!
//! - [`MemoryDriver`] -- virtual-memory mapping and cache maintenance.
//! - [`DmaController`] -- host-to-device DMA channels.
//! - [`ClockScaling`] -- core clock adjustment.
//! - [`MemoryPools`] -- capability-tagged buffer allocation.
//! - [`ComponentRegistry`] -- component driver class registration.
//!
//! [`FirmwareServices`] bundles them, together with CPU identity and time,
//! into the single object the manager is constructed with.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod component;
pub mod dma;
pub mod error;
pub mod heap;
pub mod memory;
pub mod services;

pub use clock::ClockScaling;
pub use component::{ComponentDriverInfo, ComponentRegistry};
pub use dma::{
    DmaAccess, DmaAttribute, DmaBlockConfig, DmaChannel, DmaConfig, DmaController, DmaDevice,
    DmaDirection, DmaRequest, DmaStatus,
};
pub use error::DriverError;
pub use heap::{MemCaps, MemoryPools};
pub use memory::{MemPerm, MemoryDriver};
pub use services::FirmwareServices;
