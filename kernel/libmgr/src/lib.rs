//! Dynamic library loader for the audio DSP firmware.
//!
//! Processing modules are delivered in library images streamed from the
//! host. This crate installs those images and maps their modules on demand:
//!
//! - [`Registry`] -- library id to installed image, plus per-library
//!   counts of loaded modules.
//! - [`SegmentMapper`] -- maps, fills, and unmaps regions of the module
//!   address space, with cache maintenance folded in.
//! - [`ModuleLoader`] -- maps a module's code and read-only data and keeps
//!   the library's shared code resident while any of its modules are.
//! - [`InstanceAllocator`] -- per-instance working memory.
//! - [`Installer`] -- streams an image over host DMA into permanent
//!   storage under a temporary clock boost.
//! - [`LibraryManager`] -- the locked facade over all of the above, and
//!   [`component`] -- its process-wide instance and framework entry points.
//!
//! Hardware is reached only through the traits of `libmgr_driver_api`.

#![cfg_attr(not(test), no_std)]

pub mod component;
pub mod config;
pub mod error;
pub mod id;
pub mod installer;
pub mod instance;
pub mod manager;
pub mod module;
pub mod registry;
pub mod segment;
pub mod storage;
pub mod transfer;

pub use config::{LoaderConfig, StorageTier};
pub use error::LoaderError;
pub use id::{ComponentId, InstanceId, LibraryId, ModuleId};
pub use installer::Installer;
pub use instance::{InstanceAllocator, InstanceSlice, instance_address};
pub use manager::LibraryManager;
pub use module::ModuleLoader;
pub use registry::Registry;
pub use segment::{MapGuard, SegmentMapper};
