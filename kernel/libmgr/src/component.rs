//! Process-wide manager and component framework entry points.
//!
//! The component framework calls into the loader through plain functions
//! with C-style results: an entry point or zero, a status of zero or a
//! negative errno. They forward to the [`LibraryManager`] established by
//! [`init`].

use libmgr_core::sync::OnceCell;
use libmgr_core::{kerr, kinfo};
use libmgr_driver_api::FirmwareServices;

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::id::{ComponentId, LibraryId, ModuleId};
use crate::manager::LibraryManager;

static MANAGER: OnceCell<LibraryManager> = OnceCell::new();

/// Establishes the process-wide manager.
///
/// Idempotent: later calls return the existing manager and ignore their
/// arguments.
pub fn init(services: &'static dyn FirmwareServices, config: LoaderConfig) -> &'static LibraryManager {
    MANAGER.get_or_init(|| {
        kinfo!("library manager up: {} library slots", crate::config::MAX_LIBRARIES);
        LibraryManager::new(services, config)
    })
}

/// Returns the process-wide manager.
///
/// # Errors
///
/// Returns [`LoaderError::NotInitialized`] before [`init`].
pub fn manager() -> Result<&'static LibraryManager, LoaderError> {
    MANAGER.get().ok_or(LoaderError::NotInitialized)
}

/// Instantiation request as delivered by the component framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantiationConfig {
    /// Packed module and instance id.
    pub id: ComponentId,
    /// Core the instance will run on.
    pub core: u32,
}

/// Module-specific part of an instantiation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleConfig {
    /// Working-memory pages to reserve for the instance.
    pub requested_pages: u32,
}

/// Loads and instantiates a module. Returns its entry point, or zero on
/// failure.
pub fn allocate_module(ipc: &InstantiationConfig, cfg: &ModuleConfig) -> u32 {
    match manager().and_then(|m| m.allocate_module(ipc.id, cfg.requested_pages)) {
        Ok(entry_point) => entry_point,
        Err(e) => {
            kerr!("allocate of component {} failed: {e}", ipc.id);
            0
        }
    }
}

/// Frees a module instance. Returns zero or a negative errno.
pub fn free_module(ipc: &InstantiationConfig) -> i32 {
    status(manager().and_then(|m| m.free_module(ipc.id)))
}

/// Streams and installs a library. Returns zero or a negative errno.
pub fn load_library(dma_id: u32, lib_id: u32) -> i32 {
    status(manager().and_then(|m| m.load_library(dma_id, LibraryId::new(lib_id))))
}

/// Registers a module with the component driver registry. Returns zero or
/// a negative errno.
pub fn register_module(module_id: u32) -> i32 {
    status(manager().and_then(|m| m.register_module(ModuleId::from_raw(module_id))))
}

fn status(result: Result<(), LoaderError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.errno(),
    }
}
