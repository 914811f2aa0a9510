//! Library manager facade.
//!
//! [`LibraryManager`] owns the registry and serializes access to it: module
//! allocation and freeing take the registry lock for the whole operation,
//! so counter updates and shared-code mapping never interleave. Library
//! installation is serialized by a separate lock and only takes the
//! registry lock to commit.

use libmgr_core::sync::SpinLock;
use libmgr_core::{kdebug, kerr, kinfo};
use libmgr_driver_api::FirmwareServices;

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::id::{ComponentId, LibraryId, ModuleId};
use crate::installer::Installer;
use crate::instance::InstanceAllocator;
use crate::module::ModuleLoader;
use crate::registry::Registry;
use crate::segment::SegmentMapper;

/// The dynamic library manager.
pub struct LibraryManager {
    services: &'static dyn FirmwareServices,
    config: LoaderConfig,
    registry: SpinLock<Registry>,
    install_lock: SpinLock<()>,
}

impl LibraryManager {
    /// Creates a manager with an empty registry.
    pub fn new(services: &'static dyn FirmwareServices, config: LoaderConfig) -> Self {
        Self {
            services,
            config,
            registry: SpinLock::new(Registry::new()),
            install_lock: SpinLock::new(()),
        }
    }

    /// Returns the manager's configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn mapper(&self) -> SegmentMapper<'static> {
        SegmentMapper::new(self.services.memory())
    }

    /// Allocates the instance of `component`, loading its module first if
    /// no other instance of that module is allocated.
    ///
    /// Returns the module's entry point. If the instance cannot be
    /// allocated, only what this call mapped is undone.
    ///
    /// # Errors
    ///
    /// Returns the module load error, [`LoaderError::OutOfMemory`] if
    /// `requested_pages` exceeds the instance's working memory, or
    /// [`LoaderError::InvalidArgument`] for an invalid or already allocated
    /// instance.
    pub fn allocate_module(
        &self,
        component: ComponentId,
        requested_pages: u32,
    ) -> Result<u32, LoaderError> {
        let module = component.module();
        let instance = component.instance();
        let mut registry = self.registry.lock();
        let (_, entry) = registry.resolve(module)?;
        let first = registry.attach_instance(module)? == 1;
        let mut loader = ModuleLoader::new(&mut registry, self.mapper());

        if first {
            if let Err(e) = loader.load_module(module) {
                registry.detach_instance(module);
                return Err(e);
            }
        }

        match InstanceAllocator::new(self.mapper()).allocate(&entry, instance, requested_pages) {
            Ok(entry_point) => {
                kdebug!("component {component}: module {module} instance {instance}");
                Ok(entry_point)
            }
            Err(e) => {
                if first {
                    if let Err(undo) = loader.unload_module(module) {
                        kerr!("unload of {module} after failed allocation: {undo}");
                    }
                }
                registry.detach_instance(module);
                Err(e)
            }
        }
    }

    /// Frees the instance of `component`, unloading its module once no
    /// instance of it remains.
    ///
    /// A failed instance unmap leaves the module resident.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if the library is not
    /// installed, the module has no allocated instance or the instance id
    /// is invalid, or an unmap failure.
    pub fn free_module(&self, component: ComponentId) -> Result<(), LoaderError> {
        let module = component.module();
        let instance = component.instance();
        let mut registry = self.registry.lock();
        let (_, entry) = registry.resolve(module)?;
        if registry.instance_count(module) == 0 {
            kerr!("component {component}: module {module} has no allocated instance");
            return Err(LoaderError::InvalidArgument);
        }

        InstanceAllocator::new(self.mapper()).free(&entry, instance)?;
        if registry.detach_instance(module) > 0 {
            return Ok(());
        }
        ModuleLoader::new(&mut registry, self.mapper()).unload_module(module)
    }

    /// Returns the number of allocated instances of module `id`.
    pub fn instance_count(&self, id: ModuleId) -> u32 {
        self.registry.lock().instance_count(id)
    }

    /// Streams library `lib` from host DMA stream `dma_id` and installs it.
    ///
    /// Installs are serialized. Re-installing a slot replaces its image
    /// without freeing the previous one.
    ///
    /// # Errors
    ///
    /// See [`Installer::load_library`].
    pub fn load_library(&self, dma_id: u32, lib: LibraryId) -> Result<(), LoaderError> {
        let _serial = self.install_lock.lock();
        Installer::new(self.services, &self.config)
            .load_library(dma_id, lib, |image| self.registry.lock().install(lib, image))
    }

    /// Installs an image that is already resident, e.g. one linked into
    /// the firmware.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidArgument`] if `lib` is not a loadable
    /// slot, or the descriptor's parse error.
    pub fn install_image(&self, lib: LibraryId, image: &'static [u8]) -> Result<(), LoaderError> {
        if !lib.is_loadable() {
            return Err(LoaderError::InvalidArgument);
        }
        libmgr_manifest::FirmwareDesc::parse(image)?;
        self.registry.lock().install(lib, image)?;
        kinfo!("library {lib} installed from resident image");
        Ok(())
    }

    /// Registers module `id` of an installed library with the component
    /// driver registry.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Unsupported`] when built without the
    /// `module-adapter` feature, [`LoaderError::InvalidArgument`] if the
    /// library is not installed, or the registry's refusal.
    pub fn register_module(&self, id: ModuleId) -> Result<(), LoaderError> {
        #[cfg(feature = "module-adapter")]
        {
            let (_, entry) = self.registry.lock().resolve(id)?;
            let info = libmgr_driver_api::ComponentDriverInfo {
                uuid: entry.uuid,
                module_id: id.as_u32(),
            };
            self.services.components().register(&info)?;
            kinfo!("module {id} registered as {}", entry.uuid);
            Ok(())
        }
        #[cfg(not(feature = "module-adapter"))]
        {
            kerr!("module {id}: component registration not built in");
            Err(LoaderError::Unsupported)
        }
    }

    /// Returns the number of loaded non-shared modules of `lib`.
    pub fn library_load_count(&self, lib: LibraryId) -> u32 {
        self.registry.lock().load_count(lib)
    }

    /// Returns `true` if an image is installed under `lib`.
    pub fn is_installed(&self, lib: LibraryId) -> bool {
        self.registry.lock().get(lib).is_some()
    }

    /// Returns the installed image of `lib`.
    pub fn image(&self, lib: LibraryId) -> Option<&'static [u8]> {
        self.registry.lock().get(lib)
    }
}
