//! Component driver registry contract.

use libmgr_manifest::Uuid;

use crate::error::DriverError;

/// Class-level description of a loadable module, as registered with the
/// component framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDriverInfo {
    /// Identifying tag the framework matches instantiation requests on.
    pub uuid: Uuid,
    /// Compound module id the framework hands back on instantiation.
    pub module_id: u32,
}

/// Registry of component driver classes.
pub trait ComponentRegistry: Send + Sync {
    /// Registers a driver class.
    fn register(&self, info: &ComponentDriverInfo) -> Result<(), DriverError>;
}
