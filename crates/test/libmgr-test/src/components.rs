//! Component driver registry fake.

use std::sync::Mutex;

use libmgr_driver_api::{ComponentDriverInfo, ComponentRegistry, DriverError};

use crate::lock;

#[derive(Default)]
struct State {
    registered: Vec<ComponentDriverInfo>,
    refuse: bool,
}

/// Fake of [`ComponentRegistry`].
#[derive(Default)]
pub struct FakeComponents {
    state: Mutex<State>,
}

impl FakeComponents {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every registration fail with [`DriverError::Busy`].
    pub fn refuse(&self) {
        lock(&self.state).refuse = true;
    }

    /// Returns the registered driver classes.
    pub fn registered(&self) -> Vec<ComponentDriverInfo> {
        lock(&self.state).registered.clone()
    }
}

impl ComponentRegistry for FakeComponents {
    fn register(&self, info: &ComponentDriverInfo) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        if s.refuse {
            return Err(DriverError::Busy);
        }
        s.registered.push(*info);
        Ok(())
    }
}
