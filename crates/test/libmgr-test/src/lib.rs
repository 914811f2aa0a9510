//! Host-side test doubles for the library manager.
//!
//! Every collaborator trait of `libmgr_driver_api` has a fake here that
//! records what was asked of it and can be told to fail. [`FakePlatform`]
//! bundles one of each into a [`FirmwareServices`] implementation whose
//! fakes share a [`Journal`], so tests can assert the order in which
//! resources were acquired and released across collaborators.
//!
//! [`FirmwareServices`]: libmgr_driver_api::FirmwareServices

mod clock;
mod components;
mod dma;
pub mod log;
mod memory;
mod platform;
mod pools;

pub use clock::FakeClock;
pub use components::FakeComponents;
pub use dma::FakeDma;
pub use journal::Journal;
pub use memory::FakeMemory;
pub use platform::{FakePlatform, MAX_CPU_KHZ};
pub use pools::FakePools;

use std::sync::{Mutex, MutexGuard};

/// Locks a fake's state, ignoring poisoning from an earlier failed test.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
