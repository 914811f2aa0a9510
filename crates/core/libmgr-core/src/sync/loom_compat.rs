//! Loom compatibility shim.
//!
//! Under `cfg(loom)`, re-exports loom's atomics so the primitives in this
//! module can be model-checked; otherwise re-exports `core::sync::atomic`.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
