//! Core types and synchronization primitives for the library manager.
//!
//! This crate holds the host-testable building blocks shared by the
//! manifest parser, the driver contracts, and the loader itself: typed
//! virtual addresses, the leveled logging front-end, and the spin-based
//! lock and one-shot cell used for process-wide state.
//!
//! Nothing here allocates, so the crate is usable from the earliest point
//! of firmware bring-up.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod addr;
pub mod log;
pub mod sync;
