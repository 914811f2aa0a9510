//! Synchronization primitives.
//!
//! Provides [`SpinLock`] for serializing registry and reference-counter
//! mutations, and [`OnceCell`] for process-wide state that is established
//! exactly once at runtime. Both are const-constructible so they can live in
//! `static` items.

mod once;
mod spinlock;

pub(crate) mod loom_compat;

pub use once::OnceCell;
pub use spinlock::{SpinLock, SpinLockGuard};
