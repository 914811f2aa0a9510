//! One-shot initialization cell for `no_std`.
//!
//! [`OnceCell`] is written at most once, at runtime, and read freely after
//! that. It backs the process-wide library manager: the firmware services
//! it depends on only exist once bring-up has run, so a const initializer
//! (as `LazyLock` would need) is not available.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use super::loom_compat::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;
/// The init closure panicked. Only observable with `panic = unwind`
/// (host tests); firmware builds abort on the first panic.
const POISONED: u8 = 3;

/// A cell that is initialized at most once.
///
/// If several contexts race to initialize, one wins and the others spin
/// until the winner's value is ready, then observe that value.
pub struct OnceCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: The atomic state machine ensures the value is fully written before
// any reader can observe READY, and that it is written by exactly one context.
unsafe impl<T: Send + Sync> Send for OnceCell<T> {}
unsafe impl<T: Send + Sync> Sync for OnceCell<T> {}

/// Poisons the cell if dropped without completing init.
struct InitGuard<'a> {
    state: &'a AtomicU8,
}

impl InitGuard<'_> {
    fn defuse(self) {
        core::mem::forget(self);
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.state.store(POISONED, Ordering::Release);
    }
}

impl<T> OnceCell<T> {
    /// Creates an empty cell.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Creates an empty cell.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns the value if the cell has been initialized.
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: State is READY, so the value is fully initialized and
            // never written again.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns the value, initializing it with `init` if the cell is empty.
    ///
    /// `init` runs at most once across all callers. Callers that lose the
    /// race get the winner's value and their closure is never run.
    ///
    /// # Panics
    ///
    /// Panics if a previous initializer panicked.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        match self.state.compare_exchange(
            UNINIT,
            INITIALIZING,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                let guard = InitGuard { state: &self.state };
                let value = init();
                // SAFETY: We are the only context in INITIALIZING state.
                unsafe { (*self.value.get()).write(value) };
                self.state.store(READY, Ordering::Release);
                guard.defuse();
            }
            Err(POISONED) => panic!("OnceCell poisoned: init closure panicked"),
            Err(_) => self.wait_ready(),
        }
        // SAFETY: State is READY: either we wrote it above or waited for it.
        unsafe { (*self.value.get()).assume_init_ref() }
    }

    /// Returns `true` if the cell holds a value.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    fn wait_ready(&self) {
        loop {
            match self.state.load(Ordering::Acquire) {
                READY => return,
                POISONED => panic!("OnceCell poisoned: init closure panicked"),
                _ => {
                    #[cfg(loom)]
                    loom::thread::yield_now();
                    #[cfg(not(loom))]
                    core::hint::spin_loop();
                }
            }
        }
    }
}

impl<T> Default for OnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceCell<T> {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY means the value was written and never dropped.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}
