//! Core clock scaling contract.

use crate::error::DriverError;

/// Per-core clock adjustment.
///
/// Adjustments are relative requests that the service sums per core.
/// A user that adds `delta` must later subtract exactly `delta`.
pub trait ClockScaling: Send + Sync {
    /// Returns the highest rate a core can run at, in kHz.
    fn max_cpu_khz(&self) -> u32;

    /// Adds `delta_khz` to the rate requested for `core`.
    fn adjust(&self, core: u32, delta_khz: i32) -> Result<(), DriverError>;
}
