//! Clock request ledger.

use std::collections::BTreeMap;
use std::sync::Mutex;

use libmgr_driver_api::{ClockScaling, DriverError};

use crate::{Journal, lock};

#[derive(Default)]
struct State {
    ledger: BTreeMap<u32, i64>,
    calls: Vec<(u32, i32)>,
    fail_on_call: Option<usize>,
}

/// Fake of [`ClockScaling`] that sums adjustments per core.
pub struct FakeClock {
    max_khz: u32,
    state: Mutex<State>,
    journal: Journal,
}

impl FakeClock {
    /// Creates a clock whose cores top out at `max_khz`.
    pub fn new(max_khz: u32) -> Self {
        Self::with_journal(max_khz, Journal::new())
    }

    /// Creates a clock recording into `journal`.
    pub fn with_journal(max_khz: u32, journal: Journal) -> Self {
        Self {
            max_khz,
            state: Mutex::default(),
            journal,
        }
    }

    /// Makes the `n`th adjustment (counting from 1) fail.
    pub fn fail_on_call(&self, n: usize) {
        lock(&self.state).fail_on_call = Some(n);
    }

    /// Returns the net adjustment currently applied to `core`.
    pub fn boost(&self, core: u32) -> i64 {
        lock(&self.state).ledger.get(&core).copied().unwrap_or(0)
    }

    /// Returns the net adjustment summed over all cores.
    pub fn total_boost(&self) -> i64 {
        lock(&self.state).ledger.values().sum()
    }

    /// Returns every adjustment attempted, as `(core, delta)`.
    pub fn calls(&self) -> Vec<(u32, i32)> {
        lock(&self.state).calls.clone()
    }
}

impl ClockScaling for FakeClock {
    fn max_cpu_khz(&self) -> u32 {
        self.max_khz
    }

    fn adjust(&self, core: u32, delta_khz: i32) -> Result<(), DriverError> {
        let mut s = lock(&self.state);
        s.calls.push((core, delta_khz));
        if s.fail_on_call == Some(s.calls.len()) {
            return Err(DriverError::IoError);
        }
        *s.ledger.entry(core).or_default() += i64::from(delta_khz);
        drop(s);
        self.journal.record(format!("clock.adjust {delta_khz:+}"));
        Ok(())
    }
}
