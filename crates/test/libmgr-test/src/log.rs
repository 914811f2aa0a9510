//! Log capture for tests.

use core::fmt;
use std::sync::Mutex;

use libmgr_core::log::{LogLevel, set_log_fn};

use crate::lock;

static CAPTURED: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());

fn sink(level: LogLevel, target: &'static str, args: fmt::Arguments<'_>) {
    lock(&CAPTURED).push((level, format!("{target}: {args}")));
}

/// Routes all log output of the process into the capture buffer.
pub fn capture() {
    // SAFETY: `sink` only pushes into a mutex-guarded Vec.
    unsafe { set_log_fn(sink) };
}

/// Returns every record captured so far, as `(level, "target: message")`.
pub fn captured() -> Vec<(LogLevel, String)> {
    lock(&CAPTURED).clone()
}

/// Returns `true` if an error record containing `needle` was captured.
pub fn logged_error(needle: &str) -> bool {
    lock(&CAPTURED)
        .iter()
        .any(|(level, msg)| *level == LogLevel::Error && msg.contains(needle))
}
