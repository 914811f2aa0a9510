//! Leveled logging front-end.
//!
//! Provides [`klog!`] and the convenience macros (`kerr!`, `kwarn!`,
//! `kinfo!`, `kdebug!`, `ktrace!`). Records are routed through a single
//! registered [`LogFn`]; before [`set_log_fn`] is called, output is
//! silently discarded.
//!
//! Two ceilings apply. [`MAX_LOG_LEVEL`] is fixed at compile time by the
//! `log-debug` / `log-trace` features and lets the optimizer drop verbose
//! call sites entirely. [`set_max_level`] narrows the ceiling at runtime.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels, lower is more severe
// ---------------------------------------------------------------------------

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Error: an operation failed.
    Error = 1,
    /// Warning: unexpected condition, not necessarily an error.
    Warn = 2,
    /// Informational: high-level progress messages.
    Info = 3,
    /// Debug: detailed diagnostic information.
    Debug = 4,
    /// Trace: very verbose, low-level tracing.
    Trace = 5,
}

impl LogLevel {
    /// Returns the human-readable name (fixed-width for aligned output).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 | 1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

/// Most verbose level compiled in.
#[cfg(feature = "log-trace")]
pub const MAX_LOG_LEVEL: LogLevel = LogLevel::Trace;
/// Most verbose level compiled in.
#[cfg(all(feature = "log-debug", not(feature = "log-trace")))]
pub const MAX_LOG_LEVEL: LogLevel = LogLevel::Debug;
/// Most verbose level compiled in.
#[cfg(not(feature = "log-debug"))]
pub const MAX_LOG_LEVEL: LogLevel = LogLevel::Info;

static RUNTIME_LEVEL: AtomicU8 = AtomicU8::new(MAX_LOG_LEVEL as u8);

/// Narrows the runtime log ceiling.
///
/// Levels above [`MAX_LOG_LEVEL`] are clamped: the compile-time ceiling
/// always wins.
pub fn set_max_level(level: LogLevel) {
    let clamped = if level > MAX_LOG_LEVEL { MAX_LOG_LEVEL } else { level };
    RUNTIME_LEVEL.store(clamped as u8, Ordering::Relaxed);
}

/// Returns the current runtime log ceiling.
pub fn max_level() -> LogLevel {
    LogLevel::from_u8(RUNTIME_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if a record at `level` would reach the sink.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level <= MAX_LOG_LEVEL && level as u8 <= RUNTIME_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Registered sink
// ---------------------------------------------------------------------------

/// The signature of the global log function.
///
/// `target` is the module path of the call site.
pub type LogFn = fn(LogLevel, &'static str, fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _target: &'static str, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());

/// Registers the global log function.
///
/// # Safety
///
/// The provided function must be safe to call from any execution context,
/// including while the caller holds the library manager's locks. May be
/// called more than once; later registrations replace earlier ones.
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_log_fn() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: We only ever store valid `LogFn` function pointers into LOG_FN.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

/// Implementation detail for [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, target: &'static str, args: fmt::Arguments<'_>) {
    if enabled(level) {
        load_log_fn()(level, target, args);
    }
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, module_path!(), format_args!($($arg)*))
    };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Trace, $($arg)*) };
}
