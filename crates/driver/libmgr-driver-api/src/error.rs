//! Collaborator error types.

use core::fmt;

/// Errors reported by firmware collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The device or channel was not found or did not respond.
    DeviceNotFound,
    /// An argument was rejected by the collaborator.
    InvalidArgument,
    /// Memory could not be allocated or mapped.
    OutOfMemory,
    /// An I/O error occurred during a hardware operation.
    IoError,
    /// The resource is in use.
    Busy,
    /// A hardware operation timed out.
    Timeout,
    /// The requested operation is not supported.
    Unsupported,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("device not found"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::IoError => f.write_str("I/O error"),
            Self::Busy => f.write_str("resource busy"),
            Self::Timeout => f.write_str("hardware operation timed out"),
            Self::Unsupported => f.write_str("operation not supported"),
        }
    }
}
