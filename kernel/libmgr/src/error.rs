//! Loader error types.

use core::fmt;

use libmgr_driver_api::DriverError;
use libmgr_manifest::ManifestError;

/// Status codes reported to the component framework.
pub mod errno {
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Out of memory.
    pub const ENOMEM: i32 = 12;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Operation not supported.
    pub const ENOTSUP: i32 = 134;
    /// Timed out.
    pub const ETIMEDOUT: i32 = 116;
}

/// Errors returned by library manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// A library id, module index, instance id, or size was out of range.
    InvalidArgument,
    /// A mapping or allocation failed.
    OutOfMemory,
    /// A DMA or memory-driver operation failed.
    DeviceError,
    /// The operation is compiled out of this build.
    Unsupported,
    /// The host did not deliver data before the deadline.
    Timeout,
    /// The process-wide manager has not been initialized.
    NotInitialized,
    /// The library image is malformed.
    Manifest(ManifestError),
}

impl LoaderError {
    /// Converts a DMA engine error: everything except a timeout is a
    /// device error.
    pub(crate) fn device(err: DriverError) -> Self {
        match err {
            DriverError::Timeout => Self::Timeout,
            _ => Self::DeviceError,
        }
    }

    /// Returns the negative status code for this error.
    pub const fn errno(self) -> i32 {
        let code = match self {
            Self::InvalidArgument | Self::Manifest(_) => errno::EINVAL,
            Self::OutOfMemory => errno::ENOMEM,
            Self::DeviceError | Self::NotInitialized => errno::ENODEV,
            Self::Unsupported => errno::ENOTSUP,
            Self::Timeout => errno::ETIMEDOUT,
        };
        -code
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::DeviceError => f.write_str("device error"),
            Self::Unsupported => f.write_str("operation not supported"),
            Self::Timeout => f.write_str("transfer timed out"),
            Self::NotInitialized => f.write_str("library manager not initialized"),
            Self::Manifest(e) => write!(f, "malformed library image: {e}"),
        }
    }
}

impl From<DriverError> for LoaderError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::InvalidArgument => Self::InvalidArgument,
            DriverError::OutOfMemory => Self::OutOfMemory,
            DriverError::Unsupported => Self::Unsupported,
            DriverError::Timeout => Self::Timeout,
            DriverError::DeviceNotFound | DriverError::IoError | DriverError::Busy => {
                Self::DeviceError
            }
        }
    }
}

impl From<ManifestError> for LoaderError {
    fn from(err: ManifestError) -> Self {
        Self::Manifest(err)
    }
}

/// Keeps the first error of a multi-step teardown.
///
/// A later failure only surfaces when everything before it succeeded.
pub(crate) fn first_error(
    earlier: Result<(), LoaderError>,
    later: Result<(), LoaderError>,
) -> Result<(), LoaderError> {
    match (earlier, later) {
        (Err(e), Err(late)) => {
            libmgr_core::kerr!("cleanup failed after earlier error ({e}): {late}");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}
