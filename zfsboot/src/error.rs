//! Error types for ZFS boot operations

use core::fmt;

/// Result type for ZFS boot operations
pub type Result<T> = core::result::Result<T, ZfsError>;

/// Errors that can occur while probing, reading or configuring a pool
///
/// End of directory is not an error: `readdir` returns `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZfsError {
    /// Operation invoked on a device that is not a ZFS device
    NotSupported,

    /// Pool, dataset, key, partition or directory entry absent
    NotFound,

    /// Required cached structure (boot environment, nvstore) not present
    Unavailable,

    /// Object is not a directory
    NotDirectory,

    /// Malformed device spec, wrong-sized typed value, unparsable text
    InvalidArgument,

    /// Underlying transfer failed or returned short
    IoError,

    /// Scratch buffer allocation failed
    OutOfMemory,
}

impl ZfsError {
    /// Get a human-readable description of the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "Operation not supported on this device",
            Self::NotFound => "No such pool, dataset, key or entry",
            Self::Unavailable => "Boot environment not available",
            Self::NotDirectory => "Not a directory",
            Self::InvalidArgument => "Invalid argument",
            Self::IoError => "I/O error",
            Self::OutOfMemory => "Out of memory",
        }
    }
}

impl fmt::Display for ZfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
