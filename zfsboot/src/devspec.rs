//! Device specifications
//!
//! The loader names a dataset as `:pool[/dataset]:path` after the device
//! name has been stripped, and prints it back as `zfs:pool[/dataset]:`.

use crate::error::{Result, ZfsError};
use crate::types::{DATASET_SEP, DEVSPEC_SEP, ZFS_DEV_NAME};
use alloc::string::{String, ToString};
use core::fmt;

/// Parsed device specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevSpec {
    /// Pool name
    pub pool: String,
    /// Dataset relative to the pool, empty for the pool's root
    pub dataset: String,
    /// Path after the last separator, possibly empty
    pub path: String,
}

impl DevSpec {
    /// Canonical spec for a pool and dataset
    pub fn new(pool: &str, dataset: &str) -> Self {
        Self {
            pool: pool.to_string(),
            dataset: dataset.to_string(),
            path: String::new(),
        }
    }

    /// Parse `:pool[/dataset]:path`
    ///
    /// The last `:` ends the pool part; the first `/` before it splits
    /// off the dataset.
    pub fn parse(text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix(DEVSPEC_SEP)
            .ok_or(ZfsError::InvalidArgument)?;
        let end = rest.rfind(DEVSPEC_SEP).ok_or(ZfsError::InvalidArgument)?;
        let (head, path) = (&rest[..end], &rest[end + 1..]);

        let (pool, dataset) = match head.find(DATASET_SEP) {
            Some(sep) => (&head[..sep], &head[sep + 1..]),
            None => (head, ""),
        };
        if pool.is_empty() {
            return Err(ZfsError::InvalidArgument);
        }

        Ok(Self {
            pool: pool.to_string(),
            dataset: dataset.to_string(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for DevSpec {
    /// `zfs:pool:` or `zfs:pool/dataset:`; the path is not printed
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", ZFS_DEV_NAME, DEVSPEC_SEP, self.pool)?;
        if !self.dataset.is_empty() {
            write!(f, "{}{}", DATASET_SEP, self.dataset)?;
        }
        write!(f, "{}", DEVSPEC_SEP)
    }
}
