//! Open file handles
//!
//! A `ZfsFile` is an object descriptor plus a seek offset. Sizes are
//! looked up through the backend on every read, so a handle never caches
//! object attributes. Directory handles additionally carry the decode
//! state built by the first `readdir`.

mod readdir;

pub use readdir::DirCursor;

use crate::error::{Result, ZfsError};
use crate::pool::{Pool, PoolBackend};
use crate::types::{Dnode, Stat, Whence};

/// Open file or directory
#[derive(Debug)]
pub struct ZfsFile {
    offset: i64,
    dnode: Dnode,
    cursor: Option<DirCursor>,
}

impl ZfsFile {
    /// Handle positioned at the start of `dnode`
    pub fn new(dnode: Dnode) -> Self {
        Self {
            offset: 0,
            dnode,
            cursor: None,
        }
    }

    /// Object descriptor
    pub fn dnode(&self) -> &Dnode {
        &self.dnode
    }

    /// Current seek offset
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Object attributes
    pub fn stat<P: PoolBackend + ?Sized>(&self, backend: &mut P, pool: &mut Pool) -> Result<Stat> {
        backend.object_stat(pool, &self.dnode)
    }

    /// Read from the current offset, clamped to the object size
    ///
    /// Returns the number of bytes read; zero at or past end of file.
    pub fn read<P: PoolBackend + ?Sized>(
        &mut self,
        backend: &mut P,
        pool: &mut Pool,
        buf: &mut [u8],
    ) -> Result<usize> {
        let size = self.stat(backend, pool)?.size;
        let offset = u64::try_from(self.offset).map_err(|_| ZfsError::InvalidArgument)?;
        if offset >= size {
            return Ok(0);
        }

        let n = (buf.len() as u64).min(size - offset) as usize;
        backend.read_object(pool, &self.dnode, offset, &mut buf[..n])?;
        self.offset += n as i64;
        Ok(n)
    }

    /// Move the seek offset
    ///
    /// The result is not range checked; a negative offset fails on the
    /// next read.
    pub fn seek<P: PoolBackend + ?Sized>(
        &mut self,
        backend: &mut P,
        pool: &mut Pool,
        offset: i64,
        whence: Whence,
    ) -> Result<i64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => self.offset,
            // POSIX: size + offset, not size - offset as some loaders do
            Whence::End => {
                let size = self.stat(backend, pool)?.size;
                i64::try_from(size).map_err(|_| ZfsError::InvalidArgument)?
            }
        };
        self.offset = base
            .checked_add(offset)
            .ok_or(ZfsError::InvalidArgument)?;
        Ok(self.offset)
    }
}
