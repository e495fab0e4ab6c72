//! Directory enumeration over micro and fat ZAP objects
//!
//! The cursor is chosen from the object's first word on the first call and
//! kept in the handle; later calls resume from it.

use super::ZfsFile;
use crate::error::{Result, ZfsError};
use crate::pool::{Pool, PoolBackend};
use crate::types::{DirEntry, Dnode};
use crate::zap::fat::{self, Leaf};
use crate::zap::micro::{self, MicroEntry, MZAP_ENT_LEN, MZAP_HEADER_LEN};
use crate::zap::{dirent_object, dirent_type, ZapKind};
use alloc::vec::Vec;

/// Directory decode state, picked once from the object's first word
#[derive(Debug)]
pub enum DirCursor {
    /// Byte offset of the next slot
    Micro { pos: u64 },
    /// `pos` is `leaf block * block size + chunk index`; `leaf` holds the
    /// block `pos` points into
    Fat {
        pos: u64,
        num_leafs: u64,
        leaf: Vec<u8>,
    },
}

fn read_word<P: PoolBackend + ?Sized>(
    backend: &mut P,
    pool: &mut Pool,
    dnode: &Dnode,
    offset: u64,
) -> Result<u64> {
    let mut word = [0u8; 8];
    backend.read_object(pool, dnode, offset, &mut word)?;
    Ok(u64::from_le_bytes(word))
}

impl DirCursor {
    fn open<P: PoolBackend + ?Sized>(backend: &mut P, pool: &mut Pool, dnode: &Dnode) -> Result<Self> {
        match ZapKind::from_block_type(read_word(backend, pool, dnode, 0)?)? {
            ZapKind::Micro => Ok(Self::Micro {
                pos: MZAP_HEADER_LEN as u64,
            }),
            ZapKind::Fat => {
                let bsize = dnode.block_size;
                let mut header = [0u8; fat::ZAP_HEADER_LEN];
                backend.read_object(pool, dnode, 0, &mut header)?;
                let num_leafs = fat::header_num_leafs(&header).ok_or_else(|| {
                    log::debug!("fat zap object {}: bad header magic", dnode.object);
                    ZfsError::IoError
                })?;

                let mut leaf = Vec::new();
                leaf.try_reserve_exact(bsize)
                    .map_err(|_| ZfsError::OutOfMemory)?;
                leaf.resize(bsize, 0);

                // Leaves follow the header block
                let pos = bsize as u64;
                if num_leafs > 0 {
                    backend.read_object(pool, dnode, pos, &mut leaf)?;
                }
                log::trace!("fat zap object {}: {} leaves", dnode.object, num_leafs);
                Ok(Self::Fat {
                    pos,
                    num_leafs,
                    leaf,
                })
            }
        }
    }
}

impl ZfsFile {
    /// Next directory entry, `None` at the end
    pub fn readdir<P: PoolBackend + ?Sized>(
        &mut self,
        backend: &mut P,
        pool: &mut Pool,
    ) -> Result<Option<DirEntry>> {
        if !self.stat(backend, pool)?.is_dir() {
            return Err(ZfsError::NotDirectory);
        }

        if self.cursor.is_none() {
            self.cursor = Some(DirCursor::open(backend, pool, &self.dnode)?);
        }

        let dnode = self.dnode;
        match self.cursor.as_mut() {
            Some(DirCursor::Micro { pos }) => next_micro(backend, pool, &dnode, pos),
            Some(DirCursor::Fat {
                pos,
                num_leafs,
                leaf,
            }) => next_fat(backend, pool, &dnode, pos, *num_leafs, leaf),
            None => Ok(None),
        }
    }
}

fn next_micro<P: PoolBackend + ?Sized>(
    backend: &mut P,
    pool: &mut Pool,
    dnode: &Dnode,
    pos: &mut u64,
) -> Result<Option<DirEntry>> {
    let end = (MZAP_HEADER_LEN + micro::slot_count(dnode.block_size) * MZAP_ENT_LEN) as u64;
    let mut slot = [0u8; MZAP_ENT_LEN];

    while *pos < end {
        backend.read_object(pool, dnode, *pos, &mut slot)?;
        *pos += MZAP_ENT_LEN as u64;

        if let Some(entry) = MicroEntry::parse(&slot) {
            return Ok(Some(DirEntry {
                fileno: dirent_object(entry.value),
                kind: dirent_type(entry.value),
                name: entry.name,
            }));
        }
    }

    Ok(None)
}

fn next_fat<P: PoolBackend + ?Sized>(
    backend: &mut P,
    pool: &mut Pool,
    dnode: &Dnode,
    pos: &mut u64,
    num_leafs: u64,
    leaf: &mut Vec<u8>,
) -> Result<Option<DirEntry>> {
    let bsize = dnode.block_size as u64;
    let chunks = fat::num_chunks(dnode.block_size) as u64;

    loop {
        if *pos / bsize > num_leafs {
            return Ok(None);
        }

        let mut chunk = *pos & (bsize - 1);
        if chunk >= chunks {
            // Next leaf block
            *pos = (*pos & !(bsize - 1)) + bsize;
            chunk = 0;
            if *pos / bsize > num_leafs {
                return Ok(None);
            }
            #[cfg(feature = "trace-io")]
            log::trace!("fat zap object {}: leaf {}", dnode.object, *pos / bsize);
            backend.read_object(pool, dnode, *pos, leaf.as_mut_slice())?;
        }

        if !fat::is_leaf(leaf.as_slice()) {
            log::debug!("fat zap object {}: block {} is not a leaf", dnode.object, *pos / bsize);
            *pos = (*pos & !(bsize - 1)) + chunks;
            continue;
        }

        *pos += 1;
        let view = Leaf::new(leaf.as_slice())?;
        let entry = match view.entry(chunk as usize)? {
            Some(entry) => entry,
            None => continue,
        };

        let value = view.value(&entry)?;
        return Ok(Some(DirEntry {
            fileno: dirent_object(value),
            kind: dirent_type(value),
            name: view.name(&entry)?,
        }));
    }
}
