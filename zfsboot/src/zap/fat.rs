//! Fat ZAP header and leaf blocks
//!
//! ```text
//! zap_phys (block 0)   block_type u64 @0, magic u64 @8, ..., num_leafs u64 @64
//! zap_leaf_phys        48-byte header (magic u32 @24)
//!                      u16 hash[1 << (bs - 5)]
//!                      24-byte chunks to the end of the block
//! entry chunk          type u8 @0 (252), value_intlen u8 @1, next u16 @2,
//!                      name_chunk u16 @4, name_numints u16 @6,
//!                      value_chunk u16 @8, value_numints u16 @10,
//!                      cd u32 @12, hash u64 @16
//! array chunk          type u8 @0 (251), bytes[21] @1, next u16 @22
//! ```
//!
//! Names and values are byte arrays chained through array chunks. A name's
//! length counts its terminating NUL. Values are big-endian.

use super::read_u64_le;
use crate::error::{Result, ZfsError};
use crate::types::{DIRENT_NAME_BUF, MAXNAMLEN};
use alloc::string::String;
use alloc::vec::Vec;

/// `zap_magic` of a fat ZAP header
pub const ZAP_MAGIC: u64 = 0x2F52AB2AB;
/// `lh_magic` of a leaf
pub const ZAP_LEAF_MAGIC: u32 = 0x2AB1EAF;

/// Offset of `zap_num_leafs` in the header block
pub const ZAP_NUM_LEAFS_OFFSET: usize = 64;
/// Leaf header length
pub const ZAP_LEAF_HEADER_LEN: usize = 48;
/// Chunk size
pub const ZAP_LEAF_CHUNKSIZE: usize = 24;
/// Bytes of name or value carried by one array chunk
pub const ZAP_LEAF_ARRAY_BYTES: usize = ZAP_LEAF_CHUNKSIZE - 3;
/// End of a chunk chain
pub const CHAIN_END: u16 = 0xffff;

/// Chunk type tags
pub const ZAP_CHUNK_ARRAY: u8 = 251;
pub const ZAP_CHUNK_ENTRY: u8 = 252;
pub const ZAP_CHUNK_FREE: u8 = 253;

const LEAF_MAGIC_OFFSET: usize = 24;

/// Hash table slots in a leaf of `block_size` bytes
pub const fn hash_entries(block_size: usize) -> usize {
    block_size / 32
}

/// Usable chunks in a leaf of `block_size` bytes
pub const fn num_chunks(block_size: usize) -> usize {
    (block_size - 2 * hash_entries(block_size)) / ZAP_LEAF_CHUNKSIZE - 2
}

/// Offset of the first chunk in a leaf
pub const fn chunks_offset(block_size: usize) -> usize {
    ZAP_LEAF_HEADER_LEN + 2 * hash_entries(block_size)
}

/// Header prefix covering every field read here
pub const ZAP_HEADER_LEN: usize = ZAP_NUM_LEAFS_OFFSET + 8;
const HEADER_MAGIC_OFFSET: usize = 8;

/// `zap_num_leafs` of a header block prefix, `None` on a bad `zap_magic`
pub fn header_num_leafs(header: &[u8]) -> Option<u64> {
    if header.len() < ZAP_HEADER_LEN || read_u64_le(header, HEADER_MAGIC_OFFSET) != ZAP_MAGIC {
        return None;
    }
    Some(read_u64_le(header, ZAP_NUM_LEAFS_OFFSET))
}

/// Whether a block carries the leaf magic
pub fn is_leaf(data: &[u8]) -> bool {
    data.len() >= LEAF_MAGIC_OFFSET + 4
        && u32::from_le_bytes([
            data[LEAF_MAGIC_OFFSET],
            data[LEAF_MAGIC_OFFSET + 1],
            data[LEAF_MAGIC_OFFSET + 2],
            data[LEAF_MAGIC_OFFSET + 3],
        ]) == ZAP_LEAF_MAGIC
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Entry chunk fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub value_intlen: u8,
    pub name_chunk: u16,
    pub name_numints: u16,
    pub value_chunk: u16,
    pub value_numints: u16,
    pub cd: u32,
    pub hash: u64,
}

/// Read-only view of one leaf block
pub struct Leaf<'a> {
    data: &'a [u8],
}

impl<'a> Leaf<'a> {
    /// Wrap a leaf buffer; the block size must be a power of two
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let bs = data.len();
        if bs < 512 || !bs.is_power_of_two() {
            return Err(ZfsError::IoError);
        }
        if !is_leaf(data) {
            return Err(ZfsError::IoError);
        }
        Ok(Self { data })
    }

    /// Number of chunks
    pub fn num_chunks(&self) -> usize {
        num_chunks(self.data.len())
    }

    fn chunk(&self, index: u16) -> Result<&'a [u8]> {
        let index = index as usize;
        if index >= self.num_chunks() {
            return Err(ZfsError::IoError);
        }
        let start = chunks_offset(self.data.len()) + index * ZAP_LEAF_CHUNKSIZE;
        Ok(&self.data[start..start + ZAP_LEAF_CHUNKSIZE])
    }

    /// Decode chunk `index` if it is a live entry
    pub fn entry(&self, index: usize) -> Result<Option<LeafEntry>> {
        let index = u16::try_from(index).map_err(|_| ZfsError::IoError)?;
        let c = self.chunk(index)?;
        if c[0] != ZAP_CHUNK_ENTRY {
            return Ok(None);
        }
        Ok(Some(LeafEntry {
            value_intlen: c[1],
            name_chunk: read_u16_le(c, 4),
            name_numints: read_u16_le(c, 6),
            value_chunk: read_u16_le(c, 8),
            value_numints: read_u16_le(c, 10),
            cd: u32::from_le_bytes([c[12], c[13], c[14], c[15]]),
            hash: read_u64_le(c, 16),
        }))
    }

    /// Collect up to `len` bytes of the array chain starting at `first`
    fn array_bytes(&self, first: u16, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|_| ZfsError::OutOfMemory)?;

        let mut next = first;
        while out.len() < len {
            if next == CHAIN_END {
                return Err(ZfsError::IoError);
            }
            let c = self.chunk(next)?;
            if c[0] != ZAP_CHUNK_ARRAY {
                return Err(ZfsError::IoError);
            }
            let take = (len - out.len()).min(ZAP_LEAF_ARRAY_BYTES);
            out.extend_from_slice(&c[1..1 + take]);
            next = read_u16_le(c, 22);
        }
        Ok(out)
    }

    /// Reassemble an entry's name
    ///
    /// At most `DIRENT_NAME_BUF` bytes are read from the chain and the
    /// result is cut at the terminator, so it never exceeds `MAXNAMLEN`.
    pub fn name(&self, entry: &LeafEntry) -> Result<String> {
        let len = (entry.name_numints as usize).min(DIRENT_NAME_BUF);
        let bytes = self.array_bytes(entry.name_chunk, len)?;
        let end = bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(bytes.len())
            .min(MAXNAMLEN);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// First integer of an entry's value, big-endian
    pub fn value(&self, entry: &LeafEntry) -> Result<u64> {
        let len = (entry.value_intlen as usize).min(8);
        let bytes = self.array_bytes(entry.value_chunk, len)?;
        Ok(bytes.iter().fold(0u64, |v, &b| (v << 8) | b as u64))
    }
}
