//! ZAP directory object decoding
//!
//! The first word of a ZAP object names its encoding: a micro ZAP is one
//! block of fixed 64-byte slots, a fat ZAP is a header block followed by
//! hash leaves. All multi-byte header fields are little-endian.

pub mod fat;
pub mod micro;

use crate::error::{Result, ZfsError};
use crate::types::DirentType;

/// Fat ZAP leaf block
pub const ZBT_LEAF: u64 = 1 << 63;
/// Fat ZAP header block
pub const ZBT_HEADER: u64 = (1 << 63) + 1;
/// Micro ZAP block
pub const ZBT_MICRO: u64 = (1 << 63) + 3;

/// Directory encoding, fixed for the life of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZapKind {
    Micro,
    Fat,
}

impl ZapKind {
    /// Encoding for the object's first word
    pub fn from_block_type(word: u64) -> Result<Self> {
        match word {
            ZBT_MICRO => Ok(Self::Micro),
            ZBT_HEADER => Ok(Self::Fat),
            other => {
                log::debug!("unknown zap block type {:#x}", other);
                Err(ZfsError::IoError)
            }
        }
    }
}

const DIRENT_OBJ_MASK: u64 = (1 << 48) - 1;

/// Object number of a packed directory entry value (bits 0..48)
pub const fn dirent_object(value: u64) -> u64 {
    value & DIRENT_OBJ_MASK
}

/// Entry type of a packed directory entry value (bits 60..64)
pub const fn dirent_type(value: u64) -> DirentType {
    DirentType::from_bits((value >> 60) as u8)
}

pub(crate) fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(word)
}
