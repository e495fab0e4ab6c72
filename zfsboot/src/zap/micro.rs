//! Micro ZAP slots
//!
//! ```text
//! mzap_phys       64-byte header, then slots to the end of the block
//! mzap_ent_phys   value u64 @0, cd u32 @8, pad u16 @12, name[50] @14
//! ```

use super::read_u64_le;
use crate::types::MAXNAMLEN;
use alloc::string::String;

/// Offset of the first slot
pub const MZAP_HEADER_LEN: usize = 64;
/// Slot size
pub const MZAP_ENT_LEN: usize = 64;
/// Name field size, terminator included
pub const MZAP_NAME_LEN: usize = 50;

const NAME_OFFSET: usize = 14;

/// Number of slots in a block
pub fn slot_count(block_size: usize) -> usize {
    block_size.saturating_sub(MZAP_HEADER_LEN) / MZAP_ENT_LEN
}

/// Decoded slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroEntry {
    pub value: u64,
    pub name: String,
}

impl MicroEntry {
    /// Decode a 64-byte slot; an empty name marks a free slot
    pub fn parse(slot: &[u8]) -> Option<Self> {
        let field = &slot[NAME_OFFSET..NAME_OFFSET + MZAP_NAME_LEN];
        let len = field.iter().position(|&b| b == 0).unwrap_or(MZAP_NAME_LEN);
        if len == 0 {
            return None;
        }

        Some(Self {
            value: read_u64_le(slot, 0),
            name: String::from_utf8_lossy(&field[..len.min(MAXNAMLEN)]).into_owned(),
        })
    }
}
