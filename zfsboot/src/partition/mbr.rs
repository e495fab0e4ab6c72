//! DOS master boot record, primary entries only

use super::{read_u32_le, PartitionEntry, PartitionKind};
use alloc::format;
use alloc::vec::Vec;

const SIGNATURE_OFFSET: usize = 510;
const TABLE_OFFSET: usize = 446;
const ENTRY_SIZE: usize = 16;
const ENTRY_COUNT: usize = 4;

/// GPT protective entry
pub const TYPE_PROTECTIVE: u8 = 0xEE;
/// EFI system partition
pub const TYPE_EFI: u8 = 0xEF;
/// Solaris2 container (holds a VTOC)
pub const TYPE_SOLARIS2: u8 = 0xBF;
/// Linux swap, also the legacy Solaris id
pub const TYPE_SWAP: u8 = 0x82;

fn has_signature(sector: &[u8]) -> bool {
    sector.len() >= 512 && sector[SIGNATURE_OFFSET] == 0x55 && sector[SIGNATURE_OFFSET + 1] == 0xAA
}

fn entry_type(sector: &[u8], index: usize) -> u8 {
    sector[TABLE_OFFSET + index * ENTRY_SIZE + 4]
}

/// Does sector 0 hold a GPT protective MBR?
pub fn is_protective(sector: &[u8]) -> bool {
    has_signature(sector) && (0..ENTRY_COUNT).any(|i| entry_type(sector, i) == TYPE_PROTECTIVE)
}

fn classify(part_type: u8) -> PartitionKind {
    match part_type {
        TYPE_EFI => PartitionKind::EfiSystem,
        TYPE_SOLARIS2 => PartitionKind::Solaris2,
        TYPE_SWAP => PartitionKind::Swap,
        _ => PartitionKind::Other,
    }
}

/// Parse the four primary entries, `None` without a valid MBR
pub fn parse(sector: &[u8]) -> Option<Vec<PartitionEntry>> {
    if !has_signature(sector) {
        return None;
    }

    let mut entries = Vec::new();
    for i in 0..ENTRY_COUNT {
        let base = TABLE_OFFSET + i * ENTRY_SIZE;
        let status = sector[base];
        if status != 0x00 && status != 0x80 {
            // Boot code, not a partition table
            return None;
        }

        let part_type = sector[base + 4];
        let start = read_u32_le(sector, base + 8) as u64;
        let count = read_u32_le(sector, base + 12) as u64;
        if part_type == 0 || count == 0 {
            continue;
        }

        entries.push(PartitionEntry {
            name: format!("s{}", i + 1),
            kind: classify(part_type),
            start_lba: start,
            end_lba: start + count - 1,
        });
    }

    Some(entries)
}
