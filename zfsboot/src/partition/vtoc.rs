//! Solaris x86 VTOC (`dk_label`), found in sector 1 of a Solaris2 partition
//!
//! Layout of the fields read here:
//! ```text
//!   12   u32 v_sanity   0x600DDEEE
//!   30   u16 v_nparts
//!   72   v_part[16]     { u16 tag, u16 flag, i32 start, i32 size }
//!  508   u16 dkl_magic  0xDABE
//! ```

use super::{read_u16_le, read_u32_le, PartitionEntry, PartitionKind};
use alloc::string::String;
use alloc::vec::Vec;

const SANITY_OFFSET: usize = 12;
const NPARTS_OFFSET: usize = 30;
const PARTS_OFFSET: usize = 72;
const PART_SIZE: usize = 12;
const MAGIC_OFFSET: usize = 508;

/// `v_sanity` value of a valid label
pub const VTOC_SANITY: u32 = 0x600D_DEEE;
/// `dkl_magic` value of a valid label
pub const DKL_MAGIC: u16 = 0xDABE;
/// Maximum slices on x86
pub const NDKMAP: usize = 16;

/// Slice tags
pub const V_BOOT: u16 = 1;
pub const V_SWAP: u16 = 3;
pub const V_BACKUP: u16 = 5;
pub const V_RESERVED: u16 = 11;

fn classify(tag: u16) -> PartitionKind {
    match tag {
        V_BOOT => PartitionKind::Boot,
        V_SWAP => PartitionKind::Swap,
        V_BACKUP => PartitionKind::Backup,
        V_RESERVED => PartitionKind::Reserved,
        _ => PartitionKind::Other,
    }
}

/// Parse the slices of a label sector, `None` if it is not a VTOC
pub fn parse(sector: &[u8]) -> Option<Vec<PartitionEntry>> {
    if sector.len() < 512
        || read_u32_le(sector, SANITY_OFFSET) != VTOC_SANITY
        || read_u16_le(sector, MAGIC_OFFSET) != DKL_MAGIC
    {
        return None;
    }

    let nparts = (read_u16_le(sector, NPARTS_OFFSET) as usize).min(NDKMAP);
    let mut entries = Vec::new();
    for i in 0..nparts {
        let base = PARTS_OFFSET + i * PART_SIZE;
        let tag = read_u16_le(sector, base);
        let start = read_u32_le(sector, base + 4) as i32;
        let size = read_u32_le(sector, base + 8) as i32;
        if size <= 0 || start < 0 {
            continue;
        }

        let mut name = String::new();
        name.push((b'a' + i as u8) as char);
        entries.push(PartitionEntry {
            name,
            kind: classify(tag),
            start_lba: start as u64,
            end_lba: start as u64 + size as u64 - 1,
        });
    }

    Some(entries)
}
