//! GPT entries read through `gpt_disk_io::Disk`

use super::{PartitionEntry, PartitionKind};
use crate::error::{Result, ZfsError};
use crate::vdev::BorrowedBlockIo;
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::{BlockIo, Disk};
use gpt_disk_types::GptPartitionType;
use uguid::guid;

/// Solaris boot partition
pub const SOLARIS_BOOT: GptPartitionType =
    GptPartitionType(guid!("6a82cb45-1dd2-11b2-99a6-080020736631"));
/// Solaris swap partition
pub const SOLARIS_SWAP: GptPartitionType =
    GptPartitionType(guid!("6a87c46f-1dd2-11b2-99a6-080020736631"));
/// Solaris reserved partition
pub const SOLARIS_RESERVED: GptPartitionType =
    GptPartitionType(guid!("6a945a3b-1dd2-11b2-99a6-080020736631"));
/// Solaris /usr, which is where ZFS pools are created
pub const SOLARIS_USR_ZFS: GptPartitionType =
    GptPartitionType(guid!("6a898cc3-1dd2-11b2-99a6-080020736631"));
/// Linux swap
pub const LINUX_SWAP: GptPartitionType =
    GptPartitionType(guid!("0657fd6d-a4ab-43c4-84e5-0933c84b4f4f"));

/// Map a GPT partition type GUID
pub fn classify(guid: &GptPartitionType) -> PartitionKind {
    if guid == &GptPartitionType::EFI_SYSTEM {
        PartitionKind::EfiSystem
    } else if guid == &SOLARIS_RESERVED {
        PartitionKind::Reserved
    } else if guid == &SOLARIS_BOOT {
        PartitionKind::Boot
    } else if guid == &SOLARIS_SWAP || guid == &LINUX_SWAP {
        PartitionKind::Swap
    } else if guid == &SOLARIS_USR_ZFS {
        PartitionKind::Zfs
    } else {
        PartitionKind::Other
    }
}

/// Read every used entry of the primary GPT
pub fn read_entries<B: BlockIo>(io: &mut B, block_size: usize) -> Result<Vec<PartitionEntry>> {
    let mut disk = Disk::new(BorrowedBlockIo(io)).map_err(|_| ZfsError::IoError)?;

    let mut header_buf = vec![0u8; block_size];
    let header = disk
        .read_primary_gpt_header(&mut header_buf)
        .map_err(|_| ZfsError::NotFound)?;
    if !header.is_signature_valid() {
        return Err(ZfsError::NotFound);
    }
    let layout = header
        .get_partition_entry_array_layout()
        .map_err(|_| ZfsError::NotFound)?;

    let mut entry_buf = vec![0u8; block_size];
    let iter = disk
        .gpt_partition_entry_array_iter(layout, &mut entry_buf)
        .map_err(|_| ZfsError::IoError)?;

    let mut entries = Vec::new();
    for (index, entry_result) in iter.enumerate() {
        let entry = entry_result.map_err(|_| ZfsError::IoError)?;
        if !entry.is_used() {
            continue;
        }

        // Copy the guid to avoid unaligned reference
        let type_guid = entry.partition_type_guid;
        entries.push(PartitionEntry {
            name: format!("p{}", index + 1),
            kind: classify(&type_guid),
            start_lba: entry.starting_lba.to_u64(),
            end_lba: entry.ending_lba.to_u64(),
        });
    }

    Ok(entries)
}
