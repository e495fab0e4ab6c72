//! Read-only partition table access
//!
//! Just enough of GPT, MBR and the Solaris VTOC label to walk the regions
//! a pool may live in. Tables are detected in that order; a VTOC is also
//! what a Solaris2 MBR partition carries inside it.

pub mod gpt;
pub mod mbr;
pub mod vtoc;

use crate::error::{Result, ZfsError};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// Partition table flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// GUID partition table
    Gpt,
    /// DOS master boot record
    Mbr,
    /// Solaris x86 VTOC label
    Vtoc,
}

/// What a partition entry declares itself to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// EFI system partition
    EfiSystem,
    /// EFI/Solaris reserved area
    Reserved,
    /// VTOC boot area
    Boot,
    /// Swap (Solaris or Linux)
    Swap,
    /// VTOC backup slice covering the whole label
    Backup,
    /// MBR Solaris2 container holding a VTOC
    Solaris2,
    /// ZFS (Solaris /usr) partition
    Zfs,
    /// Anything else
    Other,
}

impl PartitionKind {
    /// Can a pool live on this partition?
    pub const fn may_hold_pool(&self) -> bool {
        !matches!(
            self,
            Self::EfiSystem | Self::Reserved | Self::Boot | Self::Swap
        )
    }

    /// Short name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EfiSystem => "efi",
            Self::Reserved => "reserved",
            Self::Boot => "boot",
            Self::Swap => "swap",
            Self::Backup => "backup",
            Self::Solaris2 => "solaris2",
            Self::Zfs => "zfs",
            Self::Other => "other",
        }
    }
}

/// One used partition entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Device name suffix (`p2`, `s1`, `a`)
    pub name: String,
    /// Declared type
    pub kind: PartitionKind,
    /// First sector, relative to the table's device
    pub start_lba: u64,
    /// Last sector, inclusive
    pub end_lba: u64,
}

impl PartitionEntry {
    /// Length in sectors
    pub fn sectors(&self) -> u64 {
        self.end_lba - self.start_lba + 1
    }
}

/// Partition table read from a device
#[derive(Debug, Clone)]
pub struct PartitionTable {
    kind: TableKind,
    entries: Vec<PartitionEntry>,
}

impl PartitionTable {
    /// Detect and read the partition table on `io`
    ///
    /// `total_sectors` bounds the entries; anything running past the end
    /// of the device is dropped.
    pub fn open<B: BlockIo>(io: &mut B, total_sectors: u64) -> Result<Self> {
        let secsz = io.block_size().to_u32() as usize;
        if secsz < 512 || total_sectors < 2 {
            return Err(ZfsError::NotFound);
        }

        let mut sector0 = vec![0u8; secsz];
        io.read_blocks(Lba(0), &mut sector0)
            .map_err(|_| ZfsError::IoError)?;

        let (kind, mut entries) = if mbr::is_protective(&sector0) {
            (TableKind::Gpt, gpt::read_entries(io, secsz)?)
        } else {
            let mut sector1 = vec![0u8; secsz];
            io.read_blocks(Lba(1), &mut sector1)
                .map_err(|_| ZfsError::IoError)?;
            if let Some(entries) = vtoc::parse(&sector1) {
                (TableKind::Vtoc, entries)
            } else if let Some(entries) = mbr::parse(&sector0) {
                (TableKind::Mbr, entries)
            } else {
                return Err(ZfsError::NotFound);
            }
        };

        entries.retain(|e| e.end_lba < total_sectors && e.start_lba <= e.end_lba);
        log::debug!(
            "partition table {:?}: {} entries",
            kind,
            entries.len()
        );

        Ok(Self { kind, entries })
    }

    /// Table flavour
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Used entries in table order
    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }
}

pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
