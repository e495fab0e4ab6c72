//! Leaf vdev I/O
//!
//! A leaf vdev is any region the pool reads from by byte offset. The
//! sector adapter turns a `gpt_disk_io::BlockIo` device into one.

pub mod sector;

pub use sector::SectorIo;

use crate::error::Result;
use alloc::boxed::Box;
use alloc::string::String;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

/// Byte-addressed access to a leaf vdev
pub trait VdevIo {
    /// Native sector size in bytes
    fn sector_size(&self) -> usize;

    /// Size of the region in bytes
    fn media_size(&mut self) -> Result<u64>;

    /// Fill `buf` from byte `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Store `buf` at byte `offset`
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
}

/// Leaf vdev attached to a pool
pub struct Vdev {
    /// Vdev GUID from the label
    pub guid: u64,
    /// `phys_path` label entry, if present
    pub phys_path: Option<String>,
    /// `devid` label entry, if present
    pub devid: Option<String>,
    io: Box<dyn VdevIo>,
}

impl Vdev {
    /// Attach I/O to a labelled vdev
    pub fn new(
        guid: u64,
        phys_path: Option<String>,
        devid: Option<String>,
        io: Box<dyn VdevIo>,
    ) -> Self {
        Self {
            guid,
            phys_path,
            devid,
            io,
        }
    }

    /// Device I/O
    pub fn io(&mut self) -> &mut dyn VdevIo {
        self.io.as_mut()
    }
}

impl core::fmt::Debug for Vdev {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vdev")
            .field("guid", &self.guid)
            .field("phys_path", &self.phys_path)
            .field("devid", &self.devid)
            .finish_non_exhaustive()
    }
}

/// Reborrowed block device, so a table reader can run over a device the
/// caller keeps
pub(crate) struct BorrowedBlockIo<'a, B: BlockIo>(pub(crate) &'a mut B);

impl<'a, B: BlockIo> BlockIo for BorrowedBlockIo<'a, B> {
    type Error = B::Error;

    fn block_size(&self) -> BlockSize {
        self.0.block_size()
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        self.0.num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.0.read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), Self::Error> {
        self.0.write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        self.0.flush()
    }
}
