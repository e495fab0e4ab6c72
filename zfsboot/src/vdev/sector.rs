//! Byte-granular access to a sector-addressed block device
//!
//! An access `[offset, offset + len)` is split into up to three pieces:
//! a partial first sector (`head` bytes skipped), a run of whole sectors,
//! and a partial last sector (`tail` bytes past the end). Partial sectors
//! go through a one-sector bounce buffer, read-modify-write when writing.
//! The whole-sector run is transferred in place when the caller's buffer
//! covers it. An access that fits in a single sector only has a head.

use super::VdevIo;
use crate::error::{Result, ZfsError};
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// Round `value` up to a multiple of `sector` (a power of two)
pub fn align_to_sector(value: usize, sector: usize) -> usize {
    (value + sector - 1) & !(sector - 1)
}

/// Sector range covering a byte access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorSpan {
    /// First sector touched
    pub start_sec: u64,
    /// Offset of the first byte within the first sector
    pub head: usize,
    /// Bytes of the last sector past the end of the access
    pub tail: usize,
    /// Bytes covered by whole sectors between head and tail
    pub full: usize,
    /// Whether the last sector is a separate partial sector
    pub partial_tail: bool,
}

impl SectorSpan {
    /// Split `[offset, offset + len)` for a device with `sector` byte sectors
    pub fn new(offset: u64, len: usize, sector: usize) -> Self {
        let start_sec = offset / sector as u64;
        let head = (offset % sector as u64) as usize;
        let total = align_to_sector(head + len, sector);
        let tail = total - (head + len);
        // A single-sector access is always handled as head-only
        let partial_tail = tail > 0 && head + len > sector;

        let mut full = total;
        if head > 0 {
            full -= sector;
        }
        if partial_tail {
            full -= sector;
        }

        Self {
            start_sec,
            head,
            tail,
            full,
            partial_tail,
        }
    }

    /// Whether any part of the access needs the bounce buffer
    pub fn needs_bounce(&self, len: usize, sector: usize) -> bool {
        self.head > 0 || self.partial_tail || len < sector
    }
}

/// Sector I/O adapter over a `gpt_disk_io::BlockIo` device
pub struct SectorIo<B: BlockIo> {
    io: B,
}

impl<B: BlockIo> SectorIo<B> {
    /// Wrap a block device
    pub fn new(io: B) -> Self {
        Self { io }
    }

    /// Get the wrapped device
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.io
    }

    /// Sector size in bytes
    pub fn sector_bytes(&self) -> usize {
        self.io.block_size().to_u32() as usize
    }

    /// Number of sectors on the device
    pub fn total_sectors(&mut self) -> Result<u64> {
        self.io.num_blocks().map_err(|_| ZfsError::IoError)
    }

    fn bounce(sector: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(sector)
            .map_err(|_| ZfsError::OutOfMemory)?;
        buf.resize(sector, 0);
        Ok(buf)
    }

    fn read_sectors(&mut self, sector: u64, dst: &mut [u8]) -> Result<()> {
        #[cfg(feature = "trace-io")]
        log::trace!("sector read lba={} bytes={}", sector, dst.len());
        self.io
            .read_blocks(Lba(sector), dst)
            .map_err(|_| ZfsError::IoError)
    }

    fn write_sectors(&mut self, sector: u64, src: &[u8]) -> Result<()> {
        #[cfg(feature = "trace-io")]
        log::trace!("sector write lba={} bytes={}", sector, src.len());
        self.io
            .write_blocks(Lba(sector), src)
            .map_err(|_| ZfsError::IoError)
    }
}

impl<B: BlockIo> VdevIo for SectorIo<B> {
    fn sector_size(&self) -> usize {
        self.sector_bytes()
    }

    fn media_size(&mut self) -> Result<u64> {
        Ok(self.total_sectors()? * self.sector_bytes() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        if len == 0 {
            return Ok(());
        }

        let secsz = self.sector_bytes();
        let span = SectorSpan::new(offset, len, secsz);
        let mut bounce = if span.needs_bounce(len, secsz) {
            Self::bounce(secsz)?
        } else {
            Vec::new()
        };

        let mut sector = span.start_sec;
        let mut pos = 0usize;

        // Partial data from the first sector
        if span.head > 0 {
            self.read_sectors(sector, &mut bounce)?;
            let n = (secsz - span.head).min(len);
            buf[..n].copy_from_slice(&bounce[span.head..span.head + n]);
            pos += n;
            sector += 1;
        }

        // Whole sectors
        if span.full > 0 {
            if len < span.full {
                self.read_sectors(sector, &mut bounce)?;
                buf[pos..].copy_from_slice(&bounce[..len - pos]);
                pos = len;
            } else {
                self.read_sectors(sector, &mut buf[pos..pos + span.full])?;
                pos += span.full;
                sector += (span.full / secsz) as u64;
            }
        }

        // Partial data from the last sector
        if span.partial_tail {
            self.read_sectors(sector, &mut bounce)?;
            let n = secsz - span.tail;
            buf[pos..pos + n].copy_from_slice(&bounce[..n]);
        }

        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let len = buf.len();
        if len == 0 {
            return Ok(());
        }

        let secsz = self.sector_bytes();
        let span = SectorSpan::new(offset, len, secsz);
        let mut bounce = if span.needs_bounce(len, secsz) {
            Self::bounce(secsz)?
        } else {
            Vec::new()
        };

        let mut sector = span.start_sec;
        let mut pos = 0usize;

        // Splice into the first sector
        if span.head > 0 {
            self.read_sectors(sector, &mut bounce)?;
            let n = (secsz - span.head).min(len);
            bounce[span.head..span.head + n].copy_from_slice(&buf[..n]);
            self.write_sectors(sector, &bounce)?;
            pos += n;
            sector += 1;
        }

        // Whole sectors; a short aligned write (512B into a 4K sector) is
        // still a read-modify-write
        if span.full > 0 {
            if len < span.full {
                self.read_sectors(sector, &mut bounce)?;
                bounce[..len - pos].copy_from_slice(&buf[pos..]);
                self.write_sectors(sector, &bounce)?;
                pos = len;
            } else {
                self.write_sectors(sector, &buf[pos..pos + span.full])?;
                pos += span.full;
                sector += (span.full / secsz) as u64;
            }
        }

        // Splice into the last sector
        if span.partial_tail {
            self.read_sectors(sector, &mut bounce)?;
            let n = secsz - span.tail;
            bounce[..n].copy_from_slice(&buf[pos..pos + n]);
            self.write_sectors(sector, &bounce)?;
        }

        Ok(())
    }
}
