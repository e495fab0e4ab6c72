//! Pool discovery on disks and partitions
//!
//! A whole disk is probed by walking its partition table: every entry
//! that may hold a pool is opened through the host and handed to the
//! backend's label reader. A Solaris2 MBR partition that is not a vdev
//! itself is searched for a nested VTOC. Per-partition failures are only
//! logged; the disk probe fails when nothing was recognised at all.

use super::{PoolBackend, PoolRegistry};
use crate::error::{Result, ZfsError};
use crate::partition::{PartitionEntry, PartitionKind, PartitionTable, TableKind};
use crate::vdev::SectorIo;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use gpt_disk_io::BlockIo;

/// Loader device name: a base disk name plus partition suffixes
///
/// `disk0` with suffixes `s1`, `a` renders as `disk0s1a:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath {
    base: String,
    parts: Vec<String>,
}

impl DevicePath {
    /// Whole-disk path
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            parts: Vec::new(),
        }
    }

    /// Path of a partition of this device
    pub fn child(&self, suffix: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(suffix.to_string());
        Self {
            base: self.base.clone(),
            parts,
        }
    }

    /// Disk name without partition suffixes
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Partition suffixes, outermost first
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Is this a whole disk?
    pub fn is_disk(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for part in &self.parts {
            f.write_str(part)?;
        }
        f.write_str(":")
    }
}

/// Partition context the loader already resolved for a device name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskContext {
    /// Partition number within the slice
    pub partition: Option<u32>,
    /// MBR slice number
    pub slice: Option<u32>,
}

impl DiskContext {
    /// Does the name already pin a single partition?
    pub fn is_partition(&self) -> bool {
        self.partition.is_some() && self.slice.is_some()
    }
}

/// Loader device table
pub trait DeviceHost {
    /// Block device handed out by `open`
    type Device: BlockIo + 'static;

    /// Whole disks to probe at init
    fn disks(&mut self) -> Vec<DevicePath>;

    /// Open a disk or partition by name
    fn open(&mut self, path: &DevicePath) -> Result<Self::Device>;

    /// Partition context of a device name, if the loader can tell
    fn disk_context(&mut self, path: &DevicePath) -> Option<DiskContext>;
}

/// Try the label reader on a region and attach it on success
///
/// The device is handed back when it is not a vdev.
pub fn try_attach<P, B>(
    backend: &mut P,
    registry: &mut PoolRegistry,
    mut io: SectorIo<B>,
) -> core::result::Result<u64, SectorIo<B>>
where
    P: PoolBackend + ?Sized,
    B: BlockIo + 'static,
{
    match backend.read_label(&mut io) {
        Ok(label) => Ok(registry.attach(label, Box::new(io))),
        Err(_) => Err(io),
    }
}

/// Recognise a pool directly on a region
pub fn probe<P, B>(backend: &mut P, registry: &mut PoolRegistry, mut io: SectorIo<B>) -> Result<u64>
where
    P: PoolBackend + ?Sized,
    B: BlockIo + 'static,
{
    let label = backend.read_label(&mut io)?;
    Ok(registry.attach(label, Box::new(io)))
}

/// Probe a whole device and its partitions
pub fn probe_device<P, H>(
    backend: &mut P,
    registry: &mut PoolRegistry,
    host: &mut H,
    path: &DevicePath,
) -> Result<u64>
where
    P: PoolBackend + ?Sized,
    H: DeviceHost,
{
    let device = host.open(path).map_err(|_| ZfsError::NotFound)?;
    let mut io = SectorIo::new(device);

    // Whole disks are never probed as vdevs, only named partitions
    if host.disk_context(path).map_or(false, |c| c.is_partition()) {
        match try_attach(backend, registry, io) {
            Ok(guid) => return Ok(guid),
            Err(back) => io = back,
        }
    }

    let total = io.total_sectors()?;
    log::debug!(
        "probing {}: {} sectors of {} bytes",
        path,
        total,
        io.sector_bytes()
    );

    let mut found = None;
    match PartitionTable::open(io.inner_mut(), total) {
        Ok(table) => {
            for entry in table.entries() {
                probe_partition(backend, registry, host, path, entry, &mut found);
            }
        }
        Err(e) => log::debug!("{}: no partition table ({})", path, e),
    }

    found.ok_or(ZfsError::NotFound)
}

fn probe_partition<P, H>(
    backend: &mut P,
    registry: &mut PoolRegistry,
    host: &mut H,
    parent: &DevicePath,
    entry: &PartitionEntry,
    found: &mut Option<u64>,
) where
    P: PoolBackend + ?Sized,
    H: DeviceHost,
{
    let path = parent.child(&entry.name);
    if !entry.kind.may_hold_pool() {
        log::debug!("{}: skipping {} partition", path, entry.kind.name());
        return;
    }

    let device = match host.open(&path) {
        Ok(device) => device,
        Err(e) => {
            log::debug!("{}: open failed ({})", path, e);
            return;
        }
    };

    let mut io = match try_attach(backend, registry, SectorIo::new(device)) {
        Ok(guid) => {
            log::debug!("{}: pool {:#x}", path, guid);
            *found = Some(guid);
            return;
        }
        Err(io) => io,
    };

    if entry.kind != PartitionKind::Solaris2 {
        return;
    }

    match PartitionTable::open(io.inner_mut(), entry.sectors()) {
        Ok(table) if table.kind() == TableKind::Vtoc => {
            for nested in table.entries() {
                probe_partition(backend, registry, host, &path, nested, found);
            }
        }
        Ok(table) => log::debug!("{}: ignoring nested {:?} table", path, table.kind()),
        Err(_) => log::debug!("{}: no nested table", path),
    }
}
