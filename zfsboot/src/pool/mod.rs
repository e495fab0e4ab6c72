//! Discovered pools
//!
//! The registry is the loader-wide pool set. It is filled while probing
//! and only read afterwards; each pool caches its boot environment blob
//! behind an `Rc` so a rewrite replaces it in one assignment.

pub mod backend;
pub mod probe;

pub use backend::{ObjsetType, PoolBackend, VdevLabel, ZfsMount};
pub use probe::{DeviceHost, DevicePath, DiskContext};

use crate::bootenv::NvList;
use crate::types::{DeviceKind, ZfsDevDesc};
use crate::vdev::{Vdev, VdevIo};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

/// A pool and the leaf vdevs it was found on
#[derive(Debug)]
pub struct Pool {
    /// Pool GUID
    pub guid: u64,
    /// Pool name
    pub name: String,
    /// Attached leaf vdevs, in discovery order
    pub vdevs: Vec<Vdev>,
    /// Cached boot environment
    pub bootenv: Option<Rc<NvList>>,
    boot_vdev: usize,
}

impl Pool {
    fn new(guid: u64, name: String) -> Self {
        Self {
            guid,
            name,
            vdevs: Vec::new(),
            bootenv: None,
            boot_vdev: 0,
        }
    }

    /// The vdev the pool was first seen on
    pub fn boot_vdev(&self) -> Option<&Vdev> {
        self.vdevs.get(self.boot_vdev)
    }

    /// Find an attached vdev by GUID
    pub fn vdev(&self, guid: u64) -> Option<&Vdev> {
        self.vdevs.iter().find(|v| v.guid == guid)
    }
}

/// Set of discovered pools
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self { pools: Vec::new() }
    }

    /// Attach a recognised vdev, creating its pool on first sight
    ///
    /// Returns the pool GUID. A vdev GUID already attached to the pool is
    /// ignored and the new I/O handle dropped.
    pub fn attach(&mut self, label: VdevLabel, io: Box<dyn VdevIo>) -> u64 {
        let index = match self.pools.iter().position(|p| p.guid == label.pool_guid) {
            Some(index) => index,
            None => {
                log::debug!("new pool {} guid {:#x}", label.pool_name, label.pool_guid);
                self.pools.push(Pool::new(label.pool_guid, label.pool_name));
                self.pools.len() - 1
            }
        };

        let pool = &mut self.pools[index];
        if pool.vdev(label.vdev_guid).is_some() {
            log::debug!("vdev {:#x} already attached to {}", label.vdev_guid, pool.name);
        } else {
            pool.vdevs.push(Vdev::new(label.vdev_guid, label.phys_path, label.devid, io));
        }
        pool.guid
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    /// First discovered pool
    pub fn first(&self) -> Option<&Pool> {
        self.pools.first()
    }

    pub fn find_by_guid(&self, guid: u64) -> Option<&Pool> {
        self.pools.iter().find(|p| p.guid == guid)
    }

    pub fn find_by_guid_mut(&mut self, guid: u64) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|p| p.guid == guid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Pool a device descriptor refers to; a zero GUID picks the first pool
    pub fn find_by_dev_mut(&mut self, dev: &ZfsDevDesc) -> Option<&mut Pool> {
        if dev.kind != DeviceKind::Zfs {
            return None;
        }
        if dev.pool_guid == 0 {
            self.pools.first_mut()
        } else {
            self.find_by_guid_mut(dev.pool_guid)
        }
    }

    /// Keep only the pools `keep` accepts
    pub fn retain_mut<F: FnMut(&mut Pool) -> bool>(&mut self, keep: F) {
        self.pools.retain_mut(keep);
    }
}
