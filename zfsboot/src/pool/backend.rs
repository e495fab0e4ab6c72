//! Pool library seam
//!
//! Everything below the directory layer (label parsing, block pointer
//! resolution, checksums, compression, dataset directory walks) is done
//! by a `PoolBackend`. The reader calls it with the registry's `Pool`
//! so the backend can reach the pool's vdevs.

use super::Pool;
use crate::bootenv::NvList;
use crate::error::Result;
use crate::types::{Dnode, Stat};
use crate::vdev::{Vdev, VdevIo};
use alloc::string::String;
use alloc::vec::Vec;

/// Identity read from a vdev label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdevLabel {
    /// Pool GUID
    pub pool_guid: u64,
    /// Pool name
    pub pool_name: String,
    /// Leaf vdev GUID
    pub vdev_guid: u64,
    /// `phys_path`, passed to the kernel as `bootpath`
    pub phys_path: Option<String>,
    /// `devid`, passed to the kernel as `diskdevid`
    pub devid: Option<String>,
}

/// Object set type of a mounted dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjsetType {
    /// Meta object set
    Meta,
    /// POSIX filesystem
    Zpl,
    /// Volume
    Zvol,
    /// Anything else, raw type number
    Other(u64),
}

/// Mounted dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZfsMount {
    /// Pool the dataset belongs to
    pub pool_guid: u64,
    /// Dataset object id
    pub root_guid: u64,
    /// Object set type
    pub objset_type: ObjsetType,
}

/// Pool/object library used by the reader
pub trait PoolBackend {
    /// Recognise a vdev label on a raw region
    fn read_label(&mut self, io: &mut dyn VdevIo) -> Result<VdevLabel>;

    /// Bring a discovered pool to a usable state (root vdev, uberblock)
    fn init_pool(&mut self, pool: &mut Pool) -> Result<()>;

    /// Mount dataset `root_guid`; zero means the pool's default root
    fn mount(&mut self, pool: &mut Pool, root_guid: u64) -> Result<ZfsMount>;

    /// Resolve a path inside a mounted dataset
    fn lookup_path(&mut self, pool: &mut Pool, mount: &ZfsMount, path: &str) -> Result<Dnode>;

    /// Fill `buf` from byte `offset` of an object
    fn read_object(&mut self, pool: &mut Pool, dnode: &Dnode, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Size and mode of an object
    fn object_stat(&mut self, pool: &mut Pool, dnode: &Dnode) -> Result<Stat>;

    /// Dataset object id for a name relative to the pool; `""` is the root
    fn lookup_dataset(&mut self, pool: &mut Pool, name: &str) -> Result<u64>;

    /// Dataset name relative to the pool for an object id
    fn dataset_name(&mut self, pool: &mut Pool, objnum: u64) -> Result<String>;

    /// Object id of the pool's boot dataset
    fn default_root(&mut self, pool: &mut Pool) -> Result<u64>;

    /// Names of the child datasets of `objnum`
    fn list_datasets(&mut self, pool: &mut Pool, objnum: u64) -> Result<Vec<String>>;

    /// Human-readable pool status
    fn pool_status(&mut self, pool: &Pool) -> String;

    /// Boot environment blob from a vdev label, `None` if the area is empty
    fn read_bootenv(&mut self, vdev: &mut Vdev) -> Result<Option<NvList>>;

    /// Store a boot environment blob in a vdev label
    fn write_bootenv(&mut self, vdev: &mut Vdev, env: &NvList) -> Result<()>;
}
