//! Common test utilities, mock block devices and a mock pool library

#![allow(dead_code)]

pub mod builder;
pub use builder::{DiskBuilder, FatZapBuilder, MicroZapBuilder};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use zfsboot::pool::ObjsetType;
use zfsboot::types::{S_IFDIR, S_IFREG};
use zfsboot::{
    DeviceHost, DevicePath, DiskContext, Dnode, NvList, PoolBackend, Result, SectorIo, Stat, Vdev,
    VdevIo, VdevLabel, ZfsDevDesc, ZfsDriver, ZfsError, ZfsMount,
};

pub const POOL_GUID: u64 = 0x7a11_0000_0000_0001;
pub const VDEV_GUID: u64 = 0x11;

/// Device of the single test pool
pub fn tank() -> ZfsDevDesc {
    ZfsDevDesc::new(POOL_GUID, 0)
}

/// Attach a labelled in-memory region to the driver
pub fn attach_vdev(zfs: &mut ZfsDriver<MockBackend>, label: VdevLabel) -> u64 {
    let device = DiskBuilder::new(16).label(0, label).build();
    zfs.probe(SectorIo::new(device)).expect("probe labelled region")
}

/// Driver with pool `tank` on one vdev
pub fn single_pool(backend: MockBackend) -> ZfsDriver<MockBackend> {
    let mut zfs = ZfsDriver::new(backend);
    attach_vdev(&mut zfs, label(POOL_GUID, "tank", VDEV_GUID));
    zfs
}

/// In-memory block device for testing
///
/// Partitions are windows onto the same backing buffer, so writes through
/// a partition are visible on the whole disk.
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    data: Rc<RefCell<Vec<u8>>>,
    start: usize,
    len: usize,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Create a device from raw data
    pub fn new(data: Vec<u8>, block_size: usize) -> Self {
        let len = data.len();
        Self {
            data: Rc::new(RefCell::new(data)),
            start: 0,
            len,
            block_size,
        }
    }

    /// Zero-filled device of `blocks` blocks
    pub fn zeroed(blocks: usize, block_size: usize) -> Self {
        Self::new(vec![0u8; blocks * block_size], block_size)
    }

    /// Device covering `count` blocks starting at `start_lba`
    pub fn window(&self, start_lba: u64, count: u64) -> Self {
        Self {
            data: Rc::clone(&self.data),
            start: self.start + start_lba as usize * self.block_size,
            len: count as usize * self.block_size,
            block_size: self.block_size,
        }
    }

    /// Copy of the bytes this device covers
    pub fn bytes(&self) -> Vec<u8> {
        self.data.borrow()[self.start..self.start + self.len].to_vec()
    }

    /// Overwrite bytes at a byte offset within the device
    pub fn write_bytes(&self, offset: usize, src: &[u8]) {
        let at = self.start + offset;
        self.data.borrow_mut()[at..at + src.len()].copy_from_slice(src);
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> std::result::Result<u64, Self::Error> {
        Ok((self.len / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> std::result::Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        let at = self.start + offset;
        dst.copy_from_slice(&self.data.borrow()[at..at + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> std::result::Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.len {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        let at = self.start + offset;
        self.data.borrow_mut()[at..at + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Loader device table over in-memory disks
#[derive(Default)]
pub struct MockHost {
    disks: Vec<DevicePath>,
    devices: HashMap<String, MemoryBlockDevice>,
    contexts: HashMap<String, DiskContext>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a whole disk
    pub fn add_disk(&mut self, name: &str, device: MemoryBlockDevice) -> DevicePath {
        let path = DevicePath::new(name);
        self.devices.insert(path.to_string(), device);
        self.disks.push(path.clone());
        path
    }

    /// Register a partition device under its full path
    pub fn add_partition(&mut self, path: &DevicePath, device: MemoryBlockDevice) {
        self.devices.insert(path.to_string(), device);
    }

    /// Report a path as naming a specific partition
    pub fn set_context(&mut self, path: &DevicePath, context: DiskContext) {
        self.contexts.insert(path.to_string(), context);
    }
}

impl DeviceHost for MockHost {
    type Device = MemoryBlockDevice;

    fn disks(&mut self) -> Vec<DevicePath> {
        self.disks.clone()
    }

    fn open(&mut self, path: &DevicePath) -> Result<MemoryBlockDevice> {
        self.devices
            .get(&path.to_string())
            .cloned()
            .ok_or(ZfsError::NotFound)
    }

    fn disk_context(&mut self, path: &DevicePath) -> Option<DiskContext> {
        self.contexts.get(&path.to_string()).copied()
    }
}

/// Mock vdev label, stored at byte 0 of a region
///
/// ```text
///   0  magic "MOCKZFS\0"
///   8  pool guid u64
///  16  vdev guid u64
///  24  pool name [32]
///  56  phys_path [64]
/// 120  devid [64]
/// ```
pub const LABEL_MAGIC: &[u8; 8] = b"MOCKZFS\0";
pub const LABEL_LEN: usize = 184;

pub fn encode_label(label: &VdevLabel) -> Vec<u8> {
    fn put_str(buf: &mut [u8], text: &str) {
        buf[..text.len()].copy_from_slice(text.as_bytes());
    }

    let mut buf = vec![0u8; LABEL_LEN];
    buf[..8].copy_from_slice(LABEL_MAGIC);
    buf[8..16].copy_from_slice(&label.pool_guid.to_le_bytes());
    buf[16..24].copy_from_slice(&label.vdev_guid.to_le_bytes());
    put_str(&mut buf[24..56], &label.pool_name);
    if let Some(path) = &label.phys_path {
        put_str(&mut buf[56..120], path);
    }
    if let Some(id) = &label.devid {
        put_str(&mut buf[120..184], id);
    }
    buf
}

fn decode_str(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if end == 0 {
        None
    } else {
        Some(String::from_utf8_lossy(&field[..end]).into_owned())
    }
}

pub fn label(pool_guid: u64, pool_name: &str, vdev_guid: u64) -> VdevLabel {
    VdevLabel {
        pool_guid,
        pool_name: pool_name.to_string(),
        vdev_guid,
        phys_path: None,
        devid: None,
    }
}

/// In-memory object
#[derive(Debug, Clone)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub mode: u32,
    pub block_size: usize,
}

impl MockObject {
    pub fn file(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            mode: S_IFREG | 0o644,
            block_size: 512,
        }
    }

    pub fn dir(data: Vec<u8>, block_size: usize) -> Self {
        Self {
            data,
            mode: S_IFDIR | 0o755,
            block_size,
        }
    }
}

/// Dataset known to the mock pool library
#[derive(Debug, Clone)]
pub struct MockDataset {
    pub name: String,
    pub objnum: u64,
    pub objset_type: ObjsetType,
}

/// Pool library over mock labels and in-memory objects
#[derive(Default)]
pub struct MockBackend {
    pub label_reads: usize,
    pub bootenv_writes: usize,
    pub failing_pools: Vec<String>,
    pub failing_writes: Vec<u64>,
    pub objects: HashMap<(u64, u64), MockObject>,
    pub paths: HashMap<(u64, String), u64>,
    pub datasets: Vec<MockDataset>,
    pub default_root: u64,
    pub bootenvs: HashMap<u64, NvList>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset; the first one added is the default root
    pub fn add_dataset(&mut self, name: &str, objnum: u64) {
        if self.datasets.is_empty() {
            self.default_root = objnum;
        }
        self.datasets.push(MockDataset {
            name: name.to_string(),
            objnum,
            objset_type: ObjsetType::Zpl,
        });
    }

    /// Add an object reachable by path in a dataset
    pub fn add_object(&mut self, objset: u64, path: &str, object: u64, obj: MockObject) {
        self.objects.insert((objset, object), obj);
        self.paths.insert((objset, path.to_string()), object);
    }
}

impl PoolBackend for MockBackend {
    fn read_label(&mut self, io: &mut dyn VdevIo) -> Result<VdevLabel> {
        self.label_reads += 1;
        let mut buf = vec![0u8; LABEL_LEN];
        io.read_at(0, &mut buf)?;
        if &buf[..8] != LABEL_MAGIC {
            return Err(ZfsError::NotFound);
        }

        let word = |at: usize| u64::from_le_bytes(buf[at..at + 8].try_into().unwrap());
        Ok(VdevLabel {
            pool_guid: word(8),
            vdev_guid: word(16),
            pool_name: decode_str(&buf[24..56]).unwrap_or_default(),
            phys_path: decode_str(&buf[56..120]),
            devid: decode_str(&buf[120..184]),
        })
    }

    fn init_pool(&mut self, pool: &mut zfsboot::pool::Pool) -> Result<()> {
        if self.failing_pools.contains(&pool.name) {
            return Err(ZfsError::IoError);
        }
        Ok(())
    }

    fn mount(&mut self, pool: &mut zfsboot::pool::Pool, root_guid: u64) -> Result<ZfsMount> {
        let objnum = if root_guid == 0 {
            self.default_root
        } else {
            root_guid
        };
        let ds = self
            .datasets
            .iter()
            .find(|d| d.objnum == objnum)
            .ok_or(ZfsError::NotFound)?;
        Ok(ZfsMount {
            pool_guid: pool.guid,
            root_guid: objnum,
            objset_type: ds.objset_type,
        })
    }

    fn lookup_path(
        &mut self,
        _pool: &mut zfsboot::pool::Pool,
        mount: &ZfsMount,
        path: &str,
    ) -> Result<Dnode> {
        let object = *self
            .paths
            .get(&(mount.root_guid, path.to_string()))
            .ok_or(ZfsError::NotFound)?;
        let obj = &self.objects[&(mount.root_guid, object)];
        Ok(Dnode {
            objset: mount.root_guid,
            object,
            block_size: obj.block_size,
        })
    }

    fn read_object(
        &mut self,
        _pool: &mut zfsboot::pool::Pool,
        dnode: &Dnode,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        let obj = self
            .objects
            .get(&(dnode.objset, dnode.object))
            .ok_or(ZfsError::IoError)?;
        let start = offset as usize;
        if start + buf.len() > obj.data.len() {
            return Err(ZfsError::IoError);
        }
        buf.copy_from_slice(&obj.data[start..start + buf.len()]);
        Ok(())
    }

    fn object_stat(&mut self, _pool: &mut zfsboot::pool::Pool, dnode: &Dnode) -> Result<Stat> {
        let obj = self
            .objects
            .get(&(dnode.objset, dnode.object))
            .ok_or(ZfsError::IoError)?;
        Ok(Stat {
            size: obj.data.len() as u64,
            mode: obj.mode,
            ino: dnode.object,
            block_size: obj.block_size as u32,
        })
    }

    fn lookup_dataset(&mut self, _pool: &mut zfsboot::pool::Pool, name: &str) -> Result<u64> {
        if name.is_empty() {
            return Ok(self.default_root);
        }
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.objnum)
            .ok_or(ZfsError::NotFound)
    }

    fn dataset_name(&mut self, _pool: &mut zfsboot::pool::Pool, objnum: u64) -> Result<String> {
        self.datasets
            .iter()
            .find(|d| d.objnum == objnum)
            .map(|d| d.name.clone())
            .ok_or(ZfsError::NotFound)
    }

    fn default_root(&mut self, _pool: &mut zfsboot::pool::Pool) -> Result<u64> {
        if self.default_root == 0 {
            return Err(ZfsError::NotFound);
        }
        Ok(self.default_root)
    }

    fn list_datasets(&mut self, _pool: &mut zfsboot::pool::Pool, objnum: u64) -> Result<Vec<String>> {
        let parent = self
            .datasets
            .iter()
            .find(|d| d.objnum == objnum)
            .map(|d| d.name.clone())
            .ok_or(ZfsError::NotFound)?;
        let prefix = format!("{}/", parent);
        Ok(self
            .datasets
            .iter()
            .filter_map(|d| d.name.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect())
    }

    fn pool_status(&mut self, pool: &zfsboot::pool::Pool) -> String {
        format!("  pool: {}\n state: ONLINE\n", pool.name)
    }

    fn read_bootenv(&mut self, vdev: &mut Vdev) -> Result<Option<NvList>> {
        Ok(self.bootenvs.get(&vdev.guid).cloned())
    }

    fn write_bootenv(&mut self, vdev: &mut Vdev, env: &NvList) -> Result<()> {
        if self.failing_writes.contains(&vdev.guid) {
            return Err(ZfsError::IoError);
        }
        self.bootenv_writes += 1;
        self.bootenvs.insert(vdev.guid, env.clone());
        Ok(())
    }
}
