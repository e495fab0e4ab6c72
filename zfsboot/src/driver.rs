//! Loader-facing ZFS driver
//!
//! `ZfsDriver` owns everything the loader keeps between calls: the pool
//! registry, the pool backend, the live variable table and the named
//! stores registered by `attach_nvstore`. File operations take the mount
//! returned by `open_mount` and a handle from `open_file`.

use crate::devspec::DevSpec;
use crate::env::{self, EnvContext, EnvFlags, Environment};
use crate::error::{Result, ZfsError};
use crate::file::ZfsFile;
use crate::pool::{probe, DeviceHost, DevicePath, ObjsetType, Pool, PoolBackend, PoolRegistry, ZfsMount};
use crate::types::{DirEntry, Stat, Whence, ZfsDevDesc, ZFS_DEV_NAME};
use crate::vdev::SectorIo;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Write;
use gpt_disk_io::BlockIo;

/// ZFS device and file system driver
pub struct ZfsDriver<B: PoolBackend> {
    backend: B,
    pools: PoolRegistry,
    env: Environment<Self>,
    stores: Vec<(String, ZfsDevDesc)>,
    current_dev: Option<ZfsDevDesc>,
}

impl<B: PoolBackend> EnvContext for ZfsDriver<B> {
    fn env(&self) -> &Environment<Self> {
        &self.env
    }

    fn env_mut(&mut self) -> &mut Environment<Self> {
        &mut self.env
    }
}

impl<B: PoolBackend> ZfsDriver<B> {
    /// Driver with no pools
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pools: PoolRegistry::new(),
            env: Environment::new(),
            stores: Vec::new(),
            current_dev: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Discovered pools
    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub(crate) fn pools_mut(&mut self) -> &mut PoolRegistry {
        &mut self.pools
    }

    pub(crate) fn pools_and_backend(&mut self) -> (&mut PoolRegistry, &mut B) {
        (&mut self.pools, &mut self.backend)
    }

    /// Device the loader currently boots from, used by variable hooks
    pub fn current_dev(&self) -> Option<ZfsDevDesc> {
        self.current_dev
    }

    pub fn set_current_dev(&mut self, dev: Option<ZfsDevDesc>) {
        self.current_dev = dev;
    }

    /// Value of a live variable
    pub fn getenv(&self, name: &str) -> Option<&str> {
        self.env.get(name)
    }

    /// Set a live variable, running its set hook if it has one
    pub fn setenv(&mut self, name: &str, value: &str) -> Result<()> {
        env::setenv(self, name, value, EnvFlags::VOLATILE)
    }

    /// Remove a live variable, running its unset hook if it has one
    pub fn unsetenv(&mut self, name: &str) -> Result<()> {
        env::unsetenv(self, name)
    }

    pub(crate) fn register_store(&mut self, name: &str, dev: ZfsDevDesc) {
        match self.stores.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = dev,
            None => self.stores.push((name.to_string(), dev)),
        }
    }

    pub(crate) fn store_dev(&self, name: &str) -> Option<ZfsDevDesc> {
        self.stores.iter().find(|(n, _)| n == name).map(|(_, d)| *d)
    }

    /// Names of the registered stores
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.iter().map(|(n, _)| n.as_str())
    }

    // Device operations

    /// Probe every disk of the host, then initialise the pools found
    ///
    /// Pools that fail initialisation are dropped.
    pub fn init<H: DeviceHost>(&mut self, host: &mut H) -> Result<()> {
        for disk in host.disks() {
            match self.probe_device(host, &disk) {
                Ok(guid) => log::debug!("{}: found pool {:#x}", disk, guid),
                Err(e) => log::debug!("{}: {}", disk, e),
            }
        }

        let backend = &mut self.backend;
        self.pools.retain_mut(|pool| match backend.init_pool(pool) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("pool {}: init failed ({})", pool.name, e);
                false
            }
        });
        Ok(())
    }

    /// Recognise a pool directly on a region
    pub fn probe<D: BlockIo + 'static>(&mut self, io: SectorIo<D>) -> Result<u64> {
        probe::probe(&mut self.backend, &mut self.pools, io)
    }

    /// Probe a device and its partitions
    pub fn probe_device<H: DeviceHost>(&mut self, host: &mut H, path: &DevicePath) -> Result<u64> {
        probe::probe_device(&mut self.backend, &mut self.pools, host, path)
    }

    /// Mount the dataset a device names
    pub fn open_mount(&mut self, dev: &ZfsDevDesc) -> Result<ZfsMount> {
        let (pools, backend) = self.pools_and_backend();
        let pool = crate::bootenv::zfs_pool(pools, dev)?;
        let mount = backend.mount(pool, dev.root_guid)?;
        if mount.objset_type != ObjsetType::Zpl {
            log::warn!("unexpected object set type {:?}", mount.objset_type);
            return Err(ZfsError::IoError);
        }
        Ok(mount)
    }

    /// Release a mount
    pub fn close_mount(&mut self, mount: ZfsMount) {
        log::trace!("unmount {:#x}/{}", mount.pool_guid, mount.root_guid);
    }

    /// Raw block access through a ZFS device is not supported
    pub fn strategy(&mut self) -> Result<()> {
        Err(ZfsError::NotSupported)
    }

    /// Pool listing; `verbose` adds each pool's status
    pub fn describe(&mut self, verbose: bool) -> String {
        let mut out = String::new();
        if self.pools.is_empty() {
            return out;
        }

        let _ = writeln!(out, "{} devices:", ZFS_DEV_NAME);
        let (pools, backend) = self.pools_and_backend();
        for pool in pools.iter() {
            if verbose {
                out.push_str(&backend.pool_status(pool));
            } else {
                let _ = writeln!(out, "    {}:{}", ZFS_DEV_NAME, pool.name);
            }
        }
        out
    }

    // File operations

    fn mount_pool(&mut self, mount: &ZfsMount) -> Result<(&mut Pool, &mut B)> {
        let pool = self
            .pools
            .find_by_guid_mut(mount.pool_guid)
            .ok_or(ZfsError::NotFound)?;
        Ok((pool, &mut self.backend))
    }

    /// Open a path inside a mounted dataset
    pub fn open_file(&mut self, mount: &ZfsMount, path: &str) -> Result<ZfsFile> {
        let (pool, backend) = self.mount_pool(mount)?;
        let dnode = backend.lookup_path(pool, mount, path)?;
        Ok(ZfsFile::new(dnode))
    }

    /// Release a file handle
    pub fn close_file(&mut self, file: ZfsFile) {
        drop(file);
    }

    pub fn read(&mut self, mount: &ZfsMount, file: &mut ZfsFile, buf: &mut [u8]) -> Result<usize> {
        let (pool, backend) = self.mount_pool(mount)?;
        file.read(backend, pool, buf)
    }

    pub fn seek(&mut self, mount: &ZfsMount, file: &mut ZfsFile, offset: i64, whence: Whence) -> Result<i64> {
        let (pool, backend) = self.mount_pool(mount)?;
        file.seek(backend, pool, offset, whence)
    }

    pub fn stat(&mut self, mount: &ZfsMount, file: &ZfsFile) -> Result<Stat> {
        let (pool, backend) = self.mount_pool(mount)?;
        file.stat(backend, pool)
    }

    pub fn readdir(&mut self, mount: &ZfsMount, file: &mut ZfsFile) -> Result<Option<DirEntry>> {
        let (pool, backend) = self.mount_pool(mount)?;
        file.readdir(backend, pool)
    }

    // Device specs

    /// Resolve `:pool[/dataset]:path` to a device and the trailing path
    pub fn parse_dev(&mut self, text: &str) -> Result<(ZfsDevDesc, String)> {
        let spec = DevSpec::parse(text)?;
        let guid = self
            .pools
            .find_by_name(&spec.pool)
            .map(|p| p.guid)
            .ok_or(ZfsError::NotFound)?;

        let (pools, backend) = self.pools_and_backend();
        let pool = pools.find_by_guid_mut(guid).ok_or(ZfsError::NotFound)?;
        let root_guid = backend.lookup_dataset(pool, &spec.dataset)?;
        Ok((ZfsDevDesc::new(guid, root_guid), spec.path))
    }

    /// Render a device as `zfs:pool[/dataset]:`
    ///
    /// A zero pool GUID means the first pool, a zero root GUID the pool's
    /// default boot dataset. Both are filled in on `dev`.
    pub fn format_dev(&mut self, dev: &mut ZfsDevDesc) -> Result<String> {
        let first = self.pools.first().map(|p| p.guid).ok_or(ZfsError::NotFound)?;
        if dev.pool_guid == 0 {
            dev.pool_guid = first;
        }

        let (pools, backend) = self.pools_and_backend();
        let pool = match crate::bootenv::zfs_pool(pools, dev) {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("can't find pool by guid {:#x}", dev.pool_guid);
                return Err(e);
            }
        };
        if dev.root_guid == 0 {
            dev.root_guid = backend.default_root(pool).map_err(|e| {
                log::warn!("can't find root filesystem of {}", pool.name);
                e
            })?;
        }
        let dataset = backend.dataset_name(pool, dev.root_guid).map_err(|e| {
            log::warn!("can't find filesystem by guid {}", dev.root_guid);
            e
        })?;

        Ok(DevSpec::new(&pool.name, &dataset).to_string())
    }

    /// Export the boot dataset to live variables and build the kernel
    /// argument `zfs-bootfs=pool/objnum[,bootpath="…"][,diskdevid="…"]`
    pub fn bootfs(&mut self, dev: &ZfsDevDesc) -> Result<String> {
        let (pools, backend) = self.pools_and_backend();
        let pool = crate::bootenv::zfs_pool(pools, dev)?;
        let root = match dev.root_guid {
            0 => backend.default_root(pool)?,
            guid => guid,
        };
        let rootname = backend.dataset_name(pool, root).map_err(|e| {
            log::warn!("can't find filesystem by guid {}", root);
            e
        })?;
        let objnum = backend.lookup_dataset(pool, &rootname).map_err(|e| {
            log::warn!("can't find filesystem by name {}", rootname);
            e
        })?;

        let (pool_guid, name) = (pool.guid, pool.name.clone());
        let (vdev_guid, phys_path, devid) = match pool.boot_vdev() {
            Some(v) => (v.guid, v.phys_path.clone(), v.devid.clone()),
            None => (0, None, None),
        };

        let bootfs = format!("{}/{}", name, objnum);
        self.env.put("zfs-bootpool", &pool_guid.to_string(), EnvFlags::VOLATILE, None);
        self.env.put("zfs-bootvdev", &vdev_guid.to_string(), EnvFlags::VOLATILE, None);
        self.env.put("zfs-bootfs", &bootfs, EnvFlags::VOLATILE, None);

        let mut cmdline = format!("zfs-bootfs={}", bootfs);
        if let Some(path) = &phys_path {
            self.env.put("bootpath", path, EnvFlags::VOLATILE, None);
            let _ = write!(cmdline, ",bootpath=\"{}\"", path);
        }
        if let Some(id) = &devid {
            self.env.put("diskdevid", id, EnvFlags::VOLATILE, None);
            let _ = write!(cmdline, ",diskdevid=\"{}\"", id);
        }
        Ok(cmdline)
    }

    /// Child datasets of `pool[/dataset]`
    pub fn list(&mut self, name: &str) -> Result<Vec<String>> {
        let (pool_name, dataset) = match name.find('/') {
            Some(sep) => (&name[..sep], &name[sep + 1..]),
            None => (name, ""),
        };
        let guid = self
            .pools
            .find_by_name(pool_name)
            .map(|p| p.guid)
            .ok_or(ZfsError::NotFound)?;

        let (pools, backend) = self.pools_and_backend();
        let pool = pools.find_by_guid_mut(guid).ok_or(ZfsError::NotFound)?;
        let objnum = backend.lookup_dataset(pool, dataset)?;
        backend.list_datasets(pool, objnum)
    }
}
