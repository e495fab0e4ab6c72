//! Boot environment store
//!
//! The pool label reserves an area for a small typed list read before
//! any dataset is mounted. Its `illumos:nvstore` sub-list holds user
//! configuration, exposed through `NamedStore` and mirrored into live
//! loader variables. Top-level string keys such as `illumos:bootonce`
//! are one-shot boot values consumed by `take_bootonce`.
//!
//! The blob is cached per pool. Every change builds a new list, writes it
//! to all vdevs and only then replaces the cached `Rc`. A failed write
//! rolls the written vdevs back to the cached blob.

mod coerce;
mod nvlist;
mod nvstore;

pub use coerce::{coerce, parse_i64, parse_u64};
pub use nvlist::{DataType, NvList, NvPair, NvValue};
pub use nvstore::BootEnvStore;

use crate::driver::ZfsDriver;
use crate::error::{Result, ZfsError};
use crate::pool::{Pool, PoolBackend, PoolRegistry};
use crate::types::{DeviceKind, ZfsDevDesc};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::fmt;

/// Blob format version key
pub const BOOTENV_VERSION: &str = "version";
/// Typed list blob, the only format the store attaches to
pub const VB_NVLIST: u64 = 1;
/// Sub-list holding user keys
pub const OS_NVSTORE: &str = "illumos:nvstore";
/// One-shot boot dataset key
pub const OS_BOOTONCE: &str = "illumos:bootonce";

/// Generic named configuration store
pub trait NamedStore {
    /// Value of a key rendered as text
    fn get(&mut self, name: &str) -> Result<String>;

    /// Set a key from native-endian bytes of `data_type`
    fn set(&mut self, data_type: DataType, name: &str, data: &[u8]) -> Result<()>;

    /// Set a key from text
    ///
    /// The type is `type_name` when given, else the key's current type,
    /// else string.
    fn set_str(&mut self, type_name: Option<&str>, name: &str, text: &str) -> Result<()>;

    /// Remove a key
    fn unset(&mut self, name: &str) -> Result<()>;

    /// Read a key and remove it
    fn get_once(&mut self, name: &str) -> Result<String>;

    /// Visit every pair in order
    fn iterate(&mut self, visit: &mut dyn FnMut(&NvPair) -> Result<()>) -> Result<()>;

    /// Write one `TYPE name = value` line per pair
    fn print(&mut self, out: &mut dyn fmt::Write) -> Result<()>;
}

pub(crate) fn zfs_pool<'a>(pools: &'a mut PoolRegistry, dev: &ZfsDevDesc) -> Result<&'a mut Pool> {
    if dev.kind != DeviceKind::Zfs {
        return Err(ZfsError::NotSupported);
    }
    pools.find_by_dev_mut(dev).ok_or(ZfsError::NotFound)
}

impl<B: PoolBackend> ZfsDriver<B> {
    /// Boot environment of the pool, loaded on first use
    ///
    /// The first vdev whose label yields a blob wins.
    pub fn boot_env(&mut self, dev: &ZfsDevDesc) -> Result<Rc<NvList>> {
        let (pools, backend) = self.pools_and_backend();
        let pool = zfs_pool(pools, dev)?;

        if let Some(env) = &pool.bootenv {
            return Ok(env.clone());
        }

        for vdev in pool.vdevs.iter_mut() {
            match backend.read_bootenv(vdev) {
                Ok(Some(env)) => {
                    let env = Rc::new(env);
                    pool.bootenv = Some(env.clone());
                    return Ok(env);
                }
                Ok(None) => {}
                Err(e) => log::debug!("vdev {:#x}: bootenv read failed ({})", vdev.guid, e),
            }
        }

        Err(ZfsError::Unavailable)
    }

    /// Write a boot environment to every vdev of the pool
    ///
    /// The cache is replaced only when all writes succeed. On a failed
    /// write the vdevs already written get the cached blob back, so the
    /// labels keep agreeing with the cache.
    pub fn set_boot_env(&mut self, dev: &ZfsDevDesc, env: NvList) -> Result<()> {
        let (pools, backend) = self.pools_and_backend();
        let pool = zfs_pool(pools, dev)?;

        let mut written = 0;
        let mut failure = None;
        for vdev in pool.vdevs.iter_mut() {
            match backend.write_bootenv(vdev, &env) {
                Ok(()) => written += 1,
                Err(e) => {
                    failure = Some((vdev.guid, e));
                    break;
                }
            }
        }

        let Some((guid, err)) = failure else {
            pool.bootenv = Some(Rc::new(env));
            return Ok(());
        };

        log::warn!("vdev {:#x}: bootenv write failed ({})", guid, err);
        match pool.bootenv.clone() {
            Some(previous) => {
                for vdev in pool.vdevs.iter_mut().take(written) {
                    if let Err(e) = backend.write_bootenv(vdev, &previous) {
                        log::warn!("vdev {:#x}: bootenv restore failed ({})", vdev.guid, e);
                    }
                }
            }
            None if written > 0 => log::warn!("{}: no cached bootenv to restore", pool.name),
            None => {}
        }
        Err(err)
    }

    /// Consume a top-level one-shot string key
    ///
    /// The key is removed and the blob written back even when the value
    /// is empty; an empty value then reports `NotFound`.
    pub fn take_bootonce(&mut self, dev: &ZfsDevDesc, key: &str) -> Result<String> {
        let env = self.boot_env(dev)?;
        let value = env.find_str(key).ok_or(ZfsError::NotFound)?.to_string();

        let mut updated = (*env).clone();
        updated.remove(key, Some(DataType::String))?;
        self.set_boot_env(dev, updated)?;

        if value.is_empty() {
            return Err(ZfsError::NotFound);
        }
        Ok(value)
    }

    /// Register the pool's nvstore and mirror its keys into live variables
    ///
    /// Only a blob in typed list format (`version` = 1) is attached.
    pub fn attach_nvstore(&mut self, dev: &ZfsDevDesc) -> Result<()> {
        let env = self.boot_env(dev)?;
        if env.find_u64(BOOTENV_VERSION) != Some(VB_NVLIST) {
            log::debug!("bootenv version {:?} has no nvstore", env.find_u64(BOOTENV_VERSION));
            return Err(ZfsError::Unavailable);
        }

        let name = zfs_pool(self.pools_mut(), dev)?.name.clone();
        self.register_store(&name, *dev);

        if let Some(store) = env.find_list(OS_NVSTORE) {
            for pair in store.iter() {
                self.mirror_pair(pair);
            }
        }
        Ok(())
    }

    /// Store handle for a device
    pub fn nvstore(&mut self, dev: ZfsDevDesc) -> BootEnvStore<'_, B> {
        BootEnvStore::new(self, dev)
    }

    /// Store handle registered under `name` by `attach_nvstore`
    pub fn named_store(&mut self, name: &str) -> Option<BootEnvStore<'_, B>> {
        let dev = self.store_dev(name)?;
        Some(BootEnvStore::new(self, dev))
    }
}
