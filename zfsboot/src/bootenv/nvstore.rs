//! nvstore: the user key sub-list of the boot environment

use super::coerce::coerce;
use super::nvlist::{DataType, NvList, NvPair, NvValue};
use super::{NamedStore, OS_NVSTORE};
use crate::driver::ZfsDriver;
use crate::env::{EnvContext, EnvFlags, EnvHooks};
use crate::error::{Result, ZfsError};
use crate::pool::PoolBackend;
use crate::types::ZfsDevDesc;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::fmt::{self, Write};

/// `NamedStore` over one pool's nvstore
pub struct BootEnvStore<'a, B: PoolBackend> {
    zfs: &'a mut ZfsDriver<B>,
    dev: ZfsDevDesc,
}

impl<'a, B: PoolBackend> BootEnvStore<'a, B> {
    pub fn new(zfs: &'a mut ZfsDriver<B>, dev: ZfsDevDesc) -> Self {
        Self { zfs, dev }
    }

    /// Device the store writes to
    pub fn dev(&self) -> &ZfsDevDesc {
        &self.dev
    }

    /// Boot environment and its nvstore sub-list, if present
    fn lists(&mut self) -> Result<(Rc<NvList>, Option<NvList>)> {
        let env = self.zfs.boot_env(&self.dev)?;
        let store = env.find_list(OS_NVSTORE).cloned();
        Ok((env, store))
    }
}

impl<'a, B: PoolBackend> NamedStore for BootEnvStore<'a, B> {
    fn get(&mut self, name: &str) -> Result<String> {
        let (_, store) = self.lists()?;
        let store = store.ok_or(ZfsError::Unavailable)?;
        let pair = store.find(name).ok_or(ZfsError::NotFound)?;
        match &pair.value {
            NvValue::NvList(_) => Err(ZfsError::InvalidArgument),
            value => Ok(value.to_string()),
        }
    }

    fn set(&mut self, data_type: DataType, name: &str, data: &[u8]) -> Result<()> {
        self.lists()?;
        let value = NvValue::from_ne_bytes(data_type, data)?;
        self.zfs.nvstore_set_value(&self.dev, name, value)
    }

    fn set_str(&mut self, type_name: Option<&str>, name: &str, text: &str) -> Result<()> {
        let (_, store) = self.lists()?;
        let data_type = match type_name {
            Some(type_name) => DataType::from_name(type_name).ok_or(ZfsError::InvalidArgument)?,
            None => store
                .as_ref()
                .and_then(|s| s.find(name))
                .map_or(DataType::String, |p| p.data_type()),
        };

        let value = coerce(data_type, text)?;
        self.set(data_type, name, &value.to_ne_bytes())
    }

    fn unset(&mut self, name: &str) -> Result<()> {
        self.zfs.nvstore_unset(&self.dev, name, true)
    }

    fn get_once(&mut self, name: &str) -> Result<String> {
        // Taking the last key drops the sub-list, so a missing sub-list
        // reads as a missing key
        let (_, store) = self.lists()?;
        if store.map_or(true, |s| s.find(name).is_none()) {
            return Err(ZfsError::NotFound);
        }

        let value = self.get(name)?;
        self.zfs.nvstore_unset(&self.dev, name, true)?;
        Ok(value)
    }

    fn iterate(&mut self, visit: &mut dyn FnMut(&NvPair) -> Result<()>) -> Result<()> {
        let (_, store) = self.lists()?;
        let store = store.ok_or(ZfsError::Unavailable)?;
        for pair in store.iter() {
            visit(pair)?;
        }
        Ok(())
    }

    fn print(&mut self, out: &mut dyn fmt::Write) -> Result<()> {
        self.iterate(&mut |pair| {
            writeln!(out, "{} {} = {}", pair.data_type(), pair.name, pair.value)
                .map_err(|_| ZfsError::IoError)
        })
    }
}

/// Set hook of mirrored variables: store the new text in the current
/// device's nvstore
fn nvstore_set_hook<B: PoolBackend>(zfs: &mut ZfsDriver<B>, name: &str, value: &str) -> Result<()> {
    let dev = zfs.current_dev().ok_or(ZfsError::NotFound)?;
    BootEnvStore::new(zfs, dev).set_str(None, name, value)
}

/// Unset hook of mirrored variables; the caller discards the variable
fn nvstore_unset_hook<B: PoolBackend>(zfs: &mut ZfsDriver<B>, name: &str) -> Result<()> {
    let dev = zfs.current_dev().ok_or(ZfsError::NotFound)?;
    zfs.nvstore_unset(&dev, name, false)
}

impl<B: PoolBackend> ZfsDriver<B> {
    /// Publish a pair as a live variable carrying the store hooks
    pub(crate) fn mirror_pair(&mut self, pair: &NvPair) {
        if pair.data_type() == DataType::NvList {
            log::debug!("nvstore: not mirroring nested list {}", pair.name);
            return;
        }

        let hooks = EnvHooks {
            set: nvstore_set_hook::<B>,
            unset: nvstore_unset_hook::<B>,
        };
        let value = pair.value.to_string();
        self.env_mut().put(
            &pair.name,
            &value,
            EnvFlags::VOLATILE | EnvFlags::NOHOOK,
            Some(hooks),
        );
    }

    fn nvstore_set_value(&mut self, dev: &ZfsDevDesc, name: &str, value: NvValue) -> Result<()> {
        let env = self.boot_env(dev)?;
        let mut store = env.find_list(OS_NVSTORE).cloned().unwrap_or_default();
        store.add(name, value.clone());

        let mut updated = (*env).clone();
        updated.add(OS_NVSTORE, NvValue::NvList(store));
        self.set_boot_env(dev, updated)?;

        self.mirror_pair(&NvPair {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    /// Remove a key; `unset_env` also drops the live variable
    fn nvstore_unset(&mut self, dev: &ZfsDevDesc, name: &str, unset_env: bool) -> Result<()> {
        let env = self.boot_env(dev)?;
        let mut store = env
            .find_list(OS_NVSTORE)
            .cloned()
            .ok_or(ZfsError::Unavailable)?;

        let result = match store.remove(name, None) {
            Ok(_) => {
                let mut updated = (*env).clone();
                if store.is_empty() {
                    // An empty sub-list is dropped, not stored
                    let _ = updated.remove(OS_NVSTORE, Some(DataType::NvList));
                } else {
                    updated.add(OS_NVSTORE, NvValue::NvList(store));
                }
                self.set_boot_env(dev, updated)
            }
            Err(e) => Err(e),
        };

        if unset_env {
            self.env_mut().discard(name);
        }
        result
    }
}
