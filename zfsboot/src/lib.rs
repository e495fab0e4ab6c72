//! Read-only ZFS pool reader for boot loaders
//!
//! A `no_std` driver that finds ZFS pools on the loader's block devices,
//! lists and reads files of a mounted dataset and keeps the pool's boot
//! environment store in sync with loader variables.
//!
//! # Overview
//!
//! - Sector-aligned byte I/O over any `gpt_disk_io::BlockIo`
//! - Pool discovery on whole disks and GPT, MBR and VTOC partitions
//! - Directory enumeration over micro and fat ZAP objects
//! - File read, seek and stat
//! - Typed boot environment store (`illumos:nvstore`) with live variable hooks
//! - `zfs:pool/dataset:` device specs and the kernel `zfs-bootfs=` argument
//!
//! # Architecture
//!
//! 1. **Vdev layer** - `SectorIo` turns byte ranges into whole-sector transfers
//! 2. **Partition layer** - GPT, MBR and VTOC tables
//! 3. **Pool layer** - registry of discovered pools and the prober
//! 4. **ZAP layer** - on-disk directory formats
//! 5. **Driver** - `ZfsDriver`, the loader-facing device and file API
//!
//! Label, block pointer and dataset decoding sit behind `PoolBackend`.
//!
//! # Usage
//!
//! ```ignore
//! use zfsboot::{ZfsDriver, Whence};
//!
//! let mut zfs = ZfsDriver::new(backend);
//! zfs.init(&mut host)?;
//!
//! let (dev, path) = zfs.parse_dev(":rpool/ROOT/default:/boot/loader.conf")?;
//! let mount = zfs.open_mount(&dev)?;
//! let mut file = zfs.open_file(&mount, &path)?;
//! let n = zfs.read(&mount, &mut file, &mut buf)?;
//! ```
//!
//! # Boot environment
//!
//! ```ignore
//! use zfsboot::NamedStore;
//!
//! zfs.attach_nvstore(&dev)?;
//! zfs.nvstore(dev).set_str(Some("uint32"), "timeout", "0x10")?;
//! ```

#![no_std]

extern crate alloc;

pub mod bootenv;
pub mod devspec;
pub mod driver;
pub mod env;
pub mod error;
pub mod file;
pub mod partition;
pub mod pool;
pub mod types;
pub mod vdev;
pub mod zap;

pub use error::{Result, ZfsError};
pub use types::{DeviceKind, DirEntry, DirentType, Dnode, Stat, Whence, ZfsDevDesc};

// High-level API exports
pub use bootenv::{BootEnvStore, DataType, NamedStore, NvList, NvPair, NvValue};
pub use devspec::DevSpec;
pub use driver::ZfsDriver;
pub use env::{EnvFlags, EnvHooks, Environment};
pub use file::ZfsFile;
pub use pool::{DeviceHost, DevicePath, DiskContext, PoolBackend, PoolRegistry, VdevLabel, ZfsMount};
pub use vdev::{SectorIo, Vdev, VdevIo};
