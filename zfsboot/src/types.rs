//! Common types and constants for the ZFS boot reader

use alloc::string::String;

/// Smallest ZFS block (and dnode data block) unit, `1 << SPA_MINBLOCKSHIFT`
pub const SPA_MINBLOCKSHIFT: u32 = 9;

/// Maximum name length of a directory entry, excluding the terminator
pub const MAXNAMLEN: usize = 255;

/// Size of the caller's directory name buffer, terminator included
pub const DIRENT_NAME_BUF: usize = MAXNAMLEN + 1;

/// Device name printed in device specs and listings
pub const ZFS_DEV_NAME: &str = "zfs";

/// Delimiter between device name, pool/dataset and path in a device spec
pub const DEVSPEC_SEP: char = ':';

/// Separator between pool and dataset in a device spec
pub const DATASET_SEP: char = '/';

/// File type bits of `Stat::mode`
pub const S_IFMT: u32 = 0o170000;
/// Directory
pub const S_IFDIR: u32 = 0o040000;
/// Regular file
pub const S_IFREG: u32 = 0o100000;

/// Kind of loader device a descriptor refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Raw disk or partition
    Disk,
    /// ZFS pool dataset
    Zfs,
    /// Network or any other device class
    Other,
}

/// Resolved ZFS device descriptor
///
/// A zero `pool_guid` or `root_guid` means "use the default" when formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZfsDevDesc {
    /// Device class, must be `Zfs` for any pool operation
    pub kind: DeviceKind,
    /// Pool GUID
    pub pool_guid: u64,
    /// Root dataset object id (`root_guid` in loader terms)
    pub root_guid: u64,
}

impl ZfsDevDesc {
    /// Create a ZFS descriptor
    pub const fn new(pool_guid: u64, root_guid: u64) -> Self {
        Self {
            kind: DeviceKind::Zfs,
            pool_guid,
            root_guid,
        }
    }
}

/// Object descriptor handed out by the pool backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dnode {
    /// Object set (dataset) the object lives in
    pub objset: u64,
    /// Object number
    pub object: u64,
    /// Data block size in bytes (`dn_datablkszsec << SPA_MINBLOCKSHIFT`)
    pub block_size: usize,
}

/// Object attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Size in bytes
    pub size: u64,
    /// POSIX mode (type and permission bits)
    pub mode: u32,
    /// Object number
    pub ino: u64,
    /// Data block size
    pub block_size: u32,
}

impl Stat {
    /// Is this a directory?
    pub const fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the object
    Set,
    /// From the current offset
    Current,
    /// From the end of the object
    End,
}

/// Directory entry type, the 4-bit field of a packed directory value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DirentType {
    /// Unknown
    Unknown = 0,
    /// Named pipe
    Fifo = 1,
    /// Character device
    Char = 2,
    /// Directory
    Dir = 4,
    /// Block device
    Block = 6,
    /// Regular file
    Regular = 8,
    /// Symbolic link
    Link = 10,
    /// Socket
    Socket = 12,
    /// Whiteout
    Whiteout = 14,
}

impl DirentType {
    /// Convert the raw 4-bit type; unassigned values map to `Unknown`
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Fifo,
            2 => Self::Char,
            4 => Self::Dir,
            6 => Self::Block,
            8 => Self::Regular,
            10 => Self::Link,
            12 => Self::Socket,
            14 => Self::Whiteout,
            _ => Self::Unknown,
        }
    }
}

/// Directory entry returned by `readdir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Object number the entry points to
    pub fileno: u64,
    /// Entry type
    pub kind: DirentType,
    /// Entry name
    ///
    /// At most `MAXNAMLEN` bytes are taken from disk and decoded lossily:
    /// invalid UTF-8 becomes U+FFFD, so such a name does not match the
    /// on-disk bytes.
    pub name: String,
}
