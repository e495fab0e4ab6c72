//! Typed name/value list
//!
//! In-memory form of the boot environment blob. Encoding to and from the
//! label's XDR representation belongs to the pool backend; this side only
//! deals with decoded pairs.

use crate::error::{Result, ZfsError};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// Pair data type, numbered as in the on-disk nvpair encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Byte = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Int64 = 7,
    Uint64 = 8,
    String = 9,
    NvList = 19,
    BooleanValue = 21,
    Int8 = 22,
    Uint8 = 23,
}

const TYPE_NAMES: &[(DataType, &str)] = &[
    (DataType::Byte, "DATA_TYPE_BYTE"),
    (DataType::Int8, "DATA_TYPE_INT8"),
    (DataType::Uint8, "DATA_TYPE_UINT8"),
    (DataType::Int16, "DATA_TYPE_INT16"),
    (DataType::Uint16, "DATA_TYPE_UINT16"),
    (DataType::Int32, "DATA_TYPE_INT32"),
    (DataType::Uint32, "DATA_TYPE_UINT32"),
    (DataType::Int64, "DATA_TYPE_INT64"),
    (DataType::Uint64, "DATA_TYPE_UINT64"),
    (DataType::String, "DATA_TYPE_STRING"),
    (DataType::BooleanValue, "DATA_TYPE_BOOLEAN_VALUE"),
    (DataType::NvList, "DATA_TYPE_NVLIST"),
];

impl DataType {
    /// Full type name, `DATA_TYPE_UINT64` style
    pub fn name(&self) -> &'static str {
        TYPE_NAMES
            .iter()
            .find(|(t, _)| t == self)
            .map(|(_, n)| *n)
            .unwrap_or("DATA_TYPE_UNKNOWN")
    }

    /// Resolve a type name
    ///
    /// Accepts the full name or the part after `DATA_TYPE_`, in any case.
    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES.iter().find_map(|(t, full)| {
            let short = &full["DATA_TYPE_".len()..];
            if name.eq_ignore_ascii_case(full) || name.eq_ignore_ascii_case(short) {
                Some(*t)
            } else {
                None
            }
        })
    }

    /// Encoded width of a fixed-size scalar, `None` for strings and lists
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Byte | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            // boolean_t is an int
            Self::Int32 | Self::Uint32 | Self::BooleanValue => Some(4),
            Self::Int64 | Self::Uint64 => Some(8),
            Self::String | Self::NvList => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pair value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvValue {
    Byte(u8),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    BooleanValue(bool),
    String(String),
    NvList(NvList),
}

impl NvValue {
    /// Type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Byte(_) => DataType::Byte,
            Self::Int8(_) => DataType::Int8,
            Self::Uint8(_) => DataType::Uint8,
            Self::Int16(_) => DataType::Int16,
            Self::Uint16(_) => DataType::Uint16,
            Self::Int32(_) => DataType::Int32,
            Self::Uint32(_) => DataType::Uint32,
            Self::Int64(_) => DataType::Int64,
            Self::Uint64(_) => DataType::Uint64,
            Self::BooleanValue(_) => DataType::BooleanValue,
            Self::String(_) => DataType::String,
            Self::NvList(_) => DataType::NvList,
        }
    }

    /// Decode a value from native-endian bytes
    ///
    /// Fixed-width types need exactly their width. A string may carry a
    /// trailing NUL, which is dropped.
    pub fn from_ne_bytes(data_type: DataType, data: &[u8]) -> Result<Self> {
        if let Some(size) = data_type.fixed_size() {
            if data.len() != size {
                return Err(ZfsError::InvalidArgument);
            }
        }

        let word = |n: usize| -> [u8; 8] {
            let mut w = [0u8; 8];
            w[..n].copy_from_slice(&data[..n]);
            w
        };

        Ok(match data_type {
            DataType::Byte => Self::Byte(data[0]),
            DataType::Int8 => Self::Int8(data[0] as i8),
            DataType::Uint8 => Self::Uint8(data[0]),
            DataType::Int16 => Self::Int16(i16::from_ne_bytes([data[0], data[1]])),
            DataType::Uint16 => Self::Uint16(u16::from_ne_bytes([data[0], data[1]])),
            DataType::Int32 => Self::Int32(i32::from_ne_bytes([data[0], data[1], data[2], data[3]])),
            DataType::Uint32 => {
                Self::Uint32(u32::from_ne_bytes([data[0], data[1], data[2], data[3]]))
            }
            DataType::Int64 => Self::Int64(i64::from_ne_bytes(word(8))),
            DataType::Uint64 => Self::Uint64(u64::from_ne_bytes(word(8))),
            DataType::BooleanValue => {
                Self::BooleanValue(i32::from_ne_bytes([data[0], data[1], data[2], data[3]]) != 0)
            }
            DataType::String => {
                let bytes = match data.iter().position(|&b| b == 0) {
                    Some(nul) => &data[..nul],
                    None => data,
                };
                let text = core::str::from_utf8(bytes).map_err(|_| ZfsError::InvalidArgument)?;
                Self::String(text.to_string())
            }
            DataType::NvList => return Err(ZfsError::InvalidArgument),
        })
    }

    /// Native-endian bytes accepted by `from_ne_bytes`
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match self {
            Self::Byte(v) | Self::Uint8(v) => Vec::from([*v]),
            Self::Int8(v) => Vec::from(v.to_ne_bytes()),
            Self::Int16(v) => Vec::from(v.to_ne_bytes()),
            Self::Uint16(v) => Vec::from(v.to_ne_bytes()),
            Self::Int32(v) => Vec::from(v.to_ne_bytes()),
            Self::Uint32(v) => Vec::from(v.to_ne_bytes()),
            Self::Int64(v) => Vec::from(v.to_ne_bytes()),
            Self::Uint64(v) => Vec::from(v.to_ne_bytes()),
            Self::BooleanValue(v) => Vec::from((*v as i32).to_ne_bytes()),
            Self::String(s) => {
                let mut bytes = Vec::from(s.as_bytes());
                bytes.push(0);
                bytes
            }
            Self::NvList(_) => Vec::new(),
        }
    }
}

impl fmt::Display for NvValue {
    /// Scalars render as decimal, booleans as `1`/`0`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) | Self::Uint8(v) => write!(f, "{}", v),
            Self::Int8(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Uint16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Uint32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Uint64(v) => write!(f, "{}", v),
            Self::BooleanValue(v) => write!(f, "{}", *v as u8),
            Self::String(s) => f.write_str(s),
            Self::NvList(list) => write!(f, "<{} pairs>", list.len()),
        }
    }
}

/// Named value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvPair {
    pub name: String,
    pub value: NvValue,
}

impl NvPair {
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}

/// List of uniquely named pairs, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NvList {
    pairs: Vec<NvPair>,
}

impl NvList {
    /// Create an empty list
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NvPair> {
        self.pairs.iter()
    }

    /// Find a pair by name
    pub fn find(&self, name: &str) -> Option<&NvPair> {
        self.pairs.iter().find(|p| p.name == name)
    }

    /// Find a `u64` pair
    pub fn find_u64(&self, name: &str) -> Option<u64> {
        match self.find(name).map(|p| &p.value) {
            Some(NvValue::Uint64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Find a string pair
    pub fn find_str(&self, name: &str) -> Option<&str> {
        match self.find(name).map(|p| &p.value) {
            Some(NvValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Find a nested list
    pub fn find_list(&self, name: &str) -> Option<&NvList> {
        match self.find(name).map(|p| &p.value) {
            Some(NvValue::NvList(l)) => Some(l),
            _ => None,
        }
    }

    /// Add a pair, replacing any pair of the same name in place
    pub fn add(&mut self, name: &str, value: NvValue) {
        match self.pairs.iter_mut().find(|p| p.name == name) {
            Some(pair) => pair.value = value,
            None => self.pairs.push(NvPair {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Remove a pair, optionally only if it has the given type
    pub fn remove(&mut self, name: &str, data_type: Option<DataType>) -> Result<NvPair> {
        let index = self
            .pairs
            .iter()
            .position(|p| p.name == name && data_type.map_or(true, |t| p.data_type() == t))
            .ok_or(ZfsError::NotFound)?;
        Ok(self.pairs.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(DataType::from_name("DATA_TYPE_UINT64"), Some(DataType::Uint64));
        assert_eq!(DataType::from_name("uint64"), Some(DataType::Uint64));
        assert_eq!(DataType::from_name("Boolean_Value"), Some(DataType::BooleanValue));
        assert_eq!(DataType::from_name("float"), None);
        assert_eq!(DataType::Int8.name(), "DATA_TYPE_INT8");
    }

    #[test]
    fn test_add_replaces() {
        let mut list = NvList::new();
        list.add("a", NvValue::Uint64(1));
        list.add("b", NvValue::String("x".to_string()));
        list.add("a", NvValue::Int8(-1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().next().unwrap().value, NvValue::Int8(-1));
    }

    #[test]
    fn test_remove_typed() {
        let mut list = NvList::new();
        list.add("k", NvValue::String("v".to_string()));
        assert_eq!(list.remove("k", Some(DataType::Uint64)), Err(ZfsError::NotFound));
        assert!(list.remove("k", Some(DataType::String)).is_ok());
        assert!(list.is_empty());
    }

    #[test]
    fn test_string_bytes() {
        let v = NvValue::from_ne_bytes(DataType::String, b"hello\0").unwrap();
        assert_eq!(v, NvValue::String("hello".to_string()));
        assert_eq!(v.to_ne_bytes(), b"hello\0");
    }
}
