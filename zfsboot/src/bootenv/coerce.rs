//! Text to typed value conversion for `set_str`
//!
//! Integers take an optional sign, then a base prefix, then digits. Leading
//! whitespace is skipped; anything after the last digit is an error.

use super::nvlist::{DataType, NvValue};
use crate::error::{Result, ZfsError};
use alloc::string::ToString;

/// Split a base prefix off `text`: `0x`/`0X` hex, leading `0` octal
fn radix_of(text: &str) -> (u32, &str) {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (16, hex)
    } else if text.len() > 1 && text.starts_with('0') {
        (8, &text[1..])
    } else {
        (10, text)
    }
}

fn parse_magnitude(text: &str) -> Result<u64> {
    let (radix, digits) = radix_of(text);
    // from_str_radix takes its own '+', which would allow a second sign
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(ZfsError::InvalidArgument);
    }
    u64::from_str_radix(digits, radix).map_err(|_| ZfsError::InvalidArgument)
}

/// Parse a signed integer with an optional sign and base prefix
pub fn parse_i64(text: &str) -> Result<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = parse_magnitude(rest)?;

    if negative {
        if magnitude == i64::MAX as u64 + 1 {
            Ok(i64::MIN)
        } else {
            i64::try_from(magnitude)
                .map(|v| -v)
                .map_err(|_| ZfsError::InvalidArgument)
        }
    } else {
        i64::try_from(magnitude).map_err(|_| ZfsError::InvalidArgument)
    }
}

/// Parse an unsigned integer with a base prefix; a sign is rejected
pub fn parse_u64(text: &str) -> Result<u64> {
    let text = text.trim_start();
    let rest = text.strip_prefix('+').unwrap_or(text);
    if rest.starts_with('-') {
        return Err(ZfsError::InvalidArgument);
    }
    parse_magnitude(rest)
}

fn parse_bool(text: &str) -> Result<bool> {
    let trimmed = text.trim_start();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        parse_i64(trimmed).map(|v| v != 0)
    }
}

macro_rules! narrow {
    ($parse:ident, $text:expr, $ty:ty, $variant:ident) => {
        <$ty>::try_from($parse($text)?)
            .map(NvValue::$variant)
            .map_err(|_| ZfsError::InvalidArgument)
    };
}

/// Convert `text` to a value of `data_type`
pub fn coerce(data_type: DataType, text: &str) -> Result<NvValue> {
    match data_type {
        DataType::Int8 => narrow!(parse_i64, text, i8, Int8),
        DataType::Int16 => narrow!(parse_i64, text, i16, Int16),
        DataType::Int32 => narrow!(parse_i64, text, i32, Int32),
        DataType::Int64 => parse_i64(text).map(NvValue::Int64),
        DataType::Byte => narrow!(parse_u64, text, u8, Byte),
        DataType::Uint8 => narrow!(parse_u64, text, u8, Uint8),
        DataType::Uint16 => narrow!(parse_u64, text, u16, Uint16),
        DataType::Uint32 => narrow!(parse_u64, text, u32, Uint32),
        DataType::Uint64 => parse_u64(text).map(NvValue::Uint64),
        DataType::BooleanValue => parse_bool(text).map(NvValue::BooleanValue),
        DataType::String => Ok(NvValue::String(text.to_string())),
        DataType::NvList => Err(ZfsError::InvalidArgument),
    }
}
