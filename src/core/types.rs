//! Primitive codec: header values to and from the storage blob
//!
//! `encode` appends to an explicit storage buffer whose length is the storage
//! cursor, aligning integers to their natural size relative to the start of
//! that buffer. `decode` reads back from the same blob given an offset and an
//! element count.

use crate::core::error::{Result, RpmError};
use crate::core::io::{align_up, pad_to};
use crate::core::tag::WireType;
use serde::Serialize;
use std::fmt;

/// Decoded value(s) of one index record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    String(String),
    StringArray(Vec<String>),
    I18nString(Vec<String>),
    Binary(Vec<u8>),
}

impl Value {
    /// An empty value of the given wire type
    ///
    /// `String` has no empty form; callers create it with its single value.
    pub fn empty(wire_type: WireType) -> Option<Value> {
        match wire_type {
            WireType::Int16 => Some(Value::Int16(Vec::new())),
            WireType::Int32 => Some(Value::Int32(Vec::new())),
            WireType::StringArray => Some(Value::StringArray(Vec::new())),
            WireType::I18nString => Some(Value::I18nString(Vec::new())),
            WireType::Binary => Some(Value::Binary(Vec::new())),
            WireType::String => None,
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            Value::Int16(_) => WireType::Int16,
            Value::Int32(_) => WireType::Int32,
            Value::String(_) => WireType::String,
            Value::StringArray(_) => WireType::StringArray,
            Value::I18nString(_) => WireType::I18nString,
            Value::Binary(_) => WireType::Binary,
        }
    }

    /// Index-entry count: number of elements, or bytes for `Binary`
    pub fn count(&self) -> usize {
        match self {
            Value::Int16(v) => v.len(),
            Value::Int32(v) => v.len(),
            Value::String(_) => 1,
            Value::StringArray(v) | Value::I18nString(v) => v.len(),
            Value::Binary(v) => v.len(),
        }
    }

    /// String elements, for any of the three string types
    pub fn strings(&self) -> Option<Vec<&str>> {
        match self {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::StringArray(v) | Value::I18nString(v) => {
                Some(v.iter().map(String::as_str).collect())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int16(v) => write!(f, "{:?}", v),
            Value::Int32(v) => write!(f, "{:?}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::StringArray(v) | Value::I18nString(v) => write!(f, "{:?}", v),
            Value::Binary(v) => f.write_str(&hex::encode(v)),
        }
    }
}

fn slice<'a>(
    storage: &'a [u8],
    offset: usize,
    len: usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .filter(|end| *end <= storage.len())
        .map(|end| &storage[offset..end])
        .ok_or(RpmError::Truncated {
            context,
            offset,
            needed: len,
            available: storage.len().saturating_sub(offset),
        })
}

fn decode_strings(storage: &[u8], offset: usize, count: usize) -> Result<Vec<String>> {
    let mut strings = Vec::with_capacity(count.min(1024));
    let mut pos = offset;
    while strings.len() < count {
        let rest = storage.get(pos..).unwrap_or(&[]);
        let nul = rest.iter().position(|b| *b == 0).ok_or(RpmError::Truncated {
            context: "string value",
            offset: pos,
            needed: rest.len() + 1,
            available: rest.len(),
        })?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| RpmError::InvalidString(format!("at offset {}: {}", pos, e)))?;
        strings.push(s.to_string());
        pos += nul + 1;
    }
    Ok(strings)
}

/// Read `count` elements of `wire_type` starting at `offset` in `storage`
pub fn decode(storage: &[u8], offset: usize, count: usize, wire_type: WireType) -> Result<Value> {
    match wire_type {
        WireType::Int16 => {
            let len = count.checked_mul(2).ok_or(RpmError::Overflow(count))?;
            let bytes = slice(storage, offset, len, "INT16 value")?;
            Ok(Value::Int16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect(),
            ))
        }
        WireType::Int32 => {
            let len = count.checked_mul(4).ok_or(RpmError::Overflow(count))?;
            let bytes = slice(storage, offset, len, "INT32 value")?;
            Ok(Value::Int32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ))
        }
        WireType::String => {
            if count != 1 {
                return Err(RpmError::InvalidString(format!(
                    "STRING value with count {}",
                    count
                )));
            }
            let mut strings = decode_strings(storage, offset, 1)?;
            Ok(Value::String(strings.remove(0)))
        }
        WireType::StringArray => Ok(Value::StringArray(decode_strings(storage, offset, count)?)),
        WireType::I18nString => Ok(Value::I18nString(decode_strings(storage, offset, count)?)),
        WireType::Binary => Ok(Value::Binary(
            slice(storage, offset, count, "BIN value")?.to_vec(),
        )),
    }
}

fn encode_str(storage: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(RpmError::EmbeddedNul(s.to_string()));
    }
    storage.extend_from_slice(s.as_bytes());
    storage.push(0);
    Ok(())
}

/// Append `value` to `storage`, returning the post-alignment start offset
pub fn encode(storage: &mut Vec<u8>, value: &Value) -> Result<usize> {
    pad_to(storage, value.wire_type().alignment());
    let offset = storage.len();
    match value {
        Value::Int16(v) => v
            .iter()
            .for_each(|n| storage.extend_from_slice(&n.to_be_bytes())),
        Value::Int32(v) => v
            .iter()
            .for_each(|n| storage.extend_from_slice(&n.to_be_bytes())),
        Value::String(s) => encode_str(storage, s)?,
        Value::StringArray(v) | Value::I18nString(v) => {
            for s in v {
                encode_str(storage, s)?;
            }
        }
        Value::Binary(v) => storage.extend_from_slice(v),
    }
    debug_assert_eq!(offset, align_up(offset, value.wire_type().alignment()));
    Ok(offset)
}
