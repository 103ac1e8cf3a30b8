//! Header structure: tag directory plus shared storage blob
//!
//! On disk a header structure is laid out as:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ magic 8E AD E8 01 │ reserved (4) │           │  8-byte aligned
//! │ nindex (u32 BE)   │ hsize (u32 BE)           │
//! ├──────────────────────────────────────────────┤
//! │ nindex × { tag, type, offset, count }  16 B  │
//! ├──────────────────────────────────────────────┤
//! │ storage blob (hsize bytes)                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Offsets in the index are relative to the storage blob and are recomputed on
//! every save, so they are never stable across edits.

use crate::core::error::{Result, RpmError};
use crate::core::io::{pad_to, ByteReader};
use crate::core::tag::{Tag, WireType};
use crate::core::types::{self, Value};
use std::collections::HashMap;
use std::fmt;

pub const HEADER_MAGIC: [u8; 4] = [0x8e, 0xad, 0xe8, 0x01];

/// Size of one index-array entry
pub const INDEX_ENTRY_SIZE: usize = 16;

/// Magic + reserved + nindex + hsize
pub const PREAMBLE_SIZE: usize = 16;

/// One tagged, typed, counted value
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub tag: Tag,
    pub wire_type: WireType,
    /// Offset into the owning structure's storage blob as of the last load/save
    pub offset: u32,
    pub count: u32,
    pub value: Value,
}

impl IndexRecord {
    fn new(tag: Tag, value: Value) -> Self {
        IndexRecord {
            tag,
            wire_type: value.wire_type(),
            offset: 0,
            count: value.count() as u32,
            value,
        }
    }
}

/// Ordered collection of index records for one section
#[derive(Debug, Clone)]
pub struct HeaderStructure {
    signature: bool,
    records: Vec<IndexRecord>,
    index: HashMap<Tag, usize>,
}

impl HeaderStructure {
    /// Create an empty structure for the signature (`true`) or metadata section
    pub fn new(signature: bool) -> Self {
        HeaderStructure {
            signature,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn is_signature(&self) -> bool {
        self.signature
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.records.iter().map(|r| r.tag)
    }

    pub fn get(&self, tag: Tag) -> Option<&IndexRecord> {
        self.index.get(&tag).map(|&i| &self.records[i])
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.index.contains_key(&tag)
    }

    fn check_tag(&self, tag: Tag, value: &Value) -> Result<()> {
        if !tag.section().allows(self.signature) {
            return Err(RpmError::WrongSection {
                tag,
                signature: self.signature,
            });
        }
        if value.wire_type() != tag.wire_type() {
            return Err(RpmError::WrongValueType {
                tag,
                expected: tag.wire_type(),
                actual: value.wire_type(),
            });
        }
        Ok(())
    }

    /// Append `value` to the record for `tag`, creating it if needed
    ///
    /// Returns the element index of the first appended item. A second value
    /// for a `String` tag is rejected rather than replacing the first.
    pub fn add_value(&mut self, tag: Tag, value: Value) -> Result<usize> {
        self.check_tag(tag, &value)?;

        let Some(&i) = self.index.get(&tag) else {
            self.index.insert(tag, self.records.len());
            self.records.push(IndexRecord::new(tag, value));
            return Ok(0);
        };

        let record = &mut self.records[i];
        let first = record.value.count();
        match (&mut record.value, value) {
            (Value::Int16(v), Value::Int16(add)) => v.extend(add),
            (Value::Int32(v), Value::Int32(add)) => v.extend(add),
            (Value::StringArray(v), Value::StringArray(add)) => v.extend(add),
            (Value::I18nString(v), Value::I18nString(add)) => v.extend(add),
            (Value::Binary(v), Value::Binary(add)) => v.extend(add),
            (Value::String(_), Value::String(_)) => {
                return Err(RpmError::SingleValueViolation(tag))
            }
            (existing, add) => {
                return Err(RpmError::WrongValueType {
                    tag,
                    expected: existing.wire_type(),
                    actual: add.wire_type(),
                })
            }
        }
        record.count = record.value.count() as u32;
        Ok(first)
    }

    /// Add one string to a `String`, `StringArray` or `I18nString` tag
    pub fn add_string(&mut self, tag: Tag, value: impl Into<String>) -> Result<usize> {
        let value = value.into();
        let value = match tag.wire_type() {
            WireType::String => Value::String(value),
            WireType::I18nString => Value::I18nString(vec![value]),
            _ => Value::StringArray(vec![value]),
        };
        self.add_value(tag, value)
    }

    pub fn add_int16(&mut self, tag: Tag, value: u16) -> Result<usize> {
        self.add_value(tag, Value::Int16(vec![value]))
    }

    pub fn add_int32(&mut self, tag: Tag, value: u32) -> Result<usize> {
        self.add_value(tag, Value::Int32(vec![value]))
    }

    pub fn add_binary(&mut self, tag: Tag, value: impl Into<Vec<u8>>) -> Result<usize> {
        self.add_value(tag, Value::Binary(value.into()))
    }

    /// Reorder records by ascending tag id, the order rpm itself writes
    pub fn sort_by_id(&mut self) {
        self.records.sort_by_key(|r| r.tag.id());
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.tag, i))
            .collect();
    }

    /// Position of `needle` within a string-valued record
    pub fn index_of_string(&self, tag: Tag, needle: &str) -> Option<usize> {
        self.get(tag)?
            .value
            .strings()?
            .iter()
            .position(|s| *s == needle)
    }

    pub fn contains_string(&self, tag: Tag, needle: &str) -> bool {
        self.index_of_string(tag, needle).is_some()
    }

    fn value(&self, tag: Tag) -> Result<&Value> {
        self.get(tag)
            .map(|r| &r.value)
            .ok_or(RpmError::MissingTag(tag))
    }

    fn wrong_type(tag: Tag, expected: WireType, value: &Value) -> RpmError {
        RpmError::WrongValueType {
            tag,
            expected,
            actual: value.wire_type(),
        }
    }

    /// Single string; for `I18nString` this is the first (default locale) entry
    pub fn get_string(&self, tag: Tag) -> Result<&str> {
        match self.value(tag)? {
            Value::String(s) => Ok(s),
            Value::I18nString(v) if v.len() == 1 => Ok(&v[0]),
            Value::I18nString(v) => v.first().map(String::as_str).ok_or(
                RpmError::NotSingleValued {
                    tag,
                    count: v.len(),
                },
            ),
            other => Err(Self::wrong_type(tag, WireType::String, other)),
        }
    }

    pub fn get_string_array(&self, tag: Tag) -> Result<&[String]> {
        match self.value(tag)? {
            Value::StringArray(v) | Value::I18nString(v) => Ok(v),
            Value::String(s) => Ok(std::slice::from_ref(s)),
            other => Err(Self::wrong_type(tag, WireType::StringArray, other)),
        }
    }

    pub fn get_int16_array(&self, tag: Tag) -> Result<&[u16]> {
        match self.value(tag)? {
            Value::Int16(v) => Ok(v),
            other => Err(Self::wrong_type(tag, WireType::Int16, other)),
        }
    }

    pub fn get_int32_array(&self, tag: Tag) -> Result<&[u32]> {
        match self.value(tag)? {
            Value::Int32(v) => Ok(v),
            other => Err(Self::wrong_type(tag, WireType::Int32, other)),
        }
    }

    pub fn get_int32(&self, tag: Tag) -> Result<u32> {
        match self.get_int32_array(tag)? {
            [single] => Ok(*single),
            many => Err(RpmError::NotSingleValued {
                tag,
                count: many.len(),
            }),
        }
    }

    pub fn get_binary(&self, tag: Tag) -> Result<&[u8]> {
        match self.value(tag)? {
            Value::Binary(v) => Ok(v),
            other => Err(Self::wrong_type(tag, WireType::Binary, other)),
        }
    }

    /// Parse a header structure at the reader's position
    ///
    /// The reader is first aligned to 8 bytes. On success it is left just past
    /// the storage blob. Any failure aborts the whole load.
    pub fn load(reader: &mut ByteReader<'_>, signature: bool) -> Result<Self> {
        reader.align(8);
        let magic: [u8; 4] = reader.read_array("header magic")?;
        if magic != HEADER_MAGIC {
            return Err(RpmError::InvalidHeaderMagic(magic));
        }
        reader.skip(4, "header reserved")?;
        let nindex = reader.read_u32("header nindex")? as usize;
        let hsize = reader.read_u32("header hsize")? as usize;

        let index_len = nindex
            .checked_mul(INDEX_ENTRY_SIZE)
            .ok_or(RpmError::Overflow(nindex))?;
        let index_bytes = reader.take(index_len, "header index array")?;
        let storage = reader.take(hsize, "header storage")?;

        let mut header = HeaderStructure::new(signature);
        let mut entries = ByteReader::new(index_bytes);
        for _ in 0..nindex {
            let tag = Tag::from_id(entries.read_u32("index tag")?, signature)?;
            let found = WireType::from_u32(entries.read_u32("index type")?)?;
            if found != tag.wire_type() {
                return Err(RpmError::TypeMismatch {
                    tag,
                    expected: tag.wire_type(),
                    found,
                });
            }
            let offset = entries.read_u32("index offset")?;
            let count = entries.read_u32("index count")?;
            if found == WireType::String && count != 1 {
                return Err(RpmError::InvalidStringCount { tag, count });
            }
            let value = types::decode(storage, offset as usize, count as usize, found)?;

            if header.index.contains_key(&tag) {
                return Err(RpmError::DuplicateTag(tag));
            }
            header.index.insert(tag, header.records.len());
            header.records.push(IndexRecord {
                tag,
                wire_type: found,
                offset,
                count,
                value,
            });
        }
        Ok(header)
    }

    /// Parse a standalone header structure starting at byte 0
    pub fn from_bytes(bytes: &[u8], signature: bool) -> Result<Self> {
        HeaderStructure::load(&mut ByteReader::new(bytes), signature)
    }

    /// Serialize onto `out`, recomputing every record's offset and count
    ///
    /// The storage blob is laid out first, since offsets are only known after
    /// encoding. On error neither `out` nor the records are touched.
    pub fn save(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let nindex = u32::try_from(self.records.len())
            .map_err(|_| RpmError::Overflow(self.records.len()))?;

        let mut storage = Vec::new();
        let mut placed = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if record.value.wire_type() != record.tag.wire_type() {
                return Err(RpmError::WrongValueType {
                    tag: record.tag,
                    expected: record.tag.wire_type(),
                    actual: record.value.wire_type(),
                });
            }
            let offset = types::encode(&mut storage, &record.value)?;
            let count = record.value.count();
            placed.push((
                u32::try_from(offset).map_err(|_| RpmError::Overflow(offset))?,
                u32::try_from(count).map_err(|_| RpmError::Overflow(count))?,
            ));
        }
        let hsize = u32::try_from(storage.len()).map_err(|_| RpmError::Overflow(storage.len()))?;

        for (record, (offset, count)) in self.records.iter_mut().zip(placed) {
            record.wire_type = record.value.wire_type();
            record.offset = offset;
            record.count = count;
        }

        pad_to(out, 8);
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&nindex.to_be_bytes());
        out.extend_from_slice(&hsize.to_be_bytes());

        let index_at = out.len();
        out.resize(index_at + INDEX_ENTRY_SIZE * self.records.len(), 0);
        for (i, record) in self.records.iter().enumerate() {
            let slot = index_at + i * INDEX_ENTRY_SIZE;
            out[slot..slot + 4].copy_from_slice(&record.tag.id().to_be_bytes());
            out[slot + 4..slot + 8].copy_from_slice(&record.wire_type.ordinal().to_be_bytes());
            out[slot + 8..slot + 12].copy_from_slice(&record.offset.to_be_bytes());
            out[slot + 12..slot + 16].copy_from_slice(&record.count.to_be_bytes());
        }
        out.extend_from_slice(&storage);
        Ok(())
    }

    /// Serialize into a fresh buffer
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.save(&mut out)?;
        Ok(out)
    }
}

/// Equality ignores offsets: only section, tag order and values matter
impl PartialEq for HeaderStructure {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
            && self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .zip(&other.records)
                .all(|(a, b)| a.tag == b.tag && a.value == b.value)
    }
}

impl fmt::Display for HeaderStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(
                f,
                "{} type={} offset={} count={}",
                record.tag, record.wire_type, record.offset, record.count
            )?;
            writeln!(f, "value={}", record.value)?;
        }
        Ok(())
    }
}
