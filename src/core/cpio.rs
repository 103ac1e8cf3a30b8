//! CPIO "newc" archive codec used for the package payload
//!
//! Each member is `"070701"`, thirteen 8-character lowercase hex fields, the
//! NUL-terminated name padded to 4 bytes, then the content padded to 4 bytes.
//! Padding is relative to the start of the archive stream.

use crate::core::error::{Result, RpmError};
use crate::core::io::{pad_to, ByteReader};

pub const CPIO_MAGIC: &[u8; 6] = b"070701";
pub const TRAILER: &str = "TRAILER!!!";

/// Magic plus thirteen hex fields
pub const CPIO_HEADER_SIZE: usize = 6 + 13 * 8;

/// One archive member
///
/// `namesize` and `filesize` are not stored; they are derived from `name` and
/// `content` when written and checked against them when read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpioEntry {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub devmajor: u32,
    pub devminor: u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    pub checksum: u32,
    pub name: String,
    pub content: Vec<u8>,
}

impl CpioEntry {
    pub fn new(name: impl Into<String>, mode: u32, content: Vec<u8>) -> Self {
        CpioEntry {
            mode,
            nlink: 1,
            name: name.into(),
            content,
            ..CpioEntry::default()
        }
    }

    /// End-of-archive sentinel
    pub fn trailer() -> Self {
        CpioEntry {
            nlink: 1,
            name: TRAILER.to_string(),
            ..CpioEntry::default()
        }
    }

    pub fn is_trailer(&self) -> bool {
        self.name == TRAILER
    }

    /// Name length including the NUL terminator
    pub fn namesize(&self) -> usize {
        self.name.len() + 1
    }

    pub fn filesize(&self) -> usize {
        self.content.len()
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.name.as_bytes().contains(&0) {
            return Err(RpmError::EmbeddedNul(self.name.clone()));
        }
        let namesize =
            u32::try_from(self.namesize()).map_err(|_| RpmError::Overflow(self.namesize()))?;
        let filesize =
            u32::try_from(self.filesize()).map_err(|_| RpmError::Overflow(self.filesize()))?;

        out.extend_from_slice(CPIO_MAGIC);
        for field in [
            self.ino,
            self.mode,
            self.uid,
            self.gid,
            self.nlink,
            self.mtime,
            filesize,
            self.devmajor,
            self.devminor,
            self.rdevmajor,
            self.rdevminor,
            namesize,
            self.checksum,
        ] {
            out.extend_from_slice(format!("{:08x}", field).as_bytes());
        }
        out.extend_from_slice(self.name.as_bytes());
        out.push(0);
        pad_to(out, 4);
        out.extend_from_slice(&self.content);
        pad_to(out, 4);
        Ok(())
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let magic = reader.take(CPIO_MAGIC.len(), "cpio magic")?;
        if magic != CPIO_MAGIC {
            return Err(RpmError::InvalidCpioMagic(
                String::from_utf8_lossy(magic).into_owned(),
            ));
        }
        let mut fields = [0u32; 13];
        for field in fields.iter_mut() {
            *field = read_hex(reader)?;
        }
        let [ino, mode, uid, gid, nlink, mtime, filesize, devmajor, devminor, rdevmajor, rdevminor, namesize, checksum] =
            fields;

        let raw_name = reader.take(namesize as usize, "cpio name")?;
        let name = match raw_name.split_last() {
            Some((&0, name)) => std::str::from_utf8(name)
                .map_err(|e| RpmError::InvalidString(format!("cpio name: {}", e)))?
                .to_string(),
            _ => {
                return Err(RpmError::InconsistentEntry {
                    name: String::from_utf8_lossy(raw_name).into_owned(),
                    field: "namesize",
                    declared: namesize,
                    actual: raw_name.iter().position(|b| *b == 0).unwrap_or(raw_name.len()),
                })
            }
        };
        reader.align(4);
        let content = reader.take(filesize as usize, "cpio content")?.to_vec();
        reader.align(4);

        Ok(CpioEntry {
            ino,
            mode,
            uid,
            gid,
            nlink,
            mtime,
            devmajor,
            devminor,
            rdevmajor,
            rdevminor,
            checksum,
            name,
            content,
        })
    }
}

fn read_hex(reader: &mut ByteReader<'_>) -> Result<u32> {
    let raw = reader.take(8, "cpio header field")?;
    let invalid = || RpmError::InvalidHex {
        field: "cpio header",
        value: String::from_utf8_lossy(raw).into_owned(),
    };
    let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u32::from_str_radix(text, 16).map_err(|_| invalid())
}

/// Serialize `entries` followed by the trailer
pub fn write_archive<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a CpioEntry>,
{
    let mut out = Vec::new();
    for entry in entries {
        entry.write(&mut out)?;
    }
    CpioEntry::trailer().write(&mut out)?;
    Ok(out)
}

/// Iterator over archive members, ending after the trailer
///
/// The trailer itself is yielded so callers can inspect it. Running out of
/// input before the trailer yields [`RpmError::MissingTrailer`].
pub struct CpioReader<'a> {
    reader: ByteReader<'a>,
    done: bool,
}

impl<'a> CpioReader<'a> {
    pub fn new(archive: &'a [u8]) -> Self {
        CpioReader {
            reader: ByteReader::new(archive),
            done: false,
        }
    }
}

impl Iterator for CpioReader<'_> {
    type Item = Result<CpioEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.reader.is_empty() {
            self.done = true;
            return Some(Err(RpmError::MissingTrailer));
        }
        let entry = CpioEntry::read(&mut self.reader);
        match &entry {
            Ok(e) if !e.is_trailer() => {}
            _ => self.done = true,
        }
        Some(entry)
    }
}

/// Decode every member of an archive, trailer included
pub fn read_archive(archive: &[u8]) -> Result<Vec<CpioEntry>> {
    CpioReader::new(archive).collect()
}
