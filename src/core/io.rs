//! Byte-level I/O helpers shared by the lead, header and cpio codecs
//!
//! All multi-byte integers in a package are big-endian. Alignment is always
//! relative to the start of the buffer being read or written, which is why the
//! reader tracks an absolute position instead of slicing as it goes.

use crate::core::error::{Result, RpmError};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Round `position` up to the next multiple of `align`
pub fn align_up(position: usize, align: usize) -> usize {
    match position % align {
        0 => position,
        rem => position + align - rem,
    }
}

/// Zero-pad `out` until its length is a multiple of `align`
pub fn pad_to(out: &mut Vec<u8>, align: usize) {
    let target = align_up(out.len(), align);
    out.resize(target, 0);
}

/// Forward-only cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Skip forward to the next `align` boundary
    ///
    /// Padding past the end of the buffer is tolerated; the next read will
    /// report truncation.
    pub fn align(&mut self, align: usize) {
        self.pos = align_up(self.pos, align);
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(RpmError::Truncated {
                context,
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, context: &'static str) -> Result<()> {
        self.take(len, context).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let bytes = self.take(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(context)?[0])
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array(context)?))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array(context)?))
    }

    /// Everything from the cursor to the end of the buffer
    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.pos.min(self.buf.len());
        self.pos = self.buf.len();
        &self.buf[start..]
    }
}

/// Write a fully assembled package in one scoped write
pub fn write_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

/// Read a whole package file into memory
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(97, 4), 100);
        assert_eq!(align_up(5, 1), 5);
    }

    #[test]
    fn test_pad_to() {
        let mut out = vec![1, 2, 3];
        pad_to(&mut out, 4);
        assert_eq!(out, vec![1, 2, 3, 0]);
        pad_to(&mut out, 4);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_reader_big_endian() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xff];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16("a").unwrap(), 1);
        assert_eq!(reader.read_u32("b").unwrap(), 2);
        assert_eq!(reader.read_u8("c").unwrap(), 0xff);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_truncation() {
        let data = [0u8; 3];
        let mut reader = ByteReader::new(&data);
        let err = reader.read_u32("field").unwrap_err();
        assert!(matches!(
            err,
            RpmError::Truncated {
                context: "field",
                offset: 0,
                needed: 4,
                available: 3
            }
        ));
        // Failed read does not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_reader_align_and_rest() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut reader = ByteReader::new(&data);
        reader.skip(1, "x").unwrap();
        reader.align(8);
        assert_eq!(reader.position(), 8);
        assert_eq!(reader.rest(), &[9]);
        assert!(reader.rest().is_empty());
    }
}
