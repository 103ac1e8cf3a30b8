//! Payload compression for the cpio archive
//!
//! The compressor is named in the metadata header (`PAYLOADCOMPRESSOR`,
//! `PAYLOADFLAGS`) so readers can pick the matching decoder:
//! - `gzip` through flate2 at best level, flags `"9"` (default)
//! - `zstd` at level 19, flags `"19"`; needs `rpmlib(PayloadIsZstd)`

use crate::core::error::{Result, RpmError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const ZSTD_LEVEL: i32 = 19;

/// Payload compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCompressor {
    #[default]
    Gzip,
    Zstd,
}

impl PayloadCompressor {
    /// Value stored in `RPMTAG_PAYLOADCOMPRESSOR`
    pub fn name(self) -> &'static str {
        match self {
            PayloadCompressor::Gzip => "gzip",
            PayloadCompressor::Zstd => "zstd",
        }
    }

    /// Value stored in `RPMTAG_PAYLOADFLAGS`
    pub fn flags(self) -> &'static str {
        match self {
            PayloadCompressor::Gzip => "9",
            PayloadCompressor::Zstd => "19",
        }
    }

    /// Resolve a `PAYLOADCOMPRESSOR` value; absence means gzip
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name {
            None | Some("gzip") => Ok(PayloadCompressor::Gzip),
            Some("zstd") => Ok(PayloadCompressor::Zstd),
            Some(other) => Err(RpmError::UnsupportedCompressor(other.to_string())),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            PayloadCompressor::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            PayloadCompressor::Zstd => Ok(zstd::stream::encode_all(data, ZSTD_LEVEL)?),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            PayloadCompressor::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| RpmError::Decompression(format!("gzip: {}", e)))?;
                Ok(out)
            }
            PayloadCompressor::Zstd => zstd::stream::decode_all(data)
                .map_err(|e| RpmError::Decompression(format!("zstd: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"070701".iter().copied().cycle().take(4096).collect()
    }

    #[test]
    fn test_gzip_roundtrip() {
        let data = sample();
        let packed = PayloadCompressor::Gzip.compress(&data).unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
        assert!(packed.len() < data.len());
        assert_eq!(PayloadCompressor::Gzip.decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_zstd_roundtrip() {
        let data = sample();
        let packed = PayloadCompressor::Zstd.compress(&data).unwrap();
        assert_eq!(&packed[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
        assert_eq!(PayloadCompressor::Zstd.decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(PayloadCompressor::from_name(None).unwrap(), PayloadCompressor::Gzip);
        assert_eq!(
            PayloadCompressor::from_name(Some("zstd")).unwrap(),
            PayloadCompressor::Zstd
        );
        let err = PayloadCompressor::from_name(Some("lzma")).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_corrupt_stream() {
        let err = PayloadCompressor::Gzip.decompress(b"not gzip").unwrap_err();
        assert!(matches!(err, RpmError::Decompression(_)));
    }
}
