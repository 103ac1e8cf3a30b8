//! Package parser
//!
//! Reads lead, signature header and metadata header eagerly and keeps the
//! compressed payload as-is; the cpio archive is only decompressed when the
//! entries are asked for.

use crate::core::builder::{Dependency, DependencyKind};
use crate::core::compression::PayloadCompressor;
use crate::core::cpio::{self, CpioEntry};
use crate::core::error::{Result, RpmError};
use crate::core::flags::DependencyFlags;
use crate::core::header::HeaderStructure;
use crate::core::io::{read_file, ByteReader};
use crate::core::lead::Lead;
use crate::core::tag::Tag;
use md5::{Digest, Md5};
use sha2::Sha256;
use std::path::Path;
use tracing::{debug, info, warn};

/// A parsed package
#[derive(Debug, Clone)]
pub struct RpmPackage {
    lead: Lead,
    signature: HeaderStructure,
    header: HeaderStructure,
    header_bytes: Vec<u8>,
    payload: Vec<u8>,
}

impl RpmPackage {
    /// Parse a complete package and check its size and MD5 signature tags
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let lead = Lead::read(&mut reader)?;
        let signature = HeaderStructure::load(&mut reader, true)?;
        reader.align(8);
        let signed_start = reader.position();
        let header = HeaderStructure::load(&mut reader, false)?;
        let header_end = reader.position();
        let payload = reader.rest();
        let signed = bytes.get(signed_start..).unwrap_or_default();
        let header_bytes = bytes.get(signed_start..header_end).unwrap_or_default();

        if let Ok(stored) = signature.get_int32(Tag::SigSize) {
            if stored as usize != signed.len() {
                warn!("Signature size {} but {} bytes follow", stored, signed.len());
                return Err(RpmError::SizeMismatch {
                    stored,
                    actual: signed.len(),
                });
            }
        }
        if let Ok(stored) = signature.get_binary(Tag::SigMd5) {
            let computed = Md5::digest(signed);
            if stored != computed.as_slice() {
                warn!("MD5 mismatch for package {}", lead.name);
                return Err(RpmError::DigestMismatch {
                    stored: hex::encode(stored),
                    computed: hex::encode(computed),
                });
            }
        }

        debug!(
            "Parsed {}: {} signature tags, {} header tags, {} payload bytes",
            lead.name,
            signature.len(),
            header.len(),
            payload.len()
        );
        Ok(RpmPackage {
            lead,
            signature,
            header,
            header_bytes: header_bytes.to_vec(),
            payload: payload.to_vec(),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening package {}", path.as_ref().display());
        let bytes = read_file(path)?;
        RpmPackage::from_bytes(&bytes)
    }

    pub fn lead(&self) -> &Lead {
        &self.lead
    }

    pub fn signature(&self) -> &HeaderStructure {
        &self.signature
    }

    /// Metadata header structure
    pub fn header(&self) -> &HeaderStructure {
        &self.header
    }

    /// Compressed payload as stored in the file
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn get_string(&self, tag: Tag) -> Result<&str> {
        self.header.get_string(tag)
    }

    pub fn get_string_array(&self, tag: Tag) -> Result<&[String]> {
        self.header.get_string_array(tag)
    }

    pub fn get_int16_array(&self, tag: Tag) -> Result<&[u16]> {
        self.header.get_int16_array(tag)
    }

    pub fn get_int32_array(&self, tag: Tag) -> Result<&[u32]> {
        self.header.get_int32_array(tag)
    }

    pub fn get_int32(&self, tag: Tag) -> Result<u32> {
        self.header.get_int32(tag)
    }

    pub fn get_binary(&self, tag: Tag) -> Result<&[u8]> {
        self.header.get_binary(tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.header.contains(tag)
    }

    /// `name-version-release`
    pub fn nevr(&self) -> Result<String> {
        Ok(format!(
            "{}-{}-{}",
            self.get_string(Tag::Name)?,
            self.get_string(Tag::Version)?,
            self.get_string(Tag::Release)?
        ))
    }

    pub fn compressor(&self) -> Result<PayloadCompressor> {
        PayloadCompressor::from_name(self.get_string(Tag::PayloadCompressor).ok())
    }

    /// Full paths of the packaged files, DIRNAMES[DIRINDEXES] + BASENAMES
    pub fn file_names(&self) -> Result<Vec<String>> {
        let Ok(bases) = self.get_string_array(Tag::BaseNames) else {
            return Ok(Vec::new());
        };
        let dirs = self.get_string_array(Tag::DirNames)?;
        let indexes = self.get_int32_array(Tag::DirIndexes)?;
        if indexes.len() != bases.len() {
            return Err(RpmError::InconsistentFileList(format!(
                "{} basenames but {} directory indexes",
                bases.len(),
                indexes.len()
            )));
        }
        bases
            .iter()
            .zip(indexes)
            .map(|(base, &index)| {
                let dir = dirs.get(index as usize).ok_or(RpmError::InvalidDirIndex {
                    index,
                    dirs: dirs.len(),
                })?;
                Ok(format!("{}{}", dir, base))
            })
            .collect()
    }

    /// Entries of one dependency list
    pub fn dependencies(&self, kind: DependencyKind) -> Result<Vec<Dependency>> {
        let (name_tag, version_tag, flags_tag) = kind.tags();
        let Ok(names) = self.get_string_array(name_tag) else {
            return Ok(Vec::new());
        };
        let versions = self.get_string_array(version_tag)?;
        let flags = self.get_int32_array(flags_tag)?;
        if versions.len() != names.len() || flags.len() != names.len() {
            return Err(RpmError::InconsistentFileList(format!(
                "{}: {} names, {} versions, {} flags",
                name_tag,
                names.len(),
                versions.len(),
                flags.len()
            )));
        }
        Ok(names
            .iter()
            .zip(versions)
            .zip(flags)
            .map(|((name, version), &bits)| {
                Dependency::new(name.as_str(), version.as_str(), DependencyFlags::from_bits(bits))
            })
            .collect())
    }

    /// Decompressed cpio archive
    pub fn archive(&self) -> Result<Vec<u8>> {
        self.compressor()?.decompress(&self.payload)
    }

    /// Every cpio member, trailer included
    pub fn entries(&self) -> Result<Vec<CpioEntry>> {
        cpio::read_archive(&self.archive()?)
    }

    /// Cpio members without the trailer
    pub fn files(&self) -> Result<Vec<CpioEntry>> {
        let mut entries = self.entries()?;
        entries.pop();
        Ok(entries)
    }

    /// Deep check beyond what `from_bytes` enforces
    ///
    /// Recomputes the header SHA-256, decodes the whole payload, compares its
    /// length against `RPMSIGTAG_PAYLOADSIZE` and the cpio names against the
    /// header's file list.
    pub fn verify(&self) -> Result<()> {
        if let Ok(stored) = self.signature.get_string(Tag::SigSha256) {
            let computed = hex::encode(Sha256::digest(&self.header_bytes));
            if stored != computed {
                warn!("Header SHA-256 mismatch for package {}", self.lead.name);
                return Err(RpmError::DigestMismatch {
                    stored: stored.to_string(),
                    computed,
                });
            }
        }

        let archive = self.archive()?;
        if let Ok(stored) = self.signature.get_int32(Tag::SigPayloadSize) {
            if stored as usize != archive.len() {
                return Err(RpmError::SizeMismatch {
                    stored,
                    actual: archive.len(),
                });
            }
        }

        let mut names: Vec<String> = cpio::read_archive(&archive)?
            .into_iter()
            .filter(|e| !e.is_trailer())
            .map(|e| e.name)
            .collect();
        let mut expected = self.file_names()?;
        names.sort();
        expected.sort();
        if names != expected {
            return Err(RpmError::InconsistentFileList(format!(
                "payload holds {} entries, header lists {}",
                names.len(),
                expected.len()
            )));
        }
        debug!("Verified {}", self.lead.name);
        Ok(())
    }
}
