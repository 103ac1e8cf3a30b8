//! File entries queued for a package
//!
//! A [`FileBuilder`] collects one entry's attributes and is consumed by
//! [`FileBuilder::build`], producing the immutable [`FileRecord`] that the
//! assembler turns into per-file header tags and a cpio member.

use crate::core::cpio::CpioEntry;
use crate::core::error::{Result, RpmError};
use crate::core::flags::FileFlags;
use crate::core::validation::split_target;
use md5::{Digest, Md5};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;

const PERMISSION_BITS: u32 = 0o7777;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
}

impl FileKind {
    pub fn type_bits(self) -> u32 {
        match self {
            FileKind::Regular => S_IFREG,
            FileKind::Directory => S_IFDIR,
            FileKind::Symlink => S_IFLNK,
        }
    }

    fn default_permissions(self) -> u32 {
        match self {
            FileKind::Regular => 0o644,
            FileKind::Directory => 0o755,
            FileKind::Symlink => 0o777,
        }
    }
}

fn now() -> u32 {
    u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Attributes of one entry, before it is added to a package
///
/// Not `Clone`: a builder produces exactly one record.
///
/// ```compile_fail
/// use rpmkit::FileBuilder;
///
/// let file = FileBuilder::regular("/opt/demo/run", "x");
/// let copy = file.clone();
/// ```
#[derive(Debug)]
pub struct FileBuilder {
    kind: FileKind,
    target: String,
    content: Vec<u8>,
    link_target: String,
    permissions: u32,
    mtime: u32,
    user: String,
    group: String,
    flags: FileFlags,
    rdev: u16,
    lang: String,
}

impl FileBuilder {
    fn new(kind: FileKind, target: impl Into<String>, content: Vec<u8>) -> Self {
        FileBuilder {
            kind,
            target: target.into(),
            content,
            link_target: String::new(),
            permissions: kind.default_permissions(),
            mtime: now(),
            user: "root".to_string(),
            group: "root".to_string(),
            flags: FileFlags::NONE,
            rdev: 0,
            lang: String::new(),
        }
    }

    /// Regular file with in-memory content
    pub fn regular(target: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        FileBuilder::new(FileKind::Regular, target, content.into())
    }

    /// Regular file read from `source`, keeping its modification time
    pub fn from_path<P: AsRef<Path>>(source: P, target: impl Into<String>) -> Result<Self> {
        let source = source.as_ref();
        let content = fs::read(source)?;
        let mut builder = FileBuilder::regular(target, content);
        let modified = fs::metadata(source)?.modified()?;
        if let Ok(age) = modified.duration_since(UNIX_EPOCH) {
            builder.mtime = u32::try_from(age.as_secs()).unwrap_or(u32::MAX);
        }
        Ok(builder)
    }

    pub fn directory(target: impl Into<String>) -> Self {
        FileBuilder::new(FileKind::Directory, target, Vec::new())
    }

    pub fn symlink(target: impl Into<String>, link_target: impl Into<String>) -> Self {
        let mut builder = FileBuilder::new(FileKind::Symlink, target, Vec::new());
        builder.link_target = link_target.into();
        builder
    }

    /// Permission bits, e.g. `0o755`
    pub fn mode(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Modification time in seconds since the epoch
    pub fn mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn flags(mut self, flags: FileFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn rdev(mut self, rdev: u16) -> Self {
        self.rdev = rdev;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Validate and freeze the entry
    ///
    /// Consumes the builder, so the same entry cannot be added twice.
    ///
    /// ```compile_fail
    /// use rpmkit::FileBuilder;
    ///
    /// let file = FileBuilder::regular("/opt/demo/run", "x");
    /// let first = file.build();
    /// let second = file.build();
    /// ```
    pub fn build(self) -> Result<FileRecord> {
        let (dir, base) = split_target(&self.target)?;
        let (dir, base) = (dir.to_string(), base.to_string());

        if self.permissions & !PERMISSION_BITS != 0 {
            return Err(RpmError::InvalidTarget(format!(
                "{}: mode {:o} has bits outside {:o}",
                self.target, self.permissions, PERMISSION_BITS
            )));
        }
        if self.kind == FileKind::Symlink && self.link_target.is_empty() {
            return Err(RpmError::InvalidTarget(format!(
                "{}: symlink without a link target",
                self.target
            )));
        }
        for value in [&self.user, &self.group, &self.link_target, &self.lang] {
            if value.contains('\0') {
                return Err(RpmError::EmbeddedNul(value.clone()));
            }
        }

        let content = match self.kind {
            FileKind::Regular => self.content,
            FileKind::Directory => Vec::new(),
            FileKind::Symlink => self.link_target.clone().into_bytes(),
        };
        let size = u32::try_from(content.len()).map_err(|_| RpmError::Overflow(content.len()))?;
        let digest = match self.kind {
            FileKind::Regular => hex::encode(Md5::digest(&content)),
            _ => String::new(),
        };

        Ok(FileRecord {
            kind: self.kind,
            mode: self.kind.type_bits() | self.permissions,
            target: self.target,
            dir,
            base,
            size,
            content,
            digest,
            link_target: self.link_target,
            mtime: self.mtime,
            user: self.user,
            group: self.group,
            flags: self.flags,
            rdev: self.rdev,
            lang: self.lang,
        })
    }
}

/// A validated entry ready for assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub kind: FileKind,
    pub target: String,
    /// Directory part of `target`, with trailing `/`
    pub dir: String,
    pub base: String,
    /// File-type bits | permission bits
    pub mode: u32,
    pub size: u32,
    /// Archived bytes; the link target for symlinks
    pub content: Vec<u8>,
    /// Hex MD5 of the content, empty unless regular
    pub digest: String,
    pub link_target: String,
    pub mtime: u32,
    pub user: String,
    pub group: String,
    pub flags: FileFlags,
    pub rdev: u16,
    pub lang: String,
}

impl FileRecord {
    /// The cpio member for this entry; `ino` must be unique within the archive
    pub fn cpio_entry(&self, ino: u32) -> CpioEntry {
        let mut entry = CpioEntry::new(self.target.clone(), self.mode, self.content.clone());
        entry.ino = ino;
        entry.mtime = self.mtime;
        entry.nlink = if self.kind == FileKind::Directory { 2 } else { 1 };
        entry
    }
}
