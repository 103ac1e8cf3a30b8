//! # rpmkit - RPM package builder and reader
//!
//! `rpmkit` builds and parses Linux RPM packages without shelling out to
//! `rpmbuild`:
//!
//! - **Byte-exact format**: lead, signature and metadata header structures,
//!   cpio "newc" payload
//! - **Integrity**: MD5 over header and payload, SHA-256 over the header
//! - **gzip or zstd** payload compression
//! - **Declarative manifests** in TOML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rpmkit::{FileBuilder, PackageBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let mut builder = PackageBuilder::new();
//! builder
//!     .set_name("demo")?
//!     .set_version("1.0")?
//!     .set_release("1")?
//!     .set_arch("noarch")?
//!     .set_os("linux")?
//!     .add_file(FileBuilder::regular("/opt/demo/bin/run", "#!/bin/sh\necho hi\n").mode(0o755))?;
//!
//! // Writes ./demo-1.0-1.rpm
//! let path = builder.build(".")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading
//!
//! ```rust,no_run
//! use rpmkit::{RpmPackage, Result, Tag};
//!
//! # fn main() -> Result<()> {
//! let package = RpmPackage::open("demo-1.0-1.rpm")?;
//! println!("{}", package.get_string(Tag::Name)?);
//!
//! for entry in rpmkit::list_entries(&package)? {
//!     println!("{:o} {} {}", entry.mode, entry.size, entry.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    builder::{AssembledPackage, Dependency, DependencyKind, PackageBuilder, Scriptlet},
    compression::PayloadCompressor,
    error::{ErrorKind, Result, RpmError},
    file::{FileBuilder, FileKind, FileRecord},
    flags::{Comparison, DependencyFlags, FileFlags},
    header::HeaderStructure,
    manifest::PackageManifest,
    package::RpmPackage,
    tag::{Tag, WireType},
    types::Value,
};

use crate::core::file::{S_IFDIR, S_IFLNK, S_IFMT};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// One packaged file as described by the metadata header
///
/// Entry gathers the parallel per-file arrays (sizes, modes, owners, ...) into
/// one record per file so consumers do not index them by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Full install path (e.g. "/opt/demo/bin/run")
    pub path: String,

    /// Directory with trailing slash (e.g. "/opt/demo/bin/")
    pub parent: String,

    /// Basename (e.g. "run")
    pub name: String,

    /// File type bits and permissions, as in `st_mode`
    pub mode: u32,

    pub size: u32,

    /// Modification time, Unix epoch seconds
    pub mtime: u32,

    pub user: String,

    pub group: String,

    /// Hex MD5 of the content; empty for directories and symlinks
    pub digest: String,

    /// Symlink target; empty otherwise
    pub link_target: String,

    #[serde(serialize_with = "serialize_flags")]
    pub flags: FileFlags,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }
}

fn serialize_flags<S>(flags: &FileFlags, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u32(flags.bits())
}

fn parallel<'a, T>(package: &'a RpmPackage, tag: Tag, values: Result<&'a [T]>, len: usize) -> Result<&'a [T]> {
    let values = values?;
    if values.len() != len {
        return Err(RpmError::InconsistentFileList(format!(
            "{} has {} values for {} files in {}",
            tag,
            values.len(),
            len,
            package.lead().name
        )));
    }
    Ok(values)
}

/// Per-file view of a package's metadata header, sorted by path
pub fn list_entries(package: &RpmPackage) -> Result<Vec<Entry>> {
    let paths = package.file_names()?;
    let n = paths.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let sizes = parallel(package, Tag::FileSizes, package.get_int32_array(Tag::FileSizes), n)?;
    let modes = parallel(package, Tag::FileModes, package.get_int16_array(Tag::FileModes), n)?;
    let mtimes = parallel(package, Tag::FileMtimes, package.get_int32_array(Tag::FileMtimes), n)?;
    let users = parallel(package, Tag::FileUserName, package.get_string_array(Tag::FileUserName), n)?;
    let groups = parallel(package, Tag::FileGroupName, package.get_string_array(Tag::FileGroupName), n)?;
    let digests = parallel(package, Tag::FileMd5s, package.get_string_array(Tag::FileMd5s), n)?;
    let links = package.get_string_array(Tag::FileLinkTos).ok();
    let flags = package.get_int32_array(Tag::FileFlags).ok();

    let mut entries: Vec<Entry> = paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let split = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
            Entry {
                parent: path[..split].to_string(),
                name: path[split..].to_string(),
                mode: u32::from(modes[i]),
                size: sizes[i],
                mtime: mtimes[i],
                user: users[i].clone(),
                group: groups[i].clone(),
                digest: digests[i].clone(),
                link_target: links
                    .and_then(|l| l.get(i))
                    .cloned()
                    .unwrap_or_default(),
                flags: FileFlags::from_bits(flags.and_then(|f| f.get(i)).copied().unwrap_or(0)),
                path,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Build the package described by the TOML manifest at `manifest` into
/// `out_dir`
///
/// Relative `source` paths in the manifest resolve against the manifest's own
/// directory.
pub fn build_from_manifest<P: AsRef<Path>, Q: AsRef<Path>>(manifest: P, out_dir: Q) -> Result<PathBuf> {
    let manifest = manifest.as_ref();
    info!("Building package from {}", manifest.display());
    let base_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
    PackageManifest::from_path(manifest)?
        .into_builder(base_dir)?
        .build(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_entries() -> Result<()> {
        let mut builder = PackageBuilder::new();
        builder
            .set_name("demo")?
            .set_version("1.0")?
            .set_release("1")?
            .set_arch("noarch")?
            .set_os("linux")?
            .add_file(FileBuilder::regular("/opt/demo/run", "x").mode(0o755).mtime(7))?
            .add_file(FileBuilder::directory("/opt/demo"))?
            .add_file(FileBuilder::symlink("/usr/bin/demo", "/opt/demo/run"))?
            .add_file(FileBuilder::regular("/etc/demo.conf", "").flags(FileFlags::CONFIG))?;
        let package = RpmPackage::from_bytes(&builder.assemble()?.bytes)?;
        let entries = list_entries(&package)?;

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/etc/demo.conf", "/opt/demo", "/opt/demo/run", "/usr/bin/demo"]
        );
        assert!(entries[1].is_dir());
        assert_eq!(entries[2].mode, 0o100755);
        assert_eq!(entries[2].mtime, 7);
        assert_eq!(entries[2].parent, "/opt/demo/");
        assert_eq!(entries[2].name, "run");
        assert!(entries[3].is_symlink());
        assert_eq!(entries[3].link_target, "/opt/demo/run");
        assert_eq!(entries[0].flags, FileFlags::CONFIG);
        assert_eq!(entries[0].user, "root");
        Ok(())
    }

    #[test]
    fn test_list_entries_empty_package() -> Result<()> {
        let mut builder = PackageBuilder::new();
        builder
            .set_name("meta")?
            .set_version("1")?
            .set_release("1")?
            .set_arch("noarch")?
            .set_os("linux")?;
        let package = RpmPackage::from_bytes(&builder.assemble()?.bytes)?;
        assert!(list_entries(&package)?.is_empty());
        assert!(package.files()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_build_from_manifest() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        std::fs::write(dir.path().join("run.sh"), "#!/bin/sh\n")?;
        let manifest = dir.path().join("demo.toml");
        std::fs::write(
            &manifest,
            "name = \"demo\"\nversion = \"2.0\"\narch = \"noarch\"\n\n[[files]]\ntarget = \"/opt/demo/run\"\nsource = \"run.sh\"\nmode = \"0755\"\n",
        )?;
        let path = build_from_manifest(&manifest, dir.path())?;
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("demo-2.0-1.rpm"));
        let package = RpmPackage::open(&path)?;
        assert_eq!(package.files()?[0].content, b"#!/bin/sh\n");
        Ok(())
    }
}
