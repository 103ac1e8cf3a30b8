//! Package assembler
//!
//! [`PackageBuilder`] accumulates metadata tags, dependencies and file entries,
//! then [`PackageBuilder::assemble`] lays out the complete package:
//!
//! ```text
//! lead (96) ‖ signature header ‖ pad to 8 ‖ metadata header ‖ compressed cpio
//!                                          └───── MD5 / SIZE cover this ─────┘
//! ```
//!
//! Everything that can fail is checked before the first output byte exists.

use crate::core::compression::PayloadCompressor;
use crate::core::cpio;
use crate::core::error::{Result, RpmError};
use crate::core::file::{FileBuilder, FileKind, FileRecord};
use crate::core::flags::DependencyFlags;
use crate::core::header::HeaderStructure;
use crate::core::io::{pad_to, write_file};
use crate::core::lead::Lead;
use crate::core::tag::{Tag, WireType};
use crate::core::validation::{package_file_name, validate_release, validate_version, PackageName};
use md5::{Digest, Md5};
use sha2::Sha256;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

pub const VERSIONED_DEPENDENCIES: &str = "rpmlib(VersionedDependencies)";
pub const COMPRESSED_FILE_NAMES: &str = "rpmlib(CompressedFileNames)";
pub const PAYLOAD_IS_ZSTD: &str = "rpmlib(PayloadIsZstd)";

/// Which dependency list a [`Dependency`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Requires,
    Provides,
    Conflicts,
    Obsoletes,
}

impl DependencyKind {
    /// `(name, version, flags)` tags of the parallel arrays
    pub fn tags(self) -> (Tag, Tag, Tag) {
        match self {
            DependencyKind::Requires => (Tag::RequireName, Tag::RequireVersion, Tag::RequireFlags),
            DependencyKind::Provides => (Tag::ProvideName, Tag::ProvideVersion, Tag::ProvideFlags),
            DependencyKind::Conflicts => {
                (Tag::ConflictName, Tag::ConflictVersion, Tag::ConflictFlags)
            }
            DependencyKind::Obsoletes => {
                (Tag::ObsoleteName, Tag::ObsoleteVersion, Tag::ObsoleteFlags)
            }
        }
    }
}

/// One entry of a dependency list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// `[epoch:]version[-release]`, empty when unversioned
    pub version: String,
    pub flags: DependencyFlags,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        flags: DependencyFlags,
    ) -> Self {
        Dependency {
            name: name.into(),
            version: version.into(),
            flags,
        }
    }

    pub fn unversioned(name: impl Into<String>) -> Self {
        Dependency::new(name, "", DependencyFlags::NONE)
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            return f.write_str(&self.name);
        }
        let op = match (
            self.flags.contains(DependencyFlags::LESS),
            self.flags.contains(DependencyFlags::GREATER),
            self.flags.contains(DependencyFlags::EQUAL),
        ) {
            (true, false, true) => "<=",
            (true, false, false) => "<",
            (false, true, true) => ">=",
            (false, true, false) => ">",
            _ => "=",
        };
        write!(f, "{} {} {}", self.name, op, self.version)
    }
}

/// Install phase a scriptlet runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scriptlet {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
}

impl Scriptlet {
    /// `(script, interpreter)` tags
    fn tags(self) -> (Tag, Tag) {
        match self {
            Scriptlet::PreInstall => (Tag::PreIn, Tag::PreInProg),
            Scriptlet::PostInstall => (Tag::PostIn, Tag::PostInProg),
            Scriptlet::PreUninstall => (Tag::PreUn, Tag::PreUnProg),
            Scriptlet::PostUninstall => (Tag::PostUn, Tag::PostUnProg),
        }
    }

    fn sense(self) -> DependencyFlags {
        match self {
            Scriptlet::PreInstall => DependencyFlags::SCRIPT_PRE,
            Scriptlet::PostInstall => DependencyFlags::SCRIPT_POST,
            Scriptlet::PreUninstall => DependencyFlags::SCRIPT_PREUN,
            Scriptlet::PostUninstall => DependencyFlags::SCRIPT_POSTUN,
        }
    }
}

/// Output of [`PackageBuilder::assemble`]
#[derive(Debug, Clone)]
pub struct AssembledPackage {
    /// `<name>-<version>-<release>.rpm`
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AssembledPackage {
    /// Write the package into `dir` in one scoped write, returning its path
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        write_file(&path, &self.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Accumulates a package description; consumed by `assemble`/`build`
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    header: HeaderStructure,
    compressor: PayloadCompressor,
    files: Vec<FileRecord>,
    targets: HashSet<String>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        PackageBuilder::new()
    }
}

impl PackageBuilder {
    pub fn new() -> Self {
        PackageBuilder {
            header: HeaderStructure::new(false),
            compressor: PayloadCompressor::default(),
            files: Vec::new(),
            targets: HashSet::new(),
        }
    }

    /// Metadata header as populated so far
    pub fn header(&self) -> &HeaderStructure {
        &self.header
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Single-valued setter; I18N tags hold only the default locale here
    fn set(&mut self, tag: Tag, value: impl Into<String>) -> Result<&mut Self> {
        if self.header.contains(tag) {
            return Err(RpmError::SingleValueViolation(tag));
        }
        self.header.add_string(tag, value)?;
        Ok(self)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let name = PackageName::new(name)?;
        self.set(Tag::Name, name.into_string())
    }

    pub fn set_version(&mut self, version: impl Into<String>) -> Result<&mut Self> {
        let version = version.into();
        validate_version(&version)?;
        self.set(Tag::Version, version)
    }

    pub fn set_release(&mut self, release: impl Into<String>) -> Result<&mut Self> {
        let release = release.into();
        validate_release(&release)?;
        self.set(Tag::Release, release)
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Summary, summary)
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Description, description)
    }

    pub fn set_license(&mut self, license: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::License, license)
    }

    pub fn set_group(&mut self, group: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Group, group)
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Url, url)
    }

    pub fn set_vendor(&mut self, vendor: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Vendor, vendor)
    }

    pub fn set_packager(&mut self, packager: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Packager, packager)
    }

    pub fn set_distribution(&mut self, distribution: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Distribution, distribution)
    }

    pub fn set_build_host(&mut self, host: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::BuildHost, host)
    }

    pub fn set_os(&mut self, os: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Os, os)
    }

    pub fn set_arch(&mut self, arch: impl Into<String>) -> Result<&mut Self> {
        self.set(Tag::Arch, arch)
    }

    /// Seconds since the epoch; defaults to the time of assembly
    pub fn set_build_time(&mut self, time: u32) -> Result<&mut Self> {
        if self.header.contains(Tag::BuildTime) {
            return Err(RpmError::SingleValueViolation(Tag::BuildTime));
        }
        self.header.add_int32(Tag::BuildTime, time)?;
        Ok(self)
    }

    pub fn set_compressor(&mut self, compressor: PayloadCompressor) -> &mut Self {
        self.compressor = compressor;
        self
    }

    /// Append to one of the dependency lists
    ///
    /// A non-empty version makes the package require
    /// `rpmlib(VersionedDependencies)`, added once.
    pub fn add_dependency(&mut self, kind: DependencyKind, dep: Dependency) -> Result<&mut Self> {
        let (name_tag, version_tag, flags_tag) = kind.tags();
        let versioned = !dep.version.is_empty();
        self.header.add_string(name_tag, dep.name)?;
        self.header.add_string(version_tag, dep.version)?;
        self.header.add_int32(flags_tag, dep.flags.bits())?;
        if versioned {
            self.ensure_versioned_dependencies()?;
        }
        Ok(self)
    }

    pub fn add_require(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        flags: DependencyFlags,
    ) -> Result<&mut Self> {
        self.add_dependency(DependencyKind::Requires, Dependency::new(name, version, flags))
    }

    pub fn add_provide(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        flags: DependencyFlags,
    ) -> Result<&mut Self> {
        self.add_dependency(DependencyKind::Provides, Dependency::new(name, version, flags))
    }

    pub fn add_conflict(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        flags: DependencyFlags,
    ) -> Result<&mut Self> {
        self.add_dependency(DependencyKind::Conflicts, Dependency::new(name, version, flags))
    }

    pub fn add_obsolete(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        flags: DependencyFlags,
    ) -> Result<&mut Self> {
        self.add_dependency(DependencyKind::Obsoletes, Dependency::new(name, version, flags))
    }

    fn requires(&self, name: &str) -> bool {
        self.header.contains_string(Tag::RequireName, name)
    }

    fn add_rpmlib(&mut self, name: &str, version: &str) -> Result<()> {
        if !self.requires(name) {
            let flags = DependencyFlags::LESS | DependencyFlags::EQUAL | DependencyFlags::RPMLIB;
            self.add_dependency(DependencyKind::Requires, Dependency::new(name, version, flags))?;
        }
        Ok(())
    }

    fn ensure_versioned_dependencies(&mut self) -> Result<()> {
        self.add_rpmlib(VERSIONED_DEPENDENCIES, "3.0.3-1")
    }

    /// Set a scriptlet and require its interpreter
    pub fn set_script(
        &mut self,
        phase: Scriptlet,
        script: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Result<&mut Self> {
        let (script_tag, prog_tag) = phase.tags();
        let interpreter = interpreter.into();
        if interpreter.is_empty() {
            return Err(RpmError::MissingRequirement(format!(
                "{:?} scriptlet has no interpreter",
                phase
            )));
        }
        if interpreter.contains('\0') {
            return Err(RpmError::EmbeddedNul(interpreter));
        }
        self.header.add_string(script_tag, script)?;
        self.header.add_string(prog_tag, interpreter.clone())?;
        if !self.requires(&interpreter) {
            let flags = DependencyFlags::INTERP | phase.sense();
            self.add_dependency(
                DependencyKind::Requires,
                Dependency::new(interpreter, "", flags),
            )?;
        }
        Ok(self)
    }

    pub fn set_pre_install(
        &mut self,
        script: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Result<&mut Self> {
        self.set_script(Scriptlet::PreInstall, script, interpreter)
    }

    pub fn set_post_install(
        &mut self,
        script: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Result<&mut Self> {
        self.set_script(Scriptlet::PostInstall, script, interpreter)
    }

    pub fn set_pre_uninstall(
        &mut self,
        script: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Result<&mut Self> {
        self.set_script(Scriptlet::PreUninstall, script, interpreter)
    }

    pub fn set_post_uninstall(
        &mut self,
        script: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Result<&mut Self> {
        self.set_script(Scriptlet::PostUninstall, script, interpreter)
    }

    /// Freeze `file` and queue it; targets must be unique
    pub fn add_file(&mut self, file: FileBuilder) -> Result<&mut Self> {
        self.add_record(file.build()?)
    }

    /// Queue an already built entry
    pub fn add_record(&mut self, record: FileRecord) -> Result<&mut Self> {
        if !self.targets.insert(record.target.clone()) {
            return Err(RpmError::DuplicateTarget(record.target));
        }
        debug!("Queued {} ({} bytes)", record.target, record.size);
        self.files.push(record);
        Ok(self)
    }

    fn string(&self, tag: Tag) -> Option<&str> {
        self.header.get_string(tag).ok()
    }

    fn identity(&self) -> Result<(String, String, String)> {
        match (
            self.string(Tag::Name),
            self.string(Tag::Version),
            self.string(Tag::Release),
        ) {
            (Some(n), Some(v), Some(r)) => Ok((n.to_string(), v.to_string(), r.to_string())),
            (n, v, r) => Err(RpmError::MissingTags(
                [(Tag::Name, n), (Tag::Version, v), (Tag::Release, r)]
                    .into_iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(tag, _)| tag)
                    .collect(),
            )),
        }
    }

    /// Per-file tags for every queued entry, in addition order
    fn add_file_tags(&mut self) -> Result<()> {
        for (idx, file) in self.files.iter().enumerate() {
            let header = &mut self.header;
            header.add_string(Tag::BaseNames, file.base.as_str())?;
            let dir_index = match header.index_of_string(Tag::DirNames, &file.dir) {
                Some(i) => i,
                None => header.add_string(Tag::DirNames, file.dir.as_str())?,
            };
            header.add_int32(Tag::DirIndexes, dir_index as u32)?;
            header.add_int32(Tag::FileSizes, file.size)?;
            header.add_int32(Tag::FileMtimes, file.mtime)?;
            header.add_string(Tag::FileMd5s, file.digest.as_str())?;
            header.add_int16(Tag::FileModes, (file.mode & 0xffff) as u16)?;
            header.add_int16(Tag::FileRdevs, file.rdev)?;
            header.add_string(Tag::FileLinkTos, file.link_target.as_str())?;
            header.add_int32(Tag::FileFlags, file.flags.bits())?;
            header.add_string(Tag::FileUserName, file.user.as_str())?;
            header.add_string(Tag::FileGroupName, file.group.as_str())?;
            header.add_int32(Tag::FileDevices, 1)?;
            header.add_int32(Tag::FileInodes, idx as u32 + 1)?;
            header.add_string(Tag::FileLangs, file.lang.as_str())?;
        }
        Ok(())
    }

    fn add_automatic_tags(&mut self, name: &str, evr: &str) -> Result<()> {
        if !self.header.contains_string(Tag::ProvideName, name) {
            self.add_provide(name, evr, DependencyFlags::EQUAL)?;
        }
        if !self.files.is_empty() {
            self.add_rpmlib(COMPRESSED_FILE_NAMES, "3.0.4-1")?;
        }
        if self.compressor == PayloadCompressor::Zstd {
            self.add_rpmlib(PAYLOAD_IS_ZSTD, "5.4.18-1")?;
        }

        let size = self
            .files
            .iter()
            .filter(|f| f.kind == FileKind::Regular)
            .try_fold(0u32, |acc, f| acc.checked_add(f.size))
            .ok_or(RpmError::Overflow(u32::MAX as usize))?;
        self.header.add_int32(Tag::Size, size)?;

        if !self.header.contains(Tag::BuildTime) {
            let now = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
            self.header.add_int32(Tag::BuildTime, now)?;
        }
        self.header.add_string(Tag::PayloadFormat, "cpio")?;
        self.header
            .add_string(Tag::PayloadCompressor, self.compressor.name())?;
        self.header.add_string(Tag::PayloadFlags, self.compressor.flags())?;

        let has_i18n = self
            .header
            .records()
            .iter()
            .any(|r| r.wire_type == WireType::I18nString);
        if has_i18n && !self.header.contains(Tag::HeaderI18nTable) {
            self.header.add_string(Tag::HeaderI18nTable, "C")?;
        }
        Ok(())
    }

    /// Fail with every required tag that is absent
    fn check_required_tags(&self) -> Result<()> {
        let mut required = vec![Tag::Name, Tag::Version, Tag::Release, Tag::Arch, Tag::Os];
        if !self.files.is_empty() {
            required.extend([
                Tag::BaseNames,
                Tag::DirNames,
                Tag::DirIndexes,
                Tag::FileSizes,
                Tag::FileModes,
                Tag::FileMtimes,
                Tag::FileMd5s,
                Tag::FileUserName,
                Tag::FileGroupName,
            ]);
        }
        let missing: Vec<Tag> = required
            .into_iter()
            .filter(|tag| !self.header.contains(*tag))
            .collect();
        if !missing.is_empty() {
            return Err(RpmError::MissingTags(missing));
        }

        let versioned = [
            DependencyKind::Requires,
            DependencyKind::Provides,
            DependencyKind::Conflicts,
            DependencyKind::Obsoletes,
        ]
        .into_iter()
        .filter_map(|kind| self.header.get_string_array(kind.tags().1).ok())
        .flatten()
        .any(|v| !v.is_empty());
        if versioned && !self.requires(VERSIONED_DEPENDENCIES) {
            return Err(RpmError::MissingRequirement(VERSIONED_DEPENDENCIES.to_string()));
        }
        Ok(())
    }

    /// Lay out the complete package in memory
    pub fn assemble(mut self) -> Result<AssembledPackage> {
        let (name, version, release) = self.identity()?;
        let nevr = format!("{}-{}-{}", name, version, release);
        let lead = Lead::new(nevr.as_str(), self.string(Tag::Arch).unwrap_or_default());

        self.add_file_tags()?;
        self.add_automatic_tags(&name, &format!("{}-{}", version, release))?;
        self.check_required_tags()?;

        // cpio inode numbers match FILEINODES
        let entries: Vec<_> = self
            .files
            .iter()
            .enumerate()
            .map(|(idx, f)| f.cpio_entry(idx as u32 + 1))
            .collect();
        let archive = cpio::write_archive(&entries)?;
        let payload = self.compressor.compress(&archive)?;

        self.header.sort_by_id();
        let header_bytes = self.header.to_bytes()?;
        debug!(
            "{}: header {} bytes, archive {} bytes, payload {} bytes",
            nevr,
            header_bytes.len(),
            archive.len(),
            payload.len()
        );

        let mut signature = HeaderStructure::new(true);
        let signed_len = header_bytes.len() + payload.len();
        let signed_len_u32 =
            u32::try_from(signed_len).map_err(|_| RpmError::Overflow(signed_len))?;
        let archive_len =
            u32::try_from(archive.len()).map_err(|_| RpmError::Overflow(archive.len()))?;
        let mut md5 = Md5::new();
        md5.update(&header_bytes);
        md5.update(&payload);
        signature.add_string(Tag::SigSha256, hex::encode(Sha256::digest(&header_bytes)))?;
        signature.add_int32(Tag::SigSize, signed_len_u32)?;
        signature.add_binary(Tag::SigMd5, md5.finalize().to_vec())?;
        signature.add_int32(Tag::SigPayloadSize, archive_len)?;

        let mut bytes = Vec::with_capacity(96 + 256 + signed_len);
        lead.write(&mut bytes)?;
        signature.save(&mut bytes)?;
        pad_to(&mut bytes, 8);
        bytes.extend_from_slice(&header_bytes);
        bytes.extend_from_slice(&payload);

        info!(
            "Assembled {} with {} files ({} bytes)",
            nevr,
            self.files.len(),
            bytes.len()
        );
        Ok(AssembledPackage {
            file_name: package_file_name(&name, &version, &release),
            bytes,
        })
    }

    /// Assemble and write `<name>-<version>-<release>.rpm` into `dir`
    pub fn build<P: AsRef<Path>>(self, dir: P) -> Result<PathBuf> {
        self.assemble()?.write_to(dir)
    }
}
