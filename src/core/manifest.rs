//! Declarative package manifest
//!
//! A TOML description of one package: identity, descriptive text, dependency
//! lists, scriptlets and files. [`PackageManifest::into_builder`] turns it into
//! a populated [`PackageBuilder`].
//!
//! ```toml
//! name = "demo"
//! version = "1.0"
//! arch = "noarch"
//! summary = "Demo package"
//!
//! requires = [{ name = "bash", version = "4.0", op = ">=" }]
//!
//! [scripts]
//! post_install = "echo installed"
//!
//! [[files]]
//! target = "/opt/demo/bin/run"
//! content = "#!/bin/sh\necho hi\n"
//! mode = "0755"
//! ```

use crate::core::builder::{Dependency, DependencyKind, PackageBuilder, DEFAULT_INTERPRETER};
use crate::core::compression::PayloadCompressor;
use crate::core::error::{Result, RpmError};
use crate::core::file::FileBuilder;
use crate::core::flags::{Comparison, DependencyFlags, FileFlags};
use crate::core::validation::{split_target, validate_release, validate_version, PackageName};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Package manifest
///
/// # Examples
///
/// ```
/// use rpmkit::core::manifest::PackageManifest;
///
/// let manifest = PackageManifest::from_toml_str(r#"
///     name = "demo"
///     version = "1.0"
///     arch = "noarch"
/// "#).unwrap();
///
/// assert_eq!(manifest.name.as_str(), "demo");
/// assert_eq!(manifest.release, "1");
/// assert_eq!(manifest.os, "linux");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    /// Package name, validated on load
    #[serde(
        serialize_with = "serialize_name",
        deserialize_with = "deserialize_name"
    )]
    pub name: PackageName,

    pub version: String,

    #[serde(default = "default_release")]
    pub release: String,

    /// RPM architecture, e.g. "x86_64" or "noarch"
    pub arch: String,

    #[serde(default = "default_os")]
    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// License identifier, e.g. "MIT"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub packager: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,

    #[serde(default)]
    pub compressor: PayloadCompressor,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<DependencySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<DependencySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<DependencySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obsoletes: Vec<DependencySpec>,

    #[serde(default)]
    pub scripts: Scripts,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSpec>,
}

fn default_release() -> String {
    "1".to_string()
}

fn default_os() -> String {
    "linux".to_string()
}

/// `{ name, version?, op? }`; a version without `op` means `=`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Comparison>,
}

impl DependencySpec {
    fn to_dependency(&self) -> Result<Dependency> {
        match (&self.version, self.op) {
            (None, None) => Ok(Dependency::unversioned(self.name.as_str())),
            (None, Some(_)) => Err(RpmError::ManifestValidation(format!(
                "dependency '{}' has an operator but no version",
                self.name
            ))),
            (Some(version), op) => Ok(Dependency::new(
                self.name.as_str(),
                version.as_str(),
                op.map(DependencyFlags::from).unwrap_or(DependencyFlags::EQUAL),
            )),
        }
    }
}

/// Scriptlets, all run by `interpreter` (default `/bin/sh`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_install: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_uninstall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_uninstall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSpecKind {
    #[default]
    File,
    Dir,
    Symlink,
}

/// One `[[files]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    /// Absolute install path
    pub target: String,

    /// Local file to package, relative to the manifest's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Inline content, instead of `source`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default)]
    pub kind: FileSpecKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,

    /// Octal permission string, e.g. "0755"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u32>,

    /// config, doc, noreplace, missingok, ghost, license, readme
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl FileSpec {
    fn invalid(&self, problem: &str) -> RpmError {
        RpmError::ManifestValidation(format!("file '{}': {}", self.target, problem))
    }

    fn permissions(&self) -> Result<Option<u32>> {
        self.mode
            .as_deref()
            .map(|mode| {
                u32::from_str_radix(mode, 8)
                    .ok()
                    .filter(|m| *m <= 0o7777)
                    .ok_or_else(|| self.invalid(&format!("mode '{}' is not octal 0000-7777", mode)))
            })
            .transpose()
    }

    fn file_flags(&self) -> Result<FileFlags> {
        self.flags.iter().try_fold(FileFlags::NONE, |acc, label| {
            FileFlags::from_label(label)
                .map(|flag| acc | flag)
                .ok_or_else(|| self.invalid(&format!("unknown flag '{}'", label)))
        })
    }

    fn validate(&self) -> Result<()> {
        split_target(&self.target).map_err(|e| self.invalid(&e.to_string()))?;
        self.permissions()?;
        self.file_flags()?;
        match (self.kind, &self.source, &self.content, &self.link_target) {
            (FileSpecKind::File, Some(_), None, None) | (FileSpecKind::File, None, Some(_), None) => {
                Ok(())
            }
            (FileSpecKind::File, ..) => {
                Err(self.invalid("needs exactly one of 'source' or 'content'"))
            }
            (FileSpecKind::Dir, None, None, None) => Ok(()),
            (FileSpecKind::Dir, ..) => Err(self.invalid("a directory takes no content")),
            (FileSpecKind::Symlink, None, None, Some(_)) => Ok(()),
            (FileSpecKind::Symlink, ..) => Err(self.invalid("a symlink takes only 'link_target'")),
        }
    }

    fn to_builder(&self, base_dir: &Path) -> Result<FileBuilder> {
        let mut file = match (self.kind, &self.source, &self.content, &self.link_target) {
            (FileSpecKind::File, Some(source), _, _) => {
                FileBuilder::from_path(base_dir.join(source), self.target.as_str())?
            }
            (FileSpecKind::File, None, content, _) => FileBuilder::regular(
                self.target.as_str(),
                content.clone().unwrap_or_default().into_bytes(),
            ),
            (FileSpecKind::Dir, ..) => FileBuilder::directory(self.target.as_str()),
            (FileSpecKind::Symlink, _, _, link) => {
                FileBuilder::symlink(self.target.as_str(), link.clone().unwrap_or_default())
            }
        };
        if let Some(mode) = self.permissions()? {
            file = file.mode(mode);
        }
        if let Some(user) = &self.user {
            file = file.user(user.as_str());
        }
        if let Some(group) = &self.group {
            file = file.group(group.as_str());
        }
        if let Some(mtime) = self.mtime {
            file = file.mtime(mtime);
        }
        Ok(file.flags(self.file_flags()?))
    }
}

impl PackageManifest {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        PackageManifest::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RpmError::ManifestValidation(e.to_string()))
    }

    /// Check everything that can be checked without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        validate_version(&self.version)
            .and_then(|_| validate_release(&self.release))
            .map_err(|e| RpmError::ManifestValidation(e.to_string()))?;
        if self.arch.trim().is_empty() {
            return Err(RpmError::ManifestValidation("arch cannot be empty".to_string()));
        }
        for dep in self
            .requires
            .iter()
            .chain(&self.provides)
            .chain(&self.conflicts)
            .chain(&self.obsoletes)
        {
            dep.to_dependency()?;
        }
        let mut seen = std::collections::HashSet::new();
        for file in &self.files {
            file.validate()?;
            if !seen.insert(file.target.as_str()) {
                return Err(file.invalid("listed twice"));
            }
        }
        Ok(())
    }

    /// Populate a builder; relative `source` paths resolve against `base_dir`
    pub fn into_builder<P: AsRef<Path>>(self, base_dir: P) -> Result<PackageBuilder> {
        self.validate()?;
        let base_dir = base_dir.as_ref();
        let mut builder = PackageBuilder::new();
        builder
            .set_name(self.name.as_str())?
            .set_version(self.version.as_str())?
            .set_release(self.release.as_str())?
            .set_arch(self.arch.as_str())?
            .set_os(self.os.as_str())?
            .set_compressor(self.compressor);

        if let Some(summary) = &self.summary {
            builder.set_summary(summary.as_str())?;
        }
        if let Some(description) = &self.description {
            builder.set_description(description.as_str())?;
        }
        if let Some(license) = &self.license {
            builder.set_license(license.as_str())?;
        }
        if let Some(group) = &self.group {
            builder.set_group(group.as_str())?;
        }
        if let Some(url) = &self.url {
            builder.set_url(url.as_str())?;
        }
        if let Some(vendor) = &self.vendor {
            builder.set_vendor(vendor.as_str())?;
        }
        if let Some(packager) = &self.packager {
            builder.set_packager(packager.as_str())?;
        }
        if let Some(distribution) = &self.distribution {
            builder.set_distribution(distribution.as_str())?;
        }

        for (kind, deps) in [
            (DependencyKind::Requires, &self.requires),
            (DependencyKind::Provides, &self.provides),
            (DependencyKind::Conflicts, &self.conflicts),
            (DependencyKind::Obsoletes, &self.obsoletes),
        ] {
            for dep in deps {
                builder.add_dependency(kind, dep.to_dependency()?)?;
            }
        }

        let interpreter = self
            .scripts
            .interpreter
            .clone()
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());
        if let Some(script) = &self.scripts.pre_install {
            builder.set_pre_install(script.as_str(), interpreter.as_str())?;
        }
        if let Some(script) = &self.scripts.post_install {
            builder.set_post_install(script.as_str(), interpreter.as_str())?;
        }
        if let Some(script) = &self.scripts.pre_uninstall {
            builder.set_pre_uninstall(script.as_str(), interpreter.as_str())?;
        }
        if let Some(script) = &self.scripts.post_uninstall {
            builder.set_post_uninstall(script.as_str(), interpreter.as_str())?;
        }

        for file in &self.files {
            builder.add_file(file.to_builder(base_dir)?)?;
        }
        debug!(
            "Manifest for {} produced {} files",
            self.name,
            builder.files().len()
        );
        Ok(builder)
    }
}

fn serialize_name<S>(name: &PackageName, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(name.as_str())
}

fn deserialize_name<'de, D>(deserializer: D) -> std::result::Result<PackageName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    PackageName::new(s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tag::Tag;

    const DEMO: &str = r##"
name = "demo"
version = "1.0"
arch = "noarch"
summary = "Demo package"
license = "MIT"
compressor = "zstd"

requires = [
    { name = "bash", version = "4.0", op = ">=" },
    { name = "coreutils" },
]
provides = [{ name = "demo-cli", version = "1.0" }]

[scripts]
post_install = "echo installed"

[[files]]
target = "/opt/demo"
kind = "dir"

[[files]]
target = "/opt/demo/bin/run"
content = "#!/bin/sh\necho hi\n"
mode = "0755"
mtime = 1700000000

[[files]]
target = "/etc/demo.conf"
content = "x = 1\n"
flags = ["config", "noreplace"]

[[files]]
target = "/usr/bin/demo"
kind = "symlink"
link_target = "/opt/demo/bin/run"
"##;

    #[test]
    fn test_parse_manifest() -> Result<()> {
        let manifest = PackageManifest::from_toml_str(DEMO)?;
        assert_eq!(manifest.name.as_str(), "demo");
        assert_eq!(manifest.release, "1");
        assert_eq!(manifest.compressor, PayloadCompressor::Zstd);
        assert_eq!(manifest.requires[0].op, Some(Comparison::GreaterOrEqual));
        assert_eq!(manifest.files.len(), 4);
        assert_eq!(manifest.files[3].kind, FileSpecKind::Symlink);
        manifest.validate()?;
        Ok(())
    }

    #[test]
    fn test_into_builder() -> Result<()> {
        let builder = PackageManifest::from_toml_str(DEMO)?.into_builder(".")?;
        let header = builder.header();
        assert_eq!(header.get_string(Tag::Summary)?, "Demo package");
        assert!(header.contains_string(Tag::RequireName, "/bin/sh"));
        assert!(header.contains_string(Tag::RequireName, "rpmlib(VersionedDependencies)"));
        assert!(header.contains_string(Tag::ProvideName, "demo-cli"));
        let files = builder.files();
        assert_eq!(files.len(), 4);
        assert_eq!(files[1].mode, 0o100755);
        assert_eq!(files[1].mtime, 1_700_000_000);
        assert_eq!(files[2].flags, FileFlags::CONFIG | FileFlags::NOREPLACE);
        Ok(())
    }

    #[test]
    fn test_invalid_name_rejected_on_load() {
        let err = PackageManifest::from_toml_str("name = \"bad name\"\nversion = \"1\"\narch = \"noarch\"")
            .unwrap_err();
        assert!(matches!(err, RpmError::ManifestParse(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = "name = \"demo\"\nversion = \"1\"\narch = \"noarch\"\nsumary = \"typo\"";
        assert!(PackageManifest::from_toml_str(text).is_err());
    }

    #[test]
    fn test_file_spec_validation() -> Result<()> {
        let base = "name = \"demo\"\nversion = \"1\"\narch = \"noarch\"\n";
        let cases = [
            "[[files]]\ntarget = \"/a\"\n",
            "[[files]]\ntarget = \"/a\"\ncontent = \"x\"\nsource = \"x\"\n",
            "[[files]]\ntarget = \"a\"\ncontent = \"x\"\n",
            "[[files]]\ntarget = \"/a\"\ncontent = \"x\"\nmode = \"999\"\n",
            "[[files]]\ntarget = \"/a\"\ncontent = \"x\"\nflags = [\"bogus\"]\n",
            "[[files]]\ntarget = \"/a\"\nkind = \"dir\"\ncontent = \"x\"\n",
            "[[files]]\ntarget = \"/a\"\nkind = \"symlink\"\n",
            "[[files]]\ntarget = \"/a\"\nkind = \"dir\"\n[[files]]\ntarget = \"/a\"\nkind = \"dir\"\n",
        ];
        for case in cases {
            let manifest = PackageManifest::from_toml_str(&format!("{}{}", base, case))?;
            let err = manifest.validate().unwrap_err();
            assert!(
                matches!(err, RpmError::ManifestValidation(_)),
                "{:?} for {}",
                err,
                case
            );
        }
        Ok(())
    }

    #[test]
    fn test_operator_without_version() -> Result<()> {
        let text = "name = \"demo\"\nversion = \"1\"\narch = \"noarch\"\nrequires = [{ name = \"x\", op = \">\" }]";
        let manifest = PackageManifest::from_toml_str(text)?;
        assert!(manifest.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_toml_roundtrip() -> Result<()> {
        let manifest = PackageManifest::from_toml_str(DEMO)?;
        let text = manifest.to_toml_string()?;
        let again = PackageManifest::from_toml_str(&text)?;
        assert_eq!(again.name, manifest.name);
        assert_eq!(again.requires, manifest.requires);
        assert_eq!(again.files.len(), manifest.files.len());
        Ok(())
    }
}
