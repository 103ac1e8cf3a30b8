//! Validation for package identity strings and file targets
//!
//! Names, versions and releases end up joined with `-` in the package file
//! name and in the self-provide, so none of them may be empty or contain
//! whitespace, and versions and releases may not contain `-` at all.

use crate::core::error::{Result, RpmError};
use regex::Regex;

/// Validated package name
///
/// # Rules
/// - ASCII letters, digits and `.`, `_`, `+`, `-`
/// - Must not start with `-` or `.`
/// - Length: 1-64 bytes, so `name-version-release` still has room in the lead
///
/// # Examples
///
/// ```
/// use rpmkit::core::validation::PackageName;
///
/// let name = PackageName::new("demo-tools").unwrap();
/// assert_eq!(name.as_str(), "demo-tools");
///
/// assert!(PackageName::new("demo tools").is_err()); // whitespace
/// assert!(PackageName::new("-demo").is_err()); // leading hyphen
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageName(String);

impl PackageName {
    const PATTERN: &'static str = r"^[A-Za-z0-9_+][A-Za-z0-9._+-]*$";

    const MAX_LENGTH: usize = 64;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        Ok(PackageName(name))
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(RpmError::InvalidName("name cannot be empty".to_string()));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(RpmError::InvalidName(format!(
                "name too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }

        let re = Regex::new(Self::PATTERN).map_err(|e| RpmError::InvalidName(e.to_string()))?;
        if !re.is_match(name) {
            return Err(RpmError::InvalidName(format!(
                "name '{}' may only contain letters, digits and . _ + -",
                name
            )));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const VERSION_PATTERN: &str = r"^[A-Za-z0-9._+~^]+$";

fn validate_evr_part(what: &str, value: &str) -> Result<()> {
    let re = Regex::new(VERSION_PATTERN).map_err(|e| RpmError::InvalidVersion(e.to_string()))?;
    if !re.is_match(value) {
        return Err(RpmError::InvalidVersion(format!(
            "{} '{}' may only contain letters, digits and . _ + ~ ^",
            what, value
        )));
    }
    Ok(())
}

/// Validate a version string (`1.0`, `2.3.1~rc1`)
pub fn validate_version(version: &str) -> Result<()> {
    validate_evr_part("version", version)
}

/// Validate a release string (`1`, `4.el9`)
pub fn validate_release(release: &str) -> Result<()> {
    validate_evr_part("release", release)
}

/// Split an absolute target path into its directory (with trailing `/`) and
/// basename
///
/// # Examples
///
/// ```
/// use rpmkit::core::validation::split_target;
///
/// assert_eq!(split_target("/opt/demo/bin/run").unwrap(), ("/opt/demo/bin/", "run"));
/// assert_eq!(split_target("/etc").unwrap(), ("/", "etc"));
/// assert!(split_target("relative/path").is_err());
/// assert!(split_target("/opt/demo/").is_err());
/// ```
pub fn split_target(target: &str) -> Result<(&str, &str)> {
    if !target.starts_with('/') {
        return Err(RpmError::InvalidTarget(format!(
            "'{}' is not an absolute path",
            target
        )));
    }
    if target.contains('\0') {
        return Err(RpmError::EmbeddedNul(target.to_string()));
    }
    let split = target.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (dir, base) = target.split_at(split);
    if base.is_empty() || base == "." || base == ".." {
        return Err(RpmError::InvalidTarget(format!(
            "'{}' has no file name",
            target
        )));
    }
    Ok((dir, base))
}

/// File name of a built package: `<name>-<version>-<release>.rpm`
pub fn package_file_name(name: &str, version: &str, release: &str) -> String {
    format!("{}-{}-{}.rpm", name, version, release)
}
