//! Fixed 96-byte package preamble

use crate::core::error::{Result, RpmError};
use crate::core::io::ByteReader;
use std::fmt;

pub const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
pub const LEAD_SIZE: usize = 96;
pub const LEAD_NAME_SIZE: usize = 66;

/// Signature section is a header structure
pub const SIGNATURE_TYPE_HEADER: i16 = 5;

/// Binary package
pub const PACKAGE_TYPE_BINARY: i16 = 0;
/// Source package
pub const PACKAGE_TYPE_SOURCE: i16 = 1;

pub const OS_LINUX: i16 = 1;

/// Map an RPM architecture string onto the legacy lead `archnum`
pub fn arch_number(arch: &str) -> i16 {
    match arch {
        "i386" | "i486" | "i586" | "i686" | "athlon" | "x86_64" | "noarch" => 1,
        "alpha" => 2,
        "sparc" | "sparc64" => 3,
        "mips" | "mipsel" => 4,
        "ppc" | "ppc64" | "ppc64le" => 5,
        "m68k" => 6,
        "ia64" => 9,
        "aarch64" => 19,
        a if a.starts_with("armv") => 12,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub major: u8,
    pub minor: u8,
    pub package_type: i16,
    pub arch: i16,
    pub name: String,
    pub os: i16,
    pub signature_type: i16,
}

impl Default for Lead {
    fn default() -> Self {
        Lead {
            major: 3,
            minor: 0,
            package_type: PACKAGE_TYPE_BINARY,
            arch: 0,
            name: String::new(),
            os: OS_LINUX,
            signature_type: SIGNATURE_TYPE_HEADER,
        }
    }
}

impl Lead {
    /// Lead for a binary package named `name-version-release`
    pub fn new(name: impl Into<String>, arch: &str) -> Self {
        Lead {
            arch: arch_number(arch),
            name: name.into(),
            ..Lead::default()
        }
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let magic: [u8; 4] = reader.read_array("lead magic")?;
        if magic != LEAD_MAGIC {
            return Err(RpmError::InvalidLeadMagic(magic));
        }
        let major = reader.read_u8("lead major")?;
        let minor = reader.read_u8("lead minor")?;
        let package_type = reader.read_u16("lead type")? as i16;
        let arch = reader.read_u16("lead archnum")? as i16;
        let raw: [u8; LEAD_NAME_SIZE] = reader.read_array("lead name")?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(LEAD_NAME_SIZE);
        let name = std::str::from_utf8(&raw[..end])
            .map_err(|e| RpmError::InvalidString(format!("lead name: {}", e)))?
            .to_string();
        let os = reader.read_u16("lead osnum")? as i16;
        let signature_type = reader.read_u16("lead signature type")? as i16;
        reader.skip(16, "lead reserved")?;

        Ok(Lead {
            major,
            minor,
            package_type,
            arch,
            name,
            os,
            signature_type,
        })
    }

    /// Append exactly [`LEAD_SIZE`] bytes to `out`
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let name = self.name.as_bytes();
        if name.len() + 1 > LEAD_NAME_SIZE {
            return Err(RpmError::NameTooLong {
                name: self.name.clone(),
                len: name.len() + 1,
                limit: LEAD_NAME_SIZE,
            });
        }
        if name.contains(&0) {
            return Err(RpmError::EmbeddedNul(self.name.clone()));
        }

        out.extend_from_slice(&LEAD_MAGIC);
        out.push(self.major);
        out.push(self.minor);
        out.extend_from_slice(&self.package_type.to_be_bytes());
        out.extend_from_slice(&self.arch.to_be_bytes());
        let mut field = [0u8; LEAD_NAME_SIZE];
        field[..name.len()].copy_from_slice(name);
        out.extend_from_slice(&field);
        out.extend_from_slice(&self.os.to_be_bytes());
        out.extend_from_slice(&self.signature_type.to_be_bytes());
        out.extend_from_slice(&[0u8; 16]);
        Ok(())
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version: {}.{}", self.major, self.minor)?;
        writeln!(f, "Type: {}", self.package_type)?;
        writeln!(f, "Arch: {}", self.arch)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "OS: {}", self.os)?;
        write!(f, "Signature type: {}", self.signature_type)
    }
}
