use crate::core::tag::{Tag, WireType};
use thiserror::Error;

/// Broad classification of an [`RpmError`]
///
/// `Format` errors come from bytes that are not a valid package (bad magic,
/// tag/type mismatch, truncation). `Validation` errors come from caller input
/// that would produce an invalid package. Neither is ever retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Validation,
    Io,
    Config,
}

#[derive(Error, Debug)]
pub enum RpmError {
    #[error("Invalid lead magic: {0:02x?}")]
    InvalidLeadMagic([u8; 4]),

    #[error("Not a header structure: bad magic {0:02x?}")]
    InvalidHeaderMagic([u8; 4]),

    #[error("Invalid cpio magic: {0:?}")]
    InvalidCpioMagic(String),

    #[error("Truncated input: {context} needs {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown tag {id} in {} section", section_name(.signature))]
    UnknownTag { id: u32, signature: bool },

    #[error("{0} appears more than once")]
    DuplicateTag(Tag),

    #[error("Unknown wire type ordinal {0}")]
    UnknownWireType(u32),

    #[error("{tag} is declared {expected} but index entry says {found}")]
    TypeMismatch {
        tag: Tag,
        expected: WireType,
        found: WireType,
    },

    #[error("{tag}: STRING record holds {count} values, exactly one is allowed")]
    InvalidStringCount { tag: Tag, count: u32 },

    #[error("Invalid string data: {0}")]
    InvalidString(String),

    #[error("Invalid hex field {field}: {value:?}")]
    InvalidHex { field: &'static str, value: String },

    #[error("Cpio archive ended without a TRAILER!!! entry")]
    MissingTrailer,

    #[error("Directory index {index} out of range, {dirs} directories")]
    InvalidDirIndex { index: u32, dirs: usize },

    #[error("File list tags disagree: {0}")]
    InconsistentFileList(String),

    #[error("Package digest mismatch: stored {stored}, computed {computed}")]
    DigestMismatch { stored: String, computed: String },

    #[error("Signature size {stored} does not match header+payload size {actual}")]
    SizeMismatch { stored: u32, actual: usize },

    #[error("Unsupported payload compressor: {0}")]
    UnsupportedCompressor(String),

    #[error("Payload decompression failed: {0}")]
    Decompression(String),

    #[error("Required tags missing: {0:?}")]
    MissingTags(Vec<Tag>),

    #[error("Missing required dependency: {0}")]
    MissingRequirement(String),

    #[error("File target added twice: {0}")]
    DuplicateTarget(String),

    #[error("Tag not present: {0}")]
    MissingTag(Tag),

    #[error("{tag} holds {actual} values, expected {expected}")]
    WrongValueType {
        tag: Tag,
        expected: WireType,
        actual: WireType,
    },

    #[error("{0} is single-valued and already set")]
    SingleValueViolation(Tag),

    #[error("{tag} does not belong in the {} section", section_name(.signature))]
    WrongSection { tag: Tag, signature: bool },

    #[error("{tag} holds {count} values, expected exactly one")]
    NotSingleValued { tag: Tag, count: usize },

    #[error("String value contains NUL byte: {0:?}")]
    EmbeddedNul(String),

    #[error("Lead name {name:?} is {len} bytes with NUL, limit is {limit}")]
    NameTooLong {
        name: String,
        len: usize,
        limit: usize,
    },

    #[error("Invalid package name: {0}")]
    InvalidName(String),

    #[error("Invalid version or release: {0}")]
    InvalidVersion(String),

    #[error("Invalid file target: {0}")]
    InvalidTarget(String),

    #[error("Cpio entry {name:?} has inconsistent {field}: header says {declared}, data is {actual}")]
    InconsistentEntry {
        name: String,
        field: &'static str,
        declared: u32,
        actual: usize,
    },

    #[error("Value too large for a 32-bit field: {0}")]
    Overflow(usize),

    #[error("Manifest validation failed: {0}")]
    ManifestValidation(String),

    #[error("Manifest parse error: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpmError::InvalidLeadMagic(_)
            | RpmError::InvalidHeaderMagic(_)
            | RpmError::InvalidCpioMagic(_)
            | RpmError::Truncated { .. }
            | RpmError::UnknownTag { .. }
            | RpmError::DuplicateTag(_)
            | RpmError::UnknownWireType(_)
            | RpmError::TypeMismatch { .. }
            | RpmError::InvalidStringCount { .. }
            | RpmError::InvalidString(_)
            | RpmError::InvalidHex { .. }
            | RpmError::MissingTrailer
            | RpmError::InvalidDirIndex { .. }
            | RpmError::InconsistentFileList(_)
            | RpmError::DigestMismatch { .. }
            | RpmError::SizeMismatch { .. }
            | RpmError::UnsupportedCompressor(_)
            | RpmError::Decompression(_) => ErrorKind::Format,

            RpmError::MissingTags(_)
            | RpmError::MissingRequirement(_)
            | RpmError::DuplicateTarget(_)
            | RpmError::MissingTag(_)
            | RpmError::WrongValueType { .. }
            | RpmError::SingleValueViolation(_)
            | RpmError::WrongSection { .. }
            | RpmError::NotSingleValued { .. }
            | RpmError::EmbeddedNul(_)
            | RpmError::NameTooLong { .. }
            | RpmError::InvalidName(_)
            | RpmError::InvalidVersion(_)
            | RpmError::InvalidTarget(_)
            | RpmError::InconsistentEntry { .. }
            | RpmError::Overflow(_) => ErrorKind::Validation,

            RpmError::ManifestValidation(_) | RpmError::ManifestParse(_) => ErrorKind::Config,

            RpmError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_format(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

fn section_name(signature: &bool) -> &'static str {
    if *signature {
        "signature"
    } else {
        "header"
    }
}

pub type Result<T> = std::result::Result<T, RpmError>;
