//! Tag and wire-type enumeration
//!
//! Every tag known to this crate is listed once in the `tags!` table below,
//! together with its numeric id, declared [`WireType`], the section(s) it may
//! appear in and its LSB status. Encoding and decoding both consult this table,
//! so a record whose wire type differs from its tag's declaration is rejected
//! in either direction.

use crate::core::error::{Result, RpmError};
use serde::Serialize;
use std::fmt;

/// Binary encoding discipline of a header value
///
/// Discriminants are the ordinals RPM writes into index entries.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WireType {
    Int16 = 3,
    Int32 = 4,
    String = 6,
    Binary = 7,
    StringArray = 8,
    I18nString = 9,
}

impl WireType {
    /// Resolve an on-disk type ordinal
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            3 => Ok(WireType::Int16),
            4 => Ok(WireType::Int32),
            6 => Ok(WireType::String),
            7 => Ok(WireType::Binary),
            8 => Ok(WireType::StringArray),
            9 => Ok(WireType::I18nString),
            other => Err(RpmError::UnknownWireType(other)),
        }
    }

    pub fn ordinal(self) -> u32 {
        self as u32
    }

    /// Storage alignment in bytes
    pub fn alignment(self) -> usize {
        match self {
            WireType::Int16 => 2,
            WireType::Int32 => 4,
            WireType::String
            | WireType::Binary
            | WireType::StringArray
            | WireType::I18nString => 1,
        }
    }

    /// Intrinsic element size; `None` for variable-length strings
    pub fn element_size(self) -> Option<usize> {
        match self {
            WireType::Int16 => Some(2),
            WireType::Int32 => Some(4),
            WireType::Binary => Some(1),
            WireType::String | WireType::StringArray | WireType::I18nString => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Int16 => "INT16",
            WireType::Int32 => "INT32",
            WireType::String => "STRING",
            WireType::Binary => "BIN",
            WireType::StringArray => "STRING_ARRAY",
            WireType::I18nString => "I18NSTRING",
        };
        f.write_str(name)
    }
}

/// Which header structure a tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Signature,
    Header,
    Both,
}

impl Section {
    pub fn allows(self, signature: bool) -> bool {
        match self {
            Section::Both => true,
            Section::Signature => signature,
            Section::Header => !signature,
        }
    }
}

/// LSB classification of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStatus {
    Required,
    Optional,
    Informational,
    Deprecated,
    NotLsb,
}

/// Static description of one tag
#[derive(Debug, Clone, Copy)]
pub struct TagInfo {
    pub id: u32,
    pub wire_type: WireType,
    pub section: Section,
    pub status: TagStatus,
    pub name: &'static str,
}

macro_rules! tags {
    ($($variant:ident => ($id:expr, $ty:ident, $section:ident, $status:ident, $name:expr);)*) => {
        /// Known metadata and signature keys
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum Tag {
            $($variant,)*
        }

        impl Tag {
            /// Every known tag, in declaration order
            pub const ALL: &'static [Tag] = &[$(Tag::$variant,)*];

            pub fn info(self) -> TagInfo {
                match self {
                    $(Tag::$variant => TagInfo {
                        id: $id,
                        wire_type: WireType::$ty,
                        section: Section::$section,
                        status: TagStatus::$status,
                        name: $name,
                    },)*
                }
            }
        }
    };
}

tags! {
    HeaderSignatures => (62, Binary, Both, Optional, "RPMTAG_HEADERSIGNATURES");
    HeaderImmutable => (63, Binary, Both, Optional, "RPMTAG_HEADERIMMUTABLE");
    HeaderI18nTable => (100, StringArray, Both, Optional, "RPMTAG_HEADERI18NTABLE");

    SigSize => (1000, Int32, Signature, Required, "RPMSIGTAG_SIZE");
    SigPayloadSize => (1007, Int32, Signature, Optional, "RPMSIGTAG_PAYLOADSIZE");
    SigSha1 => (269, String, Signature, Optional, "RPMSIGTAG_SHA1");
    SigSha256 => (273, String, Signature, Optional, "RPMSIGTAG_SHA256");
    SigMd5 => (1004, Binary, Signature, Required, "RPMSIGTAG_MD5");
    SigDsa => (267, Binary, Signature, Optional, "RPMSIGTAG_DSA");
    SigRsa => (268, Binary, Signature, Optional, "RPMSIGTAG_RSA");
    SigPgp => (1002, Binary, Signature, Optional, "RPMSIGTAG_PGP");
    SigGpg => (1005, Binary, Signature, Optional, "RPMSIGTAG_GPG");

    Name => (1000, String, Header, Required, "RPMTAG_NAME");
    Version => (1001, String, Header, Required, "RPMTAG_VERSION");
    Release => (1002, String, Header, Required, "RPMTAG_RELEASE");
    Summary => (1004, I18nString, Header, Required, "RPMTAG_SUMMARY");
    Description => (1005, I18nString, Header, Required, "RPMTAG_DESCRIPTION");
    BuildTime => (1006, Int32, Header, Informational, "RPMTAG_BUILDTIME");
    BuildHost => (1007, String, Header, Informational, "RPMTAG_BUILDHOST");
    Size => (1009, Int32, Header, Required, "RPMTAG_SIZE");
    Distribution => (1010, String, Header, Informational, "RPMTAG_DISTRIBUTION");
    Vendor => (1011, String, Header, Informational, "RPMTAG_VENDOR");
    License => (1014, String, Header, Required, "RPMTAG_LICENSE");
    Packager => (1015, String, Header, Informational, "RPMTAG_PACKAGER");
    Group => (1016, I18nString, Header, Required, "RPMTAG_GROUP");
    Url => (1020, String, Header, Informational, "RPMTAG_URL");
    Os => (1021, String, Header, Required, "RPMTAG_OS");
    Arch => (1022, String, Header, Required, "RPMTAG_ARCH");
    PreIn => (1023, String, Header, Optional, "RPMTAG_PREIN");
    PostIn => (1024, String, Header, Optional, "RPMTAG_POSTIN");
    PreUn => (1025, String, Header, Optional, "RPMTAG_PREUN");
    PostUn => (1026, String, Header, Optional, "RPMTAG_POSTUN");
    OldFilenames => (1027, StringArray, Header, Optional, "RPMTAG_OLDFILENAMES");
    FileSizes => (1028, Int32, Header, Required, "RPMTAG_FILESIZES");
    FileModes => (1030, Int16, Header, Required, "RPMTAG_FILEMODES");
    FileRdevs => (1033, Int16, Header, Required, "RPMTAG_FILERDEVS");
    FileMtimes => (1034, Int32, Header, Required, "RPMTAG_FILEMTIMES");
    FileMd5s => (1035, StringArray, Header, Required, "RPMTAG_FILEMD5S");
    FileLinkTos => (1036, StringArray, Header, Required, "RPMTAG_FILELINKTOS");
    FileFlags => (1037, Int32, Header, Required, "RPMTAG_FILEFLAGS");
    FileUserName => (1039, StringArray, Header, Required, "RPMTAG_FILEUSERNAME");
    FileGroupName => (1040, StringArray, Header, Required, "RPMTAG_FILEGROUPNAME");
    SourceRpm => (1044, String, Header, Informational, "RPMTAG_SOURCERPM");
    FileVerifyFlags => (1045, Int32, Header, Optional, "RPMTAG_FILEVERIFYFLAGS");
    ArchiveSize => (1046, Int32, Header, Optional, "RPMTAG_ARCHIVESIZE");
    ProvideName => (1047, StringArray, Header, Required, "RPMTAG_PROVIDENAME");
    RequireFlags => (1048, Int32, Header, Required, "RPMTAG_REQUIREFLAGS");
    RequireName => (1049, StringArray, Header, Required, "RPMTAG_REQUIRENAME");
    RequireVersion => (1050, StringArray, Header, Required, "RPMTAG_REQUIREVERSION");
    ConflictFlags => (1053, Int32, Header, Optional, "RPMTAG_CONFLICTFLAGS");
    ConflictName => (1054, StringArray, Header, Optional, "RPMTAG_CONFLICTNAME");
    ConflictVersion => (1055, StringArray, Header, Optional, "RPMTAG_CONFLICTVERSION");
    RpmVersion => (1064, String, Header, Informational, "RPMTAG_RPMVERSION");
    ChangelogTime => (1080, Int32, Header, Optional, "RPMTAG_CHANGELOGTIME");
    ChangelogName => (1081, StringArray, Header, Optional, "RPMTAG_CHANGELOGNAME");
    ChangelogText => (1082, StringArray, Header, Optional, "RPMTAG_CHANGELOGTEXT");
    PreInProg => (1085, String, Header, Optional, "RPMTAG_PREINPROG");
    PostInProg => (1086, String, Header, Optional, "RPMTAG_POSTINPROG");
    PreUnProg => (1087, String, Header, Optional, "RPMTAG_PREUNPROG");
    PostUnProg => (1088, String, Header, Optional, "RPMTAG_POSTUNPROG");
    ObsoleteName => (1090, StringArray, Header, Optional, "RPMTAG_OBSOLETENAME");
    Cookie => (1094, String, Header, Optional, "RPMTAG_COOKIE");
    FileDevices => (1095, Int32, Header, Required, "RPMTAG_FILEDEVICES");
    FileInodes => (1096, Int32, Header, Required, "RPMTAG_FILEINODES");
    FileLangs => (1097, StringArray, Header, Required, "RPMTAG_FILELANGS");
    ProvideFlags => (1112, Int32, Header, Required, "RPMTAG_PROVIDEFLAGS");
    ProvideVersion => (1113, StringArray, Header, Required, "RPMTAG_PROVIDEVERSION");
    ObsoleteFlags => (1114, Int32, Header, Optional, "RPMTAG_OBSOLETEFLAGS");
    ObsoleteVersion => (1115, StringArray, Header, Optional, "RPMTAG_OBSOLETEVERSION");
    DirIndexes => (1116, Int32, Header, Optional, "RPMTAG_DIRINDEXES");
    BaseNames => (1117, StringArray, Header, Optional, "RPMTAG_BASENAMES");
    DirNames => (1118, StringArray, Header, Optional, "RPMTAG_DIRNAMES");
    OptFlags => (1122, String, Header, Informational, "RPMTAG_OPTFLAGS");
    DistUrl => (1123, String, Header, Informational, "RPMTAG_DISTURL");
    PayloadFormat => (1124, String, Header, Required, "RPMTAG_PAYLOADFORMAT");
    PayloadCompressor => (1125, String, Header, Required, "RPMTAG_PAYLOADCOMPRESSOR");
    PayloadFlags => (1126, String, Header, Required, "RPMTAG_PAYLOADFLAGS");
    RhnPlatform => (1131, String, Header, Deprecated, "RPMTAG_RHNPLATFORM");
    Platform => (1132, String, Header, Informational, "RPMTAG_PLATFORM");
    FileClass => (1141, Int32, Header, NotLsb, "RPMTAG_FILECLASS");
    ClassDict => (1142, StringArray, Header, NotLsb, "RPMTAG_CLASSDICT");
    FileDependsX => (1143, Int32, Header, NotLsb, "RPMTAG_FILEDEPENDSX");
    FileDependsN => (1144, Int32, Header, NotLsb, "RPMTAG_FILEDEPENDSN");
    DependsDict => (1145, Int32, Header, NotLsb, "RPMTAG_DEPENDSDICT");
    SourcePkgId => (1146, Binary, Header, NotLsb, "RPMTAG_SOURCEPKGID");
    SuggestName => (5049, StringArray, Header, NotLsb, "RPMTAG_SUGGESTNAME");
    SuggestVersion => (5050, StringArray, Header, NotLsb, "RPMTAG_SUGGESTVERSION");
    SuggestFlags => (5051, Int32, Header, NotLsb, "RPMTAG_SUGGESTFLAGS");
}

impl Tag {
    /// Resolve an on-disk tag id in the given section context
    pub fn from_id(id: u32, signature: bool) -> Result<Tag> {
        Tag::ALL
            .iter()
            .copied()
            .find(|tag| {
                let info = tag.info();
                info.id == id && info.section.allows(signature)
            })
            .ok_or(RpmError::UnknownTag { id, signature })
    }

    pub fn id(self) -> u32 {
        self.info().id
    }

    pub fn wire_type(self) -> WireType {
        self.info().wire_type
    }

    pub fn section(self) -> Section {
        self.info().section
    }

    pub fn status(self) -> TagStatus {
        self.info().status
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// True for tags that only live in the signature section
    pub fn is_signature(self) -> bool {
        self.section() == Section::Signature
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_wire_type_ordinals() {
        for ty in [
            WireType::Int16,
            WireType::Int32,
            WireType::String,
            WireType::Binary,
            WireType::StringArray,
            WireType::I18nString,
        ] {
            assert_eq!(WireType::from_u32(ty.ordinal()).unwrap(), ty);
        }
        assert!(matches!(
            WireType::from_u32(5),
            Err(RpmError::UnknownWireType(5))
        ));
        assert!(WireType::from_u32(0).is_err());
    }

    #[test]
    fn test_alignment() {
        assert_eq!(WireType::Int16.alignment(), 2);
        assert_eq!(WireType::Int32.alignment(), 4);
        assert_eq!(WireType::StringArray.alignment(), 1);
        assert_eq!(WireType::Binary.element_size(), Some(1));
        assert_eq!(WireType::I18nString.element_size(), None);
    }

    #[test]
    fn test_same_id_resolves_per_section() {
        assert_eq!(Tag::from_id(1000, false).unwrap(), Tag::Name);
        assert_eq!(Tag::from_id(1000, true).unwrap(), Tag::SigSize);
        assert_eq!(Tag::from_id(1004, true).unwrap(), Tag::SigMd5);
        assert_eq!(Tag::from_id(1004, false).unwrap(), Tag::Summary);
    }

    #[test]
    fn test_shared_tags_resolve_in_both_sections() {
        assert_eq!(Tag::from_id(62, true).unwrap(), Tag::HeaderSignatures);
        assert_eq!(Tag::from_id(62, false).unwrap(), Tag::HeaderSignatures);
        assert_eq!(Tag::from_id(100, false).unwrap(), Tag::HeaderI18nTable);
    }

    #[test]
    fn test_unknown_tag() {
        let err = Tag::from_id(4242, false).unwrap_err();
        assert!(err.is_format());
        // Header-only tag is unknown in signature context
        assert!(Tag::from_id(1118, true).is_err());
    }

    #[test]
    fn test_ids_unique_per_section() {
        for signature in [true, false] {
            let mut seen = HashSet::new();
            for tag in Tag::ALL.iter().filter(|t| t.section().allows(signature)) {
                assert!(seen.insert(tag.id()), "duplicate id {} for {}", tag.id(), tag);
            }
        }
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(Tag::Name.wire_type(), WireType::String);
        assert_eq!(Tag::FileModes.wire_type(), WireType::Int16);
        assert_eq!(Tag::SigMd5.wire_type(), WireType::Binary);
        assert_eq!(Tag::Summary.wire_type(), WireType::I18nString);
        assert!(Tag::SigMd5.is_signature());
        assert!(!Tag::HeaderImmutable.is_signature());
        assert_eq!(Tag::Name.to_string(), "RPMTAG_NAME");
    }
}
