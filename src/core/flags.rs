//! Dependency sense and file attribute bit sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

macro_rules! bit_set {
    ($name:ident { $($flag:ident = $bit:expr, $label:expr;)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: $name = $name(0);
            $(pub const $flag: $name = $name($bit);)*

            const NAMED: &'static [($name, &'static str)] = &[$(($name::$flag, $label),)*];

            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Look up a single flag by its lowercase label
            pub fn from_label(label: &str) -> Option<Self> {
                Self::NAMED
                    .iter()
                    .find(|(_, name)| *name == label)
                    .map(|(flag, _)| *flag)
            }
        }

        impl BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = Self::NAMED
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, name)| *name)
                    .collect();
                if names.is_empty() {
                    write!(f, "{:#x}", self.0)
                } else {
                    f.write_str(&names.join("|"))
                }
            }
        }
    };
}

bit_set!(DependencyFlags {
    LESS = 0x02, "less";
    GREATER = 0x04, "greater";
    EQUAL = 0x08, "equal";
    PREREQ = 0x40, "prereq";
    INTERP = 0x100, "interp";
    SCRIPT_PRE = 0x200, "script_pre";
    SCRIPT_POST = 0x400, "script_post";
    SCRIPT_PREUN = 0x800, "script_preun";
    SCRIPT_POSTUN = 0x1000, "script_postun";
    RPMLIB = 0x0100_0000, "rpmlib";
});

bit_set!(FileFlags {
    CONFIG = 1, "config";
    DOC = 2, "doc";
    MISSINGOK = 8, "missingok";
    NOREPLACE = 16, "noreplace";
    GHOST = 64, "ghost";
    LICENSE = 128, "license";
    README = 256, "readme";
});

/// Version comparison operator of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl Comparison {
    pub fn flags(self) -> DependencyFlags {
        match self {
            Comparison::Less => DependencyFlags::LESS,
            Comparison::LessOrEqual => DependencyFlags::LESS | DependencyFlags::EQUAL,
            Comparison::Equal => DependencyFlags::EQUAL,
            Comparison::GreaterOrEqual => DependencyFlags::GREATER | DependencyFlags::EQUAL,
            Comparison::Greater => DependencyFlags::GREATER,
        }
    }
}

impl From<Comparison> for DependencyFlags {
    fn from(op: Comparison) -> Self {
        op.flags()
    }
}
