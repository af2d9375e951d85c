//!
//! Shared value types used across the ACE model, the codec and the
//! descriptor adapter: trustee SIDs and the small enums that describe how an
//! entry applies.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Native 32-bit access mask as stored in an ACE.
pub type AccessMask = u32;

/// Security identifier in its canonical string form (`S-1-5-32-544`).
///
/// The prefix is normalised to upper case on parse so two SIDs that differ
/// only by the case of the leading `s` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sid(String);

impl Sid {
    /// Parses a SID string. Requires revision 1, an identifier authority and
    /// numeric sub-authorities.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        let mut parts = trimmed.split('-');
        let prefix = parts.next().unwrap_or_default();
        if !prefix.eq_ignore_ascii_case("s") {
            return Err(ValidationError::InvalidSid(value.to_string()));
        }
        let rest: Vec<&str> = parts.collect();
        // revision + authority at minimum
        if rest.len() < 2 || rest[0] != "1" {
            return Err(ValidationError::InvalidSid(value.to_string()));
        }
        for part in &rest[1..] {
            let numeric = if let Some(hex) = part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).is_ok()
            } else {
                !part.is_empty() && part.parse::<u64>().is_ok()
            };
            if !numeric {
                return Err(ValidationError::InvalidSid(value.to_string()));
            }
        }
        Ok(Sid(format!("S-{}", rest.join("-"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sid {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sid::parse(s)
    }
}

impl TryFrom<String> for Sid {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Sid::parse(&value)
    }
}

impl From<Sid> for String {
    fn from(sid: Sid) -> Self {
        sid.0
    }
}

/// Whether an entry grants or denies its rights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermType {
    #[default]
    Allow,
    Deny,
}

/// Which kinds of descendants inherit an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildTypes {
    #[default]
    All,
    Objects,
    Containers,
    None,
}

/// How far an entry propagates from the object it is set on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affects {
    #[default]
    All,
    SelfOnly,
    ChildrenOnly,
    SelfAndDirectChildrenOnly,
    DirectChildrenOnly,
}

/// Policy for explicit entries that are on disk but not in the desired list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    #[default]
    #[serde(alias = "false")]
    None,
    #[serde(alias = "true")]
    All,
    #[serde(alias = "listed_permissions")]
    ListedOnly,
}

macro_rules! symbolic_enum {
    ($ty:ident, $err:ident, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The symbol used in desired-state input and diagnostics.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ValidationError::$err(s.to_string())),
                }
            }
        }
    };
}

symbolic_enum!(PermType, InvalidPermType, {
    Allow => "allow",
    Deny => "deny",
});

symbolic_enum!(ChildTypes, InvalidChildTypes, {
    All => "all",
    Objects => "objects",
    Containers => "containers",
    None => "none",
});

symbolic_enum!(Affects, InvalidAffects, {
    All => "all",
    SelfOnly => "self_only",
    ChildrenOnly => "children_only",
    SelfAndDirectChildrenOnly => "self_and_direct_children_only",
    DirectChildrenOnly => "direct_children_only",
});

impl PurgeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeMode::None => "none",
            PurgeMode::All => "all",
            PurgeMode::ListedOnly => "listed_only",
        }
    }
}

impl fmt::Display for PurgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurgeMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "false" => Ok(PurgeMode::None),
            "all" | "true" => Ok(PurgeMode::All),
            "listed_only" | "listed_permissions" => Ok(PurgeMode::ListedOnly),
            _ => Err(ValidationError::InvalidPurge(s.to_string())),
        }
    }
}
