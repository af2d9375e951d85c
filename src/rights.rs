//!
//! Rights vocabulary.
//! Defines the symbolic rights an entry can carry, their canonical ordering
//! and the combination rules applied when a rights list is normalised.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// A symbolic right. Variant order is the canonical sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Right {
    Full,
    Modify,
    Write,
    Read,
    Execute,
    /// Use the raw access mask verbatim.
    MaskSpecific,
}

impl Right {
    pub const ALL: [Right; 6] = [
        Right::Full,
        Right::Modify,
        Right::Write,
        Right::Read,
        Right::Execute,
        Right::MaskSpecific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Right::Full => "full",
            Right::Modify => "modify",
            Right::Write => "write",
            Right::Read => "read",
            Right::Execute => "execute",
            Right::MaskSpecific => "mask_specific",
        }
    }

    /// True for rights that must stand alone in a rights list.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Right::Full | Right::Modify | Right::MaskSpecific)
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Right {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        order_of(s).map(|rank| Right::ALL[rank as usize])
    }
}

/// Rank of a rights symbol in the canonical order
/// (full=0, modify=1, write=2, read=3, execute=4, mask_specific=5).
pub fn order_of(right: &str) -> Result<u8, ValidationError> {
    match right.trim().to_ascii_lowercase().as_str() {
        "full" => Ok(0),
        "modify" => Ok(1),
        "write" => Ok(2),
        "read" => Ok(3),
        "execute" => Ok(4),
        "mask_specific" => Ok(5),
        _ => Err(ValidationError::UnknownRight(right.to_string())),
    }
}

/// Outcome of normalising a rights list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalised {
    pub rights: Vec<Right>,
    /// Rights removed because an exclusive right (`full`/`modify`) was present.
    /// Non-empty means the caller should surface a warning.
    pub collapsed: Vec<Right>,
    /// `mask_specific` was dropped because other rights were present.
    pub mask_specific_dropped: bool,
}

/// Sorts, de-duplicates and applies the compatibility rules to a rights list.
///
/// `full` or `modify` combined with anything else collapses to that single
/// right (the lower rank wins when both are present). `mask_specific`
/// combined with anything else is removed.
pub fn normalise(values: &[Right]) -> Result<Normalised, ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::EmptyRights);
    }
    let mut rights = values.to_vec();
    rights.sort();
    rights.dedup();

    if rights.len() > 1 && matches!(rights[0], Right::Full | Right::Modify) {
        let kept = rights[0];
        let collapsed = rights.split_off(1);
        return Ok(Normalised {
            rights: vec![kept],
            collapsed,
            mask_specific_dropped: false,
        });
    }

    let mut mask_specific_dropped = false;
    if rights.len() > 1 && rights.contains(&Right::MaskSpecific) {
        rights.retain(|r| *r != Right::MaskSpecific);
        mask_specific_dropped = true;
    }

    Ok(Normalised { rights, collapsed: Vec::new(), mask_specific_dropped })
}

/// Parses and normalises a list of rights symbols.
pub fn parse_rights<S: AsRef<str>>(values: &[S]) -> Result<Normalised, ValidationError> {
    let parsed = values
        .iter()
        .map(|v| v.as_ref().parse::<Right>())
        .collect::<Result<Vec<_>, _>>()?;
    normalise(&parsed)
}
