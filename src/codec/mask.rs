//! Conversion between symbolic rights and the native file access mask.

use crate::rights::Right;
use crate::types::AccessMask;

/// Native access-mask bits for file objects.
pub mod consts {
    use super::AccessMask;

    pub const FILE_READ_DATA: AccessMask = 0x0000_0001;
    pub const FILE_WRITE_DATA: AccessMask = 0x0000_0002;
    pub const FILE_APPEND_DATA: AccessMask = 0x0000_0004;
    pub const FILE_READ_EA: AccessMask = 0x0000_0008;
    pub const FILE_WRITE_EA: AccessMask = 0x0000_0010;
    pub const FILE_EXECUTE: AccessMask = 0x0000_0020;
    pub const FILE_DELETE_CHILD: AccessMask = 0x0000_0040;
    pub const FILE_READ_ATTRIBUTES: AccessMask = 0x0000_0080;
    pub const FILE_WRITE_ATTRIBUTES: AccessMask = 0x0000_0100;

    pub const DELETE: AccessMask = 0x0001_0000;
    pub const READ_CONTROL: AccessMask = 0x0002_0000;
    pub const WRITE_DAC: AccessMask = 0x0004_0000;
    pub const WRITE_OWNER: AccessMask = 0x0008_0000;
    pub const SYNCHRONIZE: AccessMask = 0x0010_0000;

    pub const STANDARD_RIGHTS_REQUIRED: AccessMask = DELETE | READ_CONTROL | WRITE_DAC | WRITE_OWNER;
    pub const STANDARD_RIGHTS_READ: AccessMask = READ_CONTROL;
    pub const STANDARD_RIGHTS_WRITE: AccessMask = READ_CONTROL;
    pub const STANDARD_RIGHTS_EXECUTE: AccessMask = READ_CONTROL;

    pub const GENERIC_ALL: AccessMask = 0x1000_0000;
    pub const GENERIC_EXECUTE: AccessMask = 0x2000_0000;
    pub const GENERIC_WRITE: AccessMask = 0x4000_0000;
    pub const GENERIC_READ: AccessMask = 0x8000_0000;

    /// 0x001F01FF
    pub const FILE_ALL_ACCESS: AccessMask = STANDARD_RIGHTS_REQUIRED | SYNCHRONIZE | 0x1FF;
    /// 0x00120089
    pub const FILE_GENERIC_READ: AccessMask =
        STANDARD_RIGHTS_READ | FILE_READ_DATA | FILE_READ_ATTRIBUTES | FILE_READ_EA | SYNCHRONIZE;
    /// 0x00120116
    pub const FILE_GENERIC_WRITE: AccessMask = STANDARD_RIGHTS_WRITE
        | FILE_WRITE_DATA
        | FILE_WRITE_ATTRIBUTES
        | FILE_WRITE_EA
        | FILE_APPEND_DATA
        | SYNCHRONIZE;
    /// 0x001200A0
    pub const FILE_GENERIC_EXECUTE: AccessMask =
        STANDARD_RIGHTS_EXECUTE | FILE_READ_ATTRIBUTES | FILE_EXECUTE | SYNCHRONIZE;
    /// 0x001301BF
    pub const FILE_MODIFY: AccessMask = DELETE | FILE_GENERIC_WRITE | FILE_GENERIC_READ | FILE_GENERIC_EXECUTE;
}

use consts::*;

/// Result of decoding a native access mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMask {
    pub rights: Vec<Right>,
    /// The original mask, present when the rights decoded to `[mask_specific]`.
    pub raw: Option<AccessMask>,
}

#[inline]
fn contains(mask: AccessMask, bits: AccessMask) -> bool {
    mask & bits == bits
}

/// Decodes a native mask into symbolic rights.
///
/// Masks that are not an exact encoding of a symbolic rights set (including
/// partial matches that leave stray bits behind) decode to `[mask_specific]`
/// with the raw mask preserved.
pub fn decode(mask: AccessMask) -> DecodedMask {
    if contains(mask, GENERIC_ALL) || contains(mask, FILE_ALL_ACCESS) {
        return DecodedMask { rights: vec![Right::Full], raw: None };
    }

    let mut rights = Vec::with_capacity(3);
    let mut remainder = mask;

    if contains(mask, GENERIC_WRITE) || contains(mask, FILE_GENERIC_WRITE) {
        rights.push(Right::Write);
        remainder &= !(GENERIC_WRITE | FILE_GENERIC_WRITE);
    }
    if contains(mask, GENERIC_READ) || contains(mask, FILE_GENERIC_READ) {
        rights.push(Right::Read);
        remainder &= !(GENERIC_READ | FILE_GENERIC_READ);
    }
    if contains(mask, GENERIC_EXECUTE) || contains(mask, FILE_GENERIC_EXECUTE) {
        rights.push(Right::Execute);
        remainder &= !(GENERIC_EXECUTE | FILE_GENERIC_EXECUTE);
    }

    if rights == [Right::Write, Right::Read, Right::Execute] && contains(mask, DELETE) {
        rights = vec![Right::Modify];
        remainder &= !DELETE;
    }

    if rights.is_empty() || remainder != 0 {
        tracing::debug!(
            "access mask {:#010x} has no symbolic form (remainder {:#x}), using mask_specific",
            mask,
            remainder
        );
        return DecodedMask { rights: vec![Right::MaskSpecific], raw: Some(mask) };
    }

    DecodedMask { rights, raw: None }
}

/// Encodes symbolic rights into a native mask. An explicit mask wins outright.
pub fn encode(rights: &[Right], explicit: Option<AccessMask>) -> AccessMask {
    if let Some(mask) = explicit {
        return mask;
    }
    if rights.contains(&Right::Full) {
        return FILE_ALL_ACCESS;
    }
    if rights.contains(&Right::Modify) {
        return FILE_MODIFY;
    }
    rights.iter().fold(0, |mask, right| match right {
        Right::Write => mask | FILE_GENERIC_WRITE,
        Right::Read => mask | FILE_GENERIC_READ,
        Right::Execute => mask | FILE_GENERIC_EXECUTE,
        _ => mask,
    })
}

/// Parses a mask given as a decimal or `0x`-prefixed hexadecimal string.
pub fn parse_mask(value: &str) -> Option<AccessMask> {
    let trimmed = value.trim();
    match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => AccessMask::from_str_radix(hex, 16).ok(),
        None => trimmed.parse::<AccessMask>().ok(),
    }
}
