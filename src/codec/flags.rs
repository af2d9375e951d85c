//! Conversion between `{child_types, affects}` and native ACE inheritance flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{Affects, ChildTypes};

bitflags! {
    /// Native ACE header flags relevant to file DACLs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AceFlags: u8 {
        /// Non-container children inherit the entry.
        const OBJECT_INHERIT       = 0x01;
        /// Container children inherit the entry.
        const CONTAINER_INHERIT    = 0x02;
        /// Inheritance stops after direct children.
        const NO_PROPAGATE_INHERIT = 0x04;
        /// The entry does not apply to the object it is set on.
        const INHERIT_ONLY         = 0x08;
        /// The entry was inherited from a parent container.
        const INHERITED            = 0x10;
    }
}

impl AceFlags {
    /// Bits that make an entry propagate to children at all.
    pub const PROPAGATES: Self = Self::OBJECT_INHERIT.union(Self::CONTAINER_INHERIT);

    /// Bits describing propagation, i.e. everything but `INHERITED`.
    pub const PROPAGATION_MASK: Self = Self::PROPAGATES
        .union(Self::NO_PROPAGATE_INHERIT)
        .union(Self::INHERIT_ONLY);

    pub fn is_inherited(&self) -> bool {
        self.contains(Self::INHERITED)
    }
}

/// Derives `child_types` from the inherit bits. Both bits set means `all`.
pub fn decode_child_types(flags: AceFlags) -> ChildTypes {
    let mut child_types = ChildTypes::None;
    if flags.contains(AceFlags::OBJECT_INHERIT) {
        child_types = ChildTypes::Objects;
    }
    if flags.contains(AceFlags::CONTAINER_INHERIT) {
        child_types = ChildTypes::Containers;
    }
    if flags.contains(AceFlags::PROPAGATES) {
        child_types = ChildTypes::All;
    }
    child_types
}

/// Derives `affects` from the inherit-only, inherit and no-propagate bits.
pub fn decode_affects(flags: AceFlags) -> Affects {
    let targets_self = !flags.contains(AceFlags::INHERIT_ONLY);
    let targets_children = flags.intersects(AceFlags::PROPAGATES);

    let affects = if targets_self && !targets_children {
        Affects::SelfOnly
    } else if !targets_self {
        Affects::ChildrenOnly
    } else {
        Affects::All
    };

    if flags.contains(AceFlags::NO_PROPAGATE_INHERIT) {
        return match affects {
            Affects::All => Affects::SelfAndDirectChildrenOnly,
            Affects::ChildrenOnly => Affects::DirectChildrenOnly,
            other => other,
        };
    }
    affects
}

/// Decodes both propagation fields at once.
pub fn decode(flags: AceFlags) -> (ChildTypes, Affects) {
    (decode_child_types(flags), decode_affects(flags))
}

/// Encodes `child_types` and `affects` into inheritance flags.
/// Never sets `INHERITED`; that bit belongs to the store.
pub fn encode(child_types: ChildTypes, affects: Affects) -> AceFlags {
    let mut flags = match child_types {
        ChildTypes::All => AceFlags::PROPAGATES,
        ChildTypes::Objects => AceFlags::OBJECT_INHERIT,
        ChildTypes::Containers => AceFlags::CONTAINER_INHERIT,
        ChildTypes::None => AceFlags::empty(),
    };

    match affects {
        Affects::All => {}
        Affects::SelfOnly => flags = AceFlags::empty(),
        Affects::ChildrenOnly => flags |= AceFlags::INHERIT_ONLY,
        Affects::SelfAndDirectChildrenOnly => flags |= AceFlags::NO_PROPAGATE_INHERIT,
        Affects::DirectChildrenOnly => {
            flags |= AceFlags::NO_PROPAGATE_INHERIT | AceFlags::INHERIT_ONLY
        }
    }

    if child_types == ChildTypes::None && !flags.is_empty() {
        flags = AceFlags::empty();
    }
    flags
}
