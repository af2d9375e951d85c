//!
//! Access control entry model.
//!
//! An [`Ace`] is the canonical in-memory form of one allow/deny grant. It is
//! only constructed through [`AceBuilder`] (or decoded from a native record),
//! so its invariants always hold:
//!
//! - `rights` is non-empty, sorted by rank and de-duplicated;
//! - `full`, `modify` and `mask_specific` never share the list with another right;
//! - `child_types == none` exactly when `affects == self_only`.
//!
//! Corrections applied to keep those invariants are logged at `warn` and
//! returned as [`Correction`] values.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::codec::{flags, mask, AceFlags};
use crate::descriptor::IdentityLookup;
use crate::error::ValidationError;
use crate::rights::{self, Right};
use crate::types::{AccessMask, Affects, ChildTypes, PermType, Sid};

/// An automatic correction applied while normalising an entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// `full` or `modify` was combined with other rights; only `kept` remains.
    RightsCollapsed { identity: String, kept: Right, dropped: Vec<Right> },
    /// `child_types` and `affects` disagreed about `none`/`self_only`.
    PropagationCoupled {
        identity: String,
        requested_child_types: ChildTypes,
        requested_affects: Affects,
        child_types: ChildTypes,
        affects: Affects,
    },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::RightsCollapsed { identity, kept, dropped } => {
                let dropped: Vec<&str> = dropped.iter().map(Right::as_str).collect();
                write!(
                    f,
                    "rights for '{identity}' contain '{kept}' which cannot be combined with other rights; \
                     ignoring [{}]",
                    dropped.join(", ")
                )
            }
            Correction::PropagationCoupled {
                identity,
                requested_child_types,
                requested_affects,
                child_types,
                affects,
            } => write!(
                f,
                "child_types '{requested_child_types}' and affects '{requested_affects}' for '{identity}' \
                 are inconsistent; using child_types '{child_types}' and affects '{affects}'"
            ),
        }
    }
}

fn report(correction: &Correction) {
    tracing::warn!("{}", correction);
}

/// Resolves a requested `child_types`/`affects` pair into a consistent one.
///
/// `child_types = none` and `affects = self_only` imply each other. When one
/// side names them and the other explicitly asks for something else, the pair
/// becomes `(none, self_only)` and a correction is returned. Unset sides
/// default to `all`.
pub fn couple_propagation(
    identity: &str,
    child_types: Option<ChildTypes>,
    affects: Option<Affects>,
) -> (ChildTypes, Affects, Option<Correction>) {
    match (child_types, affects) {
        (Some(ChildTypes::None), None) | (None, Some(Affects::SelfOnly)) => {
            (ChildTypes::None, Affects::SelfOnly, None)
        }
        (Some(ChildTypes::None), Some(Affects::SelfOnly)) => (ChildTypes::None, Affects::SelfOnly, None),
        (Some(c), Some(a)) if c == ChildTypes::None || a == Affects::SelfOnly => {
            let correction = Correction::PropagationCoupled {
                identity: identity.to_string(),
                requested_child_types: c,
                requested_affects: a,
                child_types: ChildTypes::None,
                affects: Affects::SelfOnly,
            };
            (ChildTypes::None, Affects::SelfOnly, Some(correction))
        }
        (c, a) => (c.unwrap_or_default(), a.unwrap_or_default(), None),
    }
}

/// One allow/deny grant of rights to one identity.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Ace {
    identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<Sid>,
    rights: Vec<Right>,
    perm_type: PermType,
    child_types: ChildTypes,
    affects: Affects,
    is_inherited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask: Option<AccessMask>,
    /// Flags and mask exactly as read from the store, until the entry is changed.
    #[serde(skip)]
    native: Option<(AceFlags, AccessMask)>,
}

impl Ace {
    /// Builds an entry with default type and propagation, discarding correction notices.
    pub fn new<I>(identity: impl Into<String>, rights: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = Right>,
    {
        AceBuilder::new(identity, rights).build().map(|(ace, _)| ace)
    }

    /// Rebuilds an entry from its native encoding as read from a store.
    ///
    /// Propagation flags are taken as they are; a stored entry is never
    /// corrected, only described. Until one of the setters changes it, the
    /// entry encodes back to the exact flags and mask it was decoded from.
    pub fn decode(
        identity: impl Into<String>,
        sid: Option<Sid>,
        perm_type: PermType,
        ace_flags: AceFlags,
        access_mask: AccessMask,
    ) -> Self {
        let decoded = mask::decode(access_mask);
        let (child_types, affects) = flags::decode(ace_flags);
        Ace {
            identity: identity.into(),
            sid,
            rights: decoded.rights,
            perm_type,
            child_types,
            affects,
            is_inherited: ace_flags.is_inherited(),
            mask: decoded.raw,
            native: Some((ace_flags, access_mask)),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn sid(&self) -> Option<&Sid> {
        self.sid.as_ref()
    }

    pub fn rights(&self) -> &[Right] {
        &self.rights
    }

    pub fn perm_type(&self) -> PermType {
        self.perm_type
    }

    pub fn child_types(&self) -> ChildTypes {
        self.child_types
    }

    pub fn affects(&self) -> Affects {
        self.affects
    }

    pub fn is_inherited(&self) -> bool {
        self.is_inherited
    }

    pub fn is_allow(&self) -> bool {
        self.perm_type == PermType::Allow
    }

    pub fn is_deny(&self) -> bool {
        self.perm_type == PermType::Deny
    }

    /// Raw mask override. Only meaningful when rights are `[mask_specific]`.
    pub fn mask(&self) -> Option<AccessMask> {
        self.mask
    }

    pub fn is_mask_specific(&self) -> bool {
        self.rights == [Right::MaskSpecific]
    }

    /// Records the resolved SID for this entry's identity.
    pub fn set_sid(&mut self, sid: Sid) {
        self.sid = Some(sid);
    }

    pub fn with_sid(mut self, sid: Sid) -> Self {
        self.sid = Some(sid);
        self
    }

    /// Replaces the rights list, normalising it first.
    pub fn set_rights(&mut self, values: &[Right]) -> Result<Vec<Correction>, ValidationError> {
        let normalised = rights::normalise(values)?;
        self.native = None;
        let mut corrections = Vec::new();
        if let Some(kept) = normalised.rights.first().copied().filter(|_| !normalised.collapsed.is_empty()) {
            let correction = Correction::RightsCollapsed {
                identity: self.identity.clone(),
                kept,
                dropped: normalised.collapsed.clone(),
            };
            report(&correction);
            corrections.push(correction);
        }
        if normalised.mask_specific_dropped {
            tracing::debug!("ignoring mask_specific for '{}' because other rights are present", self.identity);
        }
        self.rights = normalised.rights;
        Ok(corrections)
    }

    /// Sets `child_types`. `none` forces `affects = self_only`; any other
    /// value lifts a `self_only` affects back to `all`.
    pub fn set_child_types(&mut self, value: ChildTypes) -> Option<Correction> {
        let previous = (self.child_types, self.affects);
        self.native = None;
        self.child_types = value;
        let forced = if value == ChildTypes::None && self.affects != Affects::SelfOnly {
            Some(Affects::SelfOnly)
        } else if value != ChildTypes::None && self.affects == Affects::SelfOnly {
            Some(Affects::All)
        } else {
            None
        };
        let affects = forced?;
        self.affects = affects;
        let correction = Correction::PropagationCoupled {
            identity: self.identity.clone(),
            requested_child_types: value,
            requested_affects: previous.1,
            child_types: value,
            affects,
        };
        report(&correction);
        Some(correction)
    }

    /// Sets `affects`. `self_only` forces `child_types = none`; any other
    /// value lifts a `none` child_types back to `all`.
    pub fn set_affects(&mut self, value: Affects) -> Option<Correction> {
        let previous = (self.child_types, self.affects);
        self.native = None;
        self.affects = value;
        let forced = if value == Affects::SelfOnly && self.child_types != ChildTypes::None {
            Some(ChildTypes::None)
        } else if value != Affects::SelfOnly && self.child_types == ChildTypes::None {
            Some(ChildTypes::All)
        } else {
            None
        };
        let child_types = forced?;
        self.child_types = child_types;
        let correction = Correction::PropagationCoupled {
            identity: self.identity.clone(),
            requested_child_types: previous.0,
            requested_affects: value,
            child_types,
            affects: value,
        };
        report(&correction);
        Some(correction)
    }

    /// Native access mask for this entry.
    pub fn access_mask(&self) -> AccessMask {
        if let Some((_, raw)) = self.native {
            return raw;
        }
        let explicit = if self.is_mask_specific() { self.mask } else { None };
        mask::encode(&self.rights, explicit)
    }

    /// Native inheritance flags for this entry, including `INHERITED` when set.
    pub fn ace_flags(&self) -> AceFlags {
        if let Some((raw, _)) = self.native {
            return raw;
        }
        let mut bits = flags::encode(self.child_types, self.affects);
        if self.is_inherited {
            bits |= AceFlags::INHERITED;
        }
        bits
    }

    fn effective_sid(&self) -> Option<Sid> {
        self.sid.clone().or_else(|| Sid::parse(&self.identity).ok())
    }

    /// Identity comparison without a lookup. SIDs decide when both sides
    /// have one; otherwise names compare case-insensitively.
    pub fn identity_matches(&self, other: &Ace) -> bool {
        match (self.effective_sid(), other.effective_sid()) {
            (Some(a), Some(b)) => a == b,
            _ => self.identity.eq_ignore_ascii_case(&other.identity),
        }
    }

    /// Identity comparison falling back to the lookup when the identities
    /// differ lexically and no SID settles it.
    pub fn identity_matches_with(&self, other: &Ace, lookup: &dyn IdentityLookup) -> bool {
        if self.identity_matches(other) {
            return true;
        }
        let resolve = |ace: &Ace| ace.effective_sid().or_else(|| lookup.name_to_sid(&ace.identity).ok());
        if let (Some(a), Some(b)) = (resolve(self), resolve(other)) {
            return a == b;
        }
        let name = |ace: &Ace| {
            ace.effective_sid()
                .and_then(|sid| lookup.sid_to_name(&sid).ok())
                .unwrap_or_else(|| ace.identity.clone())
        };
        name(self).eq_ignore_ascii_case(&name(other))
    }

    fn same_grant_fields(&self, other: &Ace) -> bool {
        self.perm_type == other.perm_type
            && self.child_types == other.child_types
            && self.affects == other.affects
            && self.is_inherited == other.is_inherited
    }

    /// Same grant subject, ignoring rights: a rights difference between two
    /// `same` entries is an update to one entry, not two distinct entries.
    pub fn is_same(&self, other: &Ace) -> bool {
        self.same_grant_fields(other) && self.identity_matches(other)
    }

    /// [`Ace::is_same`] with lookup-aware identity comparison.
    pub fn is_same_with(&self, other: &Ace, lookup: &dyn IdentityLookup) -> bool {
        self.same_grant_fields(other) && self.identity_matches_with(other, lookup)
    }

    fn same_rights(&self, other: &Ace) -> bool {
        self.rights == other.rights && (!self.is_mask_specific() || self.mask == other.mask)
    }

    /// Lookup-aware counterpart of `==`.
    pub fn equals_with(&self, other: &Ace, lookup: &dyn IdentityLookup) -> bool {
        self.is_same_with(other, lookup) && self.same_rights(other)
    }
}

impl PartialEq for Ace {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) && self.same_rights(other)
    }
}

impl Eq for Ace {}

impl Hash for Ace {
    // identity is left out: equal entries may spell it differently
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.perm_type.hash(state);
        self.child_types.hash(state);
        self.affects.hash(state);
        self.is_inherited.hash(state);
        self.rights.hash(state);
    }
}

impl fmt::Display for Ace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rights: Vec<String> = self.rights.iter().map(|r| format!("\"{r}\"")).collect();
        write!(f, "{{ identity => '{}', rights => [{}]", self.identity, rights.join(", "))?;
        if self.is_mask_specific() {
            if let Some(mask) = self.mask {
                write!(f, ", mask => '{mask}'")?;
            }
        }
        if self.perm_type != PermType::Allow {
            write!(f, ", perm_type => '{}'", self.perm_type)?;
        }
        if self.child_types != ChildTypes::All {
            write!(f, ", child_types => '{}'", self.child_types)?;
        }
        if self.affects != Affects::All {
            write!(f, ", affects => '{}'", self.affects)?;
        }
        if self.is_inherited {
            f.write_str(", is_inherited => 'true'")?;
        }
        f.write_str(" }")
    }
}

/// Validating constructor for [`Ace`].
#[derive(Debug, Clone)]
pub struct AceBuilder {
    identity: String,
    sid: Option<Sid>,
    rights: Vec<Right>,
    perm_type: PermType,
    child_types: Option<ChildTypes>,
    affects: Option<Affects>,
    is_inherited: bool,
    mask: Option<AccessMask>,
}

impl AceBuilder {
    pub fn new<I>(identity: impl Into<String>, rights: I) -> Self
    where
        I: IntoIterator<Item = Right>,
    {
        AceBuilder {
            identity: identity.into(),
            sid: None,
            rights: rights.into_iter().collect(),
            perm_type: PermType::default(),
            child_types: None,
            affects: None,
            is_inherited: false,
            mask: None,
        }
    }

    pub fn sid(mut self, sid: Sid) -> Self {
        self.sid = Some(sid);
        self
    }

    pub fn perm_type(mut self, perm_type: PermType) -> Self {
        self.perm_type = perm_type;
        self
    }

    pub fn child_types(mut self, child_types: ChildTypes) -> Self {
        self.child_types = Some(child_types);
        self
    }

    pub fn affects(mut self, affects: Affects) -> Self {
        self.affects = Some(affects);
        self
    }

    pub fn inherited(mut self, is_inherited: bool) -> Self {
        self.is_inherited = is_inherited;
        self
    }

    pub fn mask(mut self, mask: AccessMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Validates and normalises the entry, returning it with the corrections applied.
    pub fn build(self) -> Result<(Ace, Vec<Correction>), ValidationError> {
        let identity = self.identity.trim().to_string();
        if identity.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }

        let (child_types, affects, coupling) = couple_propagation(&identity, self.child_types, self.affects);

        let mut ace = Ace {
            identity,
            sid: self.sid,
            rights: Vec::new(),
            perm_type: self.perm_type,
            child_types,
            affects,
            is_inherited: self.is_inherited,
            mask: self.mask,
            native: None,
        };
        let mut corrections = ace.set_rights(&self.rights)?;
        if let Some(correction) = coupling {
            report(&correction);
            corrections.push(correction);
        }
        Ok((ace, corrections))
    }
}
