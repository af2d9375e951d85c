//!
//! Desired-state contract.
//!
//! [`DesiredState`] is the plain record a configuration framework hands over
//! for one target. [`DesiredState::validate`] turns it into entries the
//! synchronizer can use, failing fast on malformed input before any store
//! access happens.

use std::path::PathBuf;

use crate::ace::{Ace, AceBuilder, Correction};
use crate::codec::mask::parse_mask;
use crate::error::ValidationError;
use crate::rights::{self, Right};
use crate::types::{Affects, ChildTypes, PermType, PurgeMode};

fn default_true() -> bool {
    true
}

/// One desired permission as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PermissionSpec {
    pub identity: String,
    pub rights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perm_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affects: Option<String>,
    /// Decimal or `0x` hexadecimal; only with `rights = ["mask_specific"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_inherited: Option<bool>,
}

impl PermissionSpec {
    pub fn new<S: Into<String>>(identity: impl Into<String>, rights: impl IntoIterator<Item = S>) -> Self {
        PermissionSpec {
            identity: identity.into(),
            rights: rights.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn perm_type(mut self, value: &str) -> Self {
        self.perm_type = Some(value.to_string());
        self
    }

    pub fn child_types(mut self, value: &str) -> Self {
        self.child_types = Some(value.to_string());
        self
    }

    pub fn affects(mut self, value: &str) -> Self {
        self.affects = Some(value.to_string());
        self
    }

    pub fn mask(mut self, value: &str) -> Self {
        self.mask = Some(value.to_string());
        self
    }

    /// Validates this permission into an [`Ace`].
    pub fn to_ace(&self) -> Result<(Ace, Vec<Correction>), ValidationError> {
        let identity = self.identity.trim();
        if identity.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }
        if self.is_inherited == Some(true) {
            return Err(ValidationError::InheritedNotAllowed { identity: identity.to_string() });
        }
        if self.rights.is_empty() {
            return Err(ValidationError::EmptyRights);
        }
        let rights = self
            .rights
            .iter()
            .map(|r| r.parse::<Right>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = AceBuilder::new(identity, rights.iter().copied());
        if let Some(value) = &self.perm_type {
            builder = builder.perm_type(value.parse::<PermType>()?);
        }
        if let Some(value) = &self.child_types {
            builder = builder.child_types(value.parse::<ChildTypes>()?);
        }
        if let Some(value) = &self.affects {
            builder = builder.affects(value.parse::<Affects>()?);
        }
        if let Some(value) = &self.mask {
            let mask = parse_mask(value).ok_or_else(|| ValidationError::InvalidMask(value.clone()))?;
            if rights::normalise(&rights)?.rights == [Right::MaskSpecific] {
                builder = builder.mask(mask);
            } else if rights.contains(&Right::MaskSpecific) {
                // mask_specific is filtered out next to other rights, and its mask with it
                tracing::debug!("ignoring mask {:#x} for '{}' because other rights are present", mask, identity);
            } else {
                return Err(ValidationError::MaskWithoutMaskSpecific { identity: identity.to_string() });
            }
        }

        let (ace, corrections) = builder.build()?;
        if ace.is_mask_specific() && self.mask.is_none() {
            return Err(ValidationError::MaskRequired { identity: identity.to_string() });
        }
        Ok((ace, corrections))
    }
}

/// Caller options for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Plan only; never write.
    pub noop: bool,
    /// Render current entries with account names instead of bare SIDs.
    pub resolve_names: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions { noop: false, resolve_names: true }
    }
}

/// Desired security state of one target path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DesiredState {
    pub target: PathBuf,
    #[serde(default, alias = "purge")]
    pub purge_mode: PurgeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub inherit_parent_permissions: bool,
    /// `None` leaves the DACL entries unmanaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<PermissionSpec>>,
    #[serde(default)]
    pub options: ReconcileOptions,
}

/// A desired state whose permissions passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedState {
    pub target: PathBuf,
    pub purge_mode: PurgeMode,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub inherit_parent_permissions: bool,
    pub permissions: Option<Vec<Ace>>,
    pub corrections: Vec<Correction>,
    pub options: ReconcileOptions,
}

impl DesiredState {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        DesiredState {
            target: target.into(),
            purge_mode: PurgeMode::default(),
            owner: None,
            group: None,
            inherit_parent_permissions: true,
            permissions: None,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<PermissionSpec>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_purge(mut self, purge_mode: PurgeMode) -> Self {
        self.purge_mode = purge_mode;
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_inheritance(mut self, inherit_parent_permissions: bool) -> Self {
        self.inherit_parent_permissions = inherit_parent_permissions;
        self
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses a desired state from JSON.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Parses a list of desired states from a JSON array.
    pub fn batch_from_json(json: &str) -> Result<Vec<Self>, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Checks the whole record and builds the desired entries.
    pub fn validate(&self) -> Result<ValidatedState, ValidationError> {
        if self.target.as_os_str().is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if self.owner.as_deref().is_some_and(|o| o.trim().is_empty()) {
            return Err(ValidationError::EmptyIdentity);
        }
        if self.group.as_deref().is_some_and(|g| g.trim().is_empty()) {
            return Err(ValidationError::EmptyIdentity);
        }

        let mut corrections = Vec::new();
        let permissions = match &self.permissions {
            None => None,
            Some(specs) => {
                if specs.is_empty() && self.purge_mode == PurgeMode::All {
                    return Err(ValidationError::EmptyPermissionsWithPurgeAll);
                }
                let mut aces = Vec::with_capacity(specs.len());
                for spec in specs {
                    let (ace, fixed) = spec.to_ace()?;
                    corrections.extend(fixed);
                    aces.push(ace);
                }
                Some(aces)
            }
        };

        Ok(ValidatedState {
            target: self.target.clone(),
            purge_mode: self.purge_mode,
            owner: self.owner.clone(),
            group: self.group.clone(),
            inherit_parent_permissions: self.inherit_parent_permissions,
            permissions,
            corrections,
            options: self.options.clone(),
        })
    }
}
