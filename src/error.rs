//!
//! Defines error types for ACL reconciliation.

use std::path::PathBuf;

/// Malformed desired-state input. Raised before any store I/O is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A permission entry has an empty identity.
    #[error("identity must not be empty")]
    EmptyIdentity,
    /// A permission entry lists no rights.
    #[error("rights must contain at least one value")]
    EmptyRights,
    /// A rights symbol outside the known vocabulary.
    #[error("unknown right '{0}', expected one of full, modify, write, read, execute, mask_specific")]
    UnknownRight(String),
    #[error("invalid perm_type '{0}', expected allow or deny")]
    InvalidPermType(String),
    #[error("invalid child_types '{0}', expected all, objects, containers or none")]
    InvalidChildTypes(String),
    #[error("invalid affects '{0}', expected all, self_only, children_only, self_and_direct_children_only or direct_children_only")]
    InvalidAffects(String),
    #[error("invalid purge mode '{0}', expected none, all or listed_only")]
    InvalidPurge(String),
    /// The mask is not a decimal or `0x` hexadecimal 32-bit integer.
    #[error("invalid mask '{0}'")]
    InvalidMask(String),
    #[error("rights for '{identity}' are [mask_specific] but no mask was given")]
    MaskRequired { identity: String },
    #[error("a mask was given for '{identity}' but rights are not [mask_specific]")]
    MaskWithoutMaskSpecific { identity: String },
    /// Desired entries are always explicit.
    #[error("permission for '{identity}' is marked inherited; inherited entries cannot be managed")]
    InheritedNotAllowed { identity: String },
    #[error("purge_mode all requires at least one permission")]
    EmptyPermissionsWithPurgeAll,
    #[error("target must not be empty")]
    EmptyTarget,
    #[error("'{0}' is not a valid SID")]
    InvalidSid(String),
    /// The desired-state document could not be parsed.
    #[error("malformed desired state: {0}")]
    Malformed(String),
}

/// Failure reported by a security-descriptor store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("path not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

/// Failure reported by an identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("account '{0}' not found")]
    NotFound(String),
    #[error("lookup failed: {0}")]
    Other(String),
}

/// Represents errors that can occur while reconciling one target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AclError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// An identity referenced by permissions, owner or group could not be resolved.
    #[error("could not resolve identity '{identity}': {reason}")]
    IdentityResolution { identity: String, reason: LookupError },
    #[error("failed to read security descriptor for '{}': {source}", path.display())]
    DescriptorRead { path: PathBuf, source: StoreError },
    #[error("failed to write security descriptor for '{}': {source}", path.display())]
    DescriptorWrite { path: PathBuf, source: StoreError },
    /// The target is of a kind that is not modelled (e.g. a symbolic link).
    #[error("unsupported target '{}': {kind}", path.display())]
    UnsupportedTarget { path: PathBuf, kind: String },
}

impl AclError {
    /// Path of the target the error belongs to, when known.
    pub fn target(&self) -> Option<&std::path::Path> {
        match self {
            AclError::DescriptorRead { path, .. }
            | AclError::DescriptorWrite { path, .. }
            | AclError::UnsupportedTarget { path, .. } => Some(path),
            AclError::Validation(_) | AclError::IdentityResolution { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AclError>;
