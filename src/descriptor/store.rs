//! Collaborator contracts: the security-descriptor store and the identity lookup.

use std::path::Path;

use crate::codec::AceFlags;
use crate::error::{LookupError, StoreError};
use crate::types::{AccessMask, PermType, Sid};

/// One native DACL record as the store hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RawAce {
    pub sid: Sid,
    pub ace_type: PermType,
    pub flags: AceFlags,
    pub mask: AccessMask,
}

impl RawAce {
    pub fn is_inherited(&self) -> bool {
        self.flags.is_inherited()
    }
}

/// Security descriptor of one filesystem object.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SecurityDescriptor {
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    /// Explicit entries first, then inherited entries in their original order.
    pub dacl: Vec<RawAce>,
    /// Inheritance from the parent is blocked.
    pub protected: bool,
}

impl SecurityDescriptor {
    pub fn explicit_entries(&self) -> impl Iterator<Item = &RawAce> {
        self.dacl.iter().filter(|ace| !ace.is_inherited())
    }

    pub fn inherits_parent_permissions(&self) -> bool {
        !self.protected
    }
}

/// Kind of object a target path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::File => "file",
            TargetKind::Directory => "directory",
            TargetKind::Symlink => "symbolic link",
            TargetKind::Other => "other",
        }
    }

    /// Classifies a path on the local filesystem without following links.
    pub fn probe(path: &Path) -> Result<TargetKind, StoreError> {
        let metadata = std::fs::symlink_metadata(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound,
            std::io::ErrorKind::PermissionDenied => StoreError::AccessDenied,
            _ => StoreError::Other(err.to_string()),
        })?;
        let file_type = metadata.file_type();
        Ok(if file_type.is_symlink() {
            TargetKind::Symlink
        } else if file_type.is_dir() {
            TargetKind::Directory
        } else if file_type.is_file() {
            TargetKind::File
        } else {
            TargetKind::Other
        })
    }
}

/// Raw read/write access to security descriptors.
pub trait DescriptorStore {
    fn get(&self, path: &Path) -> Result<SecurityDescriptor, StoreError>;

    /// Writes the descriptor. Only explicit entries of `descriptor.dacl` are
    /// authoritative; inherited entries follow `descriptor.protected`.
    fn set(&mut self, path: &Path, descriptor: &SecurityDescriptor) -> Result<(), StoreError>;

    fn target_kind(&self, path: &Path) -> Result<TargetKind, StoreError> {
        TargetKind::probe(path)
    }
}

/// Account name / SID resolution.
pub trait IdentityLookup {
    fn name_to_sid(&self, name: &str) -> Result<Sid, LookupError>;

    fn sid_to_name(&self, sid: &Sid) -> Result<String, LookupError>;
}

/// Resolves an identity that may already be a SID string.
pub fn resolve_sid(lookup: &dyn IdentityLookup, identity: &str) -> Result<Sid, LookupError> {
    match Sid::parse(identity) {
        Ok(sid) => Ok(sid),
        Err(_) => lookup.name_to_sid(identity.trim()),
    }
}

impl<S: DescriptorStore + ?Sized> DescriptorStore for &mut S {
    fn get(&self, path: &Path) -> Result<SecurityDescriptor, StoreError> {
        (**self).get(path)
    }

    fn set(&mut self, path: &Path, descriptor: &SecurityDescriptor) -> Result<(), StoreError> {
        (**self).set(path, descriptor)
    }

    fn target_kind(&self, path: &Path) -> Result<TargetKind, StoreError> {
        (**self).target_kind(path)
    }
}

impl<L: IdentityLookup + ?Sized> IdentityLookup for &L {
    fn name_to_sid(&self, name: &str) -> Result<Sid, LookupError> {
        (**self).name_to_sid(name)
    }

    fn sid_to_name(&self, sid: &Sid) -> Result<String, LookupError> {
        (**self).sid_to_name(sid)
    }
}
