//! In-memory collaborators.
//!
//! [`MemoryStore`] keeps descriptors per path and models inheritance the way
//! the native store does: entries inherited from the parent are attached on
//! read while the object is unprotected and stripped once it is protected.
//! [`StaticLookup`] resolves a fixed account table.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::store::{DescriptorStore, IdentityLookup, RawAce, SecurityDescriptor, TargetKind};
use crate::error::{LookupError, StoreError};
use crate::types::Sid;

#[derive(Debug, Clone)]
struct StoredObject {
    kind: TargetKind,
    owner: Option<Sid>,
    group: Option<Sid>,
    explicit: Vec<RawAce>,
    parent_inherited: Vec<RawAce>,
    protected: bool,
}

/// A write accepted by the store, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub path: PathBuf,
    pub descriptor: SecurityDescriptor,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: HashMap<PathBuf, StoredObject>,
    writes: Vec<WriteRecord>,
    read_failures: HashMap<PathBuf, StoreError>,
    write_failures: HashMap<PathBuf, StoreError>,
    reads: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object. Entries of `descriptor.dacl` flagged inherited become
    /// the entries the parent passes down.
    pub fn insert(&mut self, path: impl Into<PathBuf>, kind: TargetKind, descriptor: SecurityDescriptor) {
        let (parent_inherited, explicit): (Vec<RawAce>, Vec<RawAce>) =
            descriptor.dacl.into_iter().partition(RawAce::is_inherited);
        self.objects.insert(
            path.into(),
            StoredObject {
                kind,
                owner: descriptor.owner,
                group: descriptor.group,
                explicit,
                parent_inherited,
                protected: descriptor.protected,
            },
        );
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, descriptor: SecurityDescriptor) -> Self {
        self.insert(path, TargetKind::File, descriptor);
        self
    }

    pub fn with_directory(mut self, path: impl Into<PathBuf>, descriptor: SecurityDescriptor) -> Self {
        self.insert(path, TargetKind::Directory, descriptor);
        self
    }

    pub fn with_symlink(mut self, path: impl Into<PathBuf>) -> Self {
        self.insert(path, TargetKind::Symlink, SecurityDescriptor::default());
        self
    }

    /// Writes accepted so far.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Number of `get` calls served.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn compose(object: &StoredObject) -> SecurityDescriptor {
        let mut dacl = object.explicit.clone();
        if !object.protected {
            dacl.extend(object.parent_inherited.iter().cloned());
        }
        SecurityDescriptor {
            owner: object.owner.clone(),
            group: object.group.clone(),
            dacl,
            protected: object.protected,
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryStore {
    /// Makes every subsequent `get` for `path` fail with `error`.
    pub fn fail_reads(mut self, path: impl Into<PathBuf>, error: StoreError) -> Self {
        self.read_failures.insert(path.into(), error);
        self
    }

    /// Makes every subsequent `set` for `path` fail with `error`.
    pub fn fail_writes(mut self, path: impl Into<PathBuf>, error: StoreError) -> Self {
        self.write_failures.insert(path.into(), error);
        self
    }
}

impl DescriptorStore for MemoryStore {
    fn get(&self, path: &Path) -> Result<SecurityDescriptor, StoreError> {
        if let Some(error) = self.read_failures.get(path) {
            return Err(error.clone());
        }
        let object = self.objects.get(path).ok_or(StoreError::NotFound)?;
        if object.kind == TargetKind::Symlink {
            return Err(StoreError::Unsupported("symbolic links".to_string()));
        }
        self.reads.set(self.reads.get() + 1);
        Ok(Self::compose(object))
    }

    fn set(&mut self, path: &Path, descriptor: &SecurityDescriptor) -> Result<(), StoreError> {
        if let Some(error) = self.write_failures.get(path) {
            return Err(error.clone());
        }
        let object = self.objects.get_mut(path).ok_or(StoreError::NotFound)?;
        if object.kind == TargetKind::Symlink {
            return Err(StoreError::Unsupported("symbolic links".to_string()));
        }
        object.owner = descriptor.owner.clone();
        object.group = descriptor.group.clone();
        object.explicit = descriptor.explicit_entries().cloned().collect();
        object.protected = descriptor.protected;
        self.writes.push(WriteRecord { path: path.to_path_buf(), descriptor: descriptor.clone() });
        Ok(())
    }

    fn target_kind(&self, path: &Path) -> Result<TargetKind, StoreError> {
        self.objects.get(path).map(|object| object.kind).ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Clone)]
struct Account {
    name: String,
    sid: Sid,
}

/// Fixed account table, pre-seeded with well-known principals.
///
/// Names match case-insensitively, and `DOMAIN\name` accounts also answer
/// to their bare `name`.
#[derive(Debug, Clone)]
pub struct StaticLookup {
    by_name: HashMap<String, usize>,
    by_sid: HashMap<Sid, usize>,
    accounts: Vec<Account>,
}

const WELL_KNOWN: &[(&str, &str)] = &[
    ("Everyone", "S-1-1-0"),
    ("CREATOR OWNER", "S-1-3-0"),
    ("CREATOR GROUP", "S-1-3-1"),
    ("NT AUTHORITY\\Authenticated Users", "S-1-5-11"),
    ("NT AUTHORITY\\SYSTEM", "S-1-5-18"),
    ("BUILTIN\\Administrators", "S-1-5-32-544"),
    ("BUILTIN\\Users", "S-1-5-32-545"),
];

impl Default for StaticLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticLookup {
    pub fn new() -> Self {
        let mut lookup = StaticLookup::empty();
        for (name, sid) in WELL_KNOWN {
            if let Ok(sid) = Sid::parse(sid) {
                lookup.add_account(name, sid);
            }
        }
        lookup
    }

    /// A table with no accounts at all.
    pub fn empty() -> Self {
        StaticLookup { by_name: HashMap::new(), by_sid: HashMap::new(), accounts: Vec::new() }
    }

    pub fn with_account(mut self, name: &str, sid: Sid) -> Self {
        self.add_account(name, sid);
        self
    }

    pub fn add_account(&mut self, name: &str, sid: Sid) {
        let index = self.accounts.len();
        self.accounts.push(Account { name: name.to_string(), sid: sid.clone() });
        self.by_name.insert(name.to_lowercase(), index);
        if let Some((_, short)) = name.rsplit_once('\\') {
            self.by_name.entry(short.to_lowercase()).or_insert(index);
        }
        self.by_sid.entry(sid).or_insert(index);
    }
}

impl IdentityLookup for StaticLookup {
    fn name_to_sid(&self, name: &str) -> Result<Sid, LookupError> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|index| self.accounts[*index].sid.clone())
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    fn sid_to_name(&self, sid: &Sid) -> Result<String, LookupError> {
        self.by_sid
            .get(sid)
            .map(|index| self.accounts[*index].name.clone())
            .ok_or_else(|| LookupError::NotFound(sid.to_string()))
    }
}
