#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! ntacl-core manages NTFS-style access control lists declaratively.
//!
//! A caller describes the desired owner, group, inheritance and explicit
//! permission entries of a file or directory. The crate decodes the entries
//! currently on the object into the same symbolic vocabulary, decides whether
//! the two are in sync, and writes back only the aspects that differ.
//!
//! Platform access is behind two collaborator traits,
//! [`descriptor::DescriptorStore`] and [`descriptor::IdentityLookup`], so the
//! reconciliation logic runs anywhere. In-memory implementations are provided.

// Module for shared value types (Sid, PermType, ChildTypes, Affects, PurgeMode).
pub mod types;

// Module for crate error types.
pub mod error;

// Module for the rights vocabulary and its normalisation.
pub mod rights;

// Module for the native mask and inheritance flag codec.
pub mod codec;

// Module for the permission entry model.
pub mod ace;

// Module for DACL comparison and merging.
pub mod sync;

// Module for the desired-state contract handed over by callers.
pub mod desired;

// Module for descriptor access and reconciliation.
pub mod descriptor;

pub use ace::{Ace, AceBuilder, Correction};
pub use descriptor::{Adapter, DescriptorStore, IdentityLookup, Outcome, Plan, ReconcileContext};
pub use desired::{DesiredState, PermissionSpec, ReconcileOptions};
pub use error::{AclError, LookupError, Result, StoreError, ValidationError};
pub use rights::Right;
pub use types::{AccessMask, Affects, ChildTypes, PermType, PurgeMode, Sid};

/// Installs a formatting subscriber honouring `RUST_LOG`.
///
/// Meant for binaries and test harnesses embedding the crate; calling it
/// more than once is harmless.
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
