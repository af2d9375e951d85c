//!
//! Security descriptor adapter and its collaborators.
//!
//! The store and the identity lookup are traits; the crate ships in-memory
//! implementations of both so reconciliation can run without an operating
//! system behind it.

pub mod adapter;
pub mod memory;
pub mod store;

pub use adapter::{sid_in_sync, Adapter, Outcome, Plan, ReconcileContext};
pub use memory::{MemoryStore, StaticLookup, WriteRecord};
pub use store::{resolve_sid, DescriptorStore, IdentityLookup, RawAce, SecurityDescriptor, TargetKind};

#[cfg(test)]
mod tests;
