//! Security descriptor adapter.
//!
//! Reads the current descriptor of a target, works out what has to change to
//! reach a [`DesiredState`], and writes the changes back. The descriptor is
//! cached in a [`ReconcileContext`] owned by the caller for the duration of
//! one pass; every write clears it so the next read goes back to the store.

use std::path::{Path, PathBuf};

use super::store::{resolve_sid, DescriptorStore, IdentityLookup, RawAce, SecurityDescriptor, TargetKind};
use crate::ace::{Ace, Correction};
use crate::desired::{DesiredState, ValidatedState};
use crate::error::{AclError, Result};
use crate::sync;
use crate::types::Sid;

/// Per-target cache for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    target: PathBuf,
    cached: Option<SecurityDescriptor>,
}

impl ReconcileContext {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        ReconcileContext { target: target.into(), cached: None }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Forces the next read to go back to the store.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

/// Changes needed to bring one target in sync. `None` fields are already in sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Plan {
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    /// Explicit entries to write, in order.
    pub permissions: Option<Vec<Ace>>,
    /// New value of the protected flag (`!inherit_parent_permissions`).
    pub protected: Option<bool>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.group.is_none() && self.permissions.is_none() && self.protected.is_none()
    }
}

/// Result of reconciling one target.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Outcome {
    pub target: PathBuf,
    /// The target already matched the desired state before this pass.
    pub in_sync: bool,
    pub plan: Plan,
    /// Descriptor the plan writes back, when the target was out of sync.
    pub proposed: Option<SecurityDescriptor>,
    /// Whether the plan was written to the store.
    pub applied: bool,
    pub corrections: Vec<Correction>,
}

/// Empty on both sides is in sync; one side missing is not.
pub fn sid_in_sync(current: Option<&Sid>, desired: Option<&Sid>) -> bool {
    match (current, desired) {
        (None, None) => true,
        (Some(current), Some(desired)) => current == desired,
        _ => false,
    }
}

#[derive(Debug)]
pub struct Adapter<S, L> {
    store: S,
    lookup: L,
}

impl<S, L> Adapter<S, L>
where
    S: DescriptorStore,
    L: IdentityLookup,
{
    pub fn new(store: S, lookup: L) -> Self {
        Adapter { store, lookup }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn into_parts(self) -> (S, L) {
        (self.store, self.lookup)
    }

    /// Rejects targets that are not plain files or directories.
    pub fn check_target(&self, path: &Path) -> Result<TargetKind> {
        let kind = self
            .store
            .target_kind(path)
            .map_err(|source| AclError::DescriptorRead { path: path.to_path_buf(), source })?;
        match kind {
            TargetKind::File | TargetKind::Directory => Ok(kind),
            TargetKind::Symlink | TargetKind::Other => Err(AclError::UnsupportedTarget {
                path: path.to_path_buf(),
                kind: kind.as_str().to_string(),
            }),
        }
    }

    /// Returns the cached descriptor, fetching it from the store on first use.
    pub fn read<'c>(&self, ctx: &'c mut ReconcileContext) -> Result<&'c SecurityDescriptor> {
        let descriptor = match ctx.cached.take() {
            Some(descriptor) => descriptor,
            None => {
                tracing::debug!("reading security descriptor for {}", ctx.target.display());
                self.store
                    .get(&ctx.target)
                    .map_err(|source| AclError::DescriptorRead { path: ctx.target.clone(), source })?
            }
        };
        Ok(ctx.cached.insert(descriptor))
    }

    /// Writes the descriptor and invalidates the cache, whether or not the write succeeded.
    pub fn write(&mut self, ctx: &mut ReconcileContext, descriptor: &SecurityDescriptor) -> Result<()> {
        tracing::debug!("writing security descriptor for {}", ctx.target.display());
        ctx.invalidate();
        self.store
            .set(&ctx.target, descriptor)
            .map_err(|source| AclError::DescriptorWrite { path: ctx.target.clone(), source })
    }

    /// Resolves an account name or SID string.
    pub fn resolve(&self, identity: &str) -> Result<Sid> {
        resolve_sid(&self.lookup, identity).map_err(|reason| AclError::IdentityResolution {
            identity: identity.to_string(),
            reason,
        })
    }

    fn name_of(&self, sid: &Sid) -> String {
        self.lookup.sid_to_name(sid).unwrap_or_else(|_| sid.to_string())
    }

    pub fn owner(&self, ctx: &mut ReconcileContext) -> Result<Option<Sid>> {
        Ok(self.read(ctx)?.owner.clone())
    }

    pub fn set_owner(&mut self, ctx: &mut ReconcileContext, owner: &Sid) -> Result<()> {
        let mut descriptor = self.read(ctx)?.clone();
        descriptor.owner = Some(owner.clone());
        self.write(ctx, &descriptor)
    }

    pub fn group(&self, ctx: &mut ReconcileContext) -> Result<Option<Sid>> {
        Ok(self.read(ctx)?.group.clone())
    }

    pub fn set_group(&mut self, ctx: &mut ReconcileContext, group: &Sid) -> Result<()> {
        let mut descriptor = self.read(ctx)?.clone();
        descriptor.group = Some(group.clone());
        self.write(ctx, &descriptor)
    }

    pub fn inherits_parent_permissions(&self, ctx: &mut ReconcileContext) -> Result<bool> {
        Ok(self.read(ctx)?.inherits_parent_permissions())
    }

    pub fn set_inherit_parent_permissions(&mut self, ctx: &mut ReconcileContext, inherit: bool) -> Result<()> {
        let mut descriptor = self.read(ctx)?.clone();
        descriptor.protected = !inherit;
        self.write(ctx, &descriptor)
    }

    /// Decodes the stored DACL, inherited entries included.
    pub fn current_permissions(&self, ctx: &mut ReconcileContext, resolve_names: bool) -> Result<Vec<Ace>> {
        let descriptor = self.read(ctx)?;
        Ok(descriptor
            .dacl
            .iter()
            .map(|raw| {
                let identity = if resolve_names { self.name_of(&raw.sid) } else { raw.sid.to_string() };
                Ace::decode(identity, Some(raw.sid.clone()), raw.ace_type, raw.flags, raw.mask)
            })
            .collect())
    }

    fn encode(&self, ace: &Ace) -> Result<RawAce> {
        let sid = match ace.sid() {
            Some(sid) => sid.clone(),
            None => self.resolve(ace.identity())?,
        };
        Ok(RawAce { sid, ace_type: ace.perm_type(), flags: ace.ace_flags(), mask: ace.access_mask() })
    }

    /// Encodes `explicit` followed by the currently inherited records.
    fn dacl_with(&self, current: &SecurityDescriptor, explicit: &[Ace]) -> Result<Vec<RawAce>> {
        let mut dacl = explicit.iter().map(|ace| self.encode(ace)).collect::<Result<Vec<_>>>()?;
        dacl.extend(current.dacl.iter().filter(|raw| raw.is_inherited()).cloned());
        Ok(dacl)
    }

    /// Replaces the explicit entries of the DACL.
    pub fn set_permissions(&mut self, ctx: &mut ReconcileContext, explicit: &[Ace]) -> Result<()> {
        let mut descriptor = self.read(ctx)?.clone();
        descriptor.dacl = self.dacl_with(&descriptor, explicit)?;
        self.write(ctx, &descriptor)
    }

    /// Resolves the SID of every desired entry.
    fn resolve_permissions(&self, permissions: &mut [Ace]) -> Result<()> {
        for ace in permissions.iter_mut() {
            if ace.sid().is_none() {
                let sid = self.resolve(ace.identity())?;
                ace.set_sid(sid);
            }
        }
        Ok(())
    }

    /// Works out the changes needed for `state`. Desired entries must
    /// already carry resolved SIDs.
    pub fn plan(&self, ctx: &mut ReconcileContext, state: &ValidatedState) -> Result<Plan> {
        let mut plan = Plan::default();

        if let Some(owner) = &state.owner {
            let desired = self.resolve(owner)?;
            if !sid_in_sync(self.owner(ctx)?.as_ref(), Some(&desired)) {
                plan.owner = Some(desired);
            }
        }
        if let Some(group) = &state.group {
            let desired = self.resolve(group)?;
            if !sid_in_sync(self.group(ctx)?.as_ref(), Some(&desired)) {
                plan.group = Some(desired);
            }
        }

        if let Some(desired) = &state.permissions {
            let current = self.current_permissions(ctx, state.options.resolve_names)?;
            if !sync::in_sync(Some(current.as_slice()), Some(desired.as_slice()), state.purge_mode) {
                plan.permissions = Some(sync::merge(&current, desired, state.purge_mode));
            }
        }

        if self.inherits_parent_permissions(ctx)? != state.inherit_parent_permissions {
            plan.protected = Some(!state.inherit_parent_permissions);
        }
        Ok(plan)
    }

    /// The descriptor `plan` would leave on disk, ignoring store-side inheritance effects.
    pub fn proposed_descriptor(&self, ctx: &mut ReconcileContext, plan: &Plan) -> Result<SecurityDescriptor> {
        let mut descriptor = self.read(ctx)?.clone();
        if let Some(owner) = &plan.owner {
            descriptor.owner = Some(owner.clone());
        }
        if let Some(group) = &plan.group {
            descriptor.group = Some(group.clone());
        }
        if let Some(permissions) = &plan.permissions {
            descriptor.dacl = self.dacl_with(&descriptor, permissions)?;
        }
        if let Some(protected) = plan.protected {
            descriptor.protected = protected;
        }
        Ok(descriptor)
    }

    /// Writes a plan: owner, then group, then the DACL, then inheritance.
    /// Inheritance goes last because toggling it changes which entries are present.
    pub fn flush(&mut self, ctx: &mut ReconcileContext, plan: &Plan) -> Result<()> {
        if let Some(owner) = &plan.owner {
            tracing::info!("setting owner of {} to {}", ctx.target.display(), owner);
            self.set_owner(ctx, owner)?;
        }
        if let Some(group) = &plan.group {
            tracing::info!("setting group of {} to {}", ctx.target.display(), group);
            self.set_group(ctx, group)?;
        }
        if let Some(permissions) = &plan.permissions {
            tracing::info!("writing {} explicit entries to {}", permissions.len(), ctx.target.display());
            self.set_permissions(ctx, permissions)?;
        }
        if let Some(protected) = plan.protected {
            tracing::info!("setting inherit_parent_permissions of {} to {}", ctx.target.display(), !protected);
            self.set_inherit_parent_permissions(ctx, !protected)?;
        }
        Ok(())
    }

    /// Validates `desired`, compares it with the target and writes what differs.
    pub fn reconcile(&mut self, desired: &DesiredState) -> Result<Outcome> {
        let mut state = desired.validate()?;
        self.check_target(&state.target)?;
        if let Some(permissions) = state.permissions.as_mut() {
            self.resolve_permissions(permissions)?;
        }

        let mut ctx = ReconcileContext::new(state.target.clone());
        let plan = self.plan(&mut ctx, &state)?;
        if plan.is_empty() {
            tracing::debug!("{} is in sync", ctx.target.display());
            return Ok(Outcome {
                target: state.target,
                in_sync: true,
                plan,
                proposed: None,
                applied: false,
                corrections: state.corrections,
            });
        }

        let proposed = self.proposed_descriptor(&mut ctx, &plan)?;
        let applied = if state.options.noop {
            tracing::info!("{} is out of sync; noop, not writing", ctx.target.display());
            false
        } else {
            self.flush(&mut ctx, &plan)?;
            true
        };

        Ok(Outcome {
            target: state.target,
            in_sync: false,
            plan,
            proposed: Some(proposed),
            applied,
            corrections: state.corrections,
        })
    }

    /// Reconciles each target independently; one failure does not stop the rest.
    pub fn reconcile_batch(&mut self, desired: &[DesiredState]) -> Vec<Result<Outcome>> {
        desired
            .iter()
            .map(|state| {
                let result = self.reconcile(state);
                if let Err(err) = &result {
                    tracing::error!("failed to reconcile {}: {}", state.target.display(), err);
                }
                result
            })
            .collect()
    }
}
