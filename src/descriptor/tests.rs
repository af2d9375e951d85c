#![cfg(test)]

use std::path::Path;

use crate::codec::consts::*;
use crate::codec::AceFlags;
use crate::descriptor::adapter::{sid_in_sync, Adapter, ReconcileContext};
use crate::descriptor::memory::{MemoryStore, StaticLookup};
use crate::descriptor::store::{DescriptorStore, RawAce, SecurityDescriptor};
use crate::desired::{DesiredState, PermissionSpec, ReconcileOptions};
use crate::error::{AclError, LookupError, StoreError, ValidationError};
use crate::rights::Right;
use crate::types::{PermType, PurgeMode, Sid};

// --- Test Utilities ---

const TARGET: &str = "C:\\data";
const BOB: &str = "S-1-5-21-100-200-300-1001";
const ALICE: &str = "S-1-5-21-100-200-300-1002";
const EVE: &str = "S-1-5-21-100-200-300-1003";
const ADMINISTRATORS: &str = "S-1-5-32-544";
const USERS: &str = "S-1-5-32-545";
const SYSTEM: &str = "S-1-5-18";

fn sid(s: &str) -> Sid {
    Sid::parse(s).unwrap()
}

fn lookup() -> StaticLookup {
    StaticLookup::new()
        .with_account("DOMAIN\\bob", sid(BOB))
        .with_account("DOMAIN\\alice", sid(ALICE))
        .with_account("DOMAIN\\eve", sid(EVE))
}

fn raw(s: &str, ace_type: PermType, flags: AceFlags, mask: u32) -> RawAce {
    RawAce { sid: sid(s), ace_type, flags, mask }
}

fn inherited_users() -> RawAce {
    raw(USERS, PermType::Allow, AceFlags::PROPAGATES | AceFlags::INHERITED, FILE_GENERIC_READ | FILE_GENERIC_EXECUTE)
}

fn descriptor(dacl: Vec<RawAce>) -> SecurityDescriptor {
    SecurityDescriptor { owner: Some(sid(ADMINISTRATORS)), group: Some(sid(SYSTEM)), dacl, protected: false }
}

fn adapter_with(dacl: Vec<RawAce>) -> Adapter<MemoryStore, StaticLookup> {
    Adapter::new(MemoryStore::new().with_directory(TARGET, descriptor(dacl)), lookup())
}

fn bob_full() -> PermissionSpec {
    PermissionSpec::new("bob", ["full"])
}

// --- Cache lifecycle ---

#[test]
fn test_read_is_cached_until_write() {
    let mut adapter = adapter_with(vec![]);
    let mut ctx = ReconcileContext::new(TARGET);

    adapter.read(&mut ctx).unwrap();
    adapter.read(&mut ctx).unwrap();
    assert_eq!(adapter.store().reads(), 1);
    assert!(ctx.is_cached());

    adapter.set_owner(&mut ctx, &sid(BOB)).unwrap();
    assert!(!ctx.is_cached());
    assert_eq!(adapter.owner(&mut ctx).unwrap(), Some(sid(BOB)));
    assert_eq!(adapter.store().reads(), 2);
}

#[test]
fn test_read_error_wraps_path() {
    let adapter = Adapter::new(MemoryStore::new(), lookup());
    let mut ctx = ReconcileContext::new("C:\\missing");
    assert_eq!(
        adapter.read(&mut ctx).unwrap_err(),
        AclError::DescriptorRead { path: "C:\\missing".into(), source: StoreError::NotFound }
    );
}

#[test]
fn test_write_error_invalidates_cache() {
    let store = MemoryStore::new()
        .with_file(TARGET, descriptor(vec![]))
        .fail_writes(TARGET, StoreError::AccessDenied);
    let mut adapter = Adapter::new(store, lookup());
    let mut ctx = ReconcileContext::new(TARGET);
    let err = adapter.set_group(&mut ctx, &sid(BOB)).unwrap_err();
    assert_eq!(err, AclError::DescriptorWrite { path: TARGET.into(), source: StoreError::AccessDenied });
    assert!(!ctx.is_cached());
    assert_eq!(adapter.group(&mut ctx).unwrap(), Some(sid(SYSTEM)));
}

// --- Owner / group / inheritance ---

#[test]
fn test_sid_in_sync() {
    assert!(sid_in_sync(None, None));
    assert!(sid_in_sync(Some(&sid(BOB)), Some(&sid(BOB))));
    assert!(!sid_in_sync(Some(&sid(BOB)), None));
    assert!(!sid_in_sync(None, Some(&sid(BOB))));
}

#[test]
fn test_owner_compared_by_sid() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET).with_owner("Administrators");
    let outcome = adapter.reconcile(&state).unwrap();
    assert!(outcome.in_sync);
    assert!(adapter.store().writes().is_empty());

    let state = DesiredState::new(TARGET).with_owner(BOB).with_group("DOMAIN\\alice");
    let outcome = adapter.reconcile(&state).unwrap();
    assert!(!outcome.in_sync);
    assert_eq!(outcome.plan.owner, Some(sid(BOB)));
    assert_eq!(outcome.plan.group, Some(sid(ALICE)));
    let mut ctx = ReconcileContext::new(TARGET);
    assert_eq!(adapter.owner(&mut ctx).unwrap(), Some(sid(BOB)));
    assert_eq!(adapter.group(&mut ctx).unwrap(), Some(sid(ALICE)));
}

#[test]
fn test_unresolvable_owner() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET).with_owner("ghost");
    assert_eq!(
        adapter.reconcile(&state).unwrap_err(),
        AclError::IdentityResolution {
            identity: "ghost".to_string(),
            reason: LookupError::NotFound("ghost".to_string()),
        }
    );
}

#[test]
fn test_disabling_inheritance_strips_inherited_entries() {
    let mut adapter = adapter_with(vec![inherited_users()]);
    let state = DesiredState::new(TARGET).with_inheritance(false);
    let outcome = adapter.reconcile(&state).unwrap();
    assert_eq!(outcome.plan.protected, Some(true));

    let mut ctx = ReconcileContext::new(TARGET);
    assert!(!adapter.inherits_parent_permissions(&mut ctx).unwrap());
    assert!(adapter.current_permissions(&mut ctx, true).unwrap().is_empty());
}

// --- Permissions ---

#[test]
fn test_current_permissions_decodes_names() {
    let adapter = adapter_with(vec![
        raw(BOB, PermType::Deny, AceFlags::empty(), FILE_GENERIC_WRITE),
        inherited_users(),
    ]);
    let mut ctx = ReconcileContext::new(TARGET);
    let aces = adapter.current_permissions(&mut ctx, true).unwrap();
    assert_eq!(aces.len(), 2);
    assert_eq!(aces[0].identity(), "DOMAIN\\bob");
    assert_eq!(aces[0].rights(), &[Right::Write]);
    assert!(aces[0].is_deny());
    assert_eq!(aces[1].identity(), "BUILTIN\\Users");
    assert!(aces[1].is_inherited());

    let bare = adapter.current_permissions(&mut ctx, false).unwrap();
    assert_eq!(bare[0].identity(), BOB);
}

#[test]
fn test_reconcile_adds_missing_entry() {
    let mut adapter = adapter_with(vec![inherited_users()]);
    let state = DesiredState::new(TARGET).with_permissions(vec![bob_full()]);
    let outcome = adapter.reconcile(&state).unwrap();
    assert!(!outcome.in_sync);
    assert!(outcome.applied);

    let proposed = outcome.proposed.unwrap();
    assert_eq!(
        proposed.dacl,
        vec![raw(BOB, PermType::Allow, AceFlags::PROPAGATES, FILE_ALL_ACCESS), inherited_users()]
    );

    let again = adapter.reconcile(&state).unwrap();
    assert!(again.in_sync);
    assert_eq!(adapter.store().writes().len(), 1);
}

#[test]
fn test_reconcile_matches_by_sid_across_spellings() {
    let mut adapter = adapter_with(vec![raw(BOB, PermType::Allow, AceFlags::PROPAGATES, FILE_ALL_ACCESS)]);
    for identity in ["bob", "DOMAIN\\bob", BOB] {
        let state = DesiredState::new(TARGET).with_permissions(vec![PermissionSpec::new(identity, ["full"])]);
        assert!(adapter.reconcile(&state).unwrap().in_sync, "{identity}");
    }
}

#[test]
fn test_reconcile_keeps_unmanaged_entries_in_deny_allow_order() {
    let mut adapter = adapter_with(vec![
        raw(EVE, PermType::Deny, AceFlags::PROPAGATES, FILE_GENERIC_WRITE),
        raw(ALICE, PermType::Allow, AceFlags::PROPAGATES, FILE_GENERIC_READ),
        inherited_users(),
    ]);
    let state = DesiredState::new(TARGET).with_permissions(vec![PermissionSpec::new("bob", ["read"])]);
    adapter.reconcile(&state).unwrap();

    let written = &adapter.store().writes()[0].descriptor;
    let sids: Vec<&str> = written.explicit_entries().map(|raw| raw.sid.as_str()).collect();
    assert_eq!(sids, vec![EVE, BOB, ALICE]);
}

#[test]
fn test_reconcile_writes_unmanaged_entries_back_unchanged() {
    const CAROL: &str = "S-1-5-21-100-200-300-1004";
    let alice = raw(ALICE, PermType::Allow, AceFlags::INHERIT_ONLY, FILE_GENERIC_READ);
    let carol = raw(CAROL, PermType::Allow, AceFlags::PROPAGATES, FILE_ALL_ACCESS | 0x0100_0000);
    let eve = raw(EVE, PermType::Deny, AceFlags::OBJECT_INHERIT | AceFlags::NO_PROPAGATE_INHERIT, FILE_READ_DATA | DELETE);
    let mut adapter = adapter_with(vec![alice.clone(), carol.clone(), eve.clone(), inherited_users()]);

    let state = DesiredState::new(TARGET).with_permissions(vec![PermissionSpec::new("bob", ["read"])]);
    adapter.reconcile(&state).unwrap();

    let written: Vec<&RawAce> = adapter.store().writes()[0].descriptor.explicit_entries().collect();
    assert_eq!(
        written,
        vec![&eve, &raw(BOB, PermType::Allow, AceFlags::PROPAGATES, FILE_GENERIC_READ), &alice, &carol]
    );
    assert!(adapter.reconcile(&state).unwrap().in_sync);
}

#[test]
fn test_reconcile_purge_all_drops_unmanaged() {
    let mut adapter = adapter_with(vec![
        raw(EVE, PermType::Deny, AceFlags::PROPAGATES, FILE_GENERIC_WRITE),
        inherited_users(),
    ]);
    let state = DesiredState::new(TARGET).with_purge(PurgeMode::All).with_permissions(vec![bob_full()]);
    adapter.reconcile(&state).unwrap();

    let mut ctx = ReconcileContext::new(TARGET);
    let current = adapter.current_permissions(&mut ctx, false).unwrap();
    let explicit: Vec<_> = current.iter().filter(|ace| !ace.is_inherited()).collect();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].identity(), BOB);
    assert!(current.iter().any(|ace| ace.is_inherited()));
}

#[test]
fn test_reconcile_rights_change_updates_in_place() {
    let mut adapter = adapter_with(vec![raw(BOB, PermType::Allow, AceFlags::PROPAGATES, FILE_GENERIC_READ)]);
    let state = DesiredState::new(TARGET).with_permissions(vec![PermissionSpec::new("bob", ["modify"])]);
    let outcome = adapter.reconcile(&state).unwrap();
    let permissions = outcome.plan.permissions.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].rights(), &[Right::Modify]);
}

#[test]
fn test_mask_specific_round_trips_through_store() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET)
        .with_permissions(vec![PermissionSpec::new("bob", ["mask_specific"]).mask("0x120001")]);
    adapter.reconcile(&state).unwrap();
    assert!(adapter.reconcile(&state).unwrap().in_sync);

    let mut ctx = ReconcileContext::new(TARGET);
    let aces = adapter.current_permissions(&mut ctx, true).unwrap();
    assert_eq!(aces[0].mask(), Some(0x0012_0001));
}

#[test]
fn test_noop_plans_without_writing() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET)
        .with_permissions(vec![bob_full()])
        .with_options(ReconcileOptions { noop: true, ..Default::default() });
    let outcome = adapter.reconcile(&state).unwrap();
    assert!(!outcome.in_sync);
    assert!(!outcome.applied);
    assert!(outcome.proposed.is_some());
    assert!(adapter.store().writes().is_empty());
}

#[test]
fn test_unresolvable_permission_identity_stops_before_read() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET).with_permissions(vec![PermissionSpec::new("ghost", ["read"])]);
    assert!(matches!(adapter.reconcile(&state), Err(AclError::IdentityResolution { .. })));
    assert_eq!(adapter.store().reads(), 0);
}

// --- Flush ordering ---

#[test]
fn test_flush_order_owner_dacl_inheritance() {
    let mut adapter = adapter_with(vec![inherited_users()]);
    let state = DesiredState::new(TARGET)
        .with_owner("bob")
        .with_group("alice")
        .with_inheritance(false)
        .with_permissions(vec![bob_full()]);
    adapter.reconcile(&state).unwrap();

    let writes = adapter.store().writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[0].descriptor.owner, Some(sid(BOB)));
    assert_eq!(writes[0].descriptor.group, Some(sid(SYSTEM)));
    assert_eq!(writes[1].descriptor.group, Some(sid(ALICE)));
    assert_eq!(writes[2].descriptor.explicit_entries().count(), 1);
    assert!(!writes[2].descriptor.protected);
    assert!(writes[3].descriptor.protected);

    let mut ctx = ReconcileContext::new(TARGET);
    let current = adapter.current_permissions(&mut ctx, false).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].identity(), BOB);
}

// --- Target validation and batches ---

#[test]
fn test_symlink_rejected_before_descriptor_access() {
    let mut adapter = Adapter::new(MemoryStore::new().with_symlink("C:\\link"), lookup());
    let state = DesiredState::new("C:\\link").with_permissions(vec![bob_full()]);
    assert_eq!(
        adapter.reconcile(&state).unwrap_err(),
        AclError::UnsupportedTarget { path: "C:\\link".into(), kind: "symbolic link".to_string() }
    );
    assert_eq!(adapter.store().reads(), 0);
}

#[test]
fn test_validation_error_before_store_access() {
    let mut adapter = adapter_with(vec![]);
    let state = DesiredState::new(TARGET).with_purge(PurgeMode::All).with_permissions(vec![]);
    assert_eq!(
        adapter.reconcile(&state).unwrap_err(),
        AclError::Validation(ValidationError::EmptyPermissionsWithPurgeAll)
    );
    assert_eq!(adapter.store().reads(), 0);
}

#[test]
fn test_batch_isolates_failures() {
    let store = MemoryStore::new()
        .with_file("C:\\a", descriptor(vec![]))
        .with_file("C:\\b", descriptor(vec![]))
        .fail_reads("C:\\b", StoreError::AccessDenied)
        .with_file("C:\\c", descriptor(vec![]));
    let mut adapter = Adapter::new(store, lookup());
    let states = vec![
        DesiredState::new("C:\\a").with_permissions(vec![bob_full()]),
        DesiredState::new("C:\\b").with_permissions(vec![bob_full()]),
        DesiredState::new("C:\\c").with_permissions(vec![bob_full()]),
    ];
    let results = adapter.reconcile_batch(&states);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1].as_ref().unwrap_err().target(),
        Some(Path::new("C:\\b"))
    );
    assert!(results[2].is_ok());
    assert_eq!(adapter.store().writes().len(), 2);
}

#[test]
fn test_adapter_over_borrowed_store() {
    let mut store = MemoryStore::new().with_file(TARGET, descriptor(vec![]));
    {
        let mut adapter = Adapter::new(&mut store, lookup());
        let state = DesiredState::new(TARGET).with_permissions(vec![bob_full()]);
        adapter.reconcile(&state).unwrap();
    }
    assert_eq!(store.get(Path::new(TARGET)).unwrap().dacl.len(), 1);
}
