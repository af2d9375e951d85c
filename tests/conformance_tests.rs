#![cfg(test)]

use ntacl_core::codec::consts::*;
use ntacl_core::codec::{flags, mask, AceFlags};
use ntacl_core::descriptor::{MemoryStore, RawAce, SecurityDescriptor, StaticLookup, TargetKind};
use ntacl_core::sync::{in_sync, merge};
use ntacl_core::{
    Ace, AceBuilder, AclError, Adapter, Affects, ChildTypes, Correction, DesiredState, PermType, PermissionSpec,
    PurgeMode, Right, Sid, StoreError,
};

// --- Helpers ---

fn allow(identity: &str, rights: &[Right]) -> Ace {
    Ace::new(identity, rights.iter().copied()).unwrap()
}

fn deny(identity: &str, rights: &[Right]) -> Ace {
    AceBuilder::new(identity, rights.iter().copied())
        .perm_type(PermType::Deny)
        .build()
        .unwrap()
        .0
}

fn sid(s: &str) -> Sid {
    Sid::parse(s).unwrap()
}

fn lookup() -> StaticLookup {
    StaticLookup::new()
        .with_account("CONTOSO\\bob", sid("S-1-5-21-1-2-3-1001"))
        .with_account("CONTOSO\\x", sid("S-1-5-21-1-2-3-1002"))
        .with_account("CONTOSO\\y", sid("S-1-5-21-1-2-3-1003"))
}

// --- Codec ---

#[test]
fn test_every_encodable_rights_set_round_trips() {
    let sets: Vec<Vec<Right>> = vec![
        vec![Right::Full],
        vec![Right::Modify],
        vec![Right::Write],
        vec![Right::Read],
        vec![Right::Execute],
        vec![Right::Write, Right::Read],
        vec![Right::Write, Right::Execute],
        vec![Right::Read, Right::Execute],
        vec![Right::Write, Right::Read, Right::Execute],
    ];
    for rights in sets {
        assert_eq!(mask::decode(mask::encode(&rights, None)).rights, rights, "{rights:?}");
    }
}

#[test]
fn test_non_canonical_mask_is_preserved() {
    for raw in [0x0000_0001, FILE_GENERIC_READ | 0x2, 0x0012_0000, FILE_GENERIC_WRITE | 0x0004_0000] {
        let decoded = mask::decode(raw);
        assert_eq!(decoded.rights, vec![Right::MaskSpecific], "{raw:#x}");
        assert_eq!(mask::encode(&decoded.rights, decoded.raw), raw);
    }
}

#[test]
fn test_consistent_flag_pairs_round_trip() {
    let child_types = [ChildTypes::All, ChildTypes::Objects, ChildTypes::Containers, ChildTypes::None];
    let affects = [
        Affects::All,
        Affects::SelfOnly,
        Affects::ChildrenOnly,
        Affects::SelfAndDirectChildrenOnly,
        Affects::DirectChildrenOnly,
    ];
    for c in child_types {
        for a in affects {
            let consistent = (c == ChildTypes::None) == (a == Affects::SelfOnly);
            if consistent {
                assert_eq!(flags::decode(flags::encode(c, a)), (c, a), "{c} / {a}");
            }
        }
    }
}

#[test]
fn test_read_execute_scenario() {
    let (ace, _) = PermissionSpec::new("bob", ["read", "execute"]).to_ace().unwrap();
    assert_eq!(ace.access_mask(), FILE_GENERIC_READ | FILE_GENERIC_EXECUTE);
    let decoded = mask::decode(ace.access_mask());
    assert_eq!(decoded.rights, vec![Right::Read, Right::Execute]);
}

// --- ACE model ---

#[test]
fn test_rights_auto_correction_is_idempotent() {
    let mut collapsed = allow("bob", &[Right::Read]);
    let corrections = collapsed.set_rights(&[Right::Full, Right::Read]).unwrap();
    assert!(matches!(corrections.as_slice(), [Correction::RightsCollapsed { .. }]));

    let mut plain = allow("bob", &[Right::Read]);
    assert!(plain.set_rights(&[Right::Full]).unwrap().is_empty());
    assert_eq!(collapsed, plain);
}

#[test]
fn test_equality_follows_sid_resolution() {
    let lookup = lookup();
    let by_name = allow("bob", &[Right::Full]);
    let by_sid = allow("S-1-5-21-1-2-3-1001", &[Right::Full]);
    assert!(by_name.equals_with(&by_sid, &lookup));
    assert!(by_name.is_same_with(&by_sid, &lookup));
    assert!(!by_name.equals_with(&allow("S-1-5-21-1-2-3-1002", &[Right::Full]), &lookup));
}

// --- Synchronizer ---

#[test]
fn test_purge_all_in_sync_only_on_exact_match() {
    let current = vec![allow("bob", &[Right::Full])];
    let desired = vec![allow("bob", &[Right::Full])];
    assert!(in_sync(Some(current.as_slice()), Some(desired.as_slice()), PurgeMode::All));
    assert!(!in_sync(Some(current.as_slice()), Some(&[][..]), PurgeMode::All));
}

#[test]
fn test_merge_keeps_deny_before_allow() {
    let current = vec![deny("x", &[Right::Write]), allow("y", &[Right::Read])];
    let desired = vec![allow("bob", &[Right::Read])];
    let merged = merge(&current, &desired, PurgeMode::None);
    let first_allow = merged.iter().position(Ace::is_allow).unwrap();
    assert!(merged[..first_allow].contains(&deny("x", &[Right::Write])));
    assert!(merged.contains(&allow("bob", &[Right::Read])));
    assert!(merged.contains(&allow("y", &[Right::Read])));
}

#[test]
fn test_inherited_entries_do_not_influence_merge() {
    let inherited = Ace::decode("Users", None, PermType::Deny, AceFlags::PROPAGATES | AceFlags::INHERITED, FILE_GENERIC_READ);
    let desired = vec![allow("bob", &[Right::Read])];
    let with = merge(&[inherited.clone(), allow("y", &[Right::Read])], &desired, PurgeMode::None);
    let without = merge(&[allow("y", &[Right::Read])], &desired, PurgeMode::None);
    assert_eq!(with, without);
    assert!(!with.contains(&inherited));
}

#[test]
fn test_bob_full_scenario() {
    let desired = vec![PermissionSpec::new("bob", ["full"]).to_ace().unwrap().0];
    let current: Vec<Ace> = Vec::new();
    assert!(!in_sync(Some(current.as_slice()), Some(desired.as_slice()), PurgeMode::None));

    let merged = merge(&current, &desired, PurgeMode::None);
    assert_eq!(merged.len(), 1);
    let ace = &merged[0];
    assert_eq!(ace.identity(), "bob");
    assert_eq!(ace.rights(), &[Right::Full]);
    assert_eq!(ace.perm_type(), PermType::Allow);
    assert_eq!(ace.child_types(), ChildTypes::All);
    assert_eq!(ace.affects(), Affects::All);
}

// --- End to end ---

#[test]
fn test_reconcile_from_json_document() {
    let json = r#"[
        {"target": "C:\\share", "purge": "listed_permissions",
         "permissions": [{"identity": "bob", "rights": ["full", "read"]}]},
        {"target": "C:\\missing", "permissions": [{"identity": "bob", "rights": ["read"]}]},
        {"target": "C:\\share", "permissions": [{"identity": "nobody", "rights": ["read"]}]}
    ]"#;
    let states = DesiredState::batch_from_json(json).unwrap();
    assert_eq!(states[0].purge_mode, PurgeMode::ListedOnly);

    let descriptor = SecurityDescriptor {
        owner: Some(sid("S-1-5-32-544")),
        group: None,
        dacl: vec![RawAce {
            sid: sid("S-1-5-32-545"),
            ace_type: PermType::Allow,
            flags: AceFlags::PROPAGATES | AceFlags::INHERITED,
            mask: FILE_GENERIC_READ | FILE_GENERIC_EXECUTE,
        }],
        protected: false,
    };
    let mut adapter = Adapter::new(MemoryStore::new().with_directory("C:\\share", descriptor), lookup());
    let results = adapter.reconcile_batch(&states);

    let outcome = results[0].as_ref().unwrap();
    assert!(!outcome.in_sync);
    assert_eq!(outcome.corrections.len(), 1);
    assert!(matches!(
        &results[1],
        Err(AclError::DescriptorRead { source: StoreError::NotFound, .. })
    ));
    assert!(matches!(&results[2], Err(AclError::IdentityResolution { identity, .. }) if identity == "nobody"));

    let rerun = adapter.reconcile(&states[0]).unwrap();
    assert!(rerun.in_sync);
}

#[test]
fn test_probe_classifies_local_paths() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("data.txt");
    std::fs::write(&file, b"x").unwrap();

    assert_eq!(TargetKind::probe(dir.path()), Ok(TargetKind::Directory));
    assert_eq!(TargetKind::probe(&file), Ok(TargetKind::File));
    assert_eq!(TargetKind::probe(&dir.path().join("absent")), Err(StoreError::NotFound));

    #[cfg(unix)]
    {
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&file, &link).unwrap();
        assert_eq!(TargetKind::probe(&link), Ok(TargetKind::Symlink));
    }
}
