#![no_main]

// Arbitrary documents either fail validation or yield entries that
// reconcile against an empty store without panicking.

use libfuzzer_sys::fuzz_target;
use ntacl_core::descriptor::{MemoryStore, SecurityDescriptor, StaticLookup};
use ntacl_core::{Adapter, DesiredState};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(state) = DesiredState::from_json(json) else {
        return;
    };
    let Ok(validated) = state.validate() else {
        return;
    };
    if let Some(permissions) = &validated.permissions {
        for ace in permissions {
            assert!(!ace.rights().is_empty());
            assert!(!ace.is_inherited());
        }
    }

    let store = MemoryStore::new().with_file(state.target.clone(), SecurityDescriptor::default());
    let mut adapter = Adapter::new(store, StaticLookup::new());
    let _ = adapter.reconcile(&state);
});
