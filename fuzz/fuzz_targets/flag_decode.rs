#![no_main]

use libfuzzer_sys::fuzz_target;
use ntacl_core::codec::{flags, AceFlags};
use ntacl_core::{Affects, ChildTypes};

fuzz_target!(|bits: u8| {
    let raw = AceFlags::from_bits_truncate(bits);
    let (child_types, affects) = flags::decode(raw);
    let encoded = flags::encode(child_types, affects);
    assert!(!encoded.is_inherited());
    if child_types == ChildTypes::None || affects == Affects::SelfOnly {
        return;
    }
    assert_eq!(flags::decode(encoded), (child_types, affects));
});
