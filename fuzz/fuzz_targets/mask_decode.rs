#![no_main]

// Any mask decodes, and masks without a symbolic form keep their bits.

use libfuzzer_sys::fuzz_target;
use ntacl_core::codec::mask;
use ntacl_core::Right;

fuzz_target!(|raw: u32| {
    let decoded = mask::decode(raw);
    assert!(!decoded.rights.is_empty());
    if decoded.rights == [Right::MaskSpecific] {
        assert_eq!(mask::encode(&decoded.rights, decoded.raw), raw);
    } else {
        let again = mask::decode(mask::encode(&decoded.rights, None));
        assert_eq!(again.rights, decoded.rights);
    }
});
