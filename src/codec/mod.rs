//!
//! Mask/flag codec.
//!
//! Pure functions mapping the symbolic model onto the native encoding:
//! rights to and from the 32-bit access mask ([`mask`]), and
//! `child_types`/`affects` to and from the ACE inheritance flags ([`flags`]).
//!
//! Every value the encoders produce decodes back to the same symbolic value.
//! Arbitrary native masks outside the vocabulary decode to `mask_specific`.

pub mod flags;
pub mod mask;

pub use flags::AceFlags;
pub use mask::{consts, DecodedMask};
