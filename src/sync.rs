//!
//! DACL synchronizer.
//!
//! Decides whether the explicit entries on disk satisfy a desired list under
//! a purge mode, and builds the explicit list to write back when they do not.
//! Inherited entries are never added, dropped or reordered here; attaching
//! or stripping them is the store's job when inheritance is toggled.

use crate::ace::Ace;
use crate::types::PurgeMode;

/// Explicit (non-inherited) entries of a DACL, in their original order.
pub fn local_entries(dacl: &[Ace]) -> Vec<&Ace> {
    dacl.iter().filter(|ace| !ace.is_inherited()).collect()
}

/// Entries of `left` also present in `right`, in `left` order, without duplicates.
fn intersection<'a>(left: &[&'a Ace], right: &[Ace]) -> Vec<&'a Ace> {
    let mut result: Vec<&Ace> = Vec::new();
    for ace in left {
        if right.iter().any(|r| r == *ace) && !result.iter().any(|seen| seen == ace) {
            result.push(ace);
        }
    }
    result
}

/// Whether `current` already satisfies `desired` under `purge`.
///
/// `None` for `current` means the DACL could not be read; `None` for
/// `desired` means permissions are not managed.
///
/// With [`PurgeMode::All`] the explicit entries must equal `desired` exactly,
/// order included. Otherwise the entries of `desired` must all be present,
/// and the matches, taken in on-disk order, must line up with `desired`.
pub fn in_sync(current: Option<&[Ace]>, desired: Option<&[Ace]>, purge: PurgeMode) -> bool {
    let current = match (current, desired) {
        (None, Some(_)) => return false,
        (None, None) => return true,
        (Some(current), _) => current,
    };
    let current_local = local_entries(current);

    match purge {
        PurgeMode::All => {
            let desired = desired.unwrap_or_default();
            current_local.len() == desired.len()
                && current_local.iter().zip(desired).all(|(c, d)| *c == d)
        }
        PurgeMode::None | PurgeMode::ListedOnly => {
            let Some(desired) = desired else {
                return true;
            };
            let common = intersection(&current_local, desired);
            common.len() == desired.len() && common.iter().zip(desired).all(|(c, d)| *c == d)
        }
    }
}

/// Builds the explicit entry list to write back.
///
/// With [`PurgeMode::All`] this is `desired` verbatim. Otherwise every
/// explicit entry of `current` that is not [`Ace::is_same`] as an entry
/// already in the result is kept: unmatched deny entries go right before the
/// first allow entry, unmatched allow entries are appended.
pub fn merge(current: &[Ace], desired: &[Ace], purge: PurgeMode) -> Vec<Ace> {
    let mut result = desired.to_vec();
    if purge == PurgeMode::All {
        return result;
    }

    for ace in current.iter().filter(|ace| !ace.is_inherited()) {
        if result.iter().any(|kept| kept.is_same(ace)) {
            continue;
        }
        tracing::debug!("keeping unmanaged entry {}", ace);
        if ace.is_deny() {
            match result.iter().position(Ace::is_allow) {
                Some(index) => result.insert(index, ace.clone()),
                None => result.push(ace.clone()),
            }
        } else {
            result.push(ace.clone());
        }
    }
    result
}
