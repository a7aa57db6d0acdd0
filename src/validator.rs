//! Fix quality gating with a two-phase accuracy policy.
//!
//! Before an initial fix exists the accuracy check is skipped: the first
//! geometrically valid fix is accepted regardless of quality so a session
//! never stalls indefinitely on a poor initial signal. Once an initial fix
//! is established, fixes worse than the configured accuracy ceiling are
//! dropped.

use log::debug;

use crate::Fix;

/// Outcome of checking a single fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixCheck {
    /// Geometrically valid and within the accuracy policy.
    Accepted,
    /// Non-finite, out-of-range, or the `(0, 0)` placeholder. Dropped
    /// silently; expected and frequent.
    Invalid,
    /// Valid geometry but accuracy above the ceiling after the initial fix
    /// was established. Non-fatal, recoverable on the next fix.
    LowAccuracy,
}

/// Check a raw fix against session phase and the accuracy ceiling.
///
/// Pure predicate: the caller is responsible for flipping
/// `has_initial_fix` after the first acceptance.
pub fn check(fix: &Fix, has_initial_fix: bool, accuracy_ceiling_m: f64) -> FixCheck {
    if !fix.is_valid() {
        return FixCheck::Invalid;
    }
    // A negative accuracy radius is meaningless
    if fix.accuracy_m.map_or(false, |a| a < 0.0) {
        return FixCheck::Invalid;
    }

    if has_initial_fix {
        if let Some(accuracy) = fix.accuracy_m {
            if accuracy > accuracy_ceiling_m {
                debug!(
                    "dropping low-accuracy fix: {:.0} m > {:.0} m ceiling",
                    accuracy, accuracy_ceiling_m
                );
                return FixCheck::LowAccuracy;
            }
        }
    }

    FixCheck::Accepted
}

/// Boolean convenience wrapper over [`check`].
pub fn validate(fix: &Fix, has_initial_fix: bool, accuracy_ceiling_m: f64) -> bool {
    check(fix, has_initial_fix, accuracy_ceiling_m) == FixCheck::Accepted
}
