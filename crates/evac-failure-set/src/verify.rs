//! Invariant checks that compile away in optimized builds.
//!
//! Every contract this crate relies on (offset bounds, region containment,
//! safepoint preconditions, slot accounting) is checked through [`gc_assert!`].
//! The checks run when `debug_assertions` is on or the `verify` feature is
//! enabled, and cost nothing otherwise.

/// Whether `gc_assert!` checks are compiled in.
pub const VERIFY_ENABLED: bool = cfg!(any(debug_assertions, feature = "verify"));

/// Assert an invariant when verification is enabled.
///
/// A failed check is a fatal programming error, never a recoverable fault.
macro_rules! gc_assert {
    ($cond:expr $(,)?) => {
        if $crate::verify::VERIFY_ENABLED {
            assert!($cond);
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if $crate::verify::VERIFY_ENABLED {
            assert!($cond, $($arg)+);
        }
    };
}
