//! Safepoint state as seen by this crate.
//!
//! The host collector brings mutators to a halt and then calls [`enter`] for
//! the duration of the pause. Draining a set checks
//! [`assert_at_safepoint`] on entry. Guards nest, so worker threads may each
//! hold one while the pause is in progress.

use std::sync::atomic::{AtomicUsize, Ordering};

static SAFEPOINT_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Marks the process as being at a safepoint while alive.
#[derive(Debug)]
#[must_use = "the safepoint ends when the guard is dropped"]
pub struct SafepointGuard {
    _private: (),
}

/// Declare that all mutators are halted until the returned guard is dropped.
pub fn enter() -> SafepointGuard {
    SAFEPOINT_DEPTH.fetch_add(1, Ordering::AcqRel);
    SafepointGuard { _private: () }
}

impl Drop for SafepointGuard {
    fn drop(&mut self) {
        let prev = SAFEPOINT_DEPTH.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "safepoint depth underflow");
    }
}

/// Whether any [`SafepointGuard`] is alive.
#[must_use]
pub fn is_at_safepoint() -> bool {
    SAFEPOINT_DEPTH.load(Ordering::Acquire) > 0
}

/// Verify that the caller runs inside a safepoint.
///
/// # Panics
///
/// Panics when verification is enabled and no [`SafepointGuard`] is alive.
#[inline]
pub fn assert_at_safepoint() {
    gc_assert!(is_at_safepoint(), "must be at a safepoint");
}
