// Atomics used by the queue. Under `--cfg loom` these come from loom so the
// model checker can explore every interleaving of the CAS protocol.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use crossbeam_utils::Backoff;

/// Pause after a failed CAS or a failed consistency check.
#[cfg(not(loom))]
#[inline]
pub(crate) fn pause(backoff: Option<&Backoff>) {
    match backoff {
        Some(b) => b.spin(),
        None => std::hint::spin_loop(),
    }
}

// Loom needs an explicit yield to make progress through retry loops.
#[cfg(loom)]
#[inline]
pub(crate) fn pause(_backoff: Option<&Backoff>) {
    loom::thread::yield_now();
}
