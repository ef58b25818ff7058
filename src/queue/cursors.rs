/*******************************************************************************
 * Copyright (c) 2024 Cénotélie Opérations SAS (cenotelie.fr)
 ******************************************************************************/

//! The reservation counters for the queue

use core::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

/// A monotonic counter claimed by producers or consumers to reserve positions
///
/// The counter wraps at `u32::MAX`; all arithmetic on claimed values must use
/// wrapping operations and equality, never magnitude comparison.
#[derive(Debug)]
pub(crate) struct Cursor {
    /// The wrapped counter
    inner: CachePadded<AtomicU32>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            inner: CachePadded::new(AtomicU32::new(0)),
        }
    }
}

impl Cursor {
    /// Gets the current value using `Acquire`
    #[must_use]
    #[inline]
    pub(crate) fn load(&self) -> u32 {
        self.inner.load(Ordering::Acquire)
    }

    /// Attempts to advance the counter from `current` by `count` positions
    #[inline]
    pub(crate) fn try_claim(&self, current: u32, count: u32) -> bool {
        self.inner
            .compare_exchange(current, current.wrapping_add(count), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn set(&self, value: u32) {
        self.inner.store(value, Ordering::Relaxed);
    }
}

/// A contiguous range of positions claimed from a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    /// The first claimed position
    pub start: u32,
    /// The number of positions actually claimed
    pub granted: u32,
    /// The number of positions that were still claimable afterwards
    pub remaining: u32,
}
