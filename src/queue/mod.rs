/*******************************************************************************
 * Copyright (c) 2024 Cénotélie Opérations SAS (cenotelie.fr)
 ******************************************************************************/

//! Bounded MPMC queue over a ring of sequence-gated slots

mod cursors;
mod ring;
mod wait;

use alloc::vec::Vec;
use core::fmt;

pub use wait::{SnoozeWaitStrategy, SpinWaitStrategy, WaitStrategy, YieldWaitStrategy};

use cursors::{Cursor, Reservation};
use ring::RingBuffer;
use crate::errors::{TryRecvError, TrySendError};
use crate::utils::Phantom;

/// The largest capacity a queue can be created with
const MAX_CAPACITY: u32 = 1 << 31;

/// Rounds a requested capacity to a power of two within `[2, MAX_CAPACITY]`
fn round_up_capacity(requested: u32) -> u32 {
    if requested > MAX_CAPACITY {
        MAX_CAPACITY
    } else {
        requested.next_power_of_two().max(2)
    }
}

/// A bounded MPMC FIFO queue
///
/// Producers reserve positions by CAS-advancing `tail`, consumers by
/// CAS-advancing `head`; the payload transfer at each reserved position is
/// synchronized by the slot's own sequence pair. The item received by the
/// n-th consumer to claim is exactly the item supplied by the n-th producer
/// to claim. Within a batch, slots are published in ascending position order
/// but the batch is not atomic: the other side sees the items one by one.
///
/// All operations take `&self`; share the queue behind an `Arc` to use it
/// from several threads.
pub struct Queue<T, WS: WaitStrategy = YieldWaitStrategy> {
    _use_ws: Phantom<WS>,
    /// Counts the positions claimed by consumers; the next claim is `head + 1`
    head: Cursor,
    /// Counts the positions claimed by producers; the next claim is `tail + 1`
    tail: Cursor,
    /// The slots themselves
    ring: RingBuffer<T>,
}

impl<T> Queue<T> {
    /// Creates a queue with the default yield wait strategy
    ///
    /// The capacity is rounded up to the next power of two, with a minimum of
    /// 2 and a maximum of `2^31`.
    #[must_use]
    pub fn new(capacity: u32) -> Queue<T> {
        Self::new_with_strategy(capacity)
    }
}

impl<T, WS: WaitStrategy> Queue<T, WS> {
    /// Creates a queue with a specific wait strategy
    #[must_use]
    pub fn new_with_strategy(capacity: u32) -> Queue<T, WS> {
        Queue {
            _use_ws: Phantom::default(),
            head: Cursor::default(),
            tail: Cursor::default(),
            ring: RingBuffer::new(round_up_capacity(capacity)),
        }
    }

    /// Gets the capacity of the queue
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.ring.capacity()
    }

    /// Gets the number of items in the queue
    ///
    /// The counters are sampled independently, so under concurrent use the
    /// value may be stale by the time it is returned.
    #[must_use]
    #[inline]
    pub fn len(&self) -> u32 {
        self.tail.load().wrapping_sub(self.head.load())
    }

    /// Gets whether the queue is empty
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets whether the queue is full
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Claims up to `request` contiguous positions on the producer side
    ///
    /// `None` when no slot at all was free at load time. All counter
    /// arithmetic wraps at `u32::MAX`.
    fn acquire_push(&self, request: u32) -> Option<Reservation> {
        let backoff = WS::default();
        loop {
            let head = self.head.load();
            let tail = self.tail.load();
            let free = self.capacity().wrapping_sub(tail.wrapping_sub(head));
            if free == 0 {
                return None;
            }
            let granted = request.min(free);
            if self.tail.try_claim(tail, granted) {
                return Some(Reservation {
                    start: tail.wrapping_add(1),
                    granted,
                    remaining: free - granted,
                });
            }
            backoff.wait();
        }
    }

    /// Claims up to `request` contiguous positions on the consumer side
    fn acquire_pop(&self, request: u32) -> Option<Reservation> {
        let backoff = WS::default();
        loop {
            let head = self.head.load();
            let tail = self.tail.load();
            let used = tail.wrapping_sub(head);
            if used == 0 {
                return None;
            }
            let granted = request.min(used);
            if self.head.try_claim(head, granted) {
                return Some(Reservation {
                    start: head.wrapping_add(1),
                    granted,
                    remaining: used - granted,
                });
            }
            backoff.wait();
        }
    }

    /// Attempts to push a single item onto the queue
    ///
    /// Returns the number of free slots left after this push.
    ///
    /// # Errors
    ///
    /// Returns a `TrySendError` wrapping the item when the queue is full.
    pub fn try_push(&self, item: T) -> Result<u32, TrySendError<T>> {
        let Some(reservation) = self.acquire_push(1) else {
            return Err(TrySendError::Full(item));
        };
        self.ring.produce::<WS>(reservation.start, item);
        Ok(reservation.remaining)
    }

    /// Attempts to pop a single item from the queue
    ///
    /// Returns the item and the number of items left after this pop.
    ///
    /// # Errors
    ///
    /// Returns a `TryRecvError` when the queue is empty.
    pub fn try_pop(&self) -> Result<(T, u32), TryRecvError> {
        let Some(reservation) = self.acquire_pop(1) else {
            return Err(TryRecvError::Empty);
        };
        let item = self.ring.consume::<WS>(reservation.start);
        Ok((item, reservation.remaining))
    }

    /// Pushes the items of `provider`, up to the number of free slots
    ///
    /// Only the granted items are taken from the provider, the rest stays
    /// with the caller. Returns the number of items pushed and the number of
    /// slots left free afterwards; `(0, 0)` when the queue was full at
    /// reservation time. A provider that yields fewer items than its reported
    /// length panics, as the reserved positions could no longer be filled.
    pub fn push_many<I>(&self, provider: &mut I) -> (u32, u32)
    where
        I: ExactSizeIterator<Item = T>,
    {
        let size = u32::try_from(provider.len()).unwrap_or(u32::MAX);
        if size == 0 {
            return (0, self.capacity().wrapping_sub(self.len()));
        }
        let Some(reservation) = self.acquire_push(size) else {
            return (0, 0);
        };
        for offset in 0..reservation.granted {
            let item = provider
                .next()
                .expect("the provider yielded fewer items than its reported length");
            self.ring.produce::<WS>(reservation.start.wrapping_add(offset), item);
        }
        (reservation.granted, reservation.remaining)
    }

    /// Pops up to `count` items from the queue
    ///
    /// Returns the items in queue order, the number of items actually popped
    /// and the number of items left afterwards; empty outputs when the queue
    /// was empty at reservation time.
    pub fn pop_many(&self, count: u32) -> (Vec<T>, u32, u32) {
        if count == 0 {
            return (Vec::new(), 0, self.capacity().wrapping_sub(self.len()));
        }
        let Some(reservation) = self.acquire_pop(count) else {
            return (Vec::new(), 0, 0);
        };
        let mut items = Vec::with_capacity(reservation.granted as usize);
        for offset in 0..reservation.granted {
            items.push(self.ring.consume::<WS>(reservation.start.wrapping_add(offset)));
        }
        (items, reservation.granted, reservation.remaining)
    }

    /// Pushes a single item, waiting for a free slot when the queue is full
    ///
    /// Returns the number of free slots left after this push.
    pub fn push(&self, item: T) -> u32 {
        let backoff = WS::default();
        let reservation = loop {
            if let Some(reservation) = self.acquire_push(1) {
                break reservation;
            }
            backoff.wait();
        };
        self.ring.produce::<WS>(reservation.start, item);
        reservation.remaining
    }

    /// Pops a single item, waiting for one when the queue is empty
    ///
    /// Returns the item and the number of items left after this pop.
    #[must_use]
    pub fn pop(&self) -> (T, u32) {
        let backoff = WS::default();
        let reservation = loop {
            if let Some(reservation) = self.acquire_pop(1) {
                break reservation;
            }
            backoff.wait();
        };
        let item = self.ring.consume::<WS>(reservation.start);
        (item, reservation.remaining)
    }

    /// Re-bases all counters as if `base` positions had already flowed through
    #[cfg(test)]
    fn rebase(&self, base: u32) {
        assert_eq!(base & (self.capacity() - 1), 0, "base must be a multiple of the capacity");
        self.head.set(base);
        self.tail.set(base);
        self.ring.rebase(base);
    }
}

impl<T, WS: WaitStrategy> fmt::Display for Queue<T, WS> {
    /// Renders the sampled state; this is not a consistent snapshot
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue: Head:{} Tail:{} Len:{} Cap:{}",
            self.head.load(),
            self.tail.load(),
            self.len(),
            self.capacity()
        )
    }
}

impl<T, WS: WaitStrategy> fmt::Debug for Queue<T, WS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<T, WS: WaitStrategy> Drop for Queue<T, WS> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<T>() {
            // exclusive access: the unconsumed positions are (head, tail]
            let tail = self.tail.load();
            let mut position = self.head.load();
            while position != tail {
                position = position.wrapping_add(1);
                self.ring.drop_slot(position);
            }
        }
    }
}
