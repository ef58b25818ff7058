/*******************************************************************************
 * Copyright (c) 2024 Cénotélie Opérations SAS (cenotelie.fr)
 ******************************************************************************/

//! The ring of slots for the queue

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

use super::wait::WaitStrategy;

/// A single cell of the ring, gated by its pair of sequence counters.
///
/// `put_seq` is the position for which the slot may next be written and
/// `get_seq` the position for which it may next be read. A producer for
/// position `p` must observe both at `p`; it then advances `put_seq` to
/// `p + capacity`, which is what the consumer for `p` waits for. The consumer
/// in turn advances `get_seq` to `p + capacity`, releasing the slot to the
/// producer of the next lap.
struct Slot<T> {
    /// The position for which this slot is ready to be written
    put_seq: AtomicU32,
    /// The position for which this slot is ready to be read
    get_seq: AtomicU32,
    /// The storage for the item itself
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new(seq: u32) -> Self {
        Self {
            put_seq: AtomicU32::new(seq),
            get_seq: AtomicU32::new(seq),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// The circular array of slots accessed by producers and consumers
pub(crate) struct RingBuffer<T> {
    /// The buffer containing the slots themselves, each on its own cache line
    buffer: Box<[CachePadded<Slot<T>>]>,
    /// The mask to reduce a position to an index within the buffer
    mask: u32,
}

/// SAFETY: access to a slot's value is guarded by its sequence pair; items are
/// moved out on consumption, so `T: Send` is all that is required.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates the slots with their initial sequences
    pub(crate) fn new(capacity: u32) -> Self {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        let buffer = (0..capacity).map(|i| CachePadded::new(Slot::new(i))).collect::<Box<[_]>>();
        // positions are one-based: index 0 is first reached at position `capacity`
        buffer[0].put_seq.store(capacity, Ordering::Relaxed);
        buffer[0].get_seq.store(capacity, Ordering::Relaxed);
        Self {
            buffer,
            mask: capacity - 1,
        }
    }

    /// Gets the capacity of the ring
    #[must_use]
    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.mask + 1
    }

    /// Writes the item for a reserved position and publishes it to consumers
    ///
    /// Waits for the consumer of the previous lap to have released the slot.
    pub(crate) fn produce<WS: WaitStrategy>(&self, position: u32, item: T) {
        let slot = &self.buffer[(position & self.mask) as usize];
        let backoff = WS::default();
        while slot.put_seq.load(Ordering::Acquire) != position
            || slot.get_seq.load(Ordering::Acquire) != position
        {
            backoff.wait();
        }
        unsafe {
            (*slot.value.get()).write(item);
        }
        slot.put_seq.fetch_add(self.capacity(), Ordering::Release);
    }

    /// Moves the item out of a reserved position and releases the slot
    ///
    /// Waits for the producer of this lap to have published the slot. Moving
    /// the item out leaves the slot logically empty for the next lap.
    pub(crate) fn consume<WS: WaitStrategy>(&self, position: u32) -> T {
        let slot = &self.buffer[(position & self.mask) as usize];
        let backoff = WS::default();
        let published = position.wrapping_add(self.capacity());
        while slot.get_seq.load(Ordering::Acquire) != position
            || slot.put_seq.load(Ordering::Acquire) != published
        {
            backoff.wait();
        }
        let item = unsafe { (*slot.value.get()).assume_init_read() };
        slot.get_seq.fetch_add(self.capacity(), Ordering::Release);
        item
    }

    /// Drops the item held for a position that was produced but never consumed
    pub(crate) fn drop_slot(&mut self, position: u32) {
        let index = (position & self.mask) as usize;
        unsafe {
            self.buffer[index].value.get_mut().assume_init_drop();
        }
    }

    /// Re-bases all sequences as if `base` positions had already flowed through
    #[cfg(test)]
    pub(crate) fn rebase(&self, base: u32) {
        for (i, slot) in self.buffer.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let seq = base.wrapping_add(i as u32);
            slot.put_seq.store(seq, Ordering::Relaxed);
            slot.get_seq.store(seq, Ordering::Relaxed);
        }
        let first = base.wrapping_add(self.capacity());
        self.buffer[0].put_seq.store(first, Ordering::Relaxed);
        self.buffer[0].get_seq.store(first, Ordering::Relaxed);
    }
}



#[cfg(test)]
mod tests_drop {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::RingBuffer;
    use crate::queue::YieldWaitStrategy;

    struct DropCallback(Box<dyn Fn() + Send>);

    impl Drop for DropCallback {
        fn drop(&mut self) {
            (self.0)();
        }
    }

    #[test]
    fn drop_slot_runs_destructor() {
        let drop_count = Arc::new(AtomicUsize::new(0));
        let mut ring = RingBuffer::<DropCallback>::new(2);
        ring.produce::<YieldWaitStrategy>(
            1,
            DropCallback(Box::new({
                let drop_count = drop_count.clone();
                move || {
                    drop_count.fetch_add(1, Ordering::SeqCst);
                }
            })),
        );
        assert_eq!(drop_count.load(Ordering::SeqCst), 0);
        ring.drop_slot(1);
        assert_eq!(drop_count.load(Ordering::SeqCst), 1);
    }
}
