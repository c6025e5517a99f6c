use core::sync::atomic::Ordering;

use crate::aligned::{self, AlignedCounter, AlignedSlots};
use crate::ordering::{OBSERVE, PUBLISH};

/// Slot storage together with the occupancy counter.
///
/// The ring does not own any cursor. The producer and the consumer each pass
/// their own index into [`enqueue`](Self::enqueue) and
/// [`dequeue`](Self::dequeue), so a cursor is only ever touched by the thread
/// that owns it.
pub(crate) struct Ring<T> {
    slots: AlignedSlots<T>,
    /// Number of populated slots, in `[0, capacity]`. Incremented only by the
    /// producer and decremented only by the consumer.
    occupancy: AlignedCounter,
}

// The counter protocol hands every slot to exactly one side at a time.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must not be zero");
        Self {
            slots: AlignedSlots::allocate(capacity),
            occupancy: aligned::allocate_counter(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.occupancy.load(OBSERVE)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity() { 0 } else { next }
    }

    /// # Safety
    ///
    /// Must only be called by the single producer, with `tail` being the
    /// producer's write cursor.
    pub(crate) unsafe fn enqueue(&self, tail: &mut usize, val: T) -> Result<(), T> {
        // A stale count is never lower than the real one here, since only
        // this side increments it.
        if self.is_full() {
            return Err(val);
        }

        unsafe { self.slots.get(*tail).write(val) };
        self.occupancy.fetch_add(1, PUBLISH);
        *tail = self.advance(*tail);

        Ok(())
    }

    /// # Safety
    ///
    /// Must only be called by the single consumer, with `head` being the
    /// consumer's read cursor.
    pub(crate) unsafe fn dequeue(&self, head: &mut usize) -> Option<T> {
        // A stale count is never higher than the real one here, since only
        // this side decrements it.
        if self.is_empty() {
            return None;
        }

        let val = unsafe { self.slots.get(*head).read() };
        self.occupancy.fetch_sub(1, PUBLISH);
        *head = self.advance(*head);

        Some(val)
    }

    /// Drops every value still held, starting at `head`.
    ///
    /// # Safety
    ///
    /// `head` must be the consumer's read cursor and the ring must not be
    /// used afterwards.
    pub(crate) unsafe fn drop_remaining(&mut self, head: usize) {
        let len = self.occupancy.load(Ordering::Relaxed);
        let mut index = head;
        for _ in 0..len {
            unsafe { self.slots.get(index).drop_in_place() };
            index = self.advance(index);
        }
        self.occupancy.store(0, Ordering::Relaxed);
    }
}
