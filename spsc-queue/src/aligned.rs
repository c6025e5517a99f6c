//! Cache-line isolated storage backing the queue.
//!
//! The slots and the occupancy counter are touched from both threads, so each
//! one is placed on its own cache line to keep producer and consumer traffic
//! apart. The line size is the per-target constant of [`CachePadded`].

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::AtomicUsize;

use crossbeam_utils::CachePadded;

/// A single element slot. It holds a value only between the Push that filled
/// it and the Pop that drained it.
pub(crate) struct Slot<T>(UnsafeCell<MaybeUninit<T>>);

impl<T> Slot<T> {
    fn empty() -> Self {
        Self(UnsafeCell::new(MaybeUninit::uninit()))
    }

    /// # Safety
    ///
    /// The slot must be empty and no other thread may access it concurrently.
    pub(crate) unsafe fn write(&self, val: T) {
        unsafe { (*self.0.get()).write(val) };
    }

    /// # Safety
    ///
    /// The slot must be populated and no other thread may access it
    /// concurrently. The slot is left empty.
    pub(crate) unsafe fn read(&self) -> T {
        unsafe { (*self.0.get()).assume_init_read() }
    }

    /// # Safety
    ///
    /// Same as [`read`](Self::read), but the value is dropped in place.
    pub(crate) unsafe fn drop_in_place(&self) {
        unsafe { (*self.0.get()).assume_init_drop() }
    }
}

/// A fixed number of slots, each padded to its own cache line.
pub(crate) struct AlignedSlots<T> {
    buf: Box<[CachePadded<Slot<T>>]>,
}

impl<T> AlignedSlots<T> {
    /// Allocates `count` empty slots in one contiguous block.
    pub(crate) fn allocate(count: usize) -> Self {
        let buf = std::iter::repeat_with(|| CachePadded::new(Slot::empty()))
            .take(count)
            .collect();
        Self { buf }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn get(&self, index: usize) -> &Slot<T> {
        &self.buf[index]
    }
}

/// One atomic word isolated from every other allocation.
pub(crate) type AlignedCounter = CachePadded<AtomicUsize>;

pub(crate) fn allocate_counter() -> AlignedCounter {
    CachePadded::new(AtomicUsize::new(0))
}
