use core::fmt;

use crossbeam_utils::CachePadded;

use crate::ring::Ring;

/// A fixed-capacity, lock-free queue between one producer and one consumer.
///
/// The queue is used from two threads by [`split`](Self::split)ting it into a
/// [`Producer`] and a [`Consumer`]. Each handle owns its cursor exclusively,
/// and the only state they share is the slot storage and an atomic occupancy
/// counter. Nothing is allocated after construction.
///
/// ```
/// use spsc_queue::BoundedSpscQueue;
///
/// let mut queue = BoundedSpscQueue::new(2);
/// let (mut tx, mut rx) = queue.split();
/// std::thread::scope(|cx| {
///     cx.spawn(move || {
///         for i in 0..100 {
///             let mut val = i;
///             while let Err(v) = tx.push(val) {
///                 val = v;
///                 std::thread::yield_now();
///             }
///         }
///     });
///     cx.spawn(move || {
///         for i in 0..100 {
///             loop {
///                 if let Some(val) = rx.pop() {
///                     assert_eq!(val, i);
///                     break;
///                 }
///                 std::thread::yield_now();
///             }
///         }
///     });
/// });
/// ```
pub struct BoundedSpscQueue<T> {
    ring: Ring<T>,
    write_index: CachePadded<usize>,
    read_index: CachePadded<usize>,
}

impl<T> BoundedSpscQueue<T> {
    /// Creates a queue holding at most `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let ring = Ring::new(capacity);
        tracing::debug!(
            "allocated queue, capacity={capacity}, elem_size={}",
            size_of::<T>()
        );
        Self {
            ring,
            write_index: CachePadded::new(0),
            read_index: CachePadded::new(0),
        }
    }

    /// Splits the queue into its producer and consumer halves.
    ///
    /// Both halves continue from the cursors left by any previous split.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let Self {
            ring,
            write_index,
            read_index,
        } = self;
        let ring = &*ring;
        let producer = Producer {
            ring,
            tail: &mut **write_index,
        };
        let consumer = Consumer {
            ring,
            head: &mut **read_index,
        };
        (producer, consumer)
    }

    /// Pushes a value while holding both halves of the queue.
    pub fn push(&mut self, val: T) -> Result<(), T> {
        // SAFETY: `&mut self` excludes any other producer.
        unsafe { self.ring.enqueue(&mut self.write_index, val) }
    }

    /// Pops a value while holding both halves of the queue.
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes any other consumer.
        unsafe { self.ring.dequeue(&mut self.read_index) }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Returns the number of queued values.
    ///
    /// Once the queue is split, this is a snapshot which the other thread may
    /// invalidate at any moment; treat it as advisory.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T> Drop for BoundedSpscQueue<T> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<T>() {
            let head = *self.read_index;
            // SAFETY: `&mut self` guarantees both halves are gone.
            unsafe { self.ring.drop_remaining(head) }
        }
    }
}

impl<T> fmt::Debug for BoundedSpscQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedSpscQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// The pushing half of a [`BoundedSpscQueue`].
pub struct Producer<'a, T> {
    ring: &'a Ring<T>,
    tail: &'a mut usize,
}

impl<T> Producer<'_, T> {
    /// Attempts to push a value.
    ///
    /// Returns the value back if the queue is full. A full result may be
    /// spurious when the consumer is popping concurrently, but a value is
    /// never written past the capacity.
    pub fn push(&mut self, val: T) -> Result<(), T> {
        // SAFETY: this handle is the only producer and owns the write cursor.
        unsafe { self.ring.enqueue(self.tail, val) }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// See [`BoundedSpscQueue::len`].
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T> fmt::Debug for Producer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// The popping half of a [`BoundedSpscQueue`].
pub struct Consumer<'a, T> {
    ring: &'a Ring<T>,
    head: &'a mut usize,
}

impl<T> Consumer<'_, T> {
    /// Attempts to pop the oldest value.
    ///
    /// Returns `None` if the queue is empty. As with [`Producer::push`], an
    /// empty result may be spurious, but an unpublished slot is never read.
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: this handle is the only consumer and owns the read cursor.
        unsafe { self.ring.dequeue(self.head) }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// See [`BoundedSpscQueue::len`].
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T> fmt::Debug for Consumer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn push_spin<T>(tx: &mut Producer<T>, mut val: T) {
        while let Err(v) = tx.push(val) {
            val = v;
            std::thread::yield_now();
        }
    }

    fn pop_spin<T>(rx: &mut Consumer<T>) -> T {
        loop {
            if let Some(val) = rx.pop() {
                return val;
            }
            std::thread::yield_now();
        }
    }

    #[test]
    fn capacity_of_four() {
        let mut q = BoundedSpscQueue::new(4);
        assert_eq!(q.capacity(), 4);
        assert!(q.is_empty());

        for i in 1..=4 {
            assert_eq!(q.push(i), Ok(()));
        }
        assert_eq!(q.push(5), Err(5));
        assert!(q.is_full());
        assert_eq!(q.len(), 4);

        for i in 1..=4 {
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn capacity_bound() {
        for cap in [1, 2, 3, 7, 64] {
            let mut q = BoundedSpscQueue::new(cap);
            for i in 0..cap {
                q.push(i).unwrap();
            }
            assert!(q.is_full());
            assert_eq!(q.push(cap), Err(cap));
            assert_eq!(q.len(), cap);
        }
    }

    #[test]
    fn empty_after_drain() {
        let mut q = BoundedSpscQueue::new(5);
        for i in 0..3 {
            q.push(i).unwrap();
        }
        while q.pop().is_some() {}
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn fifo_under_random_interleaving() {
        let cap = fastrand::usize(1..=16);
        let mut q = BoundedSpscQueue::new(cap);
        let mut expected = VecDeque::new();
        for i in 0..10_000u32 {
            if fastrand::bool() {
                match q.push(i) {
                    Ok(()) => expected.push_back(i),
                    Err(v) => {
                        assert_eq!(v, i);
                        assert_eq!(expected.len(), cap);
                    },
                }
            } else {
                assert_eq!(q.pop(), expected.pop_front());
            }
            assert_eq!(q.len(), expected.len());
        }
    }

    #[test]
    #[should_panic = "capacity must not be zero"]
    fn zero_capacity() {
        BoundedSpscQueue::<u32>::new(0);
    }

    #[test]
    fn split_resumes_cursors() {
        let mut q = BoundedSpscQueue::new(3);
        {
            let (mut tx, mut rx) = q.split();
            tx.push('a').unwrap();
            tx.push('b').unwrap();
            assert_eq!(rx.pop(), Some('a'));
            assert_eq!(tx.len(), 1);
        }
        q.push('c').unwrap();
        q.push('d').unwrap();
        assert!(q.is_full());
        let (mut tx, mut rx) = q.split();
        assert_eq!(tx.push('e'), Err('e'));
        assert!(rx.is_full());
        assert_eq!(rx.pop(), Some('b'));
        assert_eq!(rx.pop(), Some('c'));
        assert_eq!(rx.pop(), Some('d'));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn moves_non_copy_values() {
        let input = std::iter::repeat_with(|| fastrand::alphanumeric().to_string())
            .take(8)
            .collect::<Vec<_>>();
        let mut q = BoundedSpscQueue::new(8);
        for s in input.iter().cloned() {
            q.push(s).unwrap();
        }
        let output = std::iter::from_fn(|| q.pop()).collect::<Vec<_>>();
        assert_eq!(output, input);
    }

    #[test]
    fn queue_drop() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut q = BoundedSpscQueue::new(4);
        // Leave values on both sides of the wrap point.
        for _ in 0..3 {
            q.push(DropCounter).unwrap();
        }
        drop(q.pop());
        drop(q.pop());
        for _ in 0..3 {
            q.push(DropCounter).unwrap();
        }
        assert!(q.push(DropCounter).is_err());
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 3);

        drop(q);
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 3 + 4);
    }

    #[test]
    fn threaded_round_trip() {
        let input = std::iter::repeat_with(fastrand::alphabetic)
            .take(1000)
            .collect::<Vec<_>>();

        let mut q = BoundedSpscQueue::new(fastrand::usize(1..=8));
        let (mut tx, mut rx) = q.split();
        let output = std::thread::scope(|cx| {
            cx.spawn(|| {
                for c in input.iter().copied() {
                    push_spin(&mut tx, c);
                }
            });
            cx.spawn(|| {
                (0..input.len())
                    .map(|_| pop_spin(&mut rx))
                    .collect::<Vec<_>>()
            })
            .join()
            .unwrap()
        });

        assert_eq!(output, input);
        assert!(q.is_empty());
    }

    #[test]
    fn threaded_stress() {
        const COUNT: u64 = 1_000_000;

        let mut q = BoundedSpscQueue::new(1024);
        let (mut tx, mut rx) = q.split();
        std::thread::scope(|cx| {
            cx.spawn(move || {
                for i in 0..COUNT {
                    let mut val = i;
                    while let Err(v) = tx.push(val) {
                        val = v;
                        std::hint::spin_loop();
                    }
                }
            });
            cx.spawn(move || {
                for i in 0..COUNT {
                    let val = loop {
                        if let Some(val) = rx.pop() {
                            break val;
                        }
                        std::hint::spin_loop();
                    };
                    assert_eq!(val, i);
                }
                assert_eq!(rx.pop(), None);
            });
        });
        assert!(q.is_empty());
    }

    #[test]
    fn threaded_drop_accounting() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter(#[allow(dead_code)] u32);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut q = BoundedSpscQueue::new(16);
        let (mut tx, mut rx) = q.split();
        std::thread::scope(|cx| {
            cx.spawn(move || {
                for i in 0..500 {
                    push_spin(&mut tx, DropCounter(i));
                }
            });
            cx.spawn(move || {
                // Stop early so that some values stay behind.
                for _ in 0..490 {
                    drop(pop_spin(&mut rx));
                }
            });
        });
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 490);
        assert_eq!(q.len(), 10);
        drop(q);
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 500);
    }
}
