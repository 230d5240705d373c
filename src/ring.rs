//! Lock-free single-producer/single-consumer ring buffer.
//!
//! Bridges interrupt context to the capture poll loop. The push side is
//! deliberately lossy: when the buffer is full the item is dropped and
//! `push` returns `false`. It never blocks and never allocates, so it is
//! safe to call from an interrupt handler.
//!
//! The heads are monotonically increasing counters, masked only when a
//! slot is addressed; occupancy is always `write - read`, so full and
//! empty derive from the same two values each endpoint publishes with a
//! single store. A separate full flag would need two stores to stay in
//! sync with the heads, and the producer can preempt the consumer between
//! them.
//!
//! The SPSC contract is enforced by construction: [`EventRing::split`]
//! hands out exactly one [`Producer`] and one [`Consumer`], neither of
//! which can be cloned.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Fixed-capacity SPSC ring. `N` must be a power of two so wraparound is a
/// single mask operation.
pub struct EventRing<T, const N: usize> {
    buf: UnsafeCell<[MaybeUninit<T>; N]>,
    /// Count of items ever pushed. Wraps at `usize::MAX`, which the
    /// power-of-two mask absorbs.
    write_head: AtomicUsize,
    /// Count of items ever popped.
    read_head: AtomicUsize,
    taken: AtomicBool,
}

// Interior access is disjoint: the producer only writes slots the consumer
// has released, and vice versa. Soundness relies on the split-once handles.
unsafe impl<T: Send, const N: usize> Sync for EventRing<T, N> {}

impl<T, const N: usize> EventRing<T, N> {
    const CAPACITY_IS_POW2: () = assert!(N.is_power_of_two(), "ring depth must be a power of 2");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::CAPACITY_IS_POW2;
        Self {
            buf: UnsafeCell::new([const { MaybeUninit::uninit() }; N]),
            write_head: AtomicUsize::new(0),
            read_head: AtomicUsize::new(0),
            taken: AtomicBool::new(false),
        }
    }

    /// Split into the producer and consumer endpoints. Returns `None` on any
    /// call after the first.
    pub fn split(&self) -> Option<(Producer<'_, T, N>, Consumer<'_, T, N>)> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((Producer { ring: self }, Consumer { ring: self }))
    }

    const fn mask(index: usize) -> usize {
        index & (N - 1)
    }
}

impl<T, const N: usize> Default for EventRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Push endpoint. Owned by the interrupt-context producer.
pub struct Producer<'a, T, const N: usize> {
    ring: &'a EventRing<T, N>,
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Insert an element. Returns `false` and drops the insertion if the
    /// buffer is full.
    pub fn push(&mut self, item: T) -> bool {
        let ring = self.ring;
        let write = ring.write_head.load(Ordering::Relaxed);
        let read = ring.read_head.load(Ordering::Acquire);

        if write.wrapping_sub(read) == N {
            return false;
        }

        // Sole producer: this slot is not readable until write_head advances.
        unsafe {
            (*ring.buf.get())[EventRing::<T, N>::mask(write)].write(item);
        }
        ring.write_head.store(write.wrapping_add(1), Ordering::Release);

        true
    }
}

/// Pop endpoint. Owned by the capture session's poll loop.
pub struct Consumer<'a, T, const N: usize> {
    ring: &'a EventRing<T, N>,
}

impl<T, const N: usize> Consumer<'_, T, N> {
    /// Extract an element. Returns `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<T> {
        let ring = self.ring;
        let read = ring.read_head.load(Ordering::Relaxed);
        let write = ring.write_head.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // Sole consumer: the producer released this slot when it advanced
        // write_head past it.
        let item = unsafe { (*ring.buf.get())[EventRing::<T, N>::mask(read)].assume_init_read() };
        ring.read_head.store(read.wrapping_add(1), Ordering::Release);

        Some(item)
    }

    /// True when nothing is pending. Only a snapshot; the producer may push
    /// immediately after.
    pub fn is_empty(&self) -> bool {
        let ring = self.ring;
        ring.read_head.load(Ordering::Relaxed) == ring.write_head.load(Ordering::Acquire)
    }
}
