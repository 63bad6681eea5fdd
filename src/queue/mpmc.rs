//! The bounded MPMC ring.
//!
//! Fixed-size slots are addressed by monotonically increasing enqueue and
//! dequeue positions. A producer or consumer first reserves a position with
//! a CAS, then publishes the slot through its per-slot sequence number, so a
//! thread that lost the race retries at the new position instead of touching
//! another thread's in-flight slot. A producer stalled between reservation
//! and publication delays visibility of that one slot; it cannot corrupt
//! concurrent consumers, which simply do not observe the sequence advance.
//!
//! Memory ordering: the reservation CAS uses `Release` on success so the
//! claimed position is published uniquely; the sequence field is written
//! with `Release` and read with `Acquire`, pairing around every value
//! handoff so no observer sees a partially written slot.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::CachePadded;

/// Reserved bit of the enqueue position marking the queue closed.
///
/// Folding closure into the position word makes `close` linearizable against
/// producers for free: a reservation CAS taken after `close` fails because
/// the compared word changed, and the retry observes the bit.
const CLOSED_BIT: usize = 1 << (usize::BITS - 1);

/// Error returned by [`MpmcQueue::push`], handing the rejected value back.
#[derive(PartialEq, Eq)]
pub enum PushError<T> {
    /// The queue is at capacity. Retry or drop, per caller policy.
    Full(T),
    /// The queue was closed; no further values will ever be accepted.
    Closed(T),
}

impl<T> PushError<T> {
    /// Recover the value that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(value) | PushError::Closed(value) => value,
        }
    }

    /// Whether this error is the closed condition.
    pub fn is_closed(&self) -> bool {
        matches!(self, PushError::Closed(_))
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded lock-free MPMC queue.
///
/// `push` and `pop` are safe under any interleaving from any number of
/// threads and never block. Capacity is rounded up to a power of two.
pub struct MpmcQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Create a queue holding at least `capacity` values.
    ///
    /// The effective capacity is `capacity` rounded up to a power of two,
    /// minimum 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        assert!(
            capacity < CLOSED_BIT >> 1,
            "queue capacity out of range"
        );

        let buffer = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Effective (rounded) capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Enqueue a value without blocking.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            if pos & CLOSED_BIT != 0 {
                return Err(PushError::Closed(value));
            }

            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);

            if seq == pos {
                // Slot free at this position: reserve it.
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if (seq.wrapping_sub(pos) as isize) < 0 {
                // Sequence lags the position: the consumer a full lap behind
                // has not freed this slot yet.
                let current = self.enqueue_pos.load(Ordering::Relaxed);
                if current == pos {
                    return Err(PushError::Full(value));
                }
                pos = current;
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeue a value without blocking; `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let expected = pos.wrapping_add(1);

            if seq == expected {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        // Free the slot for the producer one lap ahead.
                        slot.sequence
                            .store(pos + self.mask + 1, Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if (seq.wrapping_sub(expected) as isize) < 0 {
                // Nothing published at this position yet.
                let current = self.dequeue_pos.load(Ordering::Relaxed);
                if current == pos {
                    return None;
                }
                pos = current;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Close the queue. Every `push` that linearizes after this call fails
    /// with [`PushError::Closed`]; `pop` keeps draining what was accepted.
    pub fn close(&self) {
        self.enqueue_pos.fetch_or(CLOSED_BIT, Ordering::Release);
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.enqueue_pos.load(Ordering::Acquire) & CLOSED_BIT != 0
    }

    /// Approximate number of queued values. Exact only when quiescent.
    pub fn len(&self) -> usize {
        let tail = self.enqueue_pos.load(Ordering::Relaxed) & !CLOSED_BIT;
        let head = self.dequeue_pos.load(Ordering::Relaxed);
        tail.saturating_sub(head)
    }

    /// Whether the queue is (approximately) empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> fmt::Debug for MpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpmcQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
