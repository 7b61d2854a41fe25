//! Fork Queue
//!
//! Bounded FIFO from interrupt level to process level.
//!
//! Every slot carries a sequence number; a producer claims a position with
//! one CAS on `tail` and publishes the item with one release store on the
//! slot. Nothing ever waits: a full queue drops the item and bumps
//! `dropped`.
//!
//! ```text
//! slot.sequence == pos          free, producer of `pos` may write
//! slot.sequence == pos + 1      filled, consumer of `pos` may read
//! slot.sequence == pos + cap    free again for the next lap
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

pub struct ForkQueue<T: Copy> {
    slots: Box<[Slot<T>]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU32,
}

// Items are moved in and out by value; a slot is only touched by the side
// that owns its current sequence.
unsafe impl<T: Copy + Send> Send for ForkQueue<T> {}
unsafe impl<T: Copy + Send> Sync for ForkQueue<T> {}

impl<T: Copy> ForkQueue<T> {
    /// At least two slots: with one, a filled slot looks free to the
    /// next lap
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Items published or being published
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items lost to a full queue since boot
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Interrupt side. Never blocks; false when the item was dropped.
    pub fn post(&self, item: T) -> bool {
        let cap = self.capacity();
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % cap];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as isize;
            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(item) };
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Process side: take the oldest item
    pub fn pop(&self) -> Option<T> {
        let cap = self.capacity();
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % cap];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;
            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let item = unsafe { (*slot.value.get()).assume_init() };
                        slot.sequence.store(pos.wrapping_add(cap), Ordering::Release);
                        return Some(item);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Hand the items queued right now to `f`, oldest first, one at a
    /// time. Items posted while draining wait for the next drain.
    pub fn drain(&self, mut f: impl FnMut(T)) -> usize {
        let queued = self.len();
        let mut done = 0;
        while done < queued {
            match self.pop() {
                Some(item) => f(item),
                None => break,
            }
            done += 1;
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_fifo_drain() {
        let q = ForkQueue::new(4);
        for i in 0..3u32 {
            assert!(q.post(i));
        }
        let mut got = Vec::new();
        assert_eq!(q.drain(|i| got.push(i)), 3);
        assert_eq!(got, [0, 1, 2]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_overflow_drops_excess_only() {
        let q = ForkQueue::new(2);
        assert!(q.post(10u32));
        assert!(q.post(11));
        assert!(!q.post(12));
        assert!(!q.post(13));
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(10));
        assert_eq!(q.pop(), Some(11));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_wraps_around() {
        let q = ForkQueue::new(3);
        for round in 0..10u32 {
            assert!(q.post(round));
            assert!(q.post(round + 100));
            assert_eq!(q.pop(), Some(round));
            assert_eq!(q.pop(), Some(round + 100));
        }
        assert_eq!(q.dropped(), 0);
    }

    #[test]
    fn test_post_during_drain_waits_for_next_drain() {
        let q = ForkQueue::new(8);
        q.post(1u32);
        q.post(2);
        let mut got = Vec::new();
        q.drain(|i| {
            got.push(i);
            q.post(i * 10);
        });
        assert_eq!(got, [1, 2]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_concurrent_producers() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(ForkQueue::new(64));
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..32u32 {
                        q.post(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut got = Vec::new();
        q.drain(|i| got.push(i));
        assert_eq!(got.len() as u32 + q.dropped(), 128);
        // Per-producer order survives
        for t in 0..4u32 {
            let mine: Vec<_> = got.iter().filter(|&&i| i / 1000 == t).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
