//! Interrupt-context handle
//!
//! Timer, keyboard and mouse vectors run on top of whatever process is
//! current. They never touch the PD or EVB lists: each call below is one
//! atomic publish (a fork-queue slot or a tick count), and the dispatcher
//! applies the effect at process level on its next slice.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::event::EventKey;
use crate::scheduler::KernelState;
use crate::sync::ForkQueue;

/// Deferred routine, run at process level with its `data` word
pub type ForkRoutine = fn(&mut ForkContext<'_>, u32);

/// Work queued by an interrupt handler
#[derive(Clone, Copy)]
pub enum ForkItem {
    /// Post an event key
    Post(EventKey),
    /// Call a routine (`forkq(fcode, fdata)`)
    Call(ForkRoutine, u32),
}

impl fmt::Debug for ForkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post(key) => f.debug_tuple("Post").field(key).finish(),
            Self::Call(routine, data) => f
                .debug_tuple("Call")
                .field(&(*routine as usize as *const ()))
                .field(data)
                .finish(),
        }
    }
}

/// What a fork routine may do once it runs at process level
pub struct ForkContext<'a> {
    state: &'a mut KernelState,
}

impl<'a> ForkContext<'a> {
    pub(crate) fn new(state: &'a mut KernelState) -> Self {
        Self { state }
    }

    /// Returns the number of processes woken
    pub fn post_event(&mut self, key: EventKey) -> usize {
        self.state.post_event(key)
    }

    /// Ticks since boot
    pub fn now(&self) -> u64 {
        self.state.now()
    }
}

struct Shared {
    forks: ForkQueue<ForkItem>,
    ticks: AtomicU32,
}

/// Cloned into every interrupt vector
#[derive(Clone)]
pub struct InterruptHandle {
    shared: Arc<Shared>,
}

impl InterruptHandle {
    pub fn new(fork_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                forks: ForkQueue::new(fork_capacity),
                ticks: AtomicU32::new(0),
            }),
        }
    }

    /// Queue an event post; false when the fork queue was full
    pub fn post_event(&self, key: EventKey) -> bool {
        self.shared.forks.post(ForkItem::Post(key))
    }

    /// Queue a routine for process level; false when dropped
    pub fn fork(&self, routine: ForkRoutine, data: u32) -> bool {
        self.shared.forks.post(ForkItem::Call(routine, data))
    }

    /// One timer interrupt. Only counts; delays are processed at dispatch.
    pub fn timer_tick(&self) {
        self.shared.ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Fork items lost to a full queue
    pub fn dropped(&self) -> u32 {
        self.shared.forks.dropped()
    }

    pub fn pending(&self) -> usize {
        self.shared.forks.len()
    }

    /// Ticks counted since the last dispatch
    pub(crate) fn take_ticks(&self) -> u32 {
        self.shared.ticks.swap(0, Ordering::AcqRel)
    }

    /// Apply every queued item, oldest first
    pub(crate) fn drain_forks(&self, state: &mut KernelState) -> usize {
        self.shared.forks.drain(|item| match item {
            ForkItem::Post(key) => {
                state.post_event(key);
            }
            ForkItem::Call(routine, data) => {
                let mut cx = ForkContext::new(state);
                routine(&mut cx, data);
            }
        })
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish()
    }
}
