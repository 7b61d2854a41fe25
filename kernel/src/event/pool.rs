//! Event Block Pool
//!
//! Lists, each EVB on exactly one:
//! - two free lists, one per tier
//! - `waiting`: armed with a key and no deadline, in arming order
//! - `delay`: armed with a deadline, sorted by deadline then arming order
//! - `zombie`: fired, until the owner collects the outcome
//!
//! Firing moves an EVB to the zombie list, so it can fire only once.

use alloc::vec::Vec;

use super::block::{EvbQueue, EventBlock};
use super::{EventKey, Tier, WaitOutcome};
use crate::error::{KernelError, KernelResult, Resource};
use crate::list::List;
use crate::process::Pid;

use EvbQueue::Detached;

pub struct EventPool {
    evbs: Vec<EventBlock>,
    free_internal: List<EvbQueue>,
    free_external: List<EvbQueue>,
    waiting: List<EvbQueue>,
    delay: List<EvbQueue>,
    zombie: List<EvbQueue>,
    internal_count: usize,
    next_seq: u64,
}

impl EventPool {
    /// Internal blocks occupy the first `internal` slots
    pub fn new(internal: usize, external: usize) -> Self {
        let mut evbs = Vec::with_capacity(internal + external);
        evbs.extend((0..internal).map(|_| EventBlock::new(Tier::Internal)));
        evbs.extend((0..external).map(|_| EventBlock::new(Tier::External)));

        let mut pool = Self {
            evbs,
            free_internal: List::new(EvbQueue::Unused(Tier::Internal)),
            free_external: List::new(EvbQueue::Unused(Tier::External)),
            waiting: List::new(EvbQueue::Waiting),
            delay: List::new(EvbQueue::Delay),
            zombie: List::new(EvbQueue::Zombie),
            internal_count: internal,
            next_seq: 0,
        };
        for i in 0..internal + external {
            // Fresh blocks are detached, cannot fail
            let _ = if i < internal {
                pool.free_internal.push_back(&mut pool.evbs, i, Detached)
            } else {
                pool.free_external.push_back(&mut pool.evbs, i, Detached)
            };
        }
        pool
    }

    pub fn capacity(&self, tier: Tier) -> usize {
        match tier {
            Tier::Internal => self.internal_count,
            Tier::External => self.evbs.len() - self.internal_count,
        }
    }

    pub fn free_count(&self, tier: Tier) -> usize {
        match tier {
            Tier::Internal => self.free_internal.len(),
            Tier::External => self.free_external.len(),
        }
    }

    /// Armed, not yet fired
    pub fn armed_count(&self) -> usize {
        self.waiting.len() + self.delay.len()
    }

    pub fn fired_count(&self) -> usize {
        self.zombie.len()
    }

    pub fn get(&self, idx: usize) -> Option<&EventBlock> {
        self.evbs.get(idx)
    }

    /// Take a free block of `tier`
    pub fn acquire(&mut self, tier: Tier) -> KernelResult<usize> {
        let free = match tier {
            Tier::Internal => &mut self.free_internal,
            Tier::External => &mut self.free_external,
        };
        match free.pop_front(&mut self.evbs, Detached) {
            Some(idx) => Ok(idx),
            None => {
                let resource = match tier {
                    Tier::Internal => Resource::InternalEventBlocks,
                    Tier::External => Resource::ExternalEventBlocks,
                };
                Err(KernelError::exhausted(resource, self.capacity(tier)))
            }
        }
    }

    /// Put an acquired block on the waiting or delay list
    pub fn arm(
        &mut self,
        idx: usize,
        pid: Pid,
        key: Option<EventKey>,
        deadline: Option<u64>,
    ) -> KernelResult<()> {
        if self.evbs[idx].queue_owner() != Detached {
            return Err(KernelError::violation("arming an event block that is not acquired"));
        }
        if key.is_none() && deadline.is_none() {
            return Err(KernelError::violation("event block needs a key or a deadline"));
        }
        let evb = &mut self.evbs[idx];
        evb.pid = Some(pid);
        evb.key = key;
        evb.deadline = deadline;
        evb.seq = self.next_seq;
        evb.outcome = None;
        self.next_seq += 1;

        match deadline {
            None => self.waiting.push_back(&mut self.evbs, idx, Detached),
            Some(when) => {
                // After every block due at or before `when`: stable order
                let mut after = None;
                for i in self.delay.iter(&self.evbs) {
                    match self.evbs[i].deadline {
                        Some(d) if d <= when => after = Some(i),
                        _ => break,
                    }
                }
                self.delay.insert_after(&mut self.evbs, after, idx, Detached)
            }
        }
    }

    fn fire(&mut self, idx: usize, outcome: WaitOutcome) -> Option<Pid> {
        self.evbs[idx].outcome = Some(outcome);
        let _ = self.zombie.push_back(&mut self.evbs, idx, Detached);
        self.evbs[idx].pid
    }

    /// Fire every armed block waiting on `key`, in arming order.
    /// Returns the owners, in firing order.
    pub fn post(&mut self, key: EventKey) -> Vec<Pid> {
        let mut matched: Vec<usize> = self
            .waiting
            .iter(&self.evbs)
            .chain(self.delay.iter(&self.evbs))
            .filter(|&i| self.evbs[i].key == Some(key))
            .collect();
        matched.sort_by_key(|&i| self.evbs[i].seq);

        let mut woken = Vec::with_capacity(matched.len());
        for idx in matched {
            let unlinked = match self.evbs[idx].queue_owner() {
                EvbQueue::Waiting => self.waiting.remove(&mut self.evbs, idx, Detached),
                EvbQueue::Delay => self.delay.remove(&mut self.evbs, idx, Detached),
                _ => false,
            };
            if unlinked {
                woken.extend(self.fire(idx, WaitOutcome::Fired));
            }
        }
        woken
    }

    /// Fire every deadline at or before `now`, earliest first
    pub fn advance(&mut self, now: u64) -> Vec<Pid> {
        let mut woken = Vec::new();
        while let Some(idx) = self.delay.front() {
            match self.evbs[idx].deadline {
                Some(d) if d <= now => {
                    self.delay.pop_front(&mut self.evbs, Detached);
                    woken.extend(self.fire(idx, WaitOutcome::TimedOut));
                }
                _ => break,
            }
        }
        woken
    }

    /// Outcome of a fired block; the block goes back to its tier
    pub fn collect(&mut self, idx: usize) -> KernelResult<WaitOutcome> {
        if self.evbs[idx].queue_owner() != EvbQueue::Zombie {
            return Err(KernelError::violation("collecting an event block that has not fired"));
        }
        let outcome = self.evbs[idx].outcome.unwrap_or(WaitOutcome::TimedOut);
        self.release(idx)?;
        Ok(outcome)
    }

    /// Return a block to the free list of its own tier, whatever list holds it
    pub fn release(&mut self, idx: usize) -> KernelResult<()> {
        let Some(evb) = self.evbs.get(idx) else {
            return Err(KernelError::violation("event block index out of range"));
        };
        match evb.queue_owner() {
            EvbQueue::Unused(_) => {
                return Err(KernelError::violation("event block freed twice"));
            }
            EvbQueue::Waiting => {
                self.waiting.remove(&mut self.evbs, idx, Detached);
            }
            EvbQueue::Delay => {
                self.delay.remove(&mut self.evbs, idx, Detached);
            }
            EvbQueue::Zombie => {
                self.zombie.remove(&mut self.evbs, idx, Detached);
            }
            EvbQueue::Detached => {}
        }
        let evb = &mut self.evbs[idx];
        evb.reset();
        match evb.tier() {
            Tier::Internal => self.free_internal.push_front(&mut self.evbs, idx, Detached),
            Tier::External => self.free_external.push_front(&mut self.evbs, idx, Detached),
        }
    }

    /// Drop every block owned by `pid`, fired or not
    pub fn cancel_for(&mut self, pid: Pid) -> usize {
        let owned: Vec<usize> = self
            .evbs
            .iter()
            .enumerate()
            .filter(|(_, evb)| {
                evb.pid == Some(pid) && !matches!(evb.queue_owner(), EvbQueue::Unused(_))
            })
            .map(|(i, _)| i)
            .collect();
        for &idx in &owned {
            let _ = self.release(idx);
        }
        owned.len()
    }

    /// Owners on the delay list, due first
    pub fn delay_order(&self) -> Vec<(Pid, u64)> {
        self.delay
            .iter(&self.evbs)
            .filter_map(|i| Some((self.evbs[i].pid?, self.evbs[i].deadline?)))
            .collect()
    }

    pub fn check_invariants(&self) -> KernelResult<()> {
        let mut seen = alloc::vec![0u8; self.evbs.len()];
        let lists = [
            &self.free_internal,
            &self.free_external,
            &self.waiting,
            &self.delay,
            &self.zombie,
        ];
        for list in lists {
            let mut count = 0;
            for idx in list.iter(&self.evbs) {
                if self.evbs[idx].queue_owner() != list.tag() {
                    return Err(KernelError::violation("EVB tag disagrees with its list"));
                }
                seen[idx] += 1;
                count += 1;
                if count > self.evbs.len() {
                    return Err(KernelError::violation("EVB list is cyclic"));
                }
            }
            if count != list.len() {
                return Err(KernelError::violation("EVB list length out of sync"));
            }
        }
        if seen.iter().any(|&n| n != 1) {
            return Err(KernelError::violation("EVB not on exactly one list"));
        }
        for idx in self.free_internal.iter(&self.evbs).chain(self.free_external.iter(&self.evbs)) {
            let evb = &self.evbs[idx];
            if evb.queue_owner() != EvbQueue::Unused(evb.tier()) {
                return Err(KernelError::violation("EVB on the free list of another tier"));
            }
        }
        let mut last: Option<(u64, u64)> = None;
        for idx in self.delay.iter(&self.evbs) {
            let evb = &self.evbs[idx];
            let here = (evb.deadline.unwrap_or(0), evb.seq);
            if last.map_or(false, |prev| prev > here) {
                return Err(KernelError::violation("delay list out of order"));
            }
            last = Some(here);
        }
        Ok(())
    }
}
