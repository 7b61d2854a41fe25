//! Sync Block (SPB)
//!
//! Mutual exclusion between cooperative processes: a test-and-set count,
//! the owner and a FIFO of blocked waiters. The window-update lock
//! (`wind_update`) is handle 0.
//!
//! Ownership is recursive: the owner may take the block again, each take
//! needs a matching release.

use alloc::collections::VecDeque;
use core::fmt;

use crate::error::{KernelError, KernelResult};
use crate::process::Pid;

/// Index of a sync block in the kernel's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncHandle(pub u16);

impl SyncHandle {
    /// `wind_spb`, guards screen updates
    pub const WINDOW_UPDATE: SyncHandle = SyncHandle(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spb{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct SyncBlock {
    /// Nesting depth, non-zero iff owned
    tas: u16,
    owner: Option<Pid>,
    waiters: VecDeque<Pid>,
}

impl SyncBlock {
    pub const fn new() -> Self {
        Self {
            tas: 0,
            owner: None,
            waiters: VecDeque::new(),
        }
    }

    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    pub fn depth(&self) -> u16 {
        self.tas
    }

    pub fn is_locked(&self) -> bool {
        self.tas != 0
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn waiters(&self) -> impl Iterator<Item = Pid> + '_ {
        self.waiters.iter().copied()
    }

    /// Test-and-set; true when `pid` now holds the block
    pub fn try_acquire(&mut self, pid: Pid) -> bool {
        match self.owner {
            None => {
                self.tas = 1;
                self.owner = Some(pid);
                true
            }
            Some(owner) if owner == pid => {
                self.tas = self.tas.saturating_add(1);
                true
            }
            Some(_) => false,
        }
    }

    /// Queue a process that failed `try_acquire`
    pub fn enqueue(&mut self, pid: Pid) {
        if !self.waiters.contains(&pid) {
            self.waiters.push_back(pid);
        }
    }

    /// Drop one level of ownership. When the last level goes, the block
    /// passes to the oldest waiter, which is returned.
    pub fn release(&mut self, pid: Pid) -> KernelResult<Option<Pid>> {
        if self.owner != Some(pid) {
            log::error!("[SYNC] pid {} released a sync block owned by {:?}", pid, self.owner);
            return Err(KernelError::violation("sync block released by a process that does not own it"));
        }
        self.tas -= 1;
        if self.tas > 0 {
            return Ok(None);
        }
        Ok(self.hand_over())
    }

    /// Release every level held by a dying owner
    pub fn force_release(&mut self, pid: Pid) -> Option<Pid> {
        if self.owner != Some(pid) {
            return None;
        }
        self.tas = 0;
        self.hand_over()
    }

    fn hand_over(&mut self) -> Option<Pid> {
        self.owner = self.waiters.pop_front();
        if self.owner.is_some() {
            self.tas = 1;
        }
        self.owner
    }

    /// Forget a waiter that is being killed
    pub fn remove_waiter(&mut self, pid: Pid) -> bool {
        match self.waiters.iter().position(|&p| p == pid) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn check_invariant(&self) -> KernelResult<()> {
        if (self.tas != 0) != self.owner.is_some() {
            return Err(KernelError::violation("sync block count and owner disagree"));
        }
        if self.owner.is_none() && !self.waiters.is_empty() {
            return Err(KernelError::violation("sync block has waiters but no owner"));
        }
        Ok(())
    }
}
