//! Event Control Block (EVB)

use super::{EventKey, Tier, WaitOutcome};
use crate::list::Linked;
use crate::process::Pid;

/// Which list currently owns the EVB's link field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvbQueue {
    Detached,
    /// Free list of the given tier (`eul`)
    Unused(Tier),
    /// Armed, keyed, no deadline
    Waiting,
    /// Armed with a deadline, sorted (`dlr`)
    Delay,
    /// Fired, outcome not collected yet (`zlr`)
    Zombie,
}

pub struct EventBlock {
    link: Option<usize>,
    owner: EvbQueue,
    tier: Tier,
    pub(crate) pid: Option<Pid>,
    pub(crate) key: Option<EventKey>,
    /// Absolute tick
    pub(crate) deadline: Option<u64>,
    /// Arming order, breaks ties
    pub(crate) seq: u64,
    pub(crate) outcome: Option<WaitOutcome>,
}

impl EventBlock {
    pub(crate) const fn new(tier: Tier) -> Self {
        Self {
            link: None,
            owner: EvbQueue::Detached,
            tier,
            pid: None,
            key: None,
            deadline: None,
            seq: 0,
            outcome: None,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn queue_owner(&self) -> EvbQueue {
        self.owner
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn key(&self) -> Option<EventKey> {
        self.key
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn outcome(&self) -> Option<WaitOutcome> {
        self.outcome
    }

    pub(crate) fn reset(&mut self) {
        self.pid = None;
        self.key = None;
        self.deadline = None;
        self.seq = 0;
        self.outcome = None;
    }
}

impl Linked for EventBlock {
    type Tag = EvbQueue;

    fn link(&self) -> Option<usize> {
        self.link
    }

    fn set_link(&mut self, link: Option<usize>) {
        self.link = link;
    }

    fn owner(&self) -> EvbQueue {
        self.owner
    }

    fn set_owner(&mut self, owner: EvbQueue) {
        self.owner = owner;
    }
}
