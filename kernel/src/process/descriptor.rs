//! Process Descriptor (PD)
//!
//! One cooperative task: the AES itself, the screen manager, a desk
//! accessory or the running application.

use alloc::string::String;
use core::fmt;

use super::queue::MessageQueue;
use super::state::ProcessState;
use crate::config::{NAME_LEN, NUM_PRIVILEGED};
use crate::event::Tier;
use crate::list::Linked;
use crate::scheduler::Wakeup;

/// Process id: index of the PD slot, stable for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u16);

impl Pid {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// AES main process and screen manager
    pub const fn is_privileged(self) -> bool {
        (self.0 as usize) < NUM_PRIVILEGED
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which list currently owns the PD's link field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdQueue {
    /// In transit inside a kernel operation
    Detached,
    /// Unused pool
    Unused,
    /// Run list (`rlr`)
    Ready,
    /// The running process, off every list
    Running,
    /// Woken, waiting to be appended to the run list (`drl`)
    Delayed,
    /// Blocked (`nrl`)
    NotReady,
    /// Terminated, not yet reaped
    Zombie,
}

pub struct ProcessDescriptor {
    pid: Pid,
    pub(crate) state: ProcessState,
    link: Option<usize>,
    owner: PdQueue,
    name: [u8; NAME_LEN],
    app_dir: String,
    load_address: u32,
    pub(crate) queue: MessageQueue,
    /// Delivered on the next resume
    pub(crate) wakeup: Wakeup,
    /// Event block of the pending wait
    pub(crate) wait: Option<usize>,
}

impl ProcessDescriptor {
    pub(crate) fn new(pid: Pid, queue_size: usize) -> Self {
        Self {
            pid,
            state: ProcessState::Free,
            link: None,
            owner: PdQueue::Detached,
            name: [b' '; NAME_LEN],
            app_dir: String::new(),
            load_address: 0,
            queue: MessageQueue::new(queue_size),
            wakeup: Wakeup::Started,
            wait: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn queue_owner(&self) -> PdQueue {
        self.owner
    }

    /// Event block tier this process draws from
    pub fn tier(&self) -> Tier {
        if self.pid.is_privileged() {
            Tier::Internal
        } else {
            Tier::External
        }
    }

    /// Name without the blank padding
    pub fn name(&self) -> &str {
        let end = self.name.iter().rposition(|&c| c != b' ').map_or(0, |i| i + 1);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Raw 8-byte padded name
    pub fn raw_name(&self) -> &[u8; NAME_LEN] {
        &self.name
    }

    /// Copy at most 8 bytes of `name`, blank padded
    pub fn set_name(&mut self, name: &str) {
        self.name = [b' '; NAME_LEN];
        for (dst, &src) in self.name.iter_mut().zip(name.as_bytes()) {
            *dst = src;
        }
    }

    pub fn app_dir(&self) -> &str {
        &self.app_dir
    }

    pub fn set_app_dir(&mut self, dir: &str) {
        self.app_dir.clear();
        self.app_dir.push_str(dir);
    }

    pub fn load_address(&self) -> u32 {
        self.load_address
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn setup(&mut self, name: &str, load_address: u32) {
        self.set_name(name);
        self.load_address = load_address;
        self.app_dir.clear();
        self.queue.clear();
        self.wakeup = Wakeup::Started;
        self.wait = None;
    }

    /// Back to the boot-time blank slot
    pub(crate) fn clear(&mut self) {
        self.name = [b' '; NAME_LEN];
        self.app_dir.clear();
        self.load_address = 0;
        self.queue.clear();
        self.wakeup = Wakeup::Started;
        self.wait = None;
    }
}

impl Linked for ProcessDescriptor {
    type Tag = PdQueue;

    fn link(&self) -> Option<usize> {
        self.link
    }

    fn set_link(&mut self, link: Option<usize>) {
        self.link = link;
    }

    fn owner(&self) -> PdQueue {
        self.owner
    }

    fn set_owner(&mut self, owner: PdQueue) {
        self.owner = owner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_padded_and_truncated() {
        let mut pd = ProcessDescriptor::new(Pid(3), 16);
        pd.set_name("CONTROL.ACC");
        assert_eq!(pd.raw_name(), b"CONTROL.");
        pd.set_name("CALC");
        assert_eq!(pd.raw_name(), b"CALC    ");
        assert_eq!(pd.name(), "CALC");
    }

    #[test]
    fn test_tier_follows_pid() {
        assert_eq!(ProcessDescriptor::new(Pid(1), 4).tier(), Tier::Internal);
        assert_eq!(ProcessDescriptor::new(Pid(2), 4).tier(), Tier::External);
    }
}
