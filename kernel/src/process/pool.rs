//! Process Descriptor Pool
//!
//! `totpds` slots allocated at boot, threaded onto five lists:
//! unused, run (`rlr`), woken (`drl`), blocked (`nrl`) and zombie. The
//! running process is off every list and tagged `Running`.
//!
//! Round-robin only: the run list is strict FIFO, there is no priority.

use alloc::vec::Vec;

use super::descriptor::{PdQueue, Pid, ProcessDescriptor};
use super::state::{validate_transition, ProcessState};
use crate::error::{KernelError, KernelResult, Resource};
use crate::list::{Linked, List};

use PdQueue::Detached;

pub struct ProcessTable {
    pds: Vec<ProcessDescriptor>,
    unused: List<PdQueue>,
    ready: List<PdQueue>,
    delayed: List<PdQueue>,
    not_ready: List<PdQueue>,
    zombie: List<PdQueue>,
    current: Option<Pid>,
}

impl ProcessTable {
    /// All slots start on the unused list, lowest pid first
    pub fn new(total_pds: usize, queue_size: usize) -> Self {
        let mut table = Self {
            pds: (0..total_pds)
                .map(|i| ProcessDescriptor::new(Pid(i as u16), queue_size))
                .collect(),
            unused: List::new(PdQueue::Unused),
            ready: List::new(PdQueue::Ready),
            delayed: List::new(PdQueue::Delayed),
            not_ready: List::new(PdQueue::NotReady),
            zombie: List::new(PdQueue::Zombie),
            current: None,
        };
        for i in 0..total_pds {
            // Fresh slots are detached, cannot fail
            let _ = table.unused.push_back(&mut table.pds, i, Detached);
        }
        table
    }

    pub fn capacity(&self) -> usize {
        self.pds.len()
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn get(&self, pid: Pid) -> KernelResult<&ProcessDescriptor> {
        self.pds.get(pid.index()).ok_or(KernelError::InvalidProcess { pid })
    }

    pub fn get_mut(&mut self, pid: Pid) -> KernelResult<&mut ProcessDescriptor> {
        self.pds.get_mut(pid.index()).ok_or(KernelError::InvalidProcess { pid })
    }

    /// PD of a process that has been started and not terminated
    pub fn live_mut(&mut self, pid: Pid) -> KernelResult<&mut ProcessDescriptor> {
        match self.pds.get_mut(pid.index()) {
            Some(pd) if pd.state.is_live() => Ok(pd),
            _ => Err(KernelError::InvalidProcess { pid }),
        }
    }

    pub fn is_live(&self, pid: Pid) -> bool {
        self.get(pid).map_or(false, |pd| pd.state.is_live())
    }

    fn set_state(&mut self, pid: Pid, to: ProcessState) -> KernelResult<()> {
        let pd = self.get_mut(pid)?;
        if !validate_transition(pd.state, to) {
            log::error!("[PD] pid {}: invalid transition {} -> {}", pid, pd.state, to);
            return Err(KernelError::violation("invalid process state transition"));
        }
        pd.state = to;
        Ok(())
    }

    /// Take a slot off the unused list; zombies are recycled first
    pub fn allocate(&mut self) -> KernelResult<Pid> {
        self.reap();
        match self.unused.pop_front(&mut self.pds, Detached) {
            Some(idx) => Ok(Pid(idx as u16)),
            None => Err(KernelError::exhausted(Resource::ProcessSlots, self.pds.len())),
        }
    }

    /// Return a slot to the unused pool, clearing queue and name
    pub fn release(&mut self, pid: Pid) -> KernelResult<()> {
        let idx = pid.index();
        let owner = self.get(pid)?.queue_owner();
        if owner == PdQueue::Unused {
            return Err(KernelError::violation("process slot released twice"));
        }
        self.unlink(idx);
        let pd = &mut self.pds[idx];
        pd.clear();
        pd.state = ProcessState::Free;
        self.unused.push_front(&mut self.pds, idx, Detached)
    }

    /// Append to the run list (new process or yield)
    pub fn enqueue_run(&mut self, pid: Pid) -> KernelResult<()> {
        self.set_state(pid, ProcessState::Ready)?;
        if self.current == Some(pid) {
            self.current = None;
            self.pds[pid.index()].set_owner(Detached);
        }
        self.ready.push_back(&mut self.pds, pid.index(), Detached)
    }

    /// Head of the run list
    pub fn dequeue_run(&mut self) -> Option<Pid> {
        self.ready.pop_front(&mut self.pds, Detached).map(|idx| Pid(idx as u16))
    }

    pub fn set_running(&mut self, pid: Pid) -> KernelResult<()> {
        if self.pds[pid.index()].queue_owner() != Detached {
            return Err(KernelError::violation("dispatched process still on a list"));
        }
        self.set_state(pid, ProcessState::Running)?;
        self.pds[pid.index()].set_owner(PdQueue::Running);
        self.current = Some(pid);
        Ok(())
    }

    /// Running process blocks
    pub fn block(&mut self, pid: Pid, on: ProcessState) -> KernelResult<()> {
        if self.current != Some(pid) {
            return Err(KernelError::violation("only the running process can block"));
        }
        self.set_state(pid, on)?;
        self.current = None;
        self.pds[pid.index()].set_owner(Detached);
        self.not_ready.push_back(&mut self.pds, pid.index(), Detached)
    }

    /// Blocked process becomes runnable; it joins the run list at the next
    /// dispatch, in wake order
    pub fn wake(&mut self, pid: Pid) -> KernelResult<()> {
        let idx = pid.index();
        if !self.not_ready.remove(&mut self.pds, idx, Detached) {
            return Err(KernelError::violation("woken process was not blocked"));
        }
        self.set_state(pid, ProcessState::Ready)?;
        self.delayed.push_back(&mut self.pds, idx, Detached)
    }

    /// Move every woken PD to the tail of the run list
    pub fn merge_delayed(&mut self) -> usize {
        let mut moved = 0;
        while let Some(idx) = self.delayed.pop_front(&mut self.pds, Detached) {
            let _ = self.ready.push_back(&mut self.pds, idx, Detached);
            moved += 1;
        }
        moved
    }

    /// Pull a live PD off whatever list holds it and park it on the zombie list
    pub fn terminate(&mut self, pid: Pid) -> KernelResult<()> {
        self.set_state(pid, ProcessState::Terminated)?;
        let idx = pid.index();
        if self.current == Some(pid) {
            self.current = None;
        }
        self.unlink(idx);
        self.zombie.push_back(&mut self.pds, idx, Detached)
    }

    /// Recycle zombies onto the front of the unused list
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(idx) = self.zombie.pop_front(&mut self.pds, Detached) {
            let pd = &mut self.pds[idx];
            pd.clear();
            pd.state = ProcessState::Free;
            let _ = self.unused.push_front(&mut self.pds, idx, Detached);
            reaped += 1;
        }
        reaped
    }

    /// Detach `idx` from the list named by its owner tag
    fn unlink(&mut self, idx: usize) {
        match self.pds[idx].queue_owner() {
            PdQueue::Unused => {
                self.unused.remove(&mut self.pds, idx, Detached);
            }
            PdQueue::Ready => {
                self.ready.remove(&mut self.pds, idx, Detached);
            }
            PdQueue::Delayed => {
                self.delayed.remove(&mut self.pds, idx, Detached);
            }
            PdQueue::NotReady => {
                self.not_ready.remove(&mut self.pds, idx, Detached);
            }
            PdQueue::Zombie => {
                self.zombie.remove(&mut self.pds, idx, Detached);
            }
            PdQueue::Running => {
                self.pds[idx].set_owner(Detached);
                if self.current == Some(Pid(idx as u16)) {
                    self.current = None;
                }
            }
            PdQueue::Detached => {}
        }
    }

    /// Run list, head first
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.iter(&self.pds).map(|i| Pid(i as u16)).collect()
    }

    pub fn live_count(&self) -> usize {
        self.pds.iter().filter(|pd| pd.state.is_live()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessDescriptor> {
        self.pds.iter()
    }

    /// Every PD is on exactly the list its tag names (or is the running one)
    pub fn check_invariants(&self) -> KernelResult<()> {
        let mut seen = alloc::vec![0u8; self.pds.len()];
        for list in [&self.unused, &self.ready, &self.delayed, &self.not_ready, &self.zombie] {
            let mut count = 0;
            for idx in list.iter(&self.pds) {
                if self.pds[idx].queue_owner() != list.tag() {
                    return Err(KernelError::violation("PD tag disagrees with its list"));
                }
                seen[idx] += 1;
                count += 1;
                if count > self.pds.len() {
                    return Err(KernelError::violation("PD list is cyclic"));
                }
            }
            if count != list.len() {
                return Err(KernelError::violation("PD list length out of sync"));
            }
        }
        if let Some(pid) = self.current {
            if self.pds[pid.index()].queue_owner() != PdQueue::Running {
                return Err(KernelError::violation("current process not tagged running"));
            }
            seen[pid.index()] += 1;
        }
        if seen.iter().any(|&n| n != 1) {
            return Err(KernelError::violation("PD not on exactly one list"));
        }
        for pd in &self.pds {
            let expected = match pd.queue_owner() {
                PdQueue::Unused => pd.state == ProcessState::Free,
                PdQueue::Ready | PdQueue::Delayed => pd.state == ProcessState::Ready,
                PdQueue::Running => pd.state == ProcessState::Running,
                PdQueue::NotReady => pd.state.is_waiting(),
                PdQueue::Zombie => pd.state == ProcessState::Terminated,
                PdQueue::Detached => false,
            };
            if !expected {
                return Err(KernelError::violation("PD state disagrees with its list"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(table: &mut ProcessTable) -> Pid {
        let pid = table.allocate().unwrap();
        table.enqueue_run(pid).unwrap();
        pid
    }

    #[test]
    fn test_allocates_lowest_pid_first() {
        let mut table = ProcessTable::new(3, 16);
        assert_eq!(start(&mut table), Pid(0));
        assert_eq!(start(&mut table), Pid(1));
        assert_eq!(table.ready_pids(), [Pid(0), Pid(1)]);
        table.check_invariants().unwrap();
    }

    #[test]
    fn test_exhaustion() {
        let mut table = ProcessTable::new(2, 16);
        start(&mut table);
        start(&mut table);
        assert_eq!(
            table.allocate(),
            Err(KernelError::exhausted(Resource::ProcessSlots, 2))
        );
        assert_eq!(table.ready_pids(), [Pid(0), Pid(1)]);
    }

    #[test]
    fn test_block_wake_merge() {
        let mut table = ProcessTable::new(3, 16);
        let a = start(&mut table);
        let b = start(&mut table);

        let head = table.dequeue_run().unwrap();
        assert_eq!(head, a);
        table.set_running(a).unwrap();
        table.block(a, ProcessState::WaitingEvent).unwrap();
        table.check_invariants().unwrap();

        table.wake(a).unwrap();
        assert_eq!(table.get(a).unwrap().queue_owner(), PdQueue::Delayed);
        assert_eq!(table.merge_delayed(), 1);
        assert_eq!(table.ready_pids(), [b, a]);
        table.check_invariants().unwrap();
    }

    #[test]
    fn test_wake_of_unblocked_process_is_refused() {
        let mut table = ProcessTable::new(2, 16);
        let a = start(&mut table);
        assert!(matches!(table.wake(a), Err(KernelError::ProtocolViolation { .. })));
        table.check_invariants().unwrap();
    }

    #[test]
    fn test_terminated_slot_is_reused_first() {
        let mut table = ProcessTable::new(4, 16);
        let _a = start(&mut table);
        let b = start(&mut table);
        let _c = start(&mut table);
        table.terminate(b).unwrap();
        table.check_invariants().unwrap();
        assert_eq!(table.allocate().unwrap(), b);
    }

    #[test]
    fn test_release_clears_and_rejects_double_release() {
        let mut table = ProcessTable::new(2, 16);
        let a = start(&mut table);
        table.get_mut(a).unwrap().set_name("CALC");
        table.get_mut(a).unwrap().queue.write(b"xy").unwrap();
        table.release(a).unwrap();
        assert_eq!(table.get(a).unwrap().raw_name(), b"        ");
        assert_eq!(table.get(a).unwrap().pending_messages(), 0);
        assert!(table.release(a).is_err());
        table.check_invariants().unwrap();
    }
}
