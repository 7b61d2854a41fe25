//! Kernel State
//!
//! Everything the AES kernel keeps between dispatches: the PD and EVB
//! pools, the sync blocks, the program behind each live pid and the tick
//! clock. Built once at boot and owned by the dispatcher.
//!
//! Every operation here runs at process level. Interrupt handlers reach
//! it only through the fork queue.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::program::{Program, Wakeup};
use super::stats::DispatchStats;
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::event::{EventKey, EventPool, Tier};
use crate::process::{Pid, ProcessState, ProcessTable};
use crate::sync::{SyncBlock, SyncHandle};

pub struct KernelState {
    config: KernelConfig,
    pub(crate) processes: ProcessTable,
    pub(crate) events: EventPool,
    syncs: Vec<SyncBlock>,
    pub(crate) programs: Vec<Option<Box<dyn Program>>>,
    now: u64,
    pub(crate) stats: DispatchStats,
}

impl KernelState {
    pub fn new(config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        // External EVBs are only linked when applications can exist
        let external = if config.has_external_tier() { config.external_evbs } else { 0 };
        log::debug!(
            "[KERNEL] {} PDs, {}+{} EVBs, {} sync blocks",
            config.total_pds,
            config.internal_evbs,
            external,
            config.sync_blocks
        );
        Ok(Self {
            config,
            processes: ProcessTable::new(config.total_pds, config.queue_size),
            events: EventPool::new(config.internal_evbs, external),
            syncs: (0..config.sync_blocks).map(|_| SyncBlock::new()).collect(),
            programs: (0..config.total_pds).map(|_| None).collect(),
            now: 0,
            stats: DispatchStats::new(),
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Ticks since boot
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn events(&self) -> &EventPool {
        &self.events
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn sync(&self, handle: SyncHandle) -> KernelResult<&SyncBlock> {
        self.syncs
            .get(handle.index())
            .ok_or(KernelError::InvalidSyncHandle { handle })
    }

    fn sync_mut(&mut self, handle: SyncHandle) -> KernelResult<&mut SyncBlock> {
        self.syncs
            .get_mut(handle.index())
            .ok_or(KernelError::InvalidSyncHandle { handle })
    }

    // ========================================================================
    // PROCESS LIFECYCLE
    // ========================================================================

    /// Allocate a PD and put the program at the tail of the run list
    pub fn start_process(
        &mut self,
        program: Box<dyn Program>,
        name: &str,
        load_address: u32,
    ) -> KernelResult<Pid> {
        let pid = self.processes.allocate()?;
        self.processes.get_mut(pid)?.setup(name, load_address);
        self.programs[pid.index()] = Some(program);
        if let Err(err) = self.processes.enqueue_run(pid) {
            self.programs[pid.index()] = None;
            let _ = self.processes.release(pid);
            return Err(err);
        }
        self.stats.record_spawn();
        log::info!("[PD] started pid {} '{}' at {:#x}", pid, name, load_address);
        Ok(pid)
    }

    /// Terminate another process. The running one leaves with `Step::Exit`.
    pub fn kill(&mut self, pid: Pid) -> KernelResult<()> {
        if self.processes.current() == Some(pid) {
            return Err(KernelError::violation("running process cannot be killed, it must exit"));
        }
        self.terminate(pid)
    }

    /// Cancel waits, drop sync ownership, park the PD on the zombie list
    pub(crate) fn terminate(&mut self, pid: Pid) -> KernelResult<()> {
        if !self.processes.is_live(pid) {
            return Err(KernelError::InvalidProcess { pid });
        }
        // Fired or not, every EVB of the process goes back to its tier
        let cancelled = self.events.cancel_for(pid);

        let mut grants = Vec::new();
        for (i, spb) in self.syncs.iter_mut().enumerate() {
            spb.remove_waiter(pid);
            if spb.owner() == Some(pid) {
                log::warn!("[SYNC] pid {} exited holding spb{}, releasing", pid, i);
                if let Some(next) = spb.force_release(pid) {
                    grants.push((SyncHandle(i as u16), next));
                }
            }
        }
        for (handle, next) in grants {
            self.grant(handle, next);
        }

        self.processes.get_mut(pid)?.wait = None;
        self.processes.terminate(pid)?;
        self.programs[pid.index()] = None;
        self.stats.record_termination();
        log::info!("[PD] pid {} terminated ({} event blocks cancelled)", pid, cancelled);
        Ok(())
    }

    /// Running process goes to the tail of the run list
    pub(crate) fn requeue(&mut self, pid: Pid, wakeup: Wakeup) -> KernelResult<()> {
        self.processes.get_mut(pid)?.wakeup = wakeup;
        self.processes.enqueue_run(pid)
    }

    /// Wakeup to deliver on the next resume; collects a fired EVB
    pub(crate) fn take_wakeup(&mut self, pid: Pid) -> KernelResult<Wakeup> {
        let pd = self.processes.get_mut(pid)?;
        let wait = pd.wait.take();
        let pending = core::mem::replace(&mut pd.wakeup, Wakeup::Yielded);
        match wait {
            Some(idx) => Ok(Wakeup::Event(self.events.collect(idx)?)),
            None => Ok(pending),
        }
    }

    fn wake(&mut self, pid: Pid) {
        if let Err(err) = self.processes.wake(pid) {
            log::warn!("[PD] cannot wake pid {}: {}", pid, err);
        }
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    /// Fire every wait on `key`; returns the number of processes woken
    pub fn post_event(&mut self, key: EventKey) -> usize {
        let woken = self.events.post(key);
        self.stats.record_fired(woken.len());
        for &pid in &woken {
            log::trace!("[EVB] {} wakes pid {}", key, pid);
            self.wake(pid);
        }
        woken.len()
    }

    /// Move the clock and fire every expired deadline
    pub fn advance_clock(&mut self, ticks: u32) -> usize {
        self.now += u64::from(ticks);
        let expired = self.events.advance(self.now);
        self.stats.record_timeouts(expired.len());
        for &pid in &expired {
            self.wake(pid);
        }
        expired.len()
    }

    /// Running process waits on `key` and/or `timeout` ticks
    pub(crate) fn block_on_event(
        &mut self,
        pid: Pid,
        key: Option<EventKey>,
        timeout: Option<u32>,
    ) -> KernelResult<()> {
        let tier = self.processes.get(pid)?.tier();
        let idx = self.events.acquire(tier)?;
        let deadline = timeout.map(|t| self.now + u64::from(t));
        let armed = self
            .events
            .arm(idx, pid, key, deadline)
            .and_then(|()| self.processes.block(pid, ProcessState::WaitingEvent));
        if let Err(err) = armed {
            let _ = self.events.release(idx);
            return Err(err);
        }
        self.processes.get_mut(pid)?.wait = Some(idx);
        self.stats.record_event_block();
        Ok(())
    }

    /// Free event blocks of `tier`
    pub fn free_event_blocks(&self, tier: Tier) -> usize {
        self.events.free_count(tier)
    }

    // ========================================================================
    // SYNC BLOCKS
    // ========================================================================

    pub fn try_acquire_sync(&mut self, pid: Pid, handle: SyncHandle) -> KernelResult<bool> {
        Ok(self.sync_mut(handle)?.try_acquire(pid))
    }

    /// True when granted on the spot; otherwise the process is now blocked
    pub(crate) fn acquire_sync(&mut self, pid: Pid, handle: SyncHandle) -> KernelResult<bool> {
        if self.sync_mut(handle)?.try_acquire(pid) {
            return Ok(true);
        }
        self.processes.block(pid, ProcessState::WaitingSync)?;
        self.sync_mut(handle)?.enqueue(pid);
        self.stats.record_sync_block();
        log::trace!("[SYNC] pid {} waits for {}", pid, handle);
        Ok(false)
    }

    /// Only the owner may release; the oldest waiter gets the block
    pub fn release_sync(&mut self, pid: Pid, handle: SyncHandle) -> KernelResult<Option<Pid>> {
        let next = self.sync_mut(handle)?.release(pid)?;
        if let Some(next) = next {
            self.grant(handle, next);
        }
        Ok(next)
    }

    fn grant(&mut self, handle: SyncHandle, pid: Pid) {
        if let Ok(pd) = self.processes.get_mut(pid) {
            pd.wakeup = Wakeup::SyncGranted(handle);
        }
        self.wake(pid);
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Append to `to`'s queue and wake a reader blocked on it
    pub fn send_message(&mut self, to: Pid, msg: &[u8]) -> KernelResult<()> {
        self.processes.live_mut(to)?.queue.write(msg)?;
        self.post_event(EventKey::message(to));
        Ok(())
    }

    pub fn read_message(&mut self, pid: Pid, out: &mut [u8]) -> KernelResult<usize> {
        Ok(self.processes.live_mut(pid)?.queue.read(out))
    }

    // ========================================================================
    // CONSISTENCY
    // ========================================================================

    pub fn check_invariants(&self) -> KernelResult<()> {
        self.processes.check_invariants()?;
        self.events.check_invariants()?;
        for spb in &self.syncs {
            spb.check_invariant()?;
            if let Some(owner) = spb.owner() {
                if !self.processes.is_live(owner) {
                    return Err(KernelError::violation("sync block owned by a dead process"));
                }
            }
        }
        for pd in self.processes.iter() {
            if pd.state() == ProcessState::WaitingEvent && pd.wait.is_none() {
                return Err(KernelError::violation("waiting process without event block"));
            }
            // A woken process keeps its fired EVB until it runs
            if pd.wait.is_some()
                && !matches!(pd.state(), ProcessState::WaitingEvent | ProcessState::Ready)
            {
                return Err(KernelError::violation("event block held outside a wait"));
            }
            let has_program = self.programs[pd.pid().index()].is_some();
            if pd.state().is_live() && pd.state() != ProcessState::Running && !has_program {
                return Err(KernelError::violation("live process without a program"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WaitOutcome;
    use crate::scheduler::{ProcessContext, Step};

    fn idle_program() -> Box<dyn Program> {
        Box::new(|_: &mut ProcessContext<'_>, _: Wakeup| Step::Yield)
    }

    fn state(total: usize) -> KernelState {
        KernelState::new(KernelConfig::new().with_total_pds(total)).unwrap()
    }

    fn run(state: &mut KernelState) -> Pid {
        let pid = state.processes.dequeue_run().unwrap();
        state.processes.set_running(pid).unwrap();
        pid
    }

    #[test]
    fn test_external_tier_needs_applications() {
        let small = state(2);
        assert_eq!(small.free_event_blocks(Tier::External), 0);
        let full = state(8);
        assert_eq!(full.free_event_blocks(Tier::External), 30);
    }

    #[test]
    fn test_message_wakes_reader() {
        let mut st = state(4);
        let reader = st.start_process(idle_program(), "READER", 0).unwrap();
        assert_eq!(run(&mut st), reader);
        st.block_on_event(reader, Some(EventKey::message(reader)), None).unwrap();

        st.send_message(reader, b"hi").unwrap();
        assert_eq!(st.processes.get(reader).unwrap().state(), ProcessState::Ready);
        assert_eq!(st.take_wakeup(reader), Ok(Wakeup::Event(WaitOutcome::Fired)));
        let mut out = [0u8; 4];
        assert_eq!(st.read_message(reader, &mut out), Ok(2));
        st.check_invariants().unwrap();
    }

    #[test]
    fn test_timeout_fires_after_deadline() {
        let mut st = state(4);
        let pid = st.start_process(idle_program(), "SLEEPER", 0).unwrap();
        run(&mut st);
        st.block_on_event(pid, Some(EventKey::keyboard()), Some(3)).unwrap();
        assert_eq!(st.advance_clock(2), 0);
        assert_eq!(st.advance_clock(1), 1);
        assert_eq!(st.post_event(EventKey::keyboard()), 0);
        assert_eq!(st.take_wakeup(pid), Ok(Wakeup::Event(WaitOutcome::TimedOut)));
    }

    #[test]
    fn test_kill_releases_sync_to_next_waiter() {
        let mut st = state(4);
        let a = st.start_process(idle_program(), "A", 0).unwrap();
        let b = st.start_process(idle_program(), "B", 0).unwrap();
        run(&mut st);
        assert_eq!(st.acquire_sync(a, SyncHandle::WINDOW_UPDATE), Ok(true));
        st.requeue(a, Wakeup::Yielded).unwrap();
        run(&mut st);
        assert_eq!(st.acquire_sync(b, SyncHandle::WINDOW_UPDATE), Ok(false));

        st.kill(a).unwrap();
        assert_eq!(st.sync(SyncHandle::WINDOW_UPDATE).unwrap().owner(), Some(b));
        assert_eq!(
            st.take_wakeup(b),
            Ok(Wakeup::SyncGranted(SyncHandle::WINDOW_UPDATE))
        );
        st.check_invariants().unwrap();
    }

    #[test]
    fn test_bad_sync_handle() {
        let mut st = state(4);
        assert_eq!(
            st.try_acquire_sync(Pid(0), SyncHandle(9)),
            Err(KernelError::InvalidSyncHandle { handle: SyncHandle(9) })
        );
    }
}
