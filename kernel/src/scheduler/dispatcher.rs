//! Dispatcher (`dsptch`)
//!
//! One slice:
//! 1. apply what interrupt handlers queued (fork items, then timer ticks)
//! 2. reap zombies, append woken processes to the run list
//! 3. run the head of the run list until it yields, blocks or exits
//!
//! With nothing runnable the CPU is handed to the [`CpuIdle`] hook. The
//! timer tick never preempts; it only moves the clock.

use alloc::boxed::Box;

use super::context::ProcessContext;
use super::idle::{CpuIdle, NullIdle};
use super::program::{Program, Step, Wakeup};
use super::state::KernelState;
use super::stats::DispatchStats;
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::event::{EventKey, WaitOutcome};
use crate::interrupt::InterruptHandle;
use crate::process::Pid;

/// Outcome of [`Dispatcher::run_one_slice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    /// `pid` ran and gave up the CPU with `step`
    Ran { pid: Pid, step: Step },
    /// Run list empty, waited for an interrupt
    Idle,
}

pub struct Dispatcher {
    state: KernelState,
    irq: InterruptHandle,
    idle: Box<dyn CpuIdle>,
}

impl Dispatcher {
    pub fn new(config: KernelConfig) -> KernelResult<Self> {
        Self::with_idle(config, Box::new(NullIdle))
    }

    pub fn with_idle(config: KernelConfig, idle: Box<dyn CpuIdle>) -> KernelResult<Self> {
        let state = KernelState::new(config)?;
        Ok(Self {
            irq: InterruptHandle::new(config.fork_capacity),
            state,
            idle,
        })
    }

    /// Handle to give to interrupt vectors
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.irq.clone()
    }

    pub fn state(&self) -> &KernelState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut KernelState {
        &mut self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.state.stats()
    }

    pub fn now(&self) -> u64 {
        self.state.now()
    }

    pub fn start_process(
        &mut self,
        program: impl Program + 'static,
        name: &str,
        load_address: u32,
    ) -> KernelResult<Pid> {
        self.state.start_process(Box::new(program), name, load_address)
    }

    /// Process-level post (from outside any process)
    pub fn post_event(&mut self, key: EventKey) -> usize {
        self.state.post_event(key)
    }

    /// Force-terminate a process, wherever it waits
    pub fn kill(&mut self, pid: Pid) -> KernelResult<()> {
        self.state.kill(pid)
    }

    pub fn check_invariants(&self) -> KernelResult<()> {
        self.state.check_invariants()
    }

    /// Run queue, head first
    pub fn ready_pids(&self) -> alloc::vec::Vec<Pid> {
        self.state.processes.ready_pids()
    }

    fn service_interrupts(&mut self) {
        let forks = self.irq.drain_forks(&mut self.state);
        let ticks = self.irq.take_ticks();
        if ticks > 0 {
            self.state.advance_clock(ticks);
        }
        if forks > 0 {
            log::trace!("[DISPATCH] {} fork items, {} ticks", forks, ticks);
        }
    }

    pub fn run_one_slice(&mut self) -> KernelResult<Slice> {
        self.service_interrupts();
        self.state.processes.reap();
        self.state.processes.merge_delayed();

        let Some(pid) = self.state.processes.dequeue_run() else {
            self.state.stats.record_idle();
            self.idle.wait_for_interrupt();
            return Ok(Slice::Idle);
        };
        self.state.processes.set_running(pid)?;
        self.state.stats.record_slice();

        let Some(mut program) = self.state.programs[pid.index()].take() else {
            let err = crate::kernel_error!(KernelError::violation("scheduled process has no program"));
            let _ = self.state.terminate(pid);
            return Err(err);
        };
        let mut wakeup = match self.state.take_wakeup(pid) {
            Ok(wakeup) => wakeup,
            Err(err) => Wakeup::Failed(err),
        };

        let step = loop {
            let (step, violation) = {
                let mut cx = ProcessContext::new(&mut self.state, pid);
                let step = program.resume(&mut cx, wakeup);
                (step, cx.take_violation())
            };
            if let Some(err) = violation {
                let err = crate::kernel_error!(err);
                log::error!("[DISPATCH] pid {} terminated after a protocol violation", pid);
                let _ = self.state.terminate(pid);
                return Err(err);
            }
            match self.settle(pid, step) {
                Ok(Some(again)) => wakeup = again,
                Ok(None) => break step,
                Err(err) => {
                    // The process is still current: take it down with the lists intact
                    let err = crate::kernel_error!(err);
                    let _ = self.state.terminate(pid);
                    return Err(err);
                }
            }
        };

        if self.state.processes.is_live(pid) {
            self.state.programs[pid.index()] = Some(program);
        }
        crate::kernel_assert!(
            self.state.processes.current().is_none(),
            "process still current after its slice"
        );
        Ok(Slice::Ran { pid, step })
    }

    /// Apply the step of the running process. `Some` keeps it on the CPU
    /// with that wakeup; `None` means it switched out.
    fn settle(&mut self, pid: Pid, step: Step) -> KernelResult<Option<Wakeup>> {
        let st = &mut self.state;
        match step {
            Step::Yield => {
                st.stats.record_yield();
                st.requeue(pid, Wakeup::Yielded)?;
                Ok(None)
            }
            // Zero delay: a yield that reports the timeout
            Step::Sleep(0) | Step::WaitEvent { timeout: Some(0), .. } => {
                st.stats.record_yield();
                st.requeue(pid, Wakeup::Event(WaitOutcome::TimedOut))?;
                Ok(None)
            }
            Step::WaitEvent { key, timeout } => {
                Self::refused(st.block_on_event(pid, Some(key), timeout).map(|()| None))
            }
            Step::Sleep(ticks) => {
                Self::refused(st.block_on_event(pid, None, Some(ticks)).map(|()| None))
            }
            Step::AcquireSync(handle) => Self::refused(
                st.acquire_sync(pid, handle)
                    .map(|granted| granted.then_some(Wakeup::SyncGranted(handle))),
            ),
            Step::Exit => {
                st.terminate(pid)?;
                Ok(None)
            }
        }
    }

    /// A recoverable refusal goes back to the process in the same slice
    fn refused(result: KernelResult<Option<Wakeup>>) -> KernelResult<Option<Wakeup>> {
        match result {
            Err(err) if err.is_recoverable() => {
                log::debug!("[DISPATCH] request refused: {}", err);
                Ok(Some(Wakeup::Failed(err)))
            }
            other => other,
        }
    }

    /// Dispatch until the run list is empty or `limit` slices ran.
    /// Returns the number of slices that ran a process.
    pub fn run_until_idle(&mut self, limit: usize) -> KernelResult<usize> {
        let mut ran = 0;
        while ran < limit {
            match self.run_one_slice()? {
                Slice::Ran { .. } => ran += 1,
                Slice::Idle => break,
            }
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncHandle;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    fn dispatcher(total: usize) -> Dispatcher {
        Dispatcher::new(KernelConfig::new().with_total_pds(total)).unwrap()
    }

    /// Yields `n` times then exits, logging each resume
    fn counter(log: &Rc<RefCell<Vec<(Pid, Wakeup)>>>, n: usize) -> impl Program {
        let log = Rc::clone(log);
        let mut left = n;
        move |cx: &mut ProcessContext<'_>, wakeup: Wakeup| {
            log.borrow_mut().push((cx.pid(), wakeup));
            if left == 0 {
                return Step::Exit;
            }
            left -= 1;
            Step::Yield
        }
    }

    #[test]
    fn test_round_robin() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut d = dispatcher(4);
        let a = d.start_process(counter(&log, 1), "A", 0).unwrap();
        let b = d.start_process(counter(&log, 1), "B", 0).unwrap();
        assert_eq!(d.run_until_idle(100).unwrap(), 4);
        let order: Vec<Pid> = log.borrow().iter().map(|&(p, _)| p).collect();
        assert_eq!(order, [a, b, a, b]);
        assert_eq!(log.borrow()[0].1, Wakeup::Started);
        assert_eq!(log.borrow()[2].1, Wakeup::Yielded);
        assert_eq!(d.stats().terminations, 2);
        d.check_invariants().unwrap();
    }

    #[test]
    fn test_empty_run_list_idles() {
        let mut d = Dispatcher::with_idle(KernelConfig::default(), Box::new(NullIdle)).unwrap();
        assert_eq!(d.run_one_slice(), Ok(Slice::Idle));
        assert_eq!(d.stats().idle_slices, 1);
    }

    #[test]
    fn test_idle_hook_runs_interrupts() {
        let mut d = dispatcher(4);
        let irq = d.interrupt_handle();
        let ticks = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&ticks);
        d.idle = Box::new(move || {
            irq.timer_tick();
            *seen.borrow_mut() += 1;
        });
        d.start_process(
            |_: &mut ProcessContext<'_>, w: Wakeup| match w {
                Wakeup::Started => Step::Sleep(3),
                _ => Step::Exit,
            },
            "NAP",
            0,
        )
        .unwrap();
        let mut slices = 0;
        while d.stats().terminations == 0 && slices < 20 {
            d.run_one_slice().unwrap();
            slices += 1;
        }
        assert_eq!(d.stats().terminations, 1);
        assert_eq!(*ticks.borrow(), 3);
        assert!(d.now() >= 3);
    }

    #[test]
    fn test_failed_request_keeps_cpu() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&log);
        let mut d = dispatcher(4);
        d.start_process(
            move |_: &mut ProcessContext<'_>, w: Wakeup| {
                seen.borrow_mut().push(w);
                match w {
                    Wakeup::Started => Step::AcquireSync(SyncHandle(7)),
                    _ => Step::Exit,
                }
            },
            "BAD",
            0,
        )
        .unwrap();
        let slice = d.run_one_slice().unwrap();
        assert_eq!(slice, Slice::Ran { pid: Pid(0), step: Step::Exit });
        assert_eq!(
            log.borrow()[1],
            Wakeup::Failed(KernelError::InvalidSyncHandle { handle: SyncHandle(7) })
        );
    }

    #[test]
    fn test_interrupt_post_wakes_waiter() {
        let mut d = dispatcher(4);
        let irq = d.interrupt_handle();
        let got = Rc::new(RefCell::new(None));
        let seen = Rc::clone(&got);
        d.start_process(
            move |_: &mut ProcessContext<'_>, w: Wakeup| match w {
                Wakeup::Started => Step::WaitEvent { key: EventKey::keyboard(), timeout: None },
                other => {
                    *seen.borrow_mut() = Some(other);
                    Step::Exit
                }
            },
            "KBD",
            0,
        )
        .unwrap();
        d.run_one_slice().unwrap();
        assert_eq!(d.run_one_slice(), Ok(Slice::Idle));
        irq.post_event(EventKey::keyboard());
        d.run_one_slice().unwrap();
        assert_eq!(*got.borrow(), Some(Wakeup::Event(WaitOutcome::Fired)));
        d.check_invariants().unwrap();
    }

    #[test]
    fn test_zero_timeout_polls() {
        let mut d = dispatcher(4);
        d.start_process(
            |_: &mut ProcessContext<'_>, w: Wakeup| match w {
                Wakeup::Started => Step::WaitEvent { key: EventKey::button(), timeout: Some(0) },
                Wakeup::Event(WaitOutcome::TimedOut) => Step::Exit,
                _ => Step::Yield,
            },
            "POLL",
            0,
        )
        .unwrap();
        assert_eq!(d.run_until_idle(10).unwrap(), 2);
        assert_eq!(d.stats().event_blocks, 0);
    }
}
