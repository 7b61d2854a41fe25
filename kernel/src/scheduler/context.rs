//! Services available to the running process
//!
//! Nothing here blocks. Anything that may give up the CPU is a [`Step`]
//! returned from [`Program::resume`].
//!
//! A protocol violation is still returned to the caller, but it is also
//! recorded: the dispatcher terminates the process once `resume` returns.
//!
//! [`Step`]: super::Step
//! [`Program::resume`]: super::Program::resume

use alloc::boxed::Box;

use super::program::Program;
use super::state::KernelState;
use crate::error::{KernelError, KernelResult};
use crate::event::EventKey;
use crate::process::Pid;
use crate::sync::SyncHandle;

pub struct ProcessContext<'a> {
    state: &'a mut KernelState,
    pid: Pid,
    violation: Option<KernelError>,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(state: &'a mut KernelState, pid: Pid) -> Self {
        Self { state, pid, violation: None }
    }

    /// First protocol violation raised by a service call, if any
    pub(crate) fn take_violation(&mut self) -> Option<KernelError> {
        self.violation.take()
    }

    fn checked<T>(&mut self, result: KernelResult<T>) -> KernelResult<T> {
        if let Err(err) = &result {
            if !err.is_recoverable() && self.violation.is_none() {
                self.violation = Some(*err);
            }
        }
        result
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn now(&self) -> u64 {
        self.state.now()
    }

    /// Padded name trimmed of blanks
    pub fn name(&self) -> &str {
        self.state.processes.get(self.pid).map_or("", |pd| pd.name())
    }

    pub fn post_event(&mut self, key: EventKey) -> usize {
        self.state.post_event(key)
    }

    /// Start another program; it runs after everything already queued
    pub fn start_process(
        &mut self,
        program: impl Program + 'static,
        name: &str,
        load_address: u32,
    ) -> KernelResult<Pid> {
        let result = self.state.start_process(Box::new(program), name, load_address);
        self.checked(result)
    }

    pub fn try_acquire_sync(&mut self, handle: SyncHandle) -> KernelResult<bool> {
        let result = self.state.try_acquire_sync(self.pid, handle);
        self.checked(result)
    }

    /// Returns the waiter that now owns the block, if any
    pub fn release_sync(&mut self, handle: SyncHandle) -> KernelResult<Option<Pid>> {
        let result = self.state.release_sync(self.pid, handle);
        self.checked(result)
    }

    pub fn send_message(&mut self, to: Pid, msg: &[u8]) -> KernelResult<()> {
        let result = self.state.send_message(to, msg);
        self.checked(result)
    }

    /// Bytes moved out of the own message queue
    pub fn read_message(&mut self, out: &mut [u8]) -> KernelResult<usize> {
        let result = self.state.read_message(self.pid, out);
        self.checked(result)
    }

    pub fn pending_messages(&self) -> usize {
        self.state
            .processes
            .get(self.pid)
            .map_or(0, |pd| pd.pending_messages())
    }

    pub fn app_dir(&self) -> &str {
        self.state.processes.get(self.pid).map_or("", |pd| pd.app_dir())
    }

    pub fn set_app_dir(&mut self, dir: &str) -> KernelResult<()> {
        let pd = self.state.processes.live_mut(self.pid)?;
        pd.set_app_dir(dir);
        Ok(())
    }

    /// Terminate another process. Killing oneself is a violation.
    pub fn kill(&mut self, pid: Pid) -> KernelResult<()> {
        let result = self.state.kill(pid);
        self.checked(result)
    }
}
