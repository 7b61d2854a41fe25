//! Cooperative program interface
//!
//! A process is a resumable state machine. The dispatcher calls `resume`
//! with the reason the process is running again; the process does its
//! work through the [`ProcessContext`] and returns the [`Step`] that
//! decides whether it keeps the CPU.

use super::context::ProcessContext;
use crate::error::KernelError;
use crate::event::{EventKey, WaitOutcome};
use crate::sync::SyncHandle;

/// Why a process is being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// First run after `start_process`
    Started,
    /// Back from a yield
    Yielded,
    /// The event wait ended
    Event(WaitOutcome),
    /// Now owns the sync block
    SyncGranted(SyncHandle),
    /// The previous step could not be carried out
    Failed(KernelError),
}

/// What a process asks of the dispatcher when it gives up control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Back of the run list
    Yield,
    /// Block until `key` is posted or `timeout` ticks pass.
    /// A zero timeout polls.
    WaitEvent { key: EventKey, timeout: Option<u32> },
    /// Block for `ticks` timer ticks (`evnt_timer`)
    Sleep(u32),
    /// Take a sync block, blocking while another process holds it
    AcquireSync(SyncHandle),
    /// Terminate the process
    Exit,
}

pub trait Program {
    fn resume(&mut self, cx: &mut ProcessContext<'_>, wakeup: Wakeup) -> Step;
}

impl<F> Program for F
where
    F: FnMut(&mut ProcessContext<'_>, Wakeup) -> Step,
{
    fn resume(&mut self, cx: &mut ProcessContext<'_>, wakeup: Wakeup) -> Step {
        self(cx, wakeup)
    }
}
