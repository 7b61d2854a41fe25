//! Event subsystem
//!
//! Event blocks (EVBs) record one pending wait each: a key, a deadline, or
//! both. They come from two fixed tiers so the privileged processes can
//! never be starved by applications.

pub mod block;
pub mod pool;

pub use block::{EventBlock, EvbQueue};
pub use pool::EventPool;

use core::fmt;

use crate::process::Pid;

/// Identifies what a process waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey(pub u32);

impl EventKey {
    const MESSAGE: u32 = 0x0100_0000;
    const KEYBOARD: u32 = 0x0200_0000;
    const BUTTON: u32 = 0x0300_0000;
    const MOUSE_RECT: u32 = 0x0400_0000;
    const USER: u32 = 0x0F00_0000;

    /// Something was written to `pid`'s message queue
    pub const fn message(pid: Pid) -> Self {
        Self(Self::MESSAGE | pid.0 as u32)
    }

    pub const fn keyboard() -> Self {
        Self(Self::KEYBOARD)
    }

    pub const fn button() -> Self {
        Self(Self::BUTTON)
    }

    /// Mouse entered/left rectangle `n`
    pub const fn mouse_rect(n: u16) -> Self {
        Self(Self::MOUSE_RECT | n as u32)
    }

    /// Application-defined key
    pub const fn user(n: u16) -> Self {
        Self(Self::USER | n as u32)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The key was posted
    Fired,
    /// The deadline passed first
    TimedOut,
}

/// Event block pool tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Reserved for pids below `NUM_PRIVILEGED`
    Internal,
    /// Everyone else
    External,
}
