//! Idle handling
//!
//! When the run list is empty the dispatcher must not spin: it hands the
//! CPU to a [`CpuIdle`] until the next interrupt. On the target this is
//! `stop #$2000`; hosted builds plug in something that advances a
//! simulated clock, or nothing at all.

/// Halt until an interrupt arrives
pub trait CpuIdle {
    fn wait_for_interrupt(&mut self);
}

/// Returns at once (hosted use)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIdle;

impl CpuIdle for NullIdle {
    fn wait_for_interrupt(&mut self) {
        core::hint::spin_loop();
    }
}

impl<F: FnMut()> CpuIdle for F {
    fn wait_for_interrupt(&mut self) {
        self()
    }
}
