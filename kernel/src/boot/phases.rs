//! Boot Phases
//!
//! AES bring-up in order:
//! - KERNEL: pools, sync blocks, PD slots
//! - PRIVILEGED: AES main process (pid 0) and screen manager (pid 1)
//! - ACCESSORIES: `*.ACC` loaded from the boot drive
//! - DESKTOP: desktop.inf read
//! - ALL_RUN: every process dispatched at least once

/// Boot phase states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BootPhase {
    /// Nothing built yet
    PreBoot = 0,
    /// Kernel state built
    Kernel = 1,
    /// Privileged processes started
    Privileged = 2,
    /// Accessories loaded (or skipped)
    Accessories = 3,
    /// desktop.inf read
    Desktop = 4,
    /// Boot complete, dispatcher handed over
    Complete = 5,
}

/// Tracks the phase of one bring-up
#[derive(Debug)]
pub struct PhaseTracker {
    current: BootPhase,
}

impl PhaseTracker {
    pub const fn new() -> Self {
        Self { current: BootPhase::PreBoot }
    }

    pub fn current(&self) -> BootPhase {
        self.current
    }

    /// Advance to next phase
    pub fn advance(&mut self, next: BootPhase) -> Result<(), &'static str> {
        if next <= self.current {
            return Err("Cannot go backwards in boot phases");
        }
        log::info!("[BOOT] phase: {:?} -> {:?}", self.current, next);
        self.current = next;
        Ok(())
    }

    /// Check if phase is at least the specified level
    pub fn is_at_least(&self, phase: BootPhase) -> bool {
        self.current >= phase
    }
}
