//! State - Process state machine
//!
//! Ready -> Running -> {WaitingEvent | WaitingSync | Terminated} -> Ready ...

use core::fmt;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessState {
    /// Slot sits on the unused list
    Free = 0,

    /// On the run list, waiting for its turn
    Ready = 1,

    /// Currently running (at most one)
    Running = 2,

    /// Blocked on an event block (key and/or deadline)
    WaitingEvent = 3,

    /// Blocked on a sync block
    WaitingSync = 4,

    /// Exited or killed, waiting to be reaped
    Terminated = 5,
}

impl ProcessState {
    /// Check if state is waiting on something
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::WaitingEvent | Self::WaitingSync)
    }

    /// Slot holds a process that has not exited
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Free | Self::Terminated)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::WaitingEvent => write!(f, "WaitingEvent"),
            Self::WaitingSync => write!(f, "WaitingSync"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Validate state transition
pub fn validate_transition(from: ProcessState, to: ProcessState) -> bool {
    use ProcessState::*;

    match (from, to) {
        // Free -> Ready (started)
        (Free, Ready) => true,

        // Ready -> Running (selected by the dispatcher)
        (Ready, Running) => true,

        // Running -> Ready (yield, or sync granted on the spot)
        (Running, Ready) => true,

        // Running -> blocked
        (Running, WaitingEvent) => true,
        (Running, WaitingSync) => true,

        // Blocked -> Ready (event fired, sync handed over)
        (WaitingEvent, Ready) => true,
        (WaitingSync, Ready) => true,

        // Anything live can be killed
        (Ready | Running | WaitingEvent | WaitingSync, Terminated) => true,

        // Terminated -> Free (reaped)
        (Terminated, Free) => true,

        // All other transitions invalid
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use ProcessState::*;
        let path = [Free, Ready, Running, WaitingEvent, Ready, Running, Terminated, Free];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        use ProcessState::*;
        assert!(!validate_transition(Free, Running));
        assert!(!validate_transition(WaitingSync, Running));
        assert!(!validate_transition(Terminated, Ready));
        assert!(!validate_transition(Free, Terminated));
    }
}
