//! Kernel Error Handling
//!
//! Typed errors for every scheduler-core operation, with recovery hints.
//!
//! Two families matter to callers:
//! - `ResourceExhausted`: a fixed pool ran dry. The caller recovers
//!   ("cannot launch, close an application first").
//! - `ProtocolViolation`: a logic bug (releasing a sync block one does not
//!   own, double free of an event block). Fatal for the subsystem; the
//!   operation is refused before any shared list is touched.
//!
//! A timed-out wait is not an error, see [`crate::event::WaitOutcome`].

use core::fmt;

use crate::process::Pid;
use crate::sync::SyncHandle;

/// Fixed-size pools that can run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Process descriptor slots (`totpds`)
    ProcessSlots,
    /// Event blocks reserved for the privileged processes
    InternalEventBlocks,
    /// Event blocks shared by applications and accessories
    ExternalEventBlocks,
    /// Bytes left in a process message queue
    MessageQueue,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessSlots => write!(f, "process slots"),
            Self::InternalEventBlocks => write!(f, "internal event blocks"),
            Self::ExternalEventBlocks => write!(f, "external event blocks"),
            Self::MessageQueue => write!(f, "message queue"),
        }
    }
}

/// Kernel error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    // ═══════════════════════════════════════════════════════════════
    // Pool Errors
    // ═══════════════════════════════════════════════════════════════

    /// A fixed pool has no free entry left
    ResourceExhausted { resource: Resource, capacity: usize },

    // ═══════════════════════════════════════════════════════════════
    // Internal Consistency Errors
    // ═══════════════════════════════════════════════════════════════

    /// Caller broke the kernel protocol (not recoverable)
    ProtocolViolation { reason: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Argument Errors
    // ═══════════════════════════════════════════════════════════════

    /// No live process with this pid
    InvalidProcess { pid: Pid },

    /// No sync block behind this handle
    InvalidSyncHandle { handle: SyncHandle },

    /// Configuration rejected at boot
    InvalidConfig { reason: &'static str },

    /// Program loader refused the image (DOS error code)
    LoadFailed { code: i16 },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted { resource, capacity } => {
                write!(f, "No {} left (capacity {})", resource, capacity)
            }
            Self::ProtocolViolation { reason } => {
                write!(f, "Protocol violation: {}", reason)
            }
            Self::InvalidProcess { pid } => write!(f, "Process {} not found", pid),
            Self::InvalidSyncHandle { handle } => {
                write!(f, "Sync block {} does not exist", handle.index())
            }
            Self::InvalidConfig { reason } => write!(f, "Invalid configuration: {}", reason),
            Self::LoadFailed { code } => write!(f, "Program load failed (code {})", code),
        }
    }
}

impl KernelError {
    /// Shorthand used by the pools
    pub const fn exhausted(resource: Resource, capacity: usize) -> Self {
        Self::ResourceExhausted { resource, capacity }
    }

    /// Shorthand for fatal consistency failures
    pub const fn violation(reason: &'static str) -> Self {
        Self::ProtocolViolation { reason }
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ResourceExhausted { resource: Resource::ProcessSlots, .. } => {
                "Cannot start new application: close an application first"
            }
            Self::ResourceExhausted { resource: Resource::MessageQueue, .. } => {
                "Receiver must read its queue before more messages fit"
            }
            Self::ResourceExhausted { .. } => "Wait for pending events to complete",
            Self::ProtocolViolation { .. } => "Logic bug: reset the affected subsystem",
            Self::InvalidProcess { .. } => "Process may have already terminated",
            Self::InvalidSyncHandle { .. } => "Use a handle returned by the kernel",
            Self::InvalidConfig { .. } => "Check the pool sizes in KernelConfig",
            Self::LoadFailed { .. } => "Check that the program file exists and is valid",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ProtocolViolation { .. } | Self::InvalidConfig { .. })
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::ProtocolViolation { .. } => 3, // Critical
            Self::InvalidConfig { .. } => 3,
            Self::ResourceExhausted { .. } => 2, // Severe
            Self::LoadFailed { .. } => 1,        // Warning
            _ => 0,                              // Info
        }
    }
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Log a kernel error with its hint and evaluate to it
#[macro_export]
macro_rules! kernel_error {
    ($err:expr) => {{
        let err = $err;
        if err.severity() >= 3 {
            log::error!("[KERNEL] {} (hint: {})", err, err.recovery_hint());
        } else {
            log::warn!("[KERNEL] {} (hint: {})", err, err.recovery_hint());
        }
        err
    }};
}

/// Macro for critical kernel assertions
#[macro_export]
macro_rules! kernel_assert {
    ($cond:expr, $reason:expr) => {
        if !$cond {
            panic!("[KERNEL CRITICAL] Invariant violated: {}", $reason);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_is_fatal() {
        let err = KernelError::violation("release by non-owner");
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), 3);
    }

    #[test]
    fn test_exhaustion_hint() {
        let err = KernelError::exhausted(Resource::ProcessSlots, 8);
        assert!(err.is_recoverable());
        assert!(err.recovery_hint().starts_with("Cannot start new application"));
        assert_eq!(
            alloc::format!("{}", err),
            "No process slots left (capacity 8)"
        );
    }
}
