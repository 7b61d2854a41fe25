//! Kernel Sizing Configuration
//!
//! All pools are fixed at boot. The defaults reproduce the AES build
//! configuration; hosted tests shrink them to hit the boundaries.

use crate::error::{KernelError, KernelResult};

/// Maximum number of desk accessories loaded at boot
pub const NUM_ACCS: usize = 6;

/// AES main process + screen manager
pub const NUM_PRIVILEGED: usize = 2;

/// Process descriptors available (`totpds`)
pub const NUM_PDS: usize = NUM_ACCS + NUM_PRIVILEGED;

/// Event blocks a process may need at once
pub const EVBS_PER_PD: usize = 5;

/// Internal event blocks, reserved for the privileged processes
pub const NUM_IEVBS: usize = NUM_PRIVILEGED * EVBS_PER_PD;

/// External event blocks, shared by everything else
pub const NUM_EEVBS: usize = NUM_ACCS * EVBS_PER_PD;

/// Bytes in a process message queue
pub const QUEUE_SIZE: usize = 128;

/// Fork queue capacity
pub const NFORKS: usize = 32;

/// Padded process name length
pub const NAME_LEN: usize = 8;

/// Bytes of desktop.inf that are looked at
pub const INF_SIZE: usize = 300;

/// Runtime configuration of the kernel pools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of process descriptors (`totpds`)
    pub total_pds: usize,

    /// Event blocks in the internal tier
    pub internal_evbs: usize,

    /// Event blocks in the external tier (unused when `total_pds <= 2`)
    pub external_evbs: usize,

    /// Accessories the boot sequence may load
    pub max_accessories: usize,

    /// Message queue size per process, in bytes
    pub queue_size: usize,

    /// Fork queue slots
    pub fork_capacity: usize,

    /// Sync blocks created at boot (handle 0 is the window update lock)
    pub sync_blocks: usize,
}

impl KernelConfig {
    /// Create default configuration
    pub const fn new() -> Self {
        Self {
            total_pds: NUM_PDS,
            internal_evbs: NUM_IEVBS,
            external_evbs: NUM_EEVBS,
            max_accessories: NUM_ACCS,
            queue_size: QUEUE_SIZE,
            fork_capacity: NFORKS,
            sync_blocks: 1,
        }
    }

    pub const fn with_total_pds(mut self, total_pds: usize) -> Self {
        self.total_pds = total_pds;
        self
    }

    pub const fn with_event_blocks(mut self, internal: usize, external: usize) -> Self {
        self.internal_evbs = internal;
        self.external_evbs = external;
        self
    }

    pub const fn with_max_accessories(mut self, max: usize) -> Self {
        self.max_accessories = max;
        self
    }

    pub const fn with_queue_size(mut self, bytes: usize) -> Self {
        self.queue_size = bytes;
        self
    }

    pub const fn with_fork_capacity(mut self, slots: usize) -> Self {
        self.fork_capacity = slots;
        self
    }

    pub const fn with_sync_blocks(mut self, count: usize) -> Self {
        self.sync_blocks = count;
        self
    }

    /// Is the external event block tier populated?
    pub const fn has_external_tier(&self) -> bool {
        self.total_pds > NUM_PRIVILEGED
    }

    /// Pids are 16-bit on the target, pools must stay addressable
    pub fn validate(&self) -> KernelResult<()> {
        if self.total_pds == 0 || self.total_pds > u16::MAX as usize {
            return Err(KernelError::InvalidConfig { reason: "total_pds out of range" });
        }
        if self.internal_evbs == 0 {
            return Err(KernelError::InvalidConfig { reason: "no internal event blocks" });
        }
        if self.has_external_tier() && self.external_evbs == 0 {
            return Err(KernelError::InvalidConfig { reason: "no external event blocks" });
        }
        if self.queue_size == 0 {
            return Err(KernelError::InvalidConfig { reason: "message queues have no room" });
        }
        if self.fork_capacity == 0 {
            return Err(KernelError::InvalidConfig { reason: "fork queue has no slots" });
        }
        if self.sync_blocks == 0 {
            return Err(KernelError::InvalidConfig { reason: "window sync block missing" });
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::const_assert!(NUM_PDS > NUM_PRIVILEGED);
    static_assertions::const_assert_eq!(NUM_IEVBS, 10);
    static_assertions::const_assert_eq!(NUM_EEVBS, 30);

    #[test]
    fn test_default_is_valid() {
        let config = KernelConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.has_external_tier());
    }

    #[test]
    fn test_two_pds_need_no_external_tier() {
        let config = KernelConfig::new().with_total_pds(2).with_event_blocks(4, 0);
        assert!(config.validate().is_ok());
        assert!(!config.has_external_tier());
    }

    #[test]
    fn test_rejects_empty_pools() {
        let config = KernelConfig::new().with_total_pds(0);
        assert!(matches!(config.validate(), Err(KernelError::InvalidConfig { .. })));

        let config = KernelConfig::new().with_fork_capacity(0);
        assert!(config.validate().is_err());

        let config = KernelConfig::new().with_queue_size(0);
        assert_eq!(
            config.validate(),
            Err(KernelError::InvalidConfig { reason: "message queues have no room" })
        );
    }
}
