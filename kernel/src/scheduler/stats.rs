//! Statistics - Dispatcher activity counters
//!
//! Only the dispatcher updates these, from process level, so plain
//! counters suffice.

/// Dispatcher statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Slices that ran a process
    pub slices: u64,

    /// Slices that found the run list empty
    pub idle_slices: u64,

    /// Voluntary yields
    pub yields: u64,

    /// Blocks on an event block
    pub event_blocks: u64,

    /// Blocks on a sync block
    pub sync_blocks: u64,

    /// Processes started
    pub spawns: u64,

    /// Processes exited or killed
    pub terminations: u64,

    /// Event blocks fired by a post
    pub events_fired: u64,

    /// Event blocks fired by their deadline
    pub timeouts: u64,
}

impl DispatchStats {
    pub const fn new() -> Self {
        Self {
            slices: 0,
            idle_slices: 0,
            yields: 0,
            event_blocks: 0,
            sync_blocks: 0,
            spawns: 0,
            terminations: 0,
            events_fired: 0,
            timeouts: 0,
        }
    }

    pub fn record_slice(&mut self) {
        self.slices += 1;
    }

    pub fn record_idle(&mut self) {
        self.idle_slices += 1;
    }

    pub fn record_yield(&mut self) {
        self.yields += 1;
    }

    pub fn record_event_block(&mut self) {
        self.event_blocks += 1;
    }

    pub fn record_sync_block(&mut self) {
        self.sync_blocks += 1;
    }

    pub fn record_spawn(&mut self) {
        self.spawns += 1;
    }

    pub fn record_termination(&mut self) {
        self.terminations += 1;
    }

    pub fn record_fired(&mut self, count: usize) {
        self.events_fired += count as u64;
    }

    pub fn record_timeouts(&mut self, count: usize) {
        self.timeouts += count as u64;
    }

    /// Fraction of slices spent idle, in percent
    pub fn idle_percent(&self) -> u64 {
        let total = self.slices + self.idle_slices;
        if total > 0 {
            self.idle_slices * 100 / total
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_percent() {
        let mut stats = DispatchStats::new();
        assert_eq!(stats.idle_percent(), 0);
        for _ in 0..3 {
            stats.record_slice();
        }
        stats.record_idle();
        assert_eq!(stats.idle_percent(), 25);
    }
}
