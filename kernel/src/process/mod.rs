//! Process subsystem
//!
//! Process descriptors, their state machine and the fixed PD pool.

pub mod descriptor;
pub mod pool;
pub mod queue;
pub mod state;

// Re-exports
pub use descriptor::{PdQueue, Pid, ProcessDescriptor};
pub use pool::ProcessTable;
pub use queue::MessageQueue;
pub use state::{validate_transition, ProcessState};
