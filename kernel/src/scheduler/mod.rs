//! Cooperative scheduler
//!
//! Run-to-block round robin. A process keeps the CPU until it yields,
//! blocks on an event or a sync block, or exits; the dispatcher is the
//! only place that decides who runs next.

pub mod context;
pub mod dispatcher;
pub mod idle;
pub mod program;
pub mod state;
pub mod stats;

// Re-exports
pub use context::ProcessContext;
pub use dispatcher::{Dispatcher, Slice};
pub use idle::{CpuIdle, NullIdle};
pub use program::{Program, Step, Wakeup};
pub use state::KernelState;
pub use stats::DispatchStats;
