pub mod fork_queue;
pub mod sync_block;

pub use fork_queue::ForkQueue;
pub use sync_block::{SyncBlock, SyncHandle};
