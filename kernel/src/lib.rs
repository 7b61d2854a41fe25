// src/lib.rs
// Point d'entrée de la bibliothèque du noyau coopératif de l'AES
#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard hors tests

// Import de alloc pour les allocations dynamiques
extern crate alloc;

// Modules du noyau
pub mod error;
pub mod logger;
pub mod config;
mod list;
pub mod process;
pub mod event;
pub mod sync;
pub mod interrupt;
pub mod scheduler;
pub mod loader;
pub mod boot;
pub mod inf;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult, Resource};
pub use event::{EventKey, Tier, WaitOutcome};
pub use interrupt::{ForkContext, ForkItem, ForkRoutine, InterruptHandle};
pub use loader::{LoadedProgram, ProgramLoader};
pub use process::{Pid, ProcessState};
pub use scheduler::{
    CpuIdle, DispatchStats, Dispatcher, KernelState, NullIdle, ProcessContext, Program, Slice,
    Step, Wakeup,
};
pub use sync::{ForkQueue, SyncBlock, SyncHandle};
