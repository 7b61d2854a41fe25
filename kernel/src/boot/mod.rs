//! Boot Module
//!
//! AES bring-up (`gem_main`): build the kernel state, start the two
//! privileged processes, load the desk accessories, read desktop.inf and
//! let everything run once before the shell takes over.

pub mod phases;

pub use phases::{BootPhase, PhaseTracker};

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::{KernelConfig, NUM_PRIVILEGED};
use crate::error::{KernelError, KernelResult};
use crate::inf::{self, DesktopInf};
use crate::loader::ProgramLoader;
use crate::process::Pid;
use crate::scheduler::{CpuIdle, Dispatcher, Program, Slice};

/// Collaborators handed to [`bring_up`]
pub struct BootParams<'a> {
    /// AES main program, becomes pid 0
    pub aes: Box<dyn Program>,
    /// Screen manager (`ctlmgr`), becomes pid 1
    pub screen_manager: Box<dyn Program>,
    pub loader: &'a mut dyn ProgramLoader,
    pub idle: Box<dyn CpuIdle>,
    /// Control key held at boot: no accessories
    pub control_held: bool,
    /// Raw desktop.inf, if the file could be read
    pub desktop_inf: Option<&'a [u8]>,
}

/// What bring-up did
#[derive(Debug)]
pub struct BootReport {
    pub aes: Pid,
    pub screen_manager: Pid,
    /// `gl_mowner`: the screen manager starts out owning the mouse
    pub mouse_owner: Pid,
    /// Keyboard owner, same as the mouse at boot
    pub keyboard_owner: Pid,
    /// Accessories started, in load order
    pub accessories: Vec<Pid>,
    /// Accessories that failed to load
    pub accessories_failed: usize,
    pub desktop: Option<DesktopInf>,
    pub phase: BootPhase,
}

fn advance(phases: &mut PhaseTracker, next: BootPhase) -> KernelResult<()> {
    phases.advance(next).map_err(KernelError::violation)
}

/// Bring the AES up and hand back the running dispatcher
pub fn bring_up(
    config: KernelConfig,
    params: BootParams<'_>,
) -> KernelResult<(Dispatcher, BootReport)> {
    let mut phases = PhaseTracker::new();
    log::info!("[BOOT] ═══ AES bring-up ═══");

    if config.total_pds < NUM_PRIVILEGED {
        return Err(crate::kernel_error!(KernelError::InvalidConfig {
            reason: "the AES needs at least two process slots",
        }));
    }
    let mut dispatcher = Dispatcher::with_idle(config, params.idle)?;
    advance(&mut phases, BootPhase::Kernel)?;

    let state = dispatcher.state_mut();
    let aes = state.start_process(params.aes, "AESSYS", 0)?;
    let screen_manager = state.start_process(params.screen_manager, "SCRENMGR", 0)?;
    log::info!("[BOOT] ✓ AES pid {}, screen manager pid {}", aes, screen_manager);
    advance(&mut phases, BootPhase::Privileged)?;

    let (accessories, accessories_failed) =
        load_accessories(&mut dispatcher, params.loader, params.control_held);
    advance(&mut phases, BootPhase::Accessories)?;

    let desktop = params.desktop_inf.map(inf::parse);
    advance(&mut phases, BootPhase::Desktop)?;

    // `all_run`: one dispatch per started process
    for _ in 0..NUM_PRIVILEGED + accessories.len() {
        if dispatcher.run_one_slice()? == Slice::Idle {
            break;
        }
    }
    advance(&mut phases, BootPhase::Complete)?;
    log::info!(
        "[BOOT] ✓ {} accessories running, {} failed",
        accessories.len(),
        accessories_failed
    );

    let report = BootReport {
        aes,
        screen_manager,
        mouse_owner: screen_manager,
        keyboard_owner: screen_manager,
        accessories,
        accessories_failed,
        desktop,
        phase: phases.current(),
    };
    Ok((dispatcher, report))
}

/// `ldaccs`: at most `max_accessories`, never with only the privileged
/// slots configured, never with Control held. A failed load is skipped.
fn load_accessories(
    dispatcher: &mut Dispatcher,
    loader: &mut dyn ProgramLoader,
    control_held: bool,
) -> (Vec<Pid>, usize) {
    let config = *dispatcher.state().config();
    if !config.has_external_tier() {
        log::info!("[BOOT] no process slots for accessories");
        return (Vec::new(), 0);
    }
    if control_held {
        log::info!("[BOOT] Control held, accessories skipped");
        return (Vec::new(), 0);
    }

    let mut started = Vec::new();
    let mut failed = 0;
    for name in loader.accessories().into_iter().take(config.max_accessories) {
        match dispatcher.launch(loader, &name) {
            Ok(pid) => {
                log::debug!("[BOOT] accessory {} is pid {}", name, pid);
                started.push(pid);
            }
            Err(err) => {
                log::warn!("[BOOT] accessory {} not loaded: {}", name, err);
                failed += 1;
            }
        }
    }
    (started, failed)
}
