//! Program loader seam (`pgmld`)
//!
//! The kernel does not read files. A loader maps a named image into memory
//! and hands back the program to run plus where it was loaded; GEMDOS and
//! the file system stay on the other side of this trait.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::process::Pid;
use crate::scheduler::{Dispatcher, Program};

/// GEMDOS "file not found"
pub const EFILNF: i16 = -33;

/// A loaded image ready to start
pub struct LoadedProgram {
    pub program: Box<dyn Program>,
    pub load_address: u32,
}

pub trait ProgramLoader {
    /// Map `name` into memory
    fn load(&mut self, name: &str) -> KernelResult<LoadedProgram>;

    /// Desk accessories found on the boot drive (`*.ACC`), in directory order
    fn accessories(&mut self) -> Vec<String>;
}

type Factory = Box<dyn FnMut() -> Box<dyn Program>>;

struct Image {
    name: String,
    load_address: u32,
    factory: Factory,
}

/// In-memory image table, for ROM-resident programs and hosted runs
#[derive(Default)]
pub struct ImageTable {
    images: Vec<Image>,
}

impl ImageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image; names ending in `.ACC` are listed as accessories
    pub fn add<F>(&mut self, name: &str, load_address: u32, factory: F) -> &mut Self
    where
        F: FnMut() -> Box<dyn Program> + 'static,
    {
        self.images.push(Image {
            name: name.to_ascii_uppercase(),
            load_address,
            factory: Box::new(factory),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ProgramLoader for ImageTable {
    fn load(&mut self, name: &str) -> KernelResult<LoadedProgram> {
        let wanted = name.to_ascii_uppercase();
        let image = self
            .images
            .iter_mut()
            .find(|image| image.name == wanted)
            .ok_or(KernelError::LoadFailed { code: EFILNF })?;
        Ok(LoadedProgram {
            program: (image.factory)(),
            load_address: image.load_address,
        })
    }

    fn accessories(&mut self) -> Vec<String> {
        self.images
            .iter()
            .filter(|image| image.name.ends_with(".ACC"))
            .map(|image| image.name.to_string())
            .collect()
    }
}

impl Dispatcher {
    /// Load `name` and start it at the tail of the run list
    pub fn launch(&mut self, loader: &mut dyn ProgramLoader, name: &str) -> KernelResult<Pid> {
        let loaded = loader.load(name)?;
        self.state_mut()
            .start_process(loaded.program, name, loaded.load_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::scheduler::{ProcessContext, Step, Wakeup};

    fn exit_program() -> Box<dyn Program> {
        Box::new(|_: &mut ProcessContext<'_>, _: Wakeup| Step::Exit)
    }

    #[test]
    fn test_lists_accessories_only() {
        let mut table = ImageTable::new();
        table
            .add("calc.acc", 0x1000, exit_program)
            .add("DESKTOP.APP", 0x2000, exit_program)
            .add("CLOCK.ACC", 0x3000, exit_program);
        assert_eq!(table.accessories(), ["CALC.ACC", "CLOCK.ACC"]);
    }

    #[test]
    fn test_launch_uses_load_address() {
        let mut table = ImageTable::new();
        table.add("CALC.ACC", 0x4_2000, exit_program);
        let mut d = Dispatcher::new(KernelConfig::default()).unwrap();
        let pid = d.launch(&mut table, "calc.acc").unwrap();
        let pd = d.state().processes().get(pid).unwrap();
        assert_eq!(pd.load_address(), 0x4_2000);
        assert_eq!(pd.name(), "calc.acc");
    }

    #[test]
    fn test_missing_image() {
        let mut table = ImageTable::new();
        let mut d = Dispatcher::new(KernelConfig::default()).unwrap();
        assert_eq!(
            d.launch(&mut table, "NOPE.PRG"),
            Err(KernelError::LoadFailed { code: EFILNF })
        );
        assert_eq!(d.state().processes().live_count(), 0);
    }
}
