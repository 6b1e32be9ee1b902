// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Running compiled code on a SoC.

use crate::Result;
use crate::board::Board;
use crate::code::Code;
use crate::compiler::{Compiler, Program, off_program};
use crate::settings::CompilerSettings;
use crate::soc::Soc;

/// A connection to a SoC which runs one program at a time.
///
/// Stopping a session, either explicitly or by dropping it, loads a program
/// which sets every output low.
pub struct Qpc<S: Soc> {
    soc: S,
    compiler: Compiler,
    running: bool,
}

impl<S: Soc> Qpc<S> {
    pub fn new(soc: S, board: Board, mut settings: CompilerSettings) -> Result<Self> {
        let soc_config = soc.config()?;
        for change in settings.sanitize()? {
            qpc_log::warn!(
                "Setting '{}' changed from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        let compiler = Compiler::new(board, soc_config, settings)?;
        Ok(Self {
            soc,
            compiler,
            running: false,
        })
    }

    pub fn soc(&self) -> &S {
        &self.soc
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn load(&mut self, program: &Program) -> Result<()> {
        self.soc.reset()?;
        self.soc.load_program(program)
    }

    /// Compile `code`, load it and start the tproc.
    pub fn run(&mut self, code: &Code) -> Result<Program> {
        let program = self.compiler.compile(code)?;
        if self.compiler.settings().print_program {
            qpc_log::info!("Program:\n{}", program.listing());
        } else {
            qpc_log::diagnostic!("Program:\n{}", program.listing());
        }
        self.load(&program)?;
        let settings = self.compiler.settings();
        if settings.readout {
            let readouts_per_loop = settings.readouts_per_loop;
            self.soc.start_readout(readouts_per_loop)?;
        } else {
            self.soc.start()?;
        }
        qpc_log::debug!("Running program with {} instructions", program.num_instructions());
        self.running = true;
        Ok(program)
    }

    /// Stop the readout and switch all outputs off.
    pub fn stop(&mut self) -> Result<()> {
        if self.compiler.settings().readout {
            self.soc.stop_readout()?;
        }
        let off = self.compiler.compile(&off_program(self.compiler.board())?)?;
        qpc_log::diagnostic!("Off program:\n{}", off.listing());
        self.load(&off)?;
        self.soc.start()?;
        self.running = false;
        Ok(())
    }
}

impl<S: Soc> Drop for Qpc<S> {
    fn drop(&mut self) {
        if !self.running {
            return;
        }
        if let Err(err) = self.stop() {
            qpc_log::warn!("Failed to switch the outputs off: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::board::qick_spin_4x2;
    use crate::pulse::TrigPulseBuilder;
    use crate::soc::{SimulatedSoc, SimulatedState, SocConfig};
    use qpc_units::seconds;

    fn pulse() -> Code {
        TrigPulseBuilder::new(4u32, seconds(1e-6)).build().unwrap()
    }

    /// A simulated SoC that stays observable after the session is gone.
    #[derive(Clone, Default)]
    struct SharedSoc(Rc<RefCell<SimulatedSoc>>);

    impl Soc for SharedSoc {
        fn config(&self) -> Result<SocConfig> {
            self.0.borrow().config()
        }

        fn reset(&mut self) -> Result<()> {
            self.0.borrow_mut().reset()
        }

        fn load_program(&mut self, program: &Program) -> Result<()> {
            self.0.borrow_mut().load_program(program)
        }

        fn start(&mut self) -> Result<()> {
            self.0.borrow_mut().start()
        }

        fn start_readout(&mut self, readouts_per_loop: u32) -> Result<()> {
            self.0.borrow_mut().start_readout(readouts_per_loop)
        }

        fn stop_readout(&mut self) -> Result<()> {
            self.0.borrow_mut().stop_readout()
        }
    }

    #[test]
    fn test_drop_switches_outputs_off() {
        let soc = SharedSoc::default();
        let mut qpc = Qpc::new(
            soc.clone(),
            qick_spin_4x2(),
            CompilerSettings::default(),
        )
        .unwrap();
        let program = qpc.run(&pulse()).unwrap();
        let off = qpc
            .compiler()
            .compile(&off_program(&qick_spin_4x2()).unwrap())
            .unwrap();
        drop(qpc);

        let soc = soc.0.borrow();
        assert_eq!(soc.loaded_programs(), [program.asm(), off.asm()]);
        assert_eq!(soc.state(), SimulatedState::Running);
    }

    #[test]
    fn test_drop_idle_session() {
        let soc = SharedSoc::default();
        let qpc = Qpc::new(
            soc.clone(),
            qick_spin_4x2(),
            CompilerSettings::default(),
        )
        .unwrap();
        drop(qpc);
        assert!(soc.0.borrow().loaded_programs().is_empty());
        assert_eq!(soc.0.borrow().state(), SimulatedState::Idle);
    }

    #[test]
    fn test_run_and_stop() {
        let mut qpc = Qpc::new(
            SimulatedSoc::default(),
            qick_spin_4x2(),
            CompilerSettings::default(),
        )
        .unwrap();
        let program = qpc.run(&pulse()).unwrap();
        assert!(qpc.is_running());
        assert_eq!(qpc.soc().state(), SimulatedState::Running);
        assert_eq!(qpc.soc().loaded_programs(), [program.asm()]);

        qpc.stop().unwrap();
        assert!(!qpc.is_running());
        assert_eq!(qpc.soc().state(), SimulatedState::Running);
        let off = &qpc.soc().loaded_programs()[1];
        assert!(off.contains("TRIG clr p17"));
    }

    #[test]
    fn test_readout() {
        let settings = CompilerSettings {
            readout: true,
            readouts_per_loop: 0,
            print_program: false,
            ..Default::default()
        };
        let mut qpc = Qpc::new(SimulatedSoc::default(), qick_spin_4x2(), settings).unwrap();
        // sanitized to one readout per loop
        assert_eq!(qpc.compiler().settings().readouts_per_loop, 1);
        qpc.run(&pulse()).unwrap();
        assert_eq!(
            qpc.soc().state(),
            SimulatedState::ReadingOut {
                readouts_per_loop: 1
            }
        );
        qpc.stop().unwrap();
        assert_eq!(qpc.soc().state(), SimulatedState::Running);
    }

    #[test]
    fn test_board_mismatch() {
        let mut config = SocConfig::rfsoc_4x2();
        config.board = "ZCU111".to_string();
        let result = Qpc::new(
            SimulatedSoc::new(config),
            qick_spin_4x2(),
            CompilerSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_compilation_does_not_load() {
        let mut qpc = Qpc::new(
            SimulatedSoc::default(),
            qick_spin_4x2(),
            CompilerSettings::default(),
        )
        .unwrap();
        let code = TrigPulseBuilder::new(crate::io::Io::trig("missing"), seconds(1e-6))
            .build()
            .unwrap();
        assert!(qpc.run(&code).is_err());
        assert!(!qpc.is_running());
        assert!(qpc.soc().loaded_programs().is_empty());
    }
}
