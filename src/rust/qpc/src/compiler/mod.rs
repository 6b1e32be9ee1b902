// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Compilation of code blocks into tproc programs.
//!
//! Registers and labels only receive their physical names here. Registers
//! are numbered `r0, r1, ...` in order of first appearance, followed by the
//! temporaries needed to evaluate expressions. Every label is named
//! `<prefix><n>` with one counter shared by all prefixes.

mod lowering;
mod program;

pub use program::Program;

use qpc_units::{hertz, seconds};

use crate::board::Board;
use crate::code::Code;
use crate::settings::CompilerSettings;
use crate::soc::SocConfig;
use crate::value::Value;
use crate::{Error, Result};
use lowering::Lowering;

pub struct Compiler {
    board: Board,
    soc_config: SocConfig,
    settings: CompilerSettings,
}

impl Compiler {
    pub fn new(board: Board, soc_config: SocConfig, settings: CompilerSettings) -> Result<Self> {
        if board.name != soc_config.board {
            return Err(Error::new(&format!(
                "Board [{}] configuration not available.",
                soc_config.board
            )));
        }
        Ok(Self {
            board,
            soc_config,
            settings,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn soc_config(&self) -> &SocConfig {
        &self.soc_config
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile `code` into a program that waits for the startup delay, runs
    /// the code once and then halts.
    pub fn compile(&self, code: &Code) -> Result<Program> {
        let statements = code.statements();
        let mut lowering = Lowering::new(
            &self.board,
            &self.soc_config,
            &self.settings,
            statements,
        )?;
        lowering.prologue(self.settings.startup_delay)?;
        for statement in statements {
            lowering.lower(statement)?;
        }
        let program = lowering.finish();
        qpc_log::diagnostic!(
            "Compiled '{}' into {} instructions using {} registers",
            code.name().unwrap_or("<unnamed>"),
            program.num_instructions(),
            program.registers_used()
        );
        Ok(program)
    }
}

/// A block which brings every output of `board` into a safe idle state.
///
/// The DACs play a zero amplitude pulse, the data ports are cleared and all
/// trigger ports are set low.
pub fn off_program(board: &Board) -> Result<Code> {
    let mut code = Code::new();
    for port in board.dac_ports() {
        code.rf_square_pulse(
            port,
            Some(seconds(1e-6).into()),
            Some(hertz(100e6).into()),
            Some(Value::from(0i64)),
            Some(seconds(0.0).into()),
        )?;
    }
    code.comment("write 0 into all DPORTs");
    let mut zero = code.reg();
    code.assign(&mut zero, 0i64)?;
    for port in board.data_ports() {
        code.data_port_write(port, &zero);
    }
    for port in board.trigger_ports() {
        code.trig(port, false, Some(seconds(0.0).into()))?;
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::qick_spin_4x2;
    use crate::control::{LoopBuilder, SweepBuilder};
    use crate::io::Io;
    use crate::pulse::{RfPulseBuilder, TrigPulseBuilder};

    fn compiler() -> Compiler {
        Compiler::new(
            qick_spin_4x2(),
            SocConfig::rfsoc_4x2(),
            CompilerSettings::default(),
        )
        .unwrap()
    }

    fn lines(program: &Program) -> Vec<String> {
        program.asm().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_board_must_match_soc() {
        let mut board = qick_spin_4x2();
        board.name = "ZCU216".to_string();
        let err = Compiler::new(board, SocConfig::rfsoc_4x2(), CompilerSettings::default())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Board [RFSoC4x2] configuration not available.");
    }

    #[test]
    fn test_empty_program() {
        let program = compiler().compile(&Code::new()).unwrap();
        assert_eq!(program.asm(), "NOP\nTIME inc_ref #409600\nJUMP HERE\n");
        assert_eq!(program.num_instructions(), 3);
        assert_eq!(program.registers_used(), 0);
        assert_eq!(
            program.listing(),
            "001: NOP\n002: TIME inc_ref #409600\n003: JUMP HERE\n"
        );
    }

    #[test]
    fn test_trigger_pulse() {
        let laser = Io::trig("PMOD0_4");
        let code = TrigPulseBuilder::new(&laser, seconds(1e-6))
            .build()
            .unwrap();
        let program = compiler().compile(&code).unwrap();
        assert_eq!(
            lines(&program),
            vec![
                "NOP",
                "TIME inc_ref #409600",
                "// setting trigger port 4 to true",
                "REG_WR out_usr_time imm #0",
                "TRIG set p4",
                "// setting trigger port 4 to false",
                "REG_WR out_usr_time imm #410",
                "TRIG clr p4",
                "JUMP HERE",
            ]
        );
    }

    #[test]
    fn test_loop() {
        let body = TrigPulseBuilder::new(4u32, seconds(1e-6)).build().unwrap();
        let code = LoopBuilder::new(&body, Some(3)).build().unwrap();
        let program = compiler().compile(&code).unwrap();
        assert_eq!(
            lines(&program),
            vec![
                "NOP",
                "TIME inc_ref #409600",
                "REG_WR r0 imm #0",
                "LOOP0:",
                "REG_WR r1 imm #3",
                "TEST -op(r0 - r1)",
                "JUMP LOOP_END1 -if(NS)",
                "// setting trigger port 4 to true",
                "REG_WR out_usr_time imm #0",
                "TRIG set p4",
                "// setting trigger port 4 to false",
                "REG_WR out_usr_time imm #410",
                "TRIG clr p4",
                "// ---------------",
                "REG_WR r0 op -op(r0 + #1)",
                "JUMP LOOP0",
                "LOOP_END1:",
                "JUMP HERE",
            ]
        );
        assert_eq!(program.registers_used(), 2);
    }

    #[test]
    fn test_nested_labels_share_one_counter() {
        let mut outer = Code::new();
        let tau = outer
            .swept_reg(seconds(0.0), seconds(1e-6), seconds(0.25e-6))
            .unwrap();
        let body = TrigPulseBuilder::new(4u32, &tau)
            .block_length(seconds(2e-6))
            .build()
            .unwrap();
        let sweep = SweepBuilder::new(&body, &tau).inc_ref().build().unwrap();
        let code = LoopBuilder::new(&sweep, None).build().unwrap();
        let program = compiler().compile(&code).unwrap();
        let labels: Vec<_> = lines(&program)
            .into_iter()
            .filter(|line| line.ends_with(':'))
            .collect();
        assert_eq!(labels, vec!["LOOP0:", "SWEEP1:", "SWEEP_END2:"]);
        let asm = program.asm();
        // 0.25 us in tproc cycles
        assert!(asm.contains("REG_WR r0 op -op(r0 + #102)"));
        assert!(asm.contains("REG_WR out_usr_time op -op(r0)"));
        assert!(asm.contains("TIME inc_ref #819"));
        assert!(asm.ends_with("JUMP LOOP0\nJUMP HERE\n"));
    }

    #[test]
    fn test_frequency_conversion() {
        let sample = Io::dac("DAC_A", seconds(-75e-9));
        let code = RfPulseBuilder::new(&sample, seconds(1e-6))
            .freq(hertz(100e6))
            .amp(10_000i64)
            .build()
            .unwrap();
        let program = compiler().compile(&code).unwrap();
        assert_eq!(
            lines(&program)[2..],
            [
                "// pulsing RF port 0",
                "REG_WR out_usr_time imm #-31",
                "REG_WR w_length imm #614",
                "REG_WR w_freq imm #43690667",
                "REG_WR w_gain imm #10000",
                "REG_WR w_conf imm #9",
                "WPORT_WR p0 r_wave",
                "JUMP HERE",
            ]
        );
    }

    #[test]
    fn test_register_pulse_length_counts_fabric_cycles() {
        let sample = Io::dac("DAC_A", seconds(0.0));
        let mut outer = Code::new();
        let mut tproc_length = outer.reg();
        outer.assign(&mut tproc_length, seconds(1e-6)).unwrap();
        let err = RfPulseBuilder::new(&sample, &tproc_length)
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Pulse length"));

        let tau = outer
            .swept_reg(seconds(1e-6), seconds(2e-6), seconds(0.5e-6))
            .unwrap();
        let length = outer
            .swept_reg(seconds(1e-6), seconds(2e-6), seconds(0.5e-6))
            .unwrap()
            .on_channel(&sample);
        assert!(RfPulseBuilder::new(&sample, &length).build().is_err());
        let pulse = RfPulseBuilder::new(&sample, &length)
            .block_length(&tau)
            .build()
            .unwrap();
        let code = SweepBuilder::new(&pulse, &tau)
            .follow(&length)
            .inc_ref()
            .build()
            .unwrap();

        let asm = compiler().compile(&code).unwrap().asm();
        // 1 us is 410 tproc cycles but 614 fabric cycles
        assert!(asm.contains("REG_WR r0 imm #410"));
        assert!(asm.contains("REG_WR r1 imm #614"));
        assert!(asm.contains("REG_WR w_length op -op(r1)"));
        assert!(asm.contains("REG_WR r0 op -op(r0 + #205)"));
        assert!(asm.contains("REG_WR r1 op -op(r1 + #307)"));
        assert!(asm.contains("TIME inc_ref r0"));
    }

    #[test]
    fn test_frequency_needs_generator() {
        let mut code = Code::new();
        let mut freq = code.reg();
        code.assign(&mut freq, hertz(1e6)).unwrap();
        let err = compiler().compile(&code).err().unwrap();
        assert!(err.to_string().contains("signal generator"));
    }

    #[test]
    fn test_expression_lowering() {
        let mut code = Code::new();
        let mut a = code.reg();
        code.assign(&mut a, 0i64).unwrap();
        let big = Value::from(&a).try_add(10_000_000i64).unwrap();
        code.assign(&mut a, big).unwrap();
        let negative = Value::from(&a).try_sub(-5i64).unwrap();
        code.assign(&mut a, negative).unwrap();
        let mut b = code.reg();
        let swapped = Value::from(seconds(1e-6)).try_add(&a).unwrap();
        code.assign(&mut b, swapped).unwrap();
        let difference = Value::from(7i64).try_sub(&b).unwrap();
        code.assign(&mut a, difference).unwrap();

        let program = compiler().compile(&code).unwrap();
        assert_eq!(
            lines(&program)[2..],
            [
                "REG_WR r0 imm #0",
                "REG_WR r2 imm #10000000",
                "REG_WR r0 op -op(r0 + r2)",
                "REG_WR r0 op -op(r0 + #5)",
                "REG_WR r1 op -op(r0 + #410)",
                "REG_WR r2 imm #7",
                "REG_WR r0 op -op(r2 - r1)",
                "JUMP HERE",
            ]
        );
        assert_eq!(program.registers_used(), 3);
    }

    #[test]
    fn test_mixed_constants_fold_after_conversion() {
        let mut code = Code::new();
        let mut a = code.reg();
        let mixed = Value::from(seconds(1e-6)).try_add(3i64).unwrap();
        assert!(!mixed.is_const());
        code.assign(&mut a, mixed).unwrap();

        let program = compiler().compile(&code).unwrap();
        assert_eq!(lines(&program)[2..], ["REG_WR r0 imm #413", "JUMP HERE"]);
    }

    #[test]
    fn test_ran_out_of_registers() {
        let mut board = qick_spin_4x2();
        board.registers = 1;
        let compiler =
            Compiler::new(board, SocConfig::rfsoc_4x2(), CompilerSettings::default()).unwrap();

        let body = TrigPulseBuilder::new(4u32, seconds(1e-6)).build().unwrap();
        // the counter fits, the loop bound does not
        let code = LoopBuilder::new(&body, Some(3)).build().unwrap();
        let err = compiler.compile(&code).err().unwrap();
        assert!(err.to_string().starts_with("Ran out of registers"));

        let mut code = Code::new();
        for _ in 0..2 {
            let mut reg = code.reg();
            code.assign(&mut reg, 1i64).unwrap();
        }
        assert!(compiler.compile(&code).is_err());
    }

    #[test]
    fn test_sweep_rounding_error() {
        let mut outer = Code::new();
        let tau = outer
            .swept_reg(seconds(1e-9), seconds(10e-9), seconds(1e-9))
            .unwrap();
        let body = TrigPulseBuilder::new(4u32, seconds(1e-6)).build().unwrap();
        let code = SweepBuilder::new(&body, &tau).inc_ref().build().unwrap();
        let err = compiler().compile(&code).err().unwrap();
        assert!(err.to_string().starts_with("After rounding"));

        let settings = CompilerSettings {
            max_rounding_error: 1.0,
            ..Default::default()
        };
        let lenient = Compiler::new(qick_spin_4x2(), SocConfig::rfsoc_4x2(), settings).unwrap();
        assert!(lenient.compile(&code).is_ok());
    }

    #[test]
    fn test_unknown_io() {
        let code = TrigPulseBuilder::new(Io::trig("PMOD9_9"), seconds(1e-6))
            .build()
            .unwrap();
        let err = compiler().compile(&code).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Board 'RFSoC4x2' does not contain trig port 'PMOD9_9'"
        );
    }

    #[test]
    fn test_off_program() {
        let code = off_program(&qick_spin_4x2()).unwrap();
        let program = compiler().compile(&code).unwrap();
        let asm = program.asm();
        assert_eq!(asm.matches("WPORT_WR").count(), 2);
        assert!(asm.contains("WPORT_WR p1 r_wave"));
        assert!(asm.contains("REG_WR w_gain imm #0"));
        assert!(asm.contains("// write 0 into all DPORTs\nREG_WR r0 imm #0\nDPORT_WR p0 reg r0\n"));
        assert_eq!(asm.matches("DPORT_WR").count(), 4);
        assert_eq!(asm.matches("TRIG clr").count(), 16);
        assert!(asm.contains("TRIG clr p17"));
        assert!(!asm.contains("TRIG set"));
    }
}
