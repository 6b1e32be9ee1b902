// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Lowering of symbolic statements into tproc assembly.

use indexmap::IndexMap;
use qpc_units::Time;
use tproc_asm::{AluOp, AsmGenerator, MAX_IMM, Operand, Operator, RegName};

use super::program::Program;
use crate::board::Board;
use crate::code::{Domain, Statement};
use crate::settings::CompilerSettings;
use crate::soc::SocConfig;
use crate::symbol::{Label, SymbolId};
use crate::value::{Constant, Expression, Reg, RegTarget, Value};
use crate::{Error, Result};

/// How the constants of one statement are converted into register units.
#[derive(Debug, Clone, Copy)]
struct Conversion {
    generator: Option<u32>,
    check_rounding: bool,
}

fn flip(operator: Operator) -> Operator {
    match operator {
        Operator::Add => Operator::Sub,
        Operator::Sub => Operator::Add,
    }
}

fn out_of_registers(available: u16) -> Error {
    Error::new(&format!("Ran out of registers, the board has {available}"))
}

pub(super) struct Lowering<'a> {
    board: &'a Board,
    soc: &'a SocConfig,
    settings: &'a CompilerSettings,
    registers: IndexMap<SymbolId, u16>,
    labels: IndexMap<SymbolId, String>,
    temps_in_use: u16,
    max_temps: u16,
    generator: AsmGenerator,
}

impl<'a> Lowering<'a> {
    pub(super) fn new(
        board: &'a Board,
        soc: &'a SocConfig,
        settings: &'a CompilerSettings,
        statements: &[Statement],
    ) -> Result<Self> {
        let mut lowering = Self {
            board,
            soc,
            settings,
            registers: IndexMap::new(),
            labels: IndexMap::new(),
            temps_in_use: 0,
            max_temps: 0,
            generator: AsmGenerator::new(),
        };
        for statement in statements {
            lowering.assign_symbols(statement);
        }
        if lowering.registers.len() > usize::from(board.registers) {
            return Err(out_of_registers(board.registers));
        }
        Ok(lowering)
    }

    /// Number registers and labels in order of first appearance.
    fn assign_symbols(&mut self, statement: &Statement) {
        let registers = &mut self.registers;
        let mut visit = |reg: &Reg| {
            if reg.target() == RegTarget::Allocated {
                let next = registers.len() as u16;
                registers.entry(reg.id()).or_insert(next);
            }
        };
        match statement {
            Statement::Assign { reg, value, .. } => {
                visit(reg);
                value.for_each_reg(&mut visit);
            }
            Statement::Test { left, right, .. } => {
                visit(left);
                right.for_each_reg(&mut visit);
            }
            Statement::IncRef { delta } => delta.for_each_reg(&mut visit),
            Statement::DataPortWrite { value, .. } => visit(value),
            Statement::Label { label } | Statement::Jump { label, .. } => {
                let next = self.labels.len();
                self.labels
                    .entry(label.id())
                    .or_insert_with(|| format!("{}{next}", label.prefix()));
            }
            Statement::Comment { .. }
            | Statement::ChannelComment { .. }
            | Statement::Trig { .. }
            | Statement::WavePortWrite { .. } => {}
        }
    }

    fn reg_name(&self, reg: &Reg) -> Result<RegName> {
        match reg.target() {
            RegTarget::Special(special) => Ok(RegName::Special(special)),
            RegTarget::Allocated => self
                .registers
                .get(&reg.id())
                .map(|index| RegName::General(*index))
                .ok_or_else(|| Error::new("Register was not allocated")),
        }
    }

    fn label_name(&self, label: &Label) -> Result<&str> {
        self.labels
            .get(&label.id())
            .map(String::as_str)
            .ok_or_else(|| Error::new("Label was not numbered"))
    }

    /// A scratch register, valid until the end of the current statement.
    fn temp(&mut self) -> Result<RegName> {
        let index = self.registers.len() + usize::from(self.temps_in_use);
        if index >= usize::from(self.board.registers) {
            return Err(out_of_registers(self.board.registers));
        }
        self.temps_in_use += 1;
        self.max_temps = self.max_temps.max(self.temps_in_use);
        Ok(RegName::General(index as u16))
    }

    fn conversion(&self, domain: &Domain, check_rounding: bool) -> Result<Conversion> {
        let generator = match domain {
            Domain::Tproc => None,
            Domain::Generator(channel) => Some(self.board.resolve(channel)?),
        };
        Ok(Conversion {
            generator,
            check_rounding,
        })
    }

    fn check_rounding(&self, requested: f64, actual: f64) -> Result<()> {
        if requested == 0.0 {
            return Ok(());
        }
        let max_error = self.settings.max_rounding_error;
        if ((actual - requested) / requested).abs() > max_error {
            return Err(Error::new(&format!(
                "After rounding {requested:.3e} to the nearest register unit ({actual:.3e}), \
                 the error is > {:.1}%",
                max_error * 100.0
            )));
        }
        Ok(())
    }

    fn to_units(&self, constant: &Constant, conversion: Conversion) -> Result<i64> {
        match constant {
            Constant::Int(value) => Ok(*value),
            Constant::Time(time) => {
                let cycles = self.soc.time_to_cycles(*time, conversion.generator)?;
                if conversion.check_rounding {
                    let actual = self.soc.cycles_to_time(cycles, conversion.generator)?;
                    self.check_rounding(time.value(), actual.value())?;
                }
                Ok(cycles)
            }
            Constant::Freq(freq) => {
                let Some(generator) = conversion.generator else {
                    return Err(Error::new(&format!(
                        "Frequency {freq} can only be converted for a signal generator"
                    )));
                };
                let register = self.soc.freq_to_register(*freq, generator)?;
                if conversion.check_rounding {
                    let actual = self.soc.register_to_freq(register, generator)?;
                    self.check_rounding(freq.value(), actual.value())?;
                }
                Ok(register)
            }
        }
    }

    /// Value of an expression made only of constants.
    fn eval_const(&self, value: &Value, conversion: Conversion) -> Result<Option<i64>> {
        match value {
            Value::Const(constant) => Ok(Some(self.to_units(constant, conversion)?)),
            Value::Reg(_) => Ok(None),
            Value::Expr(expr) => {
                let left = self.eval_const(&expr.left, conversion)?;
                let right = self.eval_const(&expr.right, conversion)?;
                let (Some(left), Some(right)) = (left, right) else {
                    return Ok(None);
                };
                let result = match expr.operator {
                    Operator::Add => left.checked_add(right),
                    Operator::Sub => left.checked_sub(right),
                };
                result
                    .map(Some)
                    .ok_or_else(|| Error::new("Overflow while folding constants"))
            }
        }
    }

    fn lower_into(&mut self, dst: RegName, value: &Value, conversion: Conversion) -> Result<()> {
        let op = match value {
            Value::Const(constant) => {
                let imm = self.to_units(constant, conversion)?;
                return Ok(self.generator.add_reg_write_imm(dst, imm)?);
            }
            Value::Reg(reg) => AluOp::copy(self.reg_name(reg)?),
            Value::Expr(expr) => match self.eval_const(value, conversion)? {
                Some(imm) => return Ok(self.generator.add_reg_write_imm(dst, imm)?),
                None => self.lower_expression(expr, conversion)?,
            },
        };
        Ok(self.generator.add_reg_write_op(dst, op)?)
    }

    /// The register holding `value`, loading it into a temporary if needed.
    fn lower_to_reg(&mut self, value: &Value, conversion: Conversion) -> Result<RegName> {
        match value {
            Value::Reg(reg) => self.reg_name(reg),
            _ => {
                let temp = self.temp()?;
                self.lower_into(temp, value, conversion)?;
                Ok(temp)
            }
        }
    }

    fn lower_expression(&mut self, expr: &Expression, conversion: Conversion) -> Result<AluOp> {
        let left_const = self.eval_const(&expr.left, conversion)?;
        let right_const = self.eval_const(&expr.right, conversion)?;
        // keep constants on the right hand side where they can be immediates
        let (left, right, right_const) =
            if expr.operator == Operator::Add && left_const.is_some() && right_const.is_none() {
                (&expr.right, &expr.left, left_const)
            } else {
                (&expr.left, &expr.right, right_const)
            };

        let left = self.lower_to_reg(left, conversion)?;
        let (operator, right) = match right_const {
            Some(imm) if imm.unsigned_abs() <= MAX_IMM as u64 => {
                if imm < 0 {
                    (flip(expr.operator), Operand::Imm(-imm))
                } else {
                    (expr.operator, Operand::Imm(imm))
                }
            }
            Some(imm) => {
                let temp = self.temp()?;
                self.generator.add_reg_write_imm(temp, imm)?;
                (expr.operator, Operand::Reg(temp))
            }
            None => (
                expr.operator,
                Operand::Reg(self.lower_to_reg(right, conversion)?),
            ),
        };
        Ok(AluOp::binary(left, operator, right))
    }

    pub(super) fn prologue(&mut self, startup_delay: Time) -> Result<()> {
        self.generator.add_nop();
        let cycles = self.soc.time_to_cycles(startup_delay, None)?;
        self.generator.add_time_inc_ref(Operand::Imm(cycles))?;
        Ok(())
    }

    pub(super) fn lower(&mut self, statement: &Statement) -> Result<()> {
        self.temps_in_use = 0;
        match statement {
            Statement::Comment { text } => self.generator.add_comment(text.as_str()),
            Statement::ChannelComment {
                prefix,
                channel,
                suffix,
            } => {
                let port = self.board.resolve(channel)?;
                self.generator.add_comment(format!("{prefix}{port}{suffix}"));
            }
            Statement::Label { label } => {
                let name = self.label_name(label)?.to_string();
                self.generator.add_label(name);
            }
            Statement::Jump { label, condition } => {
                let name = self.label_name(label)?.to_string();
                self.generator.add_jump(name, *condition);
            }
            Statement::Assign {
                reg,
                value,
                domain,
                check_rounding,
            } => {
                let conversion = self.conversion(domain, *check_rounding)?;
                let dst = self.reg_name(reg)?;
                self.lower_into(dst, value, conversion)?;
            }
            Statement::Test {
                left,
                right,
                domain,
                check_rounding,
            } => {
                let conversion = self.conversion(domain, *check_rounding)?;
                let left = self.reg_name(left)?;
                let right = match right {
                    Value::Reg(reg) => self.reg_name(reg)?,
                    _ => self.lower_to_reg(right, conversion)?,
                };
                self.generator
                    .add_test(AluOp::binary(left, Operator::Sub, Operand::Reg(right)))?;
            }
            Statement::IncRef { delta } => {
                let conversion = self.conversion(&Domain::Tproc, false)?;
                let delta = match self.eval_const(delta, conversion)? {
                    Some(cycles) if cycles.unsigned_abs() <= MAX_IMM as u64 => {
                        Operand::Imm(cycles)
                    }
                    _ => Operand::Reg(self.lower_to_reg(delta, conversion)?),
                };
                self.generator.add_time_inc_ref(delta)?;
            }
            Statement::Trig { channel, state } => {
                let port = self.board.resolve(channel)?;
                self.generator.add_trig(port, *state);
            }
            Statement::WavePortWrite { channel } => {
                let port = self.board.resolve(channel)?;
                self.generator.add_wave_port_write(port);
            }
            Statement::DataPortWrite { channel, value } => {
                let port = self.board.resolve(channel)?;
                let value = self.reg_name(value)?;
                self.generator.add_data_port_write(port, value);
            }
        }
        Ok(())
    }

    pub(super) fn finish(mut self) -> Program {
        self.generator.add_jump_here();
        let registers_used = self.registers.len() as u16 + self.max_temps;
        Program::new(self.generator, registers_used)
    }
}
