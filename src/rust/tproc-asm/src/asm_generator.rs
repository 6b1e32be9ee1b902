// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::asm_statements::{AluOp, AsmStatement, Condition, Operand, RegName};
use crate::{MAX_IMM, Result};
use anyhow::anyhow;

fn check_alu_immediate(op: &AluOp) -> Result<()> {
    if let Some(value) = op.immediate() {
        if value.unsigned_abs() > MAX_IMM.unsigned_abs() {
            return Err(anyhow!(
                "Immediate #{value} in '{op}' exceeds the maximum ALU immediate {MAX_IMM}"
            )
            .into());
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsmGenerator {
    statements: Vec<AsmStatement>,
}

impl AsmGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &Vec<AsmStatement> {
        &self.statements
    }

    pub fn num_statements(&self) -> usize {
        self.statements.len()
    }

    /// Number of statements that end up in program memory.
    pub fn num_instructions(&self) -> usize {
        self.statements.iter().filter(|s| s.is_instruction()).count()
    }

    /// Add an already built statement, applying the same checks as the
    /// dedicated `add_*` methods.
    pub fn add_statement(&mut self, statement: AsmStatement) -> Result<()> {
        match &statement {
            AsmStatement::RegWriteImm { value, .. } if i32::try_from(*value).is_err() => {
                return Err(anyhow!(
                    "Immediate #{value} in '{statement}' does not fit into a 32 bit register"
                )
                .into());
            }
            AsmStatement::RegWriteOp { op, .. } | AsmStatement::Test { op } => {
                check_alu_immediate(op)?;
            }
            AsmStatement::TimeIncRef {
                delta: Operand::Imm(value),
            } if value.unsigned_abs() > MAX_IMM.unsigned_abs() => {
                return Err(anyhow!(
                    "Reference increment #{value} exceeds the maximum immediate {MAX_IMM}"
                )
                .into());
            }
            _ => {}
        }
        self.statements.push(statement);
        Ok(())
    }

    /// Add a comment. Multi-line text results in one comment per line.
    pub fn add_comment<S: Into<String>>(&mut self, comment: S) {
        let comment: String = comment.into();
        for line in comment.lines() {
            self.statements.push(AsmStatement::Comment {
                text: line.to_string(),
            });
        }
    }

    pub fn add_label<S: Into<String>>(&mut self, name: S) {
        self.statements
            .push(AsmStatement::Label { name: name.into() });
    }

    pub fn add_nop(&mut self) {
        self.statements.push(AsmStatement::Nop);
    }

    pub fn add_reg_write_imm(&mut self, dst: RegName, value: i64) -> Result<()> {
        self.add_statement(AsmStatement::RegWriteImm { dst, value })
    }

    pub fn add_reg_write_op(&mut self, dst: RegName, op: AluOp) -> Result<()> {
        self.add_statement(AsmStatement::RegWriteOp { dst, op })
    }

    pub fn add_test(&mut self, op: AluOp) -> Result<()> {
        self.add_statement(AsmStatement::Test { op })
    }

    pub fn add_jump<S: Into<String>>(&mut self, label: S, condition: Option<Condition>) {
        self.statements.push(AsmStatement::Jump {
            label: label.into(),
            condition,
        });
    }

    pub fn add_jump_here(&mut self) {
        self.statements.push(AsmStatement::JumpHere);
    }

    pub fn add_time_inc_ref(&mut self, delta: Operand) -> Result<()> {
        self.add_statement(AsmStatement::TimeIncRef { delta })
    }

    pub fn add_trig(&mut self, port: u32, state: bool) {
        self.statements.push(AsmStatement::Trig { port, state });
    }

    pub fn add_wave_port_write(&mut self, port: u32) {
        self.statements.push(AsmStatement::WavePortWrite { port });
    }

    pub fn add_data_port_write(&mut self, port: u32, value: RegName) {
        self.statements
            .push(AsmStatement::DataPortWrite { port, value });
    }

    /// Assembly text, one statement per line.
    pub fn generate_asm(&self) -> String {
        self.statements
            .iter()
            .map(|statement| format!("{statement}\n"))
            .collect::<String>()
    }

    /// Assembly text with 1-based line numbers, e.g. `001: NOP`.
    pub fn listing(&self) -> String {
        self.statements
            .iter()
            .enumerate()
            .map(|(i, statement)| format!("{:03}: {statement}\n", i + 1))
            .collect::<String>()
    }
}
