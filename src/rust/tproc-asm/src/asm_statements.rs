// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Registers with a fixed function in the tproc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialReg {
    /// Time (relative to the reference) at which the next output is queued.
    OutUsrTime,
    WLength,
    WFreq,
    WGain,
    WPhase,
    WEnv,
    WConf,
    STime,
}

impl fmt::Display for SpecialReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecialReg::OutUsrTime => "out_usr_time",
            SpecialReg::WLength => "w_length",
            SpecialReg::WFreq => "w_freq",
            SpecialReg::WGain => "w_gain",
            SpecialReg::WPhase => "w_phase",
            SpecialReg::WEnv => "w_env",
            SpecialReg::WConf => "w_conf",
            SpecialReg::STime => "s_time",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegName {
    General(u16),
    Special(SpecialReg),
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegName::General(index) => write!(f, "r{index}"),
            RegName::Special(reg) => write!(f, "{reg}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(RegName),
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "#{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Add => write!(f, "+"),
            Operator::Sub => write!(f, "-"),
        }
    }
}

/// ALU operation, rendered as `-op(left)` or `-op(left <op> right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AluOp {
    pub left: RegName,
    pub rhs: Option<(Operator, Operand)>,
}

impl AluOp {
    pub fn copy(left: RegName) -> Self {
        Self { left, rhs: None }
    }

    pub fn binary(left: RegName, operator: Operator, right: Operand) -> Self {
        Self {
            left,
            rhs: Some((operator, right)),
        }
    }

    pub(crate) fn immediate(&self) -> Option<i64> {
        match self.rhs {
            Some((_, Operand::Imm(value))) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rhs {
            None => write!(f, "-op({})", self.left),
            Some((operator, right)) => write!(f, "-op({} {operator} {right})", self.left),
        }
    }
}

/// ALU flag condition of a conditional jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Zero,
    NotZero,
    Sign,
    NotSign,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self {
            Condition::Zero => "Z",
            Condition::NotZero => "NZ",
            Condition::Sign => "S",
            Condition::NotSign => "NS",
        };
        write!(f, "{flag}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AsmStatement {
    Comment {
        text: String,
    },
    Label {
        name: String,
    },
    Nop,
    RegWriteImm {
        dst: RegName,
        value: i64,
    },
    RegWriteOp {
        dst: RegName,
        op: AluOp,
    },
    Test {
        op: AluOp,
    },
    Jump {
        label: String,
        condition: Option<Condition>,
    },
    JumpHere,
    TimeIncRef {
        delta: Operand,
    },
    Trig {
        port: u32,
        state: bool,
    },
    WavePortWrite {
        port: u32,
    },
    DataPortWrite {
        port: u32,
        value: RegName,
    },
}

impl AsmStatement {
    /// Whether the statement occupies program memory.
    pub fn is_instruction(&self) -> bool {
        !matches!(
            self,
            AsmStatement::Comment { .. } | AsmStatement::Label { .. }
        )
    }
}

impl fmt::Display for AsmStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmStatement::Comment { text } => write!(f, "// {text}"),
            AsmStatement::Label { name } => write!(f, "{name}:"),
            AsmStatement::Nop => write!(f, "NOP"),
            AsmStatement::RegWriteImm { dst, value } => write!(f, "REG_WR {dst} imm #{value}"),
            AsmStatement::RegWriteOp { dst, op } => write!(f, "REG_WR {dst} op {op}"),
            AsmStatement::Test { op } => write!(f, "TEST {op}"),
            AsmStatement::Jump { label, condition } => match condition {
                Some(condition) => write!(f, "JUMP {label} -if({condition})"),
                None => write!(f, "JUMP {label}"),
            },
            AsmStatement::JumpHere => write!(f, "JUMP HERE"),
            AsmStatement::TimeIncRef { delta } => write!(f, "TIME inc_ref {delta}"),
            AsmStatement::Trig { port, state } => {
                let action = if *state { "set" } else { "clr" };
                write!(f, "TRIG {action} p{port}")
            }
            AsmStatement::WavePortWrite { port } => write!(f, "WPORT_WR p{port} r_wave"),
            AsmStatement::DataPortWrite { port, value } => {
                write!(f, "DPORT_WR p{port} reg {value}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alu_op_display() {
        let r0 = RegName::General(0);
        assert_eq!(AluOp::copy(r0).to_string(), "-op(r0)");
        assert_eq!(
            AluOp::binary(r0, Operator::Add, Operand::Reg(RegName::General(3))).to_string(),
            "-op(r0 + r3)"
        );
        assert_eq!(
            AluOp::binary(r0, Operator::Sub, Operand::Imm(5)).to_string(),
            "-op(r0 - #5)"
        );
    }

    #[test]
    fn test_statement_display() {
        let statement = AsmStatement::RegWriteOp {
            dst: RegName::Special(SpecialReg::OutUsrTime),
            op: AluOp::binary(RegName::General(1), Operator::Sub, Operand::Imm(31)),
        };
        assert_eq!(statement.to_string(), "REG_WR out_usr_time op -op(r1 - #31)");

        let statement = AsmStatement::Jump {
            label: "LOOP_END1".to_string(),
            condition: Some(Condition::NotSign),
        };
        assert_eq!(statement.to_string(), "JUMP LOOP_END1 -if(NS)");
        assert_eq!(
            AsmStatement::Trig {
                port: 4,
                state: false
            }
            .to_string(),
            "TRIG clr p4"
        );
        assert_eq!(
            AsmStatement::TimeIncRef {
                delta: Operand::Imm(409600)
            }
            .to_string(),
            "TIME inc_ref #409600"
        );
    }

    #[test]
    fn test_is_instruction() {
        assert!(AsmStatement::Nop.is_instruction());
        assert!(
            !AsmStatement::Comment {
                text: "x".to_string()
            }
            .is_instruction()
        );
        assert!(
            !AsmStatement::Label {
                name: "L0".to_string()
            }
            .is_instruction()
        );
    }
}
