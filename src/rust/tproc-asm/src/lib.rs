// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Resolved tprocv2 assembly statements and their text representation.

pub mod asm_generator;
pub mod asm_statements;

pub use asm_generator::AsmGenerator;
pub use asm_statements::{AluOp, AsmStatement, Condition, Operand, Operator, RegName, SpecialReg};

/// Largest immediate accepted as an ALU operand.
pub const MAX_IMM: i64 = (1 << 23) - 1;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
