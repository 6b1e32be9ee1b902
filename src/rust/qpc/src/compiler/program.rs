// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use tproc_asm::{AsmGenerator, AsmStatement};

/// A compiled tproc program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    generator: AsmGenerator,
    registers_used: u16,
}

impl Program {
    pub(crate) fn new(generator: AsmGenerator, registers_used: u16) -> Self {
        Self {
            generator,
            registers_used,
        }
    }

    pub fn statements(&self) -> &[AsmStatement] {
        self.generator.statements()
    }

    /// Assembly text as accepted by the tprocv2 assembler.
    pub fn asm(&self) -> String {
        self.generator.generate_asm()
    }

    /// Assembly text with line numbers.
    pub fn listing(&self) -> String {
        self.generator.listing()
    }

    /// Number of general purpose registers, including temporaries.
    pub fn registers_used(&self) -> u16 {
        self.registers_used
    }

    pub fn num_instructions(&self) -> usize {
        self.generator.num_instructions()
    }
}
