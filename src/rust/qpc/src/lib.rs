// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Pulse sequence compiler for the QICK tprocv2.
//!
//! Experiments are composed from [`Code`] blocks which are appended
//! sequentially or in parallel, looped and swept. The [`Compiler`] turns a
//! block into tproc assembly for a given [`Board`], and a [`Qpc`] session runs
//! it on a [`Soc`].

pub mod board;
pub mod code;
pub mod compiler;
pub mod control;
pub mod io;
pub mod pulse;
pub mod session;
pub mod settings;
pub mod soc;
pub mod symbol;
pub mod value;

pub use board::{Board, qick_spin_4x2};
pub use code::{Code, Domain, Statement};
pub use compiler::{Compiler, Program, off_program};
pub use control::{LoopBuilder, SweepBuilder};
pub use io::{Channel, Io, IoKind};
pub use pulse::{RfPulseBuilder, TrigPulseBuilder, delay, trig_const};
pub use session::Qpc;
pub use settings::CompilerSettings;
pub use soc::{SimulatedSoc, Soc, SocConfig};
pub use value::{Constant, Kind, Reg, SweptReg, Value};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Asm(#[from] tproc_asm::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Values of incompatible kinds were combined.
    #[error("{0}")]
    Type(String),
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
