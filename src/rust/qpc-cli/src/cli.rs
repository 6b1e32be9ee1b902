// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::experiments::Experiment;

#[derive(Parser)]
#[command(name = "qpc")]
#[command(about = "Compile pulse sequences for the QICK tprocv2")]
pub struct Cli {
    /// Log compiler diagnostics
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile an experiment and print the program listing
    Compile {
        #[arg(value_enum)]
        experiment: Experiment,

        /// Board description (JSON), defaults to the RFSoC 4x2
        #[arg(long)]
        board: Option<PathBuf>,

        /// SoC firmware configuration (JSON)
        #[arg(long = "soc-config")]
        soc_config: Option<PathBuf>,

        /// Compiler settings (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Number of experiment repetitions
        #[arg(long, default_value_t = 1)]
        loops: u64,

        /// Run the program on a simulated SoC
        #[arg(long)]
        run: bool,
    },
    /// Print the built-in board as JSON
    Board,
}
