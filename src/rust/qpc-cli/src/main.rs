// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

mod cli;
mod experiments;

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use qpc::{Board, Compiler, CompilerSettings, Qpc, SimulatedSoc, SocConfig, qick_spin_4x2};
use qpc_log::LevelFilter;

use crate::cli::{Cli, Commands};
use crate::experiments::{Channels, Common, Experiment};

/// Parse an optional JSON file.
fn load<T>(path: Option<PathBuf>, parse: fn(&str) -> qpc::Result<T>) -> anyhow::Result<Option<T>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = parse(&json).with_context(|| format!("Invalid {}", path.display()))?;
    Ok(Some(value))
}

struct CompileArgs {
    experiment: Experiment,
    board: Option<Board>,
    soc_config: Option<SocConfig>,
    settings: Option<CompilerSettings>,
    loops: u64,
    run: bool,
}

fn compile(args: CompileArgs) -> anyhow::Result<()> {
    let board = args.board.unwrap_or_else(qick_spin_4x2);
    let soc_config = args.soc_config.unwrap_or_else(SocConfig::rfsoc_4x2);
    let mut settings = args.settings.unwrap_or_default();
    let common = Common {
        loops: args.loops,
        ..Default::default()
    };
    let code = args.experiment.build(&Channels::default(), &common)?;

    if args.run {
        let mut qpc = Qpc::new(SimulatedSoc::new(soc_config), board, settings)?;
        qpc.run(&code)?;
        qpc.stop()?;
        return Ok(());
    }

    for change in settings.sanitize()? {
        qpc_log::warn!(
            "Setting '{}' changed from {} to {}: {}",
            change.field,
            change.original,
            change.sanitized,
            change.reason
        );
    }
    let program = Compiler::new(board, soc_config, settings)?.compile(&code)?;
    print!("{}", program.listing());
    qpc_log::info!(
        "{} instructions, {} registers",
        program.num_instructions(),
        program.registers_used()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    qpc_log::init_logging(level, cli.verbose);

    match cli.command {
        Commands::Board => {
            println!("{}", serde_json::to_string_pretty(&qick_spin_4x2())?);
        }
        Commands::Compile {
            experiment,
            board,
            soc_config,
            settings,
            loops,
            run,
        } => {
            let args = CompileArgs {
                experiment,
                board: load(board, Board::from_json)?,
                soc_config: load(soc_config, SocConfig::from_json)?,
                settings: load(settings, CompilerSettings::from_json)?,
                loops,
                run,
            };
            compile(args)?;
        }
    }
    Ok(())
}
