// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! The SoC running the QICK firmware.

use qpc_units::clock::{
    cycles_to_seconds, hertz_to_register, register_to_hertz, seconds_to_cycles,
};
use qpc_units::{Frequency, Time};
use serde::{Deserialize, Serialize};

use crate::compiler::Program;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TprocConfig {
    /// Clock of the timed processor.
    pub f_time_mhz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Fabric clock, which pulse lengths are expressed in.
    pub f_fabric_mhz: f64,
    pub f_dds_mhz: f64,
    /// Phase resolution of the DDS.
    pub b_dds: u32,
}

/// Firmware configuration reported by the SoC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocConfig {
    pub board: String,
    pub tproc: TprocConfig,
    /// Signal generators, indexed by their DAC port.
    pub generators: Vec<GeneratorConfig>,
}

impl SocConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configuration of the RFSoC 4x2 with the standard tprocv2 firmware.
    pub fn rfsoc_4x2() -> Self {
        let generator = GeneratorConfig {
            f_fabric_mhz: 614.4,
            f_dds_mhz: 9830.4,
            b_dds: 32,
        };
        Self {
            board: "RFSoC4x2".to_string(),
            tproc: TprocConfig { f_time_mhz: 409.6 },
            generators: vec![generator.clone(), generator],
        }
    }

    pub fn generator(&self, generator: u32) -> Result<&GeneratorConfig> {
        self.generators.get(generator as usize).ok_or_else(|| {
            Error::new(&format!(
                "SoC '{}' has no signal generator {generator}",
                self.board
            ))
        })
    }

    /// Clock in Hz that times on `generator` are expressed in. Without a
    /// generator this is the tproc clock.
    pub fn time_clock_hz(&self, generator: Option<u32>) -> Result<f64> {
        match generator {
            None => Ok(self.tproc.f_time_mhz * 1e6),
            Some(generator) => Ok(self.generator(generator)?.f_fabric_mhz * 1e6),
        }
    }

    pub fn time_to_cycles(&self, time: Time, generator: Option<u32>) -> Result<i64> {
        Ok(seconds_to_cycles(time, self.time_clock_hz(generator)?))
    }

    pub fn cycles_to_time(&self, cycles: i64, generator: Option<u32>) -> Result<Time> {
        Ok(cycles_to_seconds(cycles, self.time_clock_hz(generator)?))
    }

    pub fn freq_to_register(&self, freq: Frequency, generator: u32) -> Result<i64> {
        let config = self.generator(generator)?;
        Ok(hertz_to_register(
            freq,
            config.f_dds_mhz * 1e6,
            config.b_dds,
        ))
    }

    pub fn register_to_freq(&self, register: i64, generator: u32) -> Result<Frequency> {
        let config = self.generator(generator)?;
        Ok(register_to_hertz(
            register,
            config.f_dds_mhz * 1e6,
            config.b_dds,
        ))
    }
}

/// Control interface of a QICK SoC.
pub trait Soc {
    fn config(&self) -> Result<SocConfig>;

    /// Stop the running program.
    fn reset(&mut self) -> Result<()>;

    fn load_program(&mut self, program: &Program) -> Result<()>;

    /// Start the loaded program.
    fn start(&mut self) -> Result<()>;

    /// Start the loaded program and stream the ADC readouts.
    fn start_readout(&mut self, readouts_per_loop: u32) -> Result<()>;

    fn stop_readout(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedState {
    Idle,
    Loaded,
    Running,
    ReadingOut { readouts_per_loop: u32 },
}

/// In-process SoC which records what it is asked to do.
#[derive(Debug, Clone)]
pub struct SimulatedSoc {
    config: SocConfig,
    state: SimulatedState,
    loaded: Vec<String>,
}

impl SimulatedSoc {
    pub fn new(config: SocConfig) -> Self {
        Self {
            config,
            state: SimulatedState::Idle,
            loaded: vec![],
        }
    }

    pub fn state(&self) -> SimulatedState {
        self.state
    }

    /// Assembly of every program loaded so far, oldest first.
    pub fn loaded_programs(&self) -> &[String] {
        &self.loaded
    }
}

impl Default for SimulatedSoc {
    fn default() -> Self {
        Self::new(SocConfig::rfsoc_4x2())
    }
}

impl Soc for SimulatedSoc {
    fn config(&self) -> Result<SocConfig> {
        Ok(self.config.clone())
    }

    fn reset(&mut self) -> Result<()> {
        self.state = SimulatedState::Idle;
        Ok(())
    }

    fn load_program(&mut self, program: &Program) -> Result<()> {
        if matches!(
            self.state,
            SimulatedState::Running | SimulatedState::ReadingOut { .. }
        ) {
            return Err(Error::new("Cannot load a program while the tproc is running"));
        }
        qpc_log::debug!(
            "Loading program with {} instructions",
            program.num_instructions()
        );
        self.loaded.push(program.asm());
        self.state = SimulatedState::Loaded;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.state == SimulatedState::Idle {
            return Err(Error::new("No program loaded"));
        }
        self.state = SimulatedState::Running;
        Ok(())
    }

    fn start_readout(&mut self, readouts_per_loop: u32) -> Result<()> {
        self.start()?;
        self.state = SimulatedState::ReadingOut { readouts_per_loop };
        Ok(())
    }

    fn stop_readout(&mut self) -> Result<()> {
        if let SimulatedState::ReadingOut { .. } = self.state {
            self.state = SimulatedState::Running;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpc_units::{hertz, seconds};

    #[test]
    fn test_conversions() {
        let config = SocConfig::rfsoc_4x2();
        assert_eq!(config.time_to_cycles(seconds(1e-3), None).unwrap(), 409600);
        assert_eq!(config.time_to_cycles(seconds(1e-6), Some(0)).unwrap(), 614);
        assert_eq!(config.cycles_to_time(4096, None).unwrap(), seconds(1e-5));
        // one register unit is f_dds / 2^32
        let unit = config.register_to_freq(1, 0).unwrap();
        assert_eq!(
            config.freq_to_register(unit * 1000.0, 1).unwrap(),
            1000
        );
        assert!(config.freq_to_register(hertz(1e6), 2).is_err());
        assert!(config.time_to_cycles(seconds(1e-6), Some(5)).is_err());
    }

    #[test]
    fn test_config_json() {
        let config = SocConfig::rfsoc_4x2();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(SocConfig::from_json(&json).unwrap(), config);
        assert!(SocConfig::from_json(r#"{"board": "x"}"#).is_err());
    }

    #[test]
    fn test_simulated_state() {
        let mut soc = SimulatedSoc::default();
        assert!(soc.start().is_err());
        assert_eq!(soc.state(), SimulatedState::Idle);
        assert!(soc.stop_readout().is_ok());
    }
}
