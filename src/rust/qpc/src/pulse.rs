// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Ready made pulse blocks.

use qpc_units::seconds;

use crate::code::Code;
use crate::io::Channel;
use crate::value::Value;
use crate::{Error, Result};

/// An empty block of the given length.
pub fn delay(length: impl Into<Value>) -> Code {
    Code::new().with_length(length)
}

/// A zero length block setting a trigger port high, or low if inverted.
pub fn trig_const(channel: impl Into<Channel>, invert: bool) -> Result<Code> {
    let mut code = Code::new();
    code.trig(channel, !invert, Some(seconds(0.0).into()))?;
    Ok(code)
}

struct PulseOptions {
    time: Value,
    block_length: Option<Value>,
    name: Option<String>,
}

impl PulseOptions {
    fn new() -> Self {
        Self {
            time: seconds(0.0).into(),
            block_length: None,
            name: None,
        }
    }

    fn block(&self, length: &Value) -> Result<Code> {
        let block_length = match &self.block_length {
            Some(block_length) => block_length.clone(),
            None if length.is_const() => length.clone(),
            None => {
                return Err(Error::new(
                    "The block length must be set if the pulse length is not a constant",
                ));
            }
        };
        let code = Code::new().with_length(block_length);
        Ok(match &self.name {
            Some(name) => code.named(name.as_str()),
            None => code,
        })
    }
}

/// A digital pulse on a trigger port.
pub struct TrigPulseBuilder {
    channel: Channel,
    length: Value,
    invert: bool,
    options: PulseOptions,
}

impl TrigPulseBuilder {
    pub fn new(channel: impl Into<Channel>, length: impl Into<Value>) -> Self {
        Self {
            channel: channel.into(),
            length: length.into(),
            invert: false,
            options: PulseOptions::new(),
        }
    }

    /// Start of the pulse within the block.
    pub fn time(mut self, time: impl Into<Value>) -> Self {
        self.options.time = time.into();
        self
    }

    /// Length of the block. Defaults to the pulse length.
    pub fn block_length(mut self, length: impl Into<Value>) -> Self {
        self.options.block_length = Some(length.into());
        self
    }

    /// Drive the port low during the pulse and high at its end.
    pub fn invert(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Code> {
        let mut code = self.options.block(&self.length)?;
        let end = self.options.time.clone().try_add(self.length)?;
        code.trig(&self.channel, !self.invert, Some(self.options.time))?;
        code.trig(&self.channel, self.invert, Some(end))?;
        Ok(code)
    }
}

/// A square RF pulse. Frequency and amplitude left unset keep the values
/// currently stored in the wave registers.
pub struct RfPulseBuilder {
    channel: Channel,
    length: Value,
    freq: Option<Value>,
    amp: Option<Value>,
    options: PulseOptions,
}

impl RfPulseBuilder {
    pub fn new(channel: impl Into<Channel>, length: impl Into<Value>) -> Self {
        Self {
            channel: channel.into(),
            length: length.into(),
            freq: None,
            amp: None,
            options: PulseOptions::new(),
        }
    }

    pub fn freq(mut self, freq: impl Into<Value>) -> Self {
        self.freq = Some(freq.into());
        self
    }

    /// Amplitude in DAC units.
    pub fn amp(mut self, amp: impl Into<Value>) -> Self {
        self.amp = Some(amp.into());
        self
    }

    pub fn time(mut self, time: impl Into<Value>) -> Self {
        self.options.time = time.into();
        self
    }

    pub fn block_length(mut self, length: impl Into<Value>) -> Self {
        self.options.block_length = Some(length.into());
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Code> {
        // a swept pulse length is also the block length
        let mut code = match self.options.block_length {
            None if !self.length.counts_cycles_of(None) => {
                return Err(Error::new(
                    "A pulse length in generator cycles needs a block length",
                ));
            }
            None if !self.length.is_const() => {
                let code = Code::new().with_length(self.length.clone());
                match &self.options.name {
                    Some(name) => code.named(name.as_str()),
                    None => code,
                }
            }
            _ => self.options.block(&self.length)?,
        };
        code.rf_square_pulse(
            self.channel,
            Some(self.length),
            self.freq,
            self.amp,
            Some(self.options.time),
        )?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Statement;
    use crate::io::Io;
    use qpc_units::hertz;
    use tproc_asm::SpecialReg;

    fn trig_states(code: &Code) -> Vec<bool> {
        code.statements()
            .iter()
            .filter_map(|s| match s {
                Statement::Trig { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn out_usr_times(code: &Code) -> Vec<Value> {
        code.statements()
            .iter()
            .filter_map(|s| match s {
                Statement::Assign { reg, value, .. } if reg.is_special(SpecialReg::OutUsrTime) => {
                    Some(value.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_delay() {
        let code = delay(seconds(100e-9)).named("mw_pre_padding");
        assert_eq!(code.length(), &Value::from(seconds(100e-9)));
        assert_eq!(code.name(), Some("mw_pre_padding"));
        assert_eq!(code.statements().len(), 1);
    }

    #[test]
    fn test_trig_const() {
        let code = trig_const(4u32, false).unwrap();
        assert_eq!(trig_states(&code), vec![true]);
        assert_eq!(code.length(), &Value::from(seconds(0.0)));
        let code = trig_const(4u32, true).unwrap();
        assert_eq!(trig_states(&code), vec![false]);
    }

    #[test]
    fn test_trig_pulse() {
        let laser = Io::trig("PMOD0_4");
        let code = TrigPulseBuilder::new(&laser, seconds(0.9e-6))
            .name("init")
            .build()
            .unwrap();
        assert_eq!(code.name(), Some("init"));
        assert_eq!(code.length(), &Value::from(seconds(0.9e-6)));
        assert_eq!(trig_states(&code), vec![true, false]);
        assert_eq!(
            out_usr_times(&code),
            vec![
                Value::from(seconds(0.0)),
                Value::from(seconds(0.0) + seconds(0.9e-6))
            ]
        );

        let inverted = TrigPulseBuilder::new(&laser, seconds(1e-6))
            .time(seconds(0.5e-6))
            .block_length(seconds(2e-6))
            .invert()
            .build()
            .unwrap();
        assert_eq!(trig_states(&inverted), vec![false, true]);
        assert_eq!(inverted.length(), &Value::from(seconds(2e-6)));
    }

    #[test]
    fn test_trig_pulse_with_register_length() {
        let mut outer = Code::new();
        let tau = outer
            .swept_reg(seconds(0.0), seconds(1e-6), seconds(0.1e-6))
            .unwrap();
        assert!(TrigPulseBuilder::new(0u32, &tau).build().is_err());
        let code = TrigPulseBuilder::new(0u32, &tau)
            .block_length(seconds(2e-6))
            .build()
            .unwrap();
        assert_eq!(out_usr_times(&code)[1], Value::from(&tau));
    }

    #[test]
    fn test_rf_pulse() {
        let sample = Io::dac("DAC_A", seconds(-75e-9)).device(seconds(0.0));
        let code = RfPulseBuilder::new(&sample, seconds(1e-6))
            .freq(hertz(200e6))
            .amp(10_000i64)
            .name("mw")
            .build()
            .unwrap();
        assert_eq!(code.length(), &Value::from(seconds(1e-6)));
        assert!(matches!(
            code.statements().last(),
            Some(Statement::WavePortWrite { .. })
        ));

        // a register pulse length becomes the block length
        let mut outer = Code::new();
        let mw = outer
            .swept_reg(seconds(10e-9), seconds(100e-9), seconds(4e-9))
            .unwrap();
        let code = RfPulseBuilder::new(&sample, &mw).build().unwrap();
        assert_eq!(code.length(), &Value::from(&mw));
    }
}
