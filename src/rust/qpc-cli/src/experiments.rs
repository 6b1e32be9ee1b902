// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Spin experiments on an NV center setup.
//!
//! Every experiment initializes the spin with a laser pulse, manipulates it
//! with microwaves on the `sample` DAC and reads it out with a second laser
//! pulse. A reference shot without microwaves follows each measurement. The
//! pair is swept over one parameter, and the sweep repeated `loops` times.

use clap::ValueEnum;
use qpc::{
    Code, Io, LoopBuilder, Result, RfPulseBuilder, SweepBuilder, TrigPulseBuilder, delay,
};
use qpc_units::{Frequency, Time, hertz, seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Experiment {
    Rabi,
    T1,
    HahnEcho,
    Odmr,
    TrigPulse,
}

/// Devices connected to the board.
#[derive(Debug, Clone)]
pub struct Channels {
    pub laser_1: Io,
    pub laser_2: Io,
    pub sample: Io,
}

impl Default for Channels {
    fn default() -> Self {
        let laser = |pin: u32| Io::trig(format!("PMOD0_{pin}")).device(seconds(0.0));
        let dac_a = Io::dac("DAC_A", seconds(-75e-9));
        Self {
            laser_1: laser(4),
            laser_2: laser(5),
            sample: dac_a.device(seconds(0.0)),
        }
    }
}

/// Parameters shared by all spin experiments.
#[derive(Debug, Clone)]
pub struct Common {
    pub loops: u64,
    pub amp: i64,
    pub freq: Frequency,
    pub laser_length: Time,
    pub mw_pre_padding: Time,
    pub mw_post_padding: Time,
}

impl Default for Common {
    fn default() -> Self {
        Self {
            loops: 1,
            amp: 10_000,
            freq: hertz(200e6),
            laser_length: seconds(0.9e-6),
            mw_pre_padding: seconds(100e-9),
            mw_post_padding: seconds(100e-9),
        }
    }
}

impl Common {
    fn init(&self, channels: &Channels) -> Result<Code> {
        TrigPulseBuilder::new(&channels.laser_1, self.laser_length)
            .name("init")
            .build()
    }

    fn readout(&self, channels: &Channels) -> Result<Code> {
        TrigPulseBuilder::new(&channels.laser_2, self.laser_length)
            .name("readout")
            .build()
    }

    /// `init`, padding, `manipulation`, padding, `readout`.
    fn shot(&self, channels: &Channels, manipulation: &[&Code]) -> Result<Code> {
        let mut shot = self.init(channels)?;
        shot.add(&delay(self.mw_pre_padding).named("mw_pre_padding"))?;
        for block in manipulation {
            shot.add(block)?;
        }
        shot.add(&delay(self.mw_post_padding).named("mw_post_padding"))?;
        shot.add(&self.readout(channels)?)?;
        Ok(shot)
    }

    fn rf_pulse(&self, channels: &Channels, length: Time, amp: i64, name: &str) -> Result<Code> {
        RfPulseBuilder::new(&channels.sample, length)
            .freq(self.freq)
            .amp(amp)
            .name(name)
            .build()
    }
}

/// Sweep the microwave pulse length.
///
/// The length is swept twice: in tproc cycles for the block timing and in
/// fabric cycles of the generator for the pulse itself.
pub fn rabi(channels: &Channels, common: &Common) -> Result<Code> {
    let (start, stop, step) = (seconds(20e-9), seconds(200e-9), seconds(10e-9));
    let mut code = Code::new().named("rabi");
    let mw = code.swept_reg(start, stop, step)?;
    let mw_length = code
        .swept_reg(start, stop, step)?
        .on_channel(&channels.sample);

    let mw_pulse = RfPulseBuilder::new(&channels.sample, &mw_length)
        .block_length(&mw)
        .freq(common.freq)
        .amp(common.amp)
        .name("mw")
        .build()?;
    let w_mw = common.shot(channels, &[&mw_pulse])?;
    let no_mw = common.shot(channels, &[&delay(&mw).named("no mw")])?;

    let sweep = SweepBuilder::new(&Code::sequence([&w_mw, &no_mw])?, &mw)
        .follow(&mw_length)
        .inc_ref()
        .name("microwave sweep")
        .build()?;
    code.add(&LoopBuilder::new(&sweep, Some(common.loops)).name("loop").build()?)?;
    Ok(code)
}

/// Sweep the wait time between initialization and a pi pulse.
pub fn t1(channels: &Channels, common: &Common) -> Result<Code> {
    let pi_time = seconds(20e-9);
    let mut code = Code::new().named("T1");
    let tau = code.swept_reg(seconds(1e-6), seconds(100e-6), seconds(10e-6))?;

    let tau_delay = delay(&tau).named("tau 1");
    let pi = common.rf_pulse(channels, pi_time, common.amp, "pi")?;
    let with_pi = common.shot(channels, &[&tau_delay, &pi])?;
    let without_pi = common.shot(channels, &[&tau_delay, &delay(pi_time).named("pi_delay")])?;

    let sweep = SweepBuilder::new(&Code::sequence([&with_pi, &without_pi])?, &tau)
        .inc_ref()
        .name("tau sweep")
        .build()?;
    code.add(&LoopBuilder::new(&sweep, Some(common.loops)).name("loop").build()?)?;
    Ok(code)
}

/// pi/2 - tau - pi - tau - ±pi/2, sweeping tau.
pub fn hahn_echo(channels: &Channels, common: &Common) -> Result<Code> {
    let pi_time = seconds(20e-9);
    let mut code = Code::new().named("hahn echo");
    let tau = code.swept_reg(seconds(20e-9), seconds(200e-9), seconds(10e-9))?;

    let pi = common.rf_pulse(channels, pi_time, common.amp, "pi")?;
    let pos_pi2 = common.rf_pulse(channels, pi_time * 0.5, common.amp, "pi/2")?;
    let neg_pi2 = common.rf_pulse(channels, pi_time * 0.5, -common.amp, "-pi/2")?;
    let tau_1 = delay(&tau).named("tau 1");
    let tau_2 = delay(&tau).named("tau 2");

    let echo = common.shot(channels, &[&pos_pi2, &tau_1, &pi, &tau_2, &pos_pi2])?;
    let inverted = common.shot(channels, &[&pos_pi2, &tau_1, &pi, &tau_2, &neg_pi2])?;

    let sweep = SweepBuilder::new(&Code::sequence([&echo, &inverted])?, &tau)
        .inc_ref()
        .name("tau sweep")
        .build()?;
    code.add(&LoopBuilder::new(&sweep, Some(common.loops)).name("loop").build()?)?;
    Ok(code)
}

/// Sweep the microwave frequency.
pub fn odmr(channels: &Channels, common: &Common) -> Result<Code> {
    let mw_len = seconds(1e-6);
    let mut code = Code::new().named("pulsed ODMR");
    let freq = code
        .swept_reg(hertz(50e6), hertz(151e6), hertz(50e6))?
        .on_channel(&channels.sample);

    let mw = RfPulseBuilder::new(&channels.sample, mw_len)
        .freq(&freq)
        .amp(common.amp)
        .build()?;
    let mw_on = common.shot(channels, &[&mw])?;
    let mw_off = common.shot(channels, &[&delay(mw_len).named("mw_delay")])?;

    let sweep = SweepBuilder::new(&Code::sequence([&mw_on, &mw_off])?, &freq)
        .inc_ref()
        .name("sweep")
        .build()?;
    code.add(&LoopBuilder::new(&sweep, Some(common.loops)).name("loop").build()?)?;
    Ok(code)
}

/// A 1 us laser pulse every 2 us, forever.
pub fn trig_pulse(channels: &Channels) -> Result<Code> {
    let pulse = TrigPulseBuilder::new(&channels.laser_1, seconds(1e-6))
        .block_length(seconds(2e-6))
        .name("pulse")
        .build()?;
    LoopBuilder::new(&pulse, None).inc_ref().name("loop").build()
}

impl Experiment {
    pub fn build(self, channels: &Channels, common: &Common) -> Result<Code> {
        match self {
            Experiment::Rabi => rabi(channels, common),
            Experiment::T1 => t1(channels, common),
            Experiment::HahnEcho => hahn_echo(channels, common),
            Experiment::Odmr => odmr(channels, common),
            Experiment::TrigPulse => trig_pulse(channels),
        }
    }
}
