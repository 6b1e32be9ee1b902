// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Code blocks: symbolic tproc instructions with a length and an offset.
//!
//! A block owns the registers and labels created through it. Appending a
//! block to another one (sequentially with [`Code::add`] or in parallel with
//! [`Code::parallel`]) copies it and gives all of its owned symbols fresh
//! identities, so that a block can be reused several times in one program
//! without the copies sharing registers or labels.

use std::collections::{BTreeSet, HashMap};

use qpc_units::{Time, seconds};
use tproc_asm::{Condition, SpecialReg};

use crate::io::Channel;
use crate::symbol::{Label, SymbolId};
use crate::value::{Constant, Kind, Reg, SweptReg, Value};
use crate::{Error, Result};

/// Amplitude range of the signal generators, in DAC units.
pub const AMP_MIN: i64 = -32768;
pub const AMP_MAX: i64 = 32767;

/// Clock domain used to convert the constants of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Times in tproc cycles.
    Tproc,
    /// Times in fabric cycles and frequencies in DDS units of the
    /// generator driving the channel.
    Generator(Channel),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Comment {
        text: String,
    },
    /// Comment mentioning a firmware port, which is only known after the
    /// channel has been resolved.
    ChannelComment {
        prefix: String,
        channel: Channel,
        suffix: String,
    },
    Label {
        label: Label,
    },
    Assign {
        reg: Reg,
        value: Value,
        domain: Domain,
        /// Reject constants that cannot be represented within the configured
        /// rounding error.
        check_rounding: bool,
    },
    /// Set the ALU flags from `left - right`.
    Test {
        left: Reg,
        right: Value,
        domain: Domain,
        check_rounding: bool,
    },
    Jump {
        label: Label,
        condition: Option<Condition>,
    },
    IncRef {
        delta: Value,
    },
    Trig {
        channel: Channel,
        state: bool,
    },
    WavePortWrite {
        channel: Channel,
    },
    DataPortWrite {
        channel: Channel,
        value: Reg,
    },
}

impl Statement {
    fn renumber(&mut self, ids: &HashMap<SymbolId, SymbolId>) {
        let mut renumber_reg = |reg: &mut Reg| {
            if let Some(id) = ids.get(&reg.id) {
                reg.id = *id;
            }
        };
        match self {
            Statement::Label { label } | Statement::Jump { label, .. } => {
                if let Some(id) = ids.get(&label.id) {
                    label.id = *id;
                }
            }
            Statement::Assign { reg, value, .. } => {
                renumber_reg(reg);
                value.for_each_reg_mut(&mut renumber_reg);
            }
            Statement::Test { left, right, .. } => {
                renumber_reg(left);
                right.for_each_reg_mut(&mut renumber_reg);
            }
            Statement::IncRef { delta } => delta.for_each_reg_mut(&mut renumber_reg),
            Statement::DataPortWrite { value, .. } => renumber_reg(value),
            Statement::Comment { .. }
            | Statement::ChannelComment { .. }
            | Statement::Trig { .. }
            | Statement::WavePortWrite { .. } => {}
        }
    }
}

/// Output select field of the signal generator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelect {
    Product = 0,
    Dds = 1,
    Input = 2,
    Zero = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    OneShot = 0,
    Periodic = 1,
}

/// Generator output once the waveform has been played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteadyState {
    Last = 0,
    Zero = 1,
}

/// Value of the `w_conf` register.
pub fn sig_gen_conf(
    outsel: OutputSelect,
    mode: GeneratorMode,
    stdysel: SteadyState,
    phase_reset: bool,
) -> i64 {
    i64::from(phase_reset) * 0b10000
        + stdysel as i64 * 0b01000
        + mode as i64 * 0b00100
        + outsel as i64
}

fn expect_kind(value: &Value, kind: Kind, what: &str) -> Result<()> {
    match value.kind() {
        Some(k) if k != kind => Err(Error::type_error(format!(
            "{what} must be a {} value",
            match kind {
                Kind::Time => "time",
                Kind::Freq => "frequency",
            }
        ))),
        _ => Ok(()),
    }
}

fn expect_clock(value: &Value, clock: Option<&Channel>, what: &str) -> Result<()> {
    if value.counts_cycles_of(clock) {
        return Ok(());
    }
    let reason = match clock {
        Some(_) => "can only use time registers swept on the channel of its generator",
        None => "cannot use a time register counting generator cycles",
    };
    Err(Error::type_error(format!("{what} {reason}")))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    name: Option<String>,
    length: Value,
    offset: Value,
    statements: Vec<Statement>,
    owned: BTreeSet<SymbolId>,
}

impl Default for Code {
    fn default() -> Self {
        Self::new()
    }
}

impl Code {
    /// An empty block of zero length.
    pub fn new() -> Self {
        Self {
            name: None,
            length: Value::from(seconds(0.0)),
            offset: Value::from(seconds(0.0)),
            statements: vec![],
            owned: BTreeSet::new(),
        }
    }

    /// Name the block. The name is emitted as a banner comment at the top of
    /// the block.
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        let name = name.into();
        let banner = Statement::Comment {
            text: format!("---------------\n{name}\n---------------"),
        };
        self.statements.insert(0, banner);
        self.name = Some(name);
        self
    }

    pub fn with_length(mut self, length: impl Into<Value>) -> Self {
        self.length = length.into();
        self
    }

    /// Offset added to the time of every pulse emitted by this block.
    pub fn with_offset(mut self, offset: impl Into<Value>) -> Self {
        self.offset = offset.into();
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn length(&self) -> &Value {
        &self.length
    }

    pub fn offset(&self) -> &Value {
        &self.offset
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Whether the symbol was created in this block or in a block appended
    /// to it.
    pub fn owns(&self, id: SymbolId) -> bool {
        self.owned.contains(&id)
    }

    /// A new general purpose register.
    pub fn reg(&mut self) -> Reg {
        let reg = Reg::allocated();
        self.owned.insert(reg.id);
        reg
    }

    /// A new register to be swept over `start..stop` by a sweep.
    pub fn swept_reg(
        &mut self,
        start: impl Into<Value>,
        stop: impl Into<Value>,
        step: impl Into<Value>,
    ) -> Result<SweptReg> {
        let reg = self.reg();
        SweptReg::new(reg, start.into(), stop.into(), step.into())
    }

    pub fn label<S: Into<String>>(&mut self, prefix: S) -> Label {
        let label = Label::new(prefix);
        self.owned.insert(label.id);
        label
    }

    pub fn comment<S: Into<String>>(&mut self, text: S) {
        self.statements.push(Statement::Comment { text: text.into() });
    }

    /// Assign a value to a register. Typed values set the kind held by the
    /// register.
    ///
    /// Constants are converted for the generator of the register if it has
    /// one, otherwise with the tproc clock.
    pub fn assign(&mut self, reg: &mut Reg, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        expect_clock(&value, reg.generator(), "Assigned value")?;
        let domain = match reg.generator() {
            Some(channel) => Domain::Generator(channel.clone()),
            None => Domain::Tproc,
        };
        self.assign_in(reg, value, domain, false)
    }

    pub(crate) fn assign_in(
        &mut self,
        reg: &mut Reg,
        value: Value,
        domain: Domain,
        check_rounding: bool,
    ) -> Result<()> {
        reg.hold(value.kind())?;
        self.statements.push(Statement::Assign {
            reg: reg.clone(),
            value,
            domain,
            check_rounding,
        });
        Ok(())
    }

    fn assign_special(
        &mut self,
        special: SpecialReg,
        value: Value,
        kind: Option<Kind>,
        domain: Domain,
    ) -> Result<()> {
        let mut reg = Reg::special(special);
        reg.hold(kind)?;
        self.assign_in(&mut reg, value, domain, false)
    }

    pub(crate) fn test(
        &mut self,
        left: &Reg,
        right: Value,
        domain: Domain,
        check_rounding: bool,
    ) -> Result<()> {
        if !Value::from(left).typecastable(&right) {
            return Err(Error::type_error(
                "Cannot compare values of incompatible kinds",
            ));
        }
        self.statements.push(Statement::Test {
            left: left.clone(),
            right,
            domain,
            check_rounding,
        });
        Ok(())
    }

    pub(crate) fn place_label(&mut self, label: &Label) {
        self.statements.push(Statement::Label {
            label: label.clone(),
        });
    }

    pub(crate) fn jump(&mut self, label: &Label, condition: Option<Condition>) {
        self.statements.push(Statement::Jump {
            label: label.clone(),
            condition,
        });
    }

    /// Advance the timing reference by the length of this block.
    pub fn inc_ref(&mut self) -> Result<()> {
        let delta = self.length.clone();
        self.inc_ref_by(delta)
    }

    pub fn inc_ref_by(&mut self, delta: impl Into<Value>) -> Result<()> {
        let delta = delta.into();
        expect_kind(&delta, Kind::Time, "Reference increment")?;
        expect_clock(&delta, None, "Reference increment")?;
        self.statements.push(Statement::IncRef { delta });
        Ok(())
    }

    /// The channel and the total latency offset of its IO.
    pub fn deembed_io(&self, channel: impl Into<Channel>) -> (Channel, Time) {
        let channel = channel.into();
        let offset = channel.offset();
        (channel, offset)
    }

    /// Absolute time of an output on an IO with the given offset.
    fn output_time(&self, port_offset: Time, time: Value) -> Result<Value> {
        expect_kind(&time, Kind::Time, "Output time")?;
        let time = self.offset.clone().try_add(port_offset)?.try_add(time)?;
        expect_clock(&time, None, "Output time")?;
        Ok(time)
    }

    /// Set a trigger port high or low at `time`. Without a time the value
    /// currently in `out_usr_time` is used.
    pub fn trig(
        &mut self,
        channel: impl Into<Channel>,
        state: bool,
        time: Option<Value>,
    ) -> Result<()> {
        let (channel, port_offset) = self.deembed_io(channel);
        self.statements.push(Statement::ChannelComment {
            prefix: "setting trigger port ".to_string(),
            channel: channel.clone(),
            suffix: format!(" to {state}"),
        });
        if let Some(time) = time {
            let time = self.output_time(port_offset, time)?;
            self.assign_special(SpecialReg::OutUsrTime, time, Some(Kind::Time), Domain::Tproc)?;
        }
        self.statements.push(Statement::Trig { channel, state });
        Ok(())
    }

    /// Play a square RF pulse. Parameters passed as `None` keep the value
    /// currently stored in the corresponding wave register.
    pub fn rf_square_pulse(
        &mut self,
        channel: impl Into<Channel>,
        length: Option<Value>,
        freq: Option<Value>,
        amp: Option<Value>,
        time: Option<Value>,
    ) -> Result<()> {
        let (channel, port_offset) = self.deembed_io(channel);
        self.statements.push(Statement::ChannelComment {
            prefix: "pulsing RF port ".to_string(),
            channel: channel.clone(),
            suffix: String::new(),
        });
        if let Some(time) = time {
            let time = self.output_time(port_offset, time)?;
            self.assign_special(SpecialReg::OutUsrTime, time, Some(Kind::Time), Domain::Tproc)?;
        }
        if let Some(length) = length {
            expect_kind(&length, Kind::Time, "Pulse length")?;
            expect_clock(&length, Some(&channel), "Pulse length")?;
            self.assign_special(
                SpecialReg::WLength,
                length,
                Some(Kind::Time),
                Domain::Generator(channel.clone()),
            )?;
        }
        if let Some(freq) = freq {
            expect_kind(&freq, Kind::Freq, "Pulse frequency")?;
            self.assign_special(
                SpecialReg::WFreq,
                freq,
                Some(Kind::Freq),
                Domain::Generator(channel.clone()),
            )?;
        }
        if let Some(amp) = amp {
            if amp.kind().is_some() {
                return Err(Error::type_error("Pulse amplitude must be an integer"));
            }
            match amp.as_const() {
                Some(Constant::Int(value)) if !(AMP_MIN..=AMP_MAX).contains(value) => {
                    return Err(Error::new(&format!(
                        "Amplitude {value} is outside of {AMP_MIN}..={AMP_MAX}"
                    )));
                }
                _ => {}
            }
            self.assign_special(SpecialReg::WGain, amp, None, Domain::Tproc)?;
        }
        let conf = sig_gen_conf(
            OutputSelect::Dds,
            GeneratorMode::OneShot,
            SteadyState::Zero,
            false,
        );
        self.assign_special(SpecialReg::WConf, Value::from(conf), None, Domain::Tproc)?;
        self.statements.push(Statement::WavePortWrite { channel });
        Ok(())
    }

    /// Write the content of a register to a data port.
    pub fn data_port_write(&mut self, channel: impl Into<Channel>, value: &Reg) {
        self.statements.push(Statement::DataPortWrite {
            channel: channel.into(),
            value: value.clone(),
        });
    }

    /// Shift every `out_usr_time` assignment by `offset`.
    ///
    /// The block is left unchanged if any of the shifted times is invalid.
    pub fn epoch_offset(&mut self, offset: &Value) -> Result<()> {
        let shifted = self
            .out_usr_times()
            .map(|time| time.clone().try_add(offset))
            .collect::<Result<Vec<_>>>()?;
        let times = self.statements.iter_mut().filter_map(|s| match s {
            Statement::Assign { reg, value, .. } if reg.is_special(SpecialReg::OutUsrTime) => {
                Some(value)
            }
            _ => None,
        });
        for (time, shifted) in times.zip(shifted) {
            *time = shifted;
        }
        Ok(())
    }

    fn out_usr_times(&self) -> impl Iterator<Item = &Value> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Assign { reg, value, .. } if reg.is_special(SpecialReg::OutUsrTime) => {
                Some(value)
            }
            _ => None,
        })
    }

    /// A copy of this block where every owned symbol has a fresh identity.
    pub fn renumbered(&self) -> Code {
        let ids: HashMap<SymbolId, SymbolId> = self
            .owned
            .iter()
            .map(|id| (*id, SymbolId::fresh()))
            .collect();
        let mut copy = self.clone();
        for statement in copy.statements.iter_mut() {
            statement.renumber(&ids);
        }
        for value in [&mut copy.length, &mut copy.offset] {
            value.for_each_reg_mut(&mut |reg| {
                if let Some(id) = ids.get(&reg.id) {
                    reg.id = *id;
                }
            });
        }
        copy.owned = ids.into_values().collect();
        copy
    }

    /// Take over the statements and symbols of `other`.
    pub(crate) fn absorb(&mut self, other: Code) {
        self.statements.extend(other.statements);
        self.owned.extend(other.owned);
    }

    fn combine_name(&mut self, other: Option<&str>, operator: &str) {
        self.name = match (self.name.take(), other) {
            (None, other) => other.map(str::to_string),
            (Some(name), None) => Some(name),
            (Some(name), Some(other)) => Some(format!("({name} {operator} {other})")),
        };
    }

    /// Append a copy of `other` to run after this block.
    pub fn add(&mut self, other: &Code) -> Result<()> {
        let mut copy = other.renumbered();
        copy.epoch_offset(&self.length)?;
        self.length = self.length.clone().try_add(copy.length.clone())?;
        self.combine_name(copy.name.as_deref(), "+");
        self.absorb(copy);
        Ok(())
    }

    /// Append a copy of `other` to run in parallel with this block.
    ///
    /// With `auto_length` the length becomes the longer of both lengths. It is
    /// left unchanged if either length is not a constant time.
    pub fn parallel(&mut self, other: &Code, auto_length: bool) -> Result<()> {
        let copy = other.renumbered();
        if !self.length.typecastable(&copy.length) {
            return Err(Error::type_error(
                "Cannot run blocks with incompatible lengths in parallel",
            ));
        }
        if auto_length {
            match (self.length.as_time(), copy.length.as_time()) {
                (Some(this), Some(that)) if that > this => self.length = copy.length.clone(),
                _ => {}
            }
        }
        self.combine_name(copy.name.as_deref(), "|");
        self.absorb(copy);
        Ok(())
    }

    /// A new block running `blocks` one after the other.
    pub fn sequence<'a>(blocks: impl IntoIterator<Item = &'a Code>) -> Result<Code> {
        let mut code = Code::new();
        for block in blocks {
            code.add(block)?;
        }
        Ok(code)
    }

    /// A new block running `blocks` in parallel.
    pub fn parallel_all<'a>(blocks: impl IntoIterator<Item = &'a Code>) -> Result<Code> {
        let mut code = Code::new();
        for block in blocks {
            code.parallel(block, true)?;
        }
        Ok(code)
    }
}
