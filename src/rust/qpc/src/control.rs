// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Loops over code blocks.
//!
//! Both loop kinds emit the same skeleton:
//!
//! ```text
//! <init>
//! START:
//! TEST -op(<reg> - <end>)
//! JUMP END -if(NS)
//! <body>
//! TIME inc_ref <body length>      (optional)
//! <increment>
//! JUMP START
//! END:
//! ```

use qpc_units::seconds;
use tproc_asm::Condition;

use crate::code::{Code, Domain};
use crate::value::{Constant, Kind, SweptReg, Value};
use crate::{Error, Result};

const SEPARATOR: &str = "---------------";

fn loop_block(name: &Option<String>, length: Value) -> Code {
    let code = Code::new().with_length(length);
    match name {
        Some(name) => code.named(name.as_str()),
        None => code,
    }
}

/// Repeat a block a fixed number of times, or forever.
pub struct LoopBuilder<'a> {
    body: &'a Code,
    loops: Option<u64>,
    inc_ref: bool,
    name: Option<String>,
}

impl<'a> LoopBuilder<'a> {
    pub fn new(body: &'a Code, loops: Option<u64>) -> Self {
        Self {
            body,
            loops,
            inc_ref: false,
            name: None,
        }
    }

    /// Advance the timing reference by the body length after every iteration.
    pub fn inc_ref(mut self) -> Self {
        self.inc_ref = true;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    fn length(&self) -> Result<Value> {
        match self.loops {
            _ if self.inc_ref => Ok(seconds(0.0).into()),
            None => Ok(seconds(0.0).into()),
            Some(loops) => {
                if !self.body.length().is_const() {
                    return Err(Error::new(
                        "A loop without inc_ref needs a body of constant length",
                    ));
                }
                self.body.length().clone().scale(loops as f64)
            }
        }
    }

    pub fn build(self) -> Result<Code> {
        let mut code = loop_block(&self.name, self.length()?);
        let start = code.label("LOOP");

        let Some(loops) = self.loops else {
            code.place_label(&start);
            self.emit_body(&mut code)?;
            code.jump(&start, None);
            return Ok(code);
        };

        let loops = i64::try_from(loops)
            .map_err(|_| Error::new(&format!("Too many loop iterations: {loops}")))?;
        let end = code.label("LOOP_END");
        let mut counter = code.reg();
        code.assign(&mut counter, 0i64)?;
        code.place_label(&start);
        code.test(&counter, Value::from(loops), Domain::Tproc, false)?;
        code.jump(&end, Some(Condition::NotSign));
        self.emit_body(&mut code)?;
        let next = Value::from(&counter).try_add(1i64)?;
        code.assign(&mut counter, next)?;
        code.jump(&start, None);
        code.place_label(&end);
        Ok(code)
    }

    fn emit_body(&self, code: &mut Code) -> Result<()> {
        code.absorb(self.body.clone());
        code.comment(SEPARATOR);
        if self.inc_ref {
            code.inc_ref_by(self.body.length().clone())?;
        }
        Ok(())
    }
}

/// Number of iterations of a sweep with constant parameters.
fn sweep_count(start: &Value, stop: &Value, step: &Value) -> Option<u64> {
    let ratio = match (start.as_const()?, stop.as_const()?, step.as_const()?) {
        (Constant::Int(start), Constant::Int(stop), Constant::Int(step)) => {
            (stop - start) as f64 / *step as f64
        }
        (Constant::Time(start), Constant::Time(stop), Constant::Time(step)) => {
            (*stop - *start).value() / step.value()
        }
        (Constant::Freq(start), Constant::Freq(stop), Constant::Freq(step)) => {
            (*stop - *start).value() / step.value()
        }
        _ => return None,
    };
    // tolerate rounding errors of the division
    Some((ratio - 1e-9).ceil().max(0.0) as u64)
}

fn is_positive(value: &Value) -> Option<bool> {
    match value.as_const()? {
        Constant::Int(v) => Some(*v > 0),
        Constant::Time(t) => Some(t.value() > 0.0),
        Constant::Freq(f) => Some(f.value() > 0.0),
    }
}

fn sweep_domain(reg: &SweptReg) -> Result<Domain> {
    match (reg.reg().kind(), reg.channel()) {
        (_, Some(channel)) => Ok(Domain::Generator(channel.clone())),
        (Some(Kind::Freq), None) => Err(Error::new(
            "A frequency sweep needs the channel of its generator",
        )),
        _ => Ok(Domain::Tproc),
    }
}

/// Sweep a register from `start` while it is below `stop`, adding `step`
/// after every iteration.
///
/// Registers swept on a channel are converted for its generator, all others
/// with the tproc clock.
pub struct SweepBuilder<'a> {
    body: &'a Code,
    reg: &'a SweptReg,
    followers: Vec<&'a SweptReg>,
    inc_ref: bool,
    name: Option<String>,
}

impl<'a> SweepBuilder<'a> {
    pub fn new(body: &'a Code, reg: &'a SweptReg) -> Self {
        Self {
            body,
            reg,
            followers: vec![],
            inc_ref: false,
            name: None,
        }
    }

    /// Step another register along with the swept one, e.g. the same time in
    /// generator cycles for a pulse length. It starts at its own `start` and
    /// advances by its own `step`; the iteration count is set by the swept
    /// register alone.
    pub fn follow(mut self, reg: &'a SweptReg) -> Self {
        self.followers.push(reg);
        self
    }

    pub fn inc_ref(mut self) -> Self {
        self.inc_ref = true;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    fn length(&self) -> Value {
        if self.inc_ref {
            return seconds(0.0).into();
        }
        let count = sweep_count(self.reg.start(), self.reg.stop(), self.reg.step());
        match (count, self.body.length().as_time()) {
            (Some(count), Some(body)) => (body * count as f64).into(),
            _ => {
                qpc_log::warn!(
                    "Length of sweep {} cannot be determined, assuming zero",
                    self.name.as_deref().unwrap_or("<unnamed>")
                );
                seconds(0.0).into()
            }
        }
    }

    pub fn build(self) -> Result<Code> {
        let mut swept = vec![];
        for sweep in std::iter::once(self.reg).chain(self.followers.iter().copied()) {
            if is_positive(sweep.step()) == Some(false) {
                return Err(Error::new("The sweep step must be positive"));
            }
            swept.push((sweep, sweep.reg().clone(), sweep_domain(sweep)?));
        }
        let mut code = loop_block(&self.name, self.length());
        let start = code.label("SWEEP");
        let end = code.label("SWEEP_END");

        for (sweep, reg, domain) in swept.iter_mut() {
            code.assign_in(reg, sweep.start().clone(), domain.clone(), true)?;
        }
        code.place_label(&start);
        let (sweep, reg, domain) = &swept[0];
        code.test(reg, sweep.stop().clone(), domain.clone(), true)?;
        code.jump(&end, Some(Condition::NotSign));
        code.absorb(self.body.clone());
        code.comment(SEPARATOR);
        if self.inc_ref {
            code.inc_ref_by(self.body.length().clone())?;
        }
        for (sweep, reg, domain) in swept.iter_mut() {
            let next = Value::from(&*reg).try_add(sweep.step())?;
            code.assign_in(reg, next, domain.clone(), true)?;
        }
        code.jump(&start, None);
        code.place_label(&end);
        Ok(code)
    }
}
