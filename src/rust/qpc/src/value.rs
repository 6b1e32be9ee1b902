// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Typed values that can be assigned to tproc registers.
//!
//! Constants carry physical units until compile time, where they are
//! converted into clock cycles or frequency register units. Registers and
//! expressions over registers are lowered into ALU instructions.

use qpc_units::{Frequency, Time, seconds};
use tproc_asm::{Operator, SpecialReg};

use crate::io::Channel;
use crate::symbol::SymbolId;
use crate::{Error, Result};

/// Physical kind held by a value. Untyped integers have no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Time,
    Freq,
}

fn typecastable(a: Option<Kind>, b: Option<Kind>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn kind_name(kind: Option<Kind>) -> &'static str {
    match kind {
        Some(Kind::Time) => "time",
        Some(Kind::Freq) => "frequency",
        None => "integer",
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// Raw value in register units (cycles, DAC units, ...).
    Int(i64),
    Time(Time),
    Freq(Frequency),
}

impl Constant {
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Constant::Int(_) => None,
            Constant::Time(_) => Some(Kind::Time),
            Constant::Freq(_) => Some(Kind::Freq),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Constant::Int(v) => *v == 0,
            Constant::Time(t) => t.is_zero(),
            Constant::Freq(f) => f.is_zero(),
        }
    }

    /// Combine two constants of the same unit. Mixed integer / physical
    /// constants can only be combined after conversion into register units.
    fn fold(&self, operator: Operator, other: &Constant) -> Option<Constant> {
        let result = match (self, other, operator) {
            (Constant::Int(a), Constant::Int(b), Operator::Add) => Constant::Int(a + b),
            (Constant::Int(a), Constant::Int(b), Operator::Sub) => Constant::Int(a - b),
            (Constant::Time(a), Constant::Time(b), Operator::Add) => Constant::Time(*a + *b),
            (Constant::Time(a), Constant::Time(b), Operator::Sub) => Constant::Time(*a - *b),
            (Constant::Freq(a), Constant::Freq(b), Operator::Add) => Constant::Freq(*a + *b),
            (Constant::Freq(a), Constant::Freq(b), Operator::Sub) => Constant::Freq(*a - *b),
            _ => return None,
        };
        Some(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegTarget {
    /// A general purpose register chosen by the compiler.
    Allocated,
    Special(SpecialReg),
}

/// Handle to a tproc register.
///
/// Allocated registers are created through [`crate::Code::reg`] so that the
/// owning code block can give them fresh identities when it is copied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reg {
    pub(crate) id: SymbolId,
    target: RegTarget,
    kind: Option<Kind>,
    generator: Option<Channel>,
}

impl Reg {
    pub(crate) fn allocated() -> Self {
        Self {
            id: SymbolId::fresh(),
            target: RegTarget::Allocated,
            kind: None,
            generator: None,
        }
    }

    pub fn special(reg: SpecialReg) -> Self {
        Self {
            id: SymbolId::fresh(),
            target: RegTarget::Special(reg),
            kind: None,
            generator: None,
        }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn target(&self) -> RegTarget {
        self.target
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn is_special(&self, reg: SpecialReg) -> bool {
        self.target == RegTarget::Special(reg)
    }

    /// Channel of the generator the register value is converted for.
    ///
    /// A time held by such a register counts cycles of the generator fabric
    /// clock. Times in all other registers count tproc cycles.
    pub fn generator(&self) -> Option<&Channel> {
        self.generator.as_ref()
    }

    /// Record the kind of a value assigned to this register.
    pub(crate) fn hold(&mut self, kind: Option<Kind>) -> Result<()> {
        match (self.kind, kind) {
            (None, kind) => {
                self.kind = kind;
                Ok(())
            }
            (Some(_), None) => Ok(()),
            (Some(held), Some(kind)) if held == kind => Ok(()),
            (Some(held), Some(kind)) => Err(Error::type_error(format!(
                "Register holding a {} value cannot be assigned a {} value",
                kind_name(Some(held)),
                kind_name(Some(kind))
            ))),
        }
    }
}

/// A register swept over `start..stop` in increments of `step` by a
/// [`crate::control::SweepBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct SweptReg {
    pub(crate) reg: Reg,
    pub(crate) start: Value,
    pub(crate) stop: Value,
    pub(crate) step: Value,
}

impl SweptReg {
    pub(crate) fn new(mut reg: Reg, start: Value, stop: Value, step: Value) -> Result<Self> {
        for (name, value) in [("stop", &stop), ("step", &step)] {
            if !start.typecastable(value) {
                return Err(Error::type_error(format!(
                    "Sweep start is a {} value but {name} is a {} value",
                    kind_name(start.kind()),
                    kind_name(value.kind())
                )));
            }
        }
        let kind = start.kind().or(stop.kind()).or(step.kind());
        reg.hold(kind)?;
        Ok(Self {
            reg,
            start,
            stop,
            step,
        })
    }

    /// Convert the swept values for the generator of `channel`.
    ///
    /// Frequencies use the generator DDS. Times count cycles of the generator
    /// fabric clock, which makes the register usable as a pulse length on
    /// that channel but not for tproc timing.
    pub fn on_channel(mut self, channel: impl Into<Channel>) -> Self {
        self.reg.generator = Some(channel.into());
        self
    }

    pub fn reg(&self) -> &Reg {
        &self.reg
    }

    pub fn start(&self) -> &Value {
        &self.start
    }

    pub fn stop(&self) -> &Value {
        &self.stop
    }

    pub fn step(&self) -> &Value {
        &self.step
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.reg.generator()
    }

    /// The swept register as a value.
    pub fn value(&self) -> Value {
        Value::Reg(self.reg.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub left: Value,
    pub operator: Operator,
    pub right: Value,
    kind: Option<Kind>,
}

impl Expression {
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Fold a constant into the innermost constant term of an addition chain,
    /// e.g. `((x + 3) + y) + 5` becomes `((x + 8) + y)`.
    fn absorb_constant(&mut self, constant: &Constant) -> bool {
        if self.operator != Operator::Add {
            return false;
        }
        for side in [&mut self.right, &mut self.left] {
            match side {
                Value::Const(c) => {
                    if let Some(folded) = c.fold(Operator::Add, constant) {
                        *c = folded;
                        return true;
                    }
                }
                Value::Expr(inner) => {
                    if inner.absorb_constant(constant) {
                        return true;
                    }
                }
                Value::Reg(_) => {}
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Const(Constant),
    Reg(Reg),
    Expr(Box<Expression>),
}

impl Value {
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Const(c) => c.kind(),
            Value::Reg(r) => r.kind(),
            Value::Expr(e) => e.kind(),
        }
    }

    /// Whether `self` and `other` may be combined or assigned to each other.
    pub fn typecastable(&self, other: &Value) -> bool {
        typecastable(self.kind(), other.kind())
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    /// Whether every time register in the value counts cycles of the
    /// generator driving `clock`, or tproc cycles for `None`.
    pub(crate) fn counts_cycles_of(&self, clock: Option<&Channel>) -> bool {
        match self {
            Value::Const(_) => true,
            Value::Reg(reg) => reg.kind != Some(Kind::Time) || reg.generator.as_ref() == clock,
            Value::Expr(e) => e.left.counts_cycles_of(clock) && e.right.counts_cycles_of(clock),
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Const(Constant::Time(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn try_add(self, other: impl Into<Value>) -> Result<Value> {
        self.combine(Operator::Add, other.into())
    }

    pub fn try_sub(self, other: impl Into<Value>) -> Result<Value> {
        self.combine(Operator::Sub, other.into())
    }

    /// Scale a constant by a factor. Registers cannot be scaled.
    pub fn scale(self, factor: f64) -> Result<Value> {
        match self {
            Value::Const(Constant::Time(t)) => Ok(Value::Const(Constant::Time(t * factor))),
            Value::Const(Constant::Freq(f)) => Ok(Value::Const(Constant::Freq(f * factor))),
            Value::Const(Constant::Int(v)) => {
                Ok(Value::Const(Constant::Int((v as f64 * factor).round() as i64)))
            }
            _ => Err(Error::new("Only constant values can be scaled")),
        }
    }

    fn combine(self, operator: Operator, other: Value) -> Result<Value> {
        if !self.typecastable(&other) {
            let verb = match operator {
                Operator::Add => "add",
                Operator::Sub => "subtract",
            };
            return Err(Error::type_error(format!(
                "Cannot {verb} a {} value and a {} value",
                kind_name(self.kind()),
                kind_name(other.kind())
            )));
        }
        let kind = self.kind().or(other.kind());

        match (self, other) {
            (Value::Const(a), Value::Const(b)) => match a.fold(operator, &b) {
                Some(folded) => Ok(Value::Const(folded)),
                None => Ok(Value::binary(Value::Const(a), operator, Value::Const(b), kind)),
            },
            // Adding a zero constant is a no-op as long as the kind survives.
            (value, Value::Const(c)) if c.is_zero() && (value.kind().is_some() || c.kind().is_none()) => {
                Ok(value)
            }
            (Value::Const(c), value)
                if operator == Operator::Add
                    && c.is_zero()
                    && (value.kind().is_some() || c.kind().is_none()) =>
            {
                Ok(value)
            }
            (Value::Expr(mut expr), Value::Const(c)) if operator == Operator::Add => {
                if expr.absorb_constant(&c) {
                    Ok(Value::Expr(expr))
                } else {
                    Ok(Value::binary(Value::Expr(expr), operator, Value::Const(c), kind))
                }
            }
            (Value::Const(c), Value::Expr(mut expr)) if operator == Operator::Add => {
                if expr.absorb_constant(&c) {
                    Ok(Value::Expr(expr))
                } else {
                    Ok(Value::binary(Value::Const(c), operator, Value::Expr(expr), kind))
                }
            }
            (left, right) => Ok(Value::binary(left, operator, right, kind)),
        }
    }

    fn binary(left: Value, operator: Operator, right: Value, kind: Option<Kind>) -> Value {
        Value::Expr(Box::new(Expression {
            left,
            operator,
            right,
            kind,
        }))
    }

    pub(crate) fn for_each_reg(&self, f: &mut dyn FnMut(&Reg)) {
        match self {
            Value::Const(_) => {}
            Value::Reg(reg) => f(reg),
            Value::Expr(expr) => {
                expr.left.for_each_reg(f);
                expr.right.for_each_reg(f);
            }
        }
    }

    pub(crate) fn for_each_reg_mut(&mut self, f: &mut dyn FnMut(&mut Reg)) {
        match self {
            Value::Const(_) => {}
            Value::Reg(reg) => f(reg),
            Value::Expr(expr) => {
                expr.left.for_each_reg_mut(f);
                expr.right.for_each_reg_mut(f);
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Const(Constant::Time(seconds(0.0)))
    }
}

impl From<Constant> for Value {
    fn from(value: Constant) -> Self {
        Value::Const(value)
    }
}

impl From<Time> for Value {
    fn from(value: Time) -> Self {
        Value::Const(Constant::Time(value))
    }
}

impl From<Frequency> for Value {
    fn from(value: Frequency) -> Self {
        Value::Const(Constant::Freq(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Const(Constant::Int(value))
    }
}

impl From<Reg> for Value {
    fn from(value: Reg) -> Self {
        Value::Reg(value)
    }
}

impl From<&Reg> for Value {
    fn from(value: &Reg) -> Self {
        Value::Reg(value.clone())
    }
}

impl From<&SweptReg> for Value {
    fn from(value: &SweptReg) -> Self {
        value.value()
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}
