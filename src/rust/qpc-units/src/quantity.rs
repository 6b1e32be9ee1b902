// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use num_traits::{AsPrimitive, Float};
use serde::{Deserialize, Serialize};
use std::fmt::Result as FormatterResult;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A physical quantity represented with unit type.
///
/// # Type Parameter
/// - `U`: The unit of the value (should be a zero-sized type)
/// - `T`: The underlying value (typically a floating point number)
///
/// Quantities serialize as their bare value.
///
/// # Examples
/// ```rust
/// use qpc_units::quantity::{hertz, seconds};
///
/// let pi_time = seconds(20e-9);
/// let drive = hertz(200e6);
/// assert_eq!((pi_time / 2.0).value(), 10e-9);
/// assert_eq!(drive.value(), 200e6);
/// ```
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de>, U: Default"
))]
pub struct Quantity<U, T = f64> {
    value: T,
    #[serde(skip)]
    unit: U,
}

impl<U, T: Copy> Quantity<U, T> {
    pub fn value(&self) -> T {
        self.value
    }
}

impl<U, T: Float> Quantity<U, T> {
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<U: Default, T: Default> Default for Quantity<U, T> {
    fn default() -> Self {
        Quantity {
            value: T::default(),
            unit: U::default(),
        }
    }
}

impl<U, T: Float> PartialEq for Quantity<U, T> {
    fn eq(&self, other: &Self) -> bool {
        let a = self.value;
        let b = other.value;
        if a.is_zero() && b.is_zero() {
            true
        } else {
            a == b
        }
    }
}

impl<U, T: Float> PartialOrd for Quantity<U, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self == other {
            Some(std::cmp::Ordering::Equal)
        } else {
            self.value.partial_cmp(&other.value)
        }
    }
}

impl<U: Display, T: Debug> Debug for Quantity<U, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        f.debug_struct("Quantity")
            .field("value", &self.value)
            .field("unit", &self.unit.to_string())
            .finish()
    }
}

impl<U, T> Add for Quantity<U, T>
where
    T: Add<Output = T> + Copy,
    U: Copy,
{
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Quantity {
            value: self.value + rhs.value,
            unit: self.unit,
        }
    }
}

impl<U, T> Sub for Quantity<U, T>
where
    T: Sub<Output = T> + Copy,
    U: Copy,
{
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Quantity {
            value: self.value - rhs.value,
            unit: self.unit,
        }
    }
}

impl<U, T> Mul<T> for Quantity<U, T>
where
    T: Mul<T, Output = T> + Copy,
    U: Copy,
{
    type Output = Self;

    fn mul(self, rhs: T) -> Self::Output {
        Quantity {
            value: self.value * rhs,
            unit: self.unit,
        }
    }
}

impl<U, T> Div<T> for Quantity<U, T>
where
    T: Div<T, Output = T> + Copy,
    U: Copy,
{
    type Output = Self;

    fn div(self, rhs: T) -> Self::Output {
        Quantity {
            value: self.value / rhs,
            unit: self.unit,
        }
    }
}

impl<U, T> Neg for Quantity<U, T>
where
    T: Neg<Output = T> + Copy,
    U: Copy,
{
    type Output = Self;

    fn neg(self) -> Self::Output {
        Quantity {
            value: -self.value,
            unit: self.unit,
        }
    }
}

fn round_to_significant_digits(x: f64, n: u32) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        let order = x.abs().log10().floor();
        let scale = 10f64.powf((n as f64) - 1.0 - order);
        (x * scale).round() / scale
    }
}

impl<U, T> Display for Quantity<U, T>
where
    T: Display + Debug + AsPrimitive<f64> + Float,
    U: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            Display::fmt(&self.value, f)?;
        } else {
            // Round slightly below the precision of epsilon so that
            // accumulated rounding errors do not show up in listings.
            let significand_digits = (-T::epsilon().log10() - T::one()).as_() as u32;
            let value = round_to_significant_digits(self.value.as_(), significand_digits);

            Debug::fmt(&value, f)?;
        }
        write!(f, " ")?;
        self.unit.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seconds;

impl Display for Seconds {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        write!(f, "s")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hertz;

impl Display for Hertz {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        write!(f, "Hz")
    }
}

impl<T: Float, U: Default> From<T> for Quantity<U, T> {
    fn from(value: T) -> Self {
        Quantity {
            value,
            unit: U::default(),
        }
    }
}

impl<U> From<Quantity<U, f64>> for f64 {
    fn from(quantity: Quantity<U, f64>) -> Self {
        quantity.value
    }
}

/// A time in seconds.
pub type Time = Quantity<Seconds>;

/// A frequency in hertz.
pub type Frequency = Quantity<Hertz>;

pub const fn seconds<T>(value: T) -> Quantity<Seconds, T> {
    Quantity {
        value,
        unit: Seconds,
    }
}

pub const fn hertz<T>(value: T) -> Quantity<Hertz, T> {
    Quantity { value, unit: Hertz }
}
