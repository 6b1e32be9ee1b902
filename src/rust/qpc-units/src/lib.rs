// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Typed physical quantities and the conversions between them and the
//! integer units used by the timed processor.

pub mod clock;
pub mod quantity;

pub use quantity::{Frequency, Hertz, Quantity, Seconds, Time, hertz, seconds};
