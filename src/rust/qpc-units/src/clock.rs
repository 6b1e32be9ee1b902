// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::quantity::{Frequency, Time, hertz, seconds};

/// Number of clock cycles of a clock running at `clock_hz` that is closest to `time`.
pub fn seconds_to_cycles(time: Time, clock_hz: f64) -> i64 {
    (time.value() * clock_hz).round() as i64
}

pub fn cycles_to_seconds(cycles: i64, clock_hz: f64) -> Time {
    seconds(cycles as f64 / clock_hz)
}

/// Phase increment register value of a DDS with `bits` of phase resolution.
pub fn hertz_to_register(freq: Frequency, dds_clock_hz: f64, bits: u32) -> i64 {
    (freq.value() / dds_clock_hz * 2f64.powi(bits as i32)).round() as i64
}

pub fn register_to_hertz(register: i64, dds_clock_hz: f64, bits: u32) -> Frequency {
    hertz(register as f64 * dds_clock_hz / 2f64.powi(bits as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_cycles() {
        assert_eq!(seconds_to_cycles(seconds(0.0), 409.6e6), 0);
        assert_eq!(seconds_to_cycles(seconds(1e-6), 409.6e6), 410);
        assert_eq!(seconds_to_cycles(seconds(1e-3), 409.6e6), 409600);
        assert_eq!(seconds_to_cycles(seconds(-75e-9), 409.6e6), -31);
    }

    #[test]
    fn test_cycles_to_seconds() {
        assert_eq!(cycles_to_seconds(4096, 409.6e6), seconds(1e-5));
    }

    #[test]
    fn test_frequency_register() {
        assert_eq!(hertz_to_register(hertz(0.0), 1e9, 32), 0);
        assert_eq!(hertz_to_register(hertz(250e6), 1e9, 32), 1 << 30);
        assert_eq!(register_to_hertz(1 << 30, 1e9, 32), hertz(250e6));
    }
}
