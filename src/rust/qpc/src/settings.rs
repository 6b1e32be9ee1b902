// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining settings for the compiler and the session.
use qpc_units::{Time, seconds};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Time given to the tproc before the first output is queued.
    pub startup_delay: Time,
    /// Log the program listing before it is loaded.
    pub print_program: bool,
    /// Largest relative error allowed when rounding sweep parameters to
    /// register units.
    pub max_rounding_error: f64,
    /// Stream ADC readouts instead of only starting the tproc.
    pub readout: bool,
    pub readouts_per_loop: u32,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            startup_delay: seconds(1e-3),
            print_program: true,
            max_rounding_error: 0.05,
            readout: false,
            readouts_per_loop: 1,
        }
    }
}

impl CompilerSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        let mut changes = vec![];
        if self.startup_delay < seconds(0.0) || !self.startup_delay.value().is_finite() {
            changes.push(SanitizationChange {
                field: "startup_delay",
                original: self.startup_delay.to_string(),
                sanitized: seconds(0.0).to_string(),
                reason: "Must be a finite, non-negative time.".to_string(),
            });
            self.startup_delay = seconds(0.0);
        }
        let rounding_error = sanitize_rounding_error(self.max_rounding_error);
        if rounding_error != self.max_rounding_error {
            changes.push(SanitizationChange {
                field: "max_rounding_error",
                original: self.max_rounding_error.to_string(),
                sanitized: rounding_error.to_string(),
                reason: "Must lie within 0 and 1.".to_string(),
            });
            self.max_rounding_error = rounding_error;
        }
        if self.readouts_per_loop == 0 {
            changes.push(SanitizationChange {
                field: "readouts_per_loop",
                original: "0".to_string(),
                sanitized: "1".to_string(),
                reason: "At least one readout per loop is required.".to_string(),
            });
            self.readouts_per_loop = 1;
        }
        Ok(changes)
    }
}

fn sanitize_rounding_error(value: f64) -> f64 {
    if value.is_nan() {
        CompilerSettings::default().max_rounding_error
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CompilerSettings::from_json("{}").unwrap();
        assert_eq!(settings, CompilerSettings::default());
        assert_eq!(settings.startup_delay, seconds(1e-3));
        assert_eq!(settings.max_rounding_error, 0.05);
    }

    #[test]
    fn test_partial_json() {
        let settings =
            CompilerSettings::from_json(r#"{"print_program": false, "readout": true}"#).unwrap();
        assert!(!settings.print_program);
        assert!(settings.readout);
        assert_eq!(settings.readouts_per_loop, 1);
        assert!(CompilerSettings::from_json(r#"{"readout": 3}"#).is_err());
    }

    #[test]
    fn test_sanitize_rounding_error() {
        assert_eq!(sanitize_rounding_error(0.1), 0.1);
        assert_eq!(sanitize_rounding_error(-1.0), 0.0);
        assert_eq!(sanitize_rounding_error(3.0), 1.0);
        assert_eq!(sanitize_rounding_error(f64::NAN), 0.05);
    }

    #[test]
    fn test_sanitization_change() {
        let mut settings = CompilerSettings {
            startup_delay: seconds(-1e-6),
            readouts_per_loop: 0,
            ..Default::default()
        };
        let changes = settings.sanitize().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "startup_delay");
        assert_eq!(changes[0].original, "-1e-6 s");
        assert_eq!(settings.startup_delay, seconds(0.0));
        assert_eq!(changes[1].field, "readouts_per_loop");
        assert_eq!(settings.readouts_per_loop, 1);

        assert!(CompilerSettings::default().sanitize().unwrap().is_empty());
    }
}
