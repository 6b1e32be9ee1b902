// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Named board inputs/outputs and the devices attached to them.

use std::fmt;

use anyhow::anyhow;
use qpc_units::{Time, seconds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoKind {
    Trig,
    Data,
    Dac,
    Adc,
    Tt,
}

impl IoKind {
    pub const ALL: [IoKind; 5] = [
        IoKind::Trig,
        IoKind::Data,
        IoKind::Dac,
        IoKind::Adc,
        IoKind::Tt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IoKind::Trig => "trig",
            IoKind::Data => "data",
            IoKind::Dac => "dac",
            IoKind::Adc => "adc",
            IoKind::Tt => "tt",
        }
    }
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IoKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<IoKind, anyhow::Error> {
        IoKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                anyhow!(
                    "Unsupported IO kind: {s}. Supported kinds are: {}",
                    IoKind::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}

/// A board IO, e.g. `PMOD0_4` or `DAC_A`.
///
/// `offset` is the latency added by the IO. It is added to every output time
/// on this IO, so a negative offset makes an output fire earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Io {
    pub kind: IoKind,
    pub name: String,
    #[serde(default)]
    pub offset: Time,
}

impl Io {
    pub fn new<S: Into<String>>(kind: IoKind, name: S, offset: Time) -> Self {
        Self {
            kind,
            name: name.into(),
            offset,
        }
    }

    pub fn trig<S: Into<String>>(name: S) -> Self {
        Self::new(IoKind::Trig, name, seconds(0.0))
    }

    pub fn dac<S: Into<String>>(name: S, offset: Time) -> Self {
        Self::new(IoKind::Dac, name, offset)
    }

    /// A device connected to this IO, adding its own latency.
    pub fn device(&self, offset: Time) -> Io {
        Io {
            kind: self.kind,
            name: self.name.clone(),
            offset: self.offset + offset,
        }
    }
}

/// Output target of a pulse: a named IO or a raw firmware port.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Io(Io),
    Port(u32),
}

impl Channel {
    pub fn offset(&self) -> Time {
        match self {
            Channel::Io(io) => io.offset,
            Channel::Port(_) => seconds(0.0),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Io(io) => write!(f, "{}", io.name),
            Channel::Port(port) => write!(f, "{port}"),
        }
    }
}

impl From<Io> for Channel {
    fn from(value: Io) -> Self {
        Channel::Io(value)
    }
}

impl From<&Io> for Channel {
    fn from(value: &Io) -> Self {
        Channel::Io(value.clone())
    }
}

impl From<u32> for Channel {
    fn from(value: u32) -> Self {
        Channel::Port(value)
    }
}

impl From<&Channel> for Channel {
    fn from(value: &Channel) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_from_str() {
        assert_eq!("dac".parse::<IoKind>().unwrap(), IoKind::Dac);
        assert_eq!("TRIG".parse::<IoKind>().unwrap(), IoKind::Trig);
        let err = "rf".parse::<IoKind>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported IO kind: rf. Supported kinds are: trig, data, dac, adc, tt"
        );
    }

    #[test]
    fn test_device_offset() {
        let dac_a = Io::dac("DAC_A", seconds(-75e-9));
        let sample = dac_a.device(seconds(0.0));
        assert_eq!(sample.offset, seconds(-75e-9));
        assert_eq!(sample.name, "DAC_A");

        let pmod = Io::trig("PMOD0_4").device(seconds(10e-9));
        assert_eq!(Channel::from(&pmod).offset(), seconds(10e-9));
        assert_eq!(Channel::Port(3).offset(), seconds(0.0));
    }

    #[test]
    fn test_io_serde() {
        let io: Io = serde_json::from_str(r#"{"kind": "dac", "name": "DAC_A", "offset": -7.5e-8}"#)
            .unwrap();
        assert_eq!(io, Io::dac("DAC_A", seconds(-75e-9)));

        let io: Io = serde_json::from_str(r#"{"kind": "trig", "name": "PMOD0_0"}"#).unwrap();
        assert_eq!(io, Io::trig("PMOD0_0"));
    }
}
