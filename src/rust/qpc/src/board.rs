// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Mapping between user facing IO names and QICK firmware ports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::{Channel, Io, IoKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerPort {
    pub port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPort {
    pub port: u32,
    pub bit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DacPort {
    pub port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdcPort {
    pub port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TtPort {
    pub port: u32,
}

/// A QICK board and firmware combination.
///
/// The name must match the board reported by the SoC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    /// Number of general purpose tproc registers.
    pub registers: u16,
    #[serde(default)]
    pub trigger_ports: IndexMap<String, TriggerPort>,
    #[serde(default)]
    pub data_ports: IndexMap<String, DataPort>,
    #[serde(default)]
    pub dac_ports: IndexMap<String, DacPort>,
    #[serde(default)]
    pub adc_ports: IndexMap<String, AdcPort>,
    #[serde(default)]
    pub tt_ports: IndexMap<String, TtPort>,
}

fn unique_ports(ports: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut unique = Vec::new();
    for port in ports {
        if !unique.contains(&port) {
            unique.push(port);
        }
    }
    unique
}

impl Board {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Firmware port of a named IO.
    pub fn port(&self, io: &Io) -> Result<u32> {
        let name = io.name.as_str();
        let port = match io.kind {
            IoKind::Trig => self.trigger_ports.get(name).map(|p| p.port),
            IoKind::Data => self.data_ports.get(name).map(|p| p.port),
            IoKind::Dac => self.dac_ports.get(name).map(|p| p.port),
            IoKind::Adc => self.adc_ports.get(name).map(|p| p.port),
            IoKind::Tt => self.tt_ports.get(name).map(|p| p.port),
        };
        port.ok_or_else(|| {
            Error::new(&format!(
                "Board '{}' does not contain {} port '{name}'",
                self.name, io.kind
            ))
        })
    }

    pub fn resolve(&self, channel: &Channel) -> Result<u32> {
        match channel {
            Channel::Io(io) => self.port(io),
            Channel::Port(port) => Ok(*port),
        }
    }

    /// Unique trigger ports in declaration order.
    pub fn trigger_ports(&self) -> Vec<u32> {
        unique_ports(self.trigger_ports.values().map(|p| p.port))
    }

    pub fn data_ports(&self) -> Vec<u32> {
        unique_ports(self.data_ports.values().map(|p| p.port))
    }

    pub fn dac_ports(&self) -> Vec<u32> {
        unique_ports(self.dac_ports.values().map(|p| p.port))
    }

    pub fn adc_ports(&self) -> Vec<u32> {
        unique_ports(self.adc_ports.values().map(|p| p.port))
    }

    pub fn tt_ports(&self) -> Vec<u32> {
        unique_ports(self.tt_ports.values().map(|p| p.port))
    }
}

/// The RFSoC 4x2 running the QICK spin firmware.
pub fn qick_spin_4x2() -> Board {
    let mut trigger_ports = IndexMap::new();
    for (pmod, base) in [(0, 0), (1, 10)] {
        for pin in 0..8 {
            trigger_ports.insert(
                format!("PMOD{pmod}_{pin}"),
                TriggerPort { port: base + pin },
            );
        }
    }
    let data_ports = (0..4)
        .map(|port| (format!("NA{port}"), DataPort { port, bit: 0 }))
        .collect();
    let dac_ports = IndexMap::from([
        ("DAC_A".to_string(), DacPort { port: 0 }),
        ("DAC_B".to_string(), DacPort { port: 1 }),
    ]);

    Board {
        name: "RFSoC4x2".to_string(),
        registers: 16,
        trigger_ports,
        data_ports,
        dac_ports,
        adc_ports: IndexMap::new(),
        tt_ports: IndexMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpc_units::seconds;

    #[test]
    fn test_qick_spin_4x2() {
        let board = qick_spin_4x2();
        assert_eq!(board.port(&Io::trig("PMOD0_4")).unwrap(), 4);
        assert_eq!(board.port(&Io::trig("PMOD1_7")).unwrap(), 17);
        assert_eq!(
            board.port(&Io::dac("DAC_B", seconds(0.0))).unwrap(),
            1
        );
        assert_eq!(
            board.trigger_ports(),
            vec![0, 1, 2, 3, 4, 5, 6, 7, 10, 11, 12, 13, 14, 15, 16, 17]
        );
        assert_eq!(board.data_ports(), vec![0, 1, 2, 3]);
        assert_eq!(board.dac_ports(), vec![0, 1]);
        assert!(board.adc_ports().is_empty());
        assert!(board.tt_ports().is_empty());
    }

    #[test]
    fn test_unknown_port() {
        let board = qick_spin_4x2();
        let err = board
            .port(&Io::new(IoKind::Adc, "ADC_D", seconds(0.0)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Board 'RFSoC4x2' does not contain adc port 'ADC_D'"
        );
        // names are looked up per kind
        assert!(board.port(&Io::dac("PMOD0_0", seconds(0.0))).is_err());
        assert_eq!(board.resolve(&Channel::Port(42)).unwrap(), 42);
    }

    #[test]
    fn test_unique_ports() {
        let mut board = qick_spin_4x2();
        board
            .dac_ports
            .insert("DAC_A_ALIAS".to_string(), DacPort { port: 0 });
        assert_eq!(board.dac_ports(), vec![0, 1]);
    }

    #[test]
    fn test_json_round_trip() {
        let board = qick_spin_4x2();
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(Board::from_json(&json).unwrap(), board);

        let minimal = Board::from_json(
            r#"{"name": "custom", "registers": 8, "trigger_ports": {"T0": {"port": 3}}}"#,
        )
        .unwrap();
        assert_eq!(minimal.trigger_ports(), vec![3]);
        assert!(minimal.dac_ports.is_empty());
    }
}
