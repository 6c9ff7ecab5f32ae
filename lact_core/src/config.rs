//! Static unit configuration (spec §3 "Static configuration", §6):
//! the I/O map, alarm definitions, default setpoints, and the
//! prover's reference volume, loaded once at startup from TOML.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use lact_common::alarm::AlarmDefinition;
use lact_common::io::IoPoint;
use lact_common::setpoints::Setpoints;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    io_points: Vec<IoPoint>,
    #[serde(default)]
    alarms: Vec<AlarmDefinition>,
    #[serde(default)]
    setpoints: Setpoints,
    #[serde(default = "default_reference_volume")]
    prover_reference_volume_bbl: f64,
}

fn default_reference_volume() -> f64 {
    100.0
}

#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub io_points: Vec<IoPoint>,
    pub alarms: Vec<AlarmDefinition>,
    pub setpoints: Setpoints,
    pub prover_reference_volume_bbl: f64,
}

impl UnitConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = Self {
            io_points: raw.io_points,
            alarms: raw.alarms,
            setpoints: raw.setpoints,
            prover_reference_volume_bbl: raw.prover_reference_volume_bbl,
        };
        config.validate()?;
        Ok(config)
    }

    /// Tag uniqueness across the whole I/O map, per-signal-kind address
    /// uniqueness, and a non-degenerate scaling warning (not an error —
    /// `raw_hi == raw_lo` is legal, just collapses the analog range).
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_tags = HashSet::new();
        for point in &self.io_points {
            if !seen_tags.insert(point.tag.as_str()) {
                return Err(ConfigError::DuplicateTag(point.tag.clone()));
            }
        }

        let mut seen_addresses: HashSet<(String, u32)> = HashSet::new();
        for point in &self.io_points {
            let key = (point.signal_kind.to_string(), point.address);
            if !seen_addresses.insert(key.clone()) {
                return Err(ConfigError::DuplicateAddress {
                    kind: key.0,
                    address: key.1,
                });
            }
        }

        for point in &self.io_points {
            use lact_common::io::SignalKind;
            let is_analog = matches!(point.signal_kind, SignalKind::AnalogIn | SignalKind::AnalogOut);
            if is_analog && point.scaling.raw_hi == point.scaling.raw_lo {
                tracing::warn!(tag = %point.tag, "analog point has raw_hi == raw_lo; engineering value will collapse to eng_lo");
            }
        }

        let mut seen_alarm_tags = HashSet::new();
        for alarm in &self.alarms {
            if !seen_alarm_tags.insert(alarm.tag.as_str()) {
                return Err(ConfigError::DuplicateTag(alarm.tag.clone()));
            }
        }

        Ok(())
    }
}
