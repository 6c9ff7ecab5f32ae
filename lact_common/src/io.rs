//! I/O point configuration (spec §3: "I/O Point").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal kind for a configured I/O point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    DigitalIn,
    DigitalOut,
    AnalogIn,
    AnalogOut,
    PulseIn,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::DigitalIn => "DI",
            SignalKind::DigitalOut => "DO",
            SignalKind::AnalogIn => "AI",
            SignalKind::AnalogOut => "AO",
            SignalKind::PulseIn => "PI",
        };
        f.write_str(s)
    }
}

/// Linear scaling quadruple for an analog point: raw_lo/raw_hi map to
/// eng_lo/eng_hi. `raw_hi == raw_lo` is accepted (see `scale_to_eng`)
/// but collapses the whole input range to `eng_lo`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub raw_lo: f64,
    pub raw_hi: f64,
    pub eng_lo: f64,
    pub eng_hi: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            raw_lo: 0.0,
            raw_hi: 4095.0,
            eng_lo: 0.0,
            eng_hi: 100.0,
        }
    }
}

impl Scaling {
    /// `eng = eng_lo + (raw - raw_lo) * (eng_hi - eng_lo) / (raw_hi - raw_lo)`.
    /// Guards the `raw_hi == raw_lo` divide-by-zero case by returning `eng_lo`.
    pub fn scale_to_eng(&self, raw: f64) -> f64 {
        let raw_range = self.raw_hi - self.raw_lo;
        if raw_range == 0.0 {
            return self.eng_lo;
        }
        let proportion = (raw - self.raw_lo) / raw_range;
        self.eng_lo + proportion * (self.eng_hi - self.eng_lo)
    }

    /// Inverse of `scale_to_eng`, with `proportion` clamped to `[0, 1]`
    /// (saturating clamp on the output, per spec §4.2).
    pub fn scale_to_raw(&self, eng: f64) -> f64 {
        let eng_range = self.eng_hi - self.eng_lo;
        if eng_range == 0.0 {
            return self.raw_lo;
        }
        let proportion = ((eng - self.eng_lo) / eng_range).clamp(0.0, 1.0);
        self.raw_lo + proportion * (self.raw_hi - self.raw_lo)
    }
}

/// A single configured I/O point: logical tag, signal kind, transport
/// address, and (for analogs) a scaling quadruple. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoPoint {
    pub tag: String,
    pub signal_kind: SignalKind,
    pub address: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub scaling: Scaling,
}

impl IoPoint {
    pub fn new(tag: impl Into<String>, signal_kind: SignalKind, address: u32) -> Self {
        Self {
            tag: tag.into(),
            signal_kind,
            address,
            description: String::new(),
            unit: String::new(),
            scaling: Scaling::default(),
        }
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_to_eng_basic() {
        let s = Scaling {
            raw_lo: 0.0,
            raw_hi: 4095.0,
            eng_lo: 0.0,
            eng_hi: 300.0,
        };
        assert!((s.scale_to_eng(4095.0) - 300.0).abs() < 1e-9);
        assert!((s.scale_to_eng(0.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn scale_divide_by_zero_guard_returns_eng_lo() {
        let s = Scaling {
            raw_lo: 10.0,
            raw_hi: 10.0,
            eng_lo: 5.0,
            eng_hi: 50.0,
        };
        assert_eq!(s.scale_to_eng(123.0), 5.0);
    }

    #[test]
    fn scale_to_raw_clamps_proportion() {
        let s = Scaling::default();
        assert_eq!(s.scale_to_raw(-50.0), s.raw_lo);
        assert_eq!(s.scale_to_raw(1000.0), s.raw_hi);
    }

    #[test]
    fn signal_kind_display() {
        assert_eq!(SignalKind::AnalogIn.to_string(), "AI");
        assert_eq!(SignalKind::PulseIn.to_string(), "PI");
    }
}
