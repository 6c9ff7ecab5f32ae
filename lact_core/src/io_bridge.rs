//! I/O Bridge (spec §4.2): scales raw field values to/from engineering
//! units and drives a pluggable backend each cycle.

use lact_common::io::{IoPoint, SignalKind};
use lact_common::tag::Quality;
use tracing::warn;

use crate::store::TagStore;

/// Backend capability set (spec §6). Implementations swallow their own
/// transport errors as far as possible; anything that does escape as
/// `Err` is converted to a BAD-quality tag write at the bridge, never
/// propagated further.
pub trait IoBackend: Send {
    fn read_digital(&mut self, address: u32) -> Result<bool, String>;
    fn write_digital(&mut self, address: u32, value: bool) -> Result<(), String>;
    fn read_analog(&mut self, address: u32) -> Result<u16, String>;
    fn write_analog(&mut self, address: u32, value: u16) -> Result<(), String>;
    fn read_pulse(&mut self, address: u32) -> Result<u64, String>;
}

/// The configured set of I/O points, grouped by signal kind for the
/// bridge's fixed read/write passes.
#[derive(Debug, Clone, Default)]
pub struct IoMap {
    pub points: Vec<IoPoint>,
}

impl IoMap {
    pub fn of_kind(&self, kind: SignalKind) -> impl Iterator<Item = &IoPoint> {
        self.points.iter().filter(move |p| p.signal_kind == kind)
    }

    pub fn get(&self, tag: &str) -> Option<&IoPoint> {
        self.points.iter().find(|p| p.tag == tag)
    }
}

pub struct IoBridge {
    pub io_map: IoMap,
}

impl IoBridge {
    pub fn new(io_map: IoMap) -> Self {
        Self { io_map }
    }

    /// Phase 1: backend → scale → Tag Store. Backend failures never
    /// propagate; they become a BAD-quality write of a type-appropriate
    /// zero value.
    pub fn read_inputs(&self, store: &TagStore, backend: &mut dyn IoBackend) {
        for point in self.io_map.of_kind(SignalKind::DigitalIn) {
            match backend.read_digital(point.address) {
                Ok(v) => store.write(&point.tag, v, Quality::Good),
                Err(e) => {
                    warn!(tag = %point.tag, error = %e, "DI read failed");
                    store.write(&point.tag, false, Quality::Bad);
                }
            }
        }

        for point in self.io_map.of_kind(SignalKind::AnalogIn) {
            match backend.read_analog(point.address) {
                Ok(raw) => {
                    let eng = point.scaling.scale_to_eng(raw as f64);
                    store.write(&point.tag, eng, Quality::Good);
                }
                Err(e) => {
                    warn!(tag = %point.tag, error = %e, "AI read failed");
                    store.write(&point.tag, 0.0, Quality::Bad);
                }
            }
        }

        for point in self.io_map.of_kind(SignalKind::PulseIn) {
            match backend.read_pulse(point.address) {
                Ok(count) => store.write(&point.tag, count as i64, Quality::Good),
                Err(e) => {
                    warn!(tag = %point.tag, error = %e, "PI read failed");
                    store.write(&point.tag, 0i64, Quality::Bad);
                }
            }
        }
    }

    /// Phase 6: Tag Store → scale → backend. Analog clamping is
    /// saturating (spec §4.2).
    pub fn write_outputs(&self, store: &TagStore, backend: &mut dyn IoBackend) {
        for point in self.io_map.of_kind(SignalKind::DigitalOut) {
            let value = store.read(&point.tag).bool_or(false);
            if let Err(e) = backend.write_digital(point.address, value) {
                warn!(tag = %point.tag, error = %e, "DO write failed");
            }
        }

        for point in self.io_map.of_kind(SignalKind::AnalogOut) {
            let eng = store.read(&point.tag).float_or(0.0);
            let raw = point.scaling.scale_to_raw(eng).round().clamp(0.0, u16::MAX as f64) as u16;
            if let Err(e) = backend.write_analog(point.address, raw) {
                warn!(tag = %point.tag, error = %e, "AO write failed");
            }
        }
    }
}
