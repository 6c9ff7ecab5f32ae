//! Simulated hardware backend (spec §1.2, §4.2 "Supplemented
//! features"): drives a toy physical model so the controller can run
//! end-to-end without real field I/O, used for development and the
//! integration scenarios in spec §8.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::io_bridge::IoBackend;

/// Minimal physical model: a pump that takes a moment to spin up, a
/// divert valve that takes time to travel, and a flow meter that ramps
/// its pulse rate toward a target once the pump is running.
pub struct HardwareSimulator {
    digital_in: HashMap<u32, bool>,
    digital_out: HashMap<u32, bool>,
    analog_in: HashMap<u32, u16>,
    analog_out: HashMap<u32, u16>,
    pulse_count: u64,

    pump_cmd_since: Option<Instant>,
    divert_cmd_to_divert: bool,
    divert_travel_since: Option<Instant>,
    last_tick: Option<Instant>,

    pump_start_delay: Duration,
    valve_travel_time: Duration,
    rated_pulses_per_sec: f64,
}

/// Digital input addresses the simulator derives from its internal
/// state (mirrors the production I/O map's address assignments).
mod addr {
    pub const DI_PUMP_RUNNING: u32 = 3;
    pub const DI_DIVERT_SALES: u32 = 5;
    pub const DI_DIVERT_DIVERT: u32 = 6;
}

impl HardwareSimulator {
    pub fn new() -> Self {
        Self {
            digital_in: HashMap::new(),
            digital_out: HashMap::new(),
            analog_in: HashMap::new(),
            analog_out: HashMap::new(),
            pulse_count: 0,
            pump_cmd_since: None,
            divert_cmd_to_divert: true,
            divert_travel_since: None,
            last_tick: None,
            pump_start_delay: Duration::from_secs(3),
            valve_travel_time: Duration::from_secs(4),
            rated_pulses_per_sec: 2777.0,
        }
    }

    fn advance(&mut self, now: Instant) {
        let dt = self
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let pump_cmd = *self.digital_out.get(&0).unwrap_or(&false);
        if pump_cmd {
            let since = *self.pump_cmd_since.get_or_insert(now);
            let running = now.duration_since(since) >= self.pump_start_delay;
            self.digital_in.insert(addr::DI_PUMP_RUNNING, running);
            if running {
                self.pulse_count = self
                    .pulse_count
                    .saturating_add((self.rated_pulses_per_sec * dt) as u64);
            }
        } else {
            self.pump_cmd_since = None;
            self.digital_in.insert(addr::DI_PUMP_RUNNING, false);
        }

        let travel_elapsed = self
            .divert_travel_since
            .map(|s| now.duration_since(s))
            .unwrap_or(Duration::MAX);
        if travel_elapsed >= self.valve_travel_time {
            self.digital_in
                .insert(addr::DI_DIVERT_DIVERT, self.divert_cmd_to_divert);
            self.digital_in
                .insert(addr::DI_DIVERT_SALES, !self.divert_cmd_to_divert);
        } else {
            self.digital_in.insert(addr::DI_DIVERT_DIVERT, false);
            self.digital_in.insert(addr::DI_DIVERT_SALES, false);
        }
    }
}

impl Default for HardwareSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for HardwareSimulator {
    fn read_digital(&mut self, address: u32) -> Result<bool, String> {
        self.advance(Instant::now());
        Ok(*self.digital_in.get(&address).unwrap_or(&false))
    }

    fn write_digital(&mut self, address: u32, value: bool) -> Result<(), String> {
        if address == 1 {
            let to_divert = value;
            if to_divert != self.divert_cmd_to_divert {
                self.divert_cmd_to_divert = to_divert;
                self.divert_travel_since = Some(Instant::now());
            }
        }
        self.digital_out.insert(address, value);
        Ok(())
    }

    fn read_analog(&mut self, address: u32) -> Result<u16, String> {
        Ok(*self.analog_in.get(&address).unwrap_or(&2048))
    }

    fn write_analog(&mut self, address: u32, value: u16) -> Result<(), String> {
        self.analog_out.insert(address, value);
        Ok(())
    }

    fn read_pulse(&mut self, _address: u32) -> Result<u64, String> {
        self.advance(Instant::now());
        Ok(self.pulse_count)
    }
}
