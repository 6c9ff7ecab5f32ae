//! Pump Supervisor (spec §4.9): overload lockout and starts-per-hour
//! limiting, sitting downstream of the State Machine's run request.

use std::collections::VecDeque;
use std::time::Instant;

use lact_common::setpoints::Setpoints;

use crate::store::TagStore;
use crate::tags::{DI_PUMP_OVERLOAD, DO_PUMP_START};

/// Written when `record_start` rejects a start; the Safety Evaluator
/// surfaces it as `ALM_PUMP_MAX_STARTS` (spec §4.3).
pub const PUMP_START_REJECTED: &str = "PUMP_START_REJECTED";

const MAX_TRACKED_STARTS: usize = 20;

pub struct PumpSupervisor {
    locked_out: bool,
    trip_at: Option<Instant>,
    start_events: VecDeque<Instant>,
    prev_overload: bool,
    prev_cmd: bool,
}

impl PumpSupervisor {
    pub fn new() -> Self {
        Self {
            locked_out: false,
            trip_at: None,
            start_events: VecDeque::with_capacity(MAX_TRACKED_STARTS),
            prev_overload: false,
            prev_cmd: false,
        }
    }

    pub fn locked_out(&self) -> bool {
        self.locked_out
    }

    fn record_start(&mut self, sp: &Setpoints, now: Instant) -> bool {
        while let Some(&front) = self.start_events.front() {
            if now.duration_since(front).as_secs_f64() > 3600.0 {
                self.start_events.pop_front();
            } else {
                break;
            }
        }
        if self.start_events.len() as u32 >= sp.pump_max_starts_per_hour {
            return false;
        }
        if self.start_events.len() >= MAX_TRACKED_STARTS {
            self.start_events.pop_front();
        }
        self.start_events.push_back(now);
        true
    }

    /// `desired_run` is the State Machine's request; the final written
    /// `DO_PUMP_START` may be suppressed by lockout. Returns the final
    /// command so the caller can feed it back into state-dependent logic
    /// if needed.
    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints, now: Instant, desired_run: bool) -> bool {
        let overload = store.read(DI_PUMP_OVERLOAD).bool_or(false);
        if overload && !self.prev_overload && self.prev_cmd {
            self.locked_out = true;
            self.trip_at = Some(now);
        }
        self.prev_overload = overload;

        if self.locked_out {
            if let Some(trip) = self.trip_at {
                if now.duration_since(trip).as_secs_f64() > sp.pump_restart_lockout_sec {
                    self.locked_out = false;
                    self.trip_at = None;
                }
            }
        }

        let mut cmd = desired_run && !self.locked_out;
        let mut rejected = false;

        if cmd && !self.prev_cmd {
            if !self.record_start(sp, now) {
                cmd = false;
                rejected = true;
                self.locked_out = true;
                self.trip_at = Some(now);
            }
        }

        self.prev_cmd = cmd;
        store.write_good(DO_PUMP_START, cmd);
        store.write_good(PUMP_START_REJECTED, rejected);
        cmd
    }
}

impl Default for PumpSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;
    use std::time::Duration;

    #[test]
    fn overload_while_commanded_latches_lockout() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let sp = Setpoints::default();
        let mut pump = PumpSupervisor::new();
        let t0 = Instant::now();

        assert!(pump.execute(&store, &sp, t0, true));

        store.write_good(DI_PUMP_OVERLOAD, true);
        assert!(!pump.execute(&store, &sp, t0 + Duration::from_millis(10), true));
        assert!(pump.locked_out());
    }

    #[test]
    fn lockout_clears_after_restart_delay() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut sp = Setpoints::default();
        sp.pump_restart_lockout_sec = 5.0;
        let mut pump = PumpSupervisor::new();
        let t0 = Instant::now();

        pump.execute(&store, &sp, t0, true);
        store.write_good(DI_PUMP_OVERLOAD, true);
        pump.execute(&store, &sp, t0 + Duration::from_millis(10), true);
        store.write_good(DI_PUMP_OVERLOAD, false);

        assert!(!pump.execute(&store, &sp, t0 + Duration::from_secs(1), true));
        assert!(pump.execute(&store, &sp, t0 + Duration::from_secs(6), true));
    }

    #[test]
    fn max_starts_per_hour_rejects_further_starts() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut sp = Setpoints::default();
        sp.pump_max_starts_per_hour = 2;
        sp.pump_restart_lockout_sec = 0.0;
        let mut pump = PumpSupervisor::new();
        let t0 = Instant::now();

        for i in 0..2u64 {
            let t = t0 + Duration::from_secs(i * 10);
            assert!(pump.execute(&store, &sp, t, true));
            assert!(pump.execute(&store, &sp, t + Duration::from_millis(1), false));
        }

        let t3 = t0 + Duration::from_secs(30);
        assert!(!pump.execute(&store, &sp, t3, true));
        assert!(store.read(PUMP_START_REJECTED).bool_or(false));
    }
}
