//! Sampler (spec §4.7): flow-proportional grab scheduling and mixing
//! pump duty cycling.

use std::time::{Duration, Instant};

use lact_common::setpoints::Setpoints;

use crate::store::TagStore;
use crate::tags::{
    DI_SAMPLE_POT_HI, DO_SAMPLE_MIX_PUMP, DO_SAMPLE_SOL, FLOW_RATE_BPH, LACT_STATE,
    SAMPLE_TOTAL_GRABS, SAMPLE_TOTAL_ML,
};

const GRAB_PULSE: Duration = Duration::from_millis(500);
const MIX_WINDOW: Duration = Duration::from_secs(300);

pub struct Sampler {
    epoch: Instant,
    last_grab_at: Option<Instant>,
    pulse_until: Option<Instant>,
    grabs: i64,
    total_ml: f64,
}

impl Sampler {
    pub fn new(now: Instant) -> Self {
        Self {
            epoch: now,
            last_grab_at: None,
            pulse_until: None,
            grabs: 0,
            total_ml: 0.0,
        }
    }

    /// Called by the engine whenever the Sampler is ticked (spec §4.11:
    /// state ∈ {Running, Divert}); the solenoid-energize invariant
    /// (state = Running only) is enforced here, not by the caller.
    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        let running = store.read(LACT_STATE).as_str() == Some("RUNNING");
        let pot_high = store.read(DI_SAMPLE_POT_HI).bool_or(false);
        let energize = running && !pot_high;

        if !energize {
            store.write_good(DO_SAMPLE_SOL, false);
            store.write_good(DO_SAMPLE_MIX_PUMP, false);
            self.pulse_until = None;
            store.write_good(SAMPLE_TOTAL_GRABS, self.grabs);
            store.write_good(SAMPLE_TOTAL_ML, self.total_ml);
            return;
        }

        let solenoid_on = if let Some(until) = self.pulse_until {
            if now < until {
                true
            } else {
                self.pulse_until = None;
                false
            }
        } else {
            let flow_rate = store.read(FLOW_RATE_BPH).float_or(0.0);
            let due = self
                .last_grab_at
                .map(|t| now.duration_since(t).as_secs_f64() >= sp.sample_rate_sec)
                .unwrap_or(true);
            if flow_rate > 0.0 && due {
                self.pulse_until = Some(now + GRAB_PULSE);
                self.last_grab_at = Some(now);
                self.grabs += 1;
                self.total_ml += sp.sample_volume_ml;
                true
            } else {
                false
            }
        };
        store.write_good(DO_SAMPLE_SOL, solenoid_on);
        store.write_good(SAMPLE_TOTAL_GRABS, self.grabs);
        store.write_good(SAMPLE_TOTAL_ML, self.total_ml);

        let phase = now.duration_since(self.epoch).as_secs_f64() % MIX_WINDOW.as_secs_f64();
        store.write_good(DO_SAMPLE_MIX_PUMP, phase < sp.sample_mix_time_sec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    fn running_store(now_flow: f64) -> TagStore {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(LACT_STATE, "RUNNING");
        store.write_good(FLOW_RATE_BPH, now_flow);
        store
    }

    #[test]
    fn forced_off_outside_running() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut sampler = Sampler::new(Instant::now());
        sampler.execute(&store, &Setpoints::default(), Instant::now());
        assert!(!store.read(DO_SAMPLE_SOL).bool_or(true));
        assert!(!store.read(DO_SAMPLE_MIX_PUMP).bool_or(true));
    }

    #[test]
    fn pot_high_forces_off_even_running() {
        let store = running_store(10.0);
        store.write_good(DI_SAMPLE_POT_HI, true);
        let mut sampler = Sampler::new(Instant::now());
        sampler.execute(&store, &Setpoints::default(), Instant::now());
        assert!(!store.read(DO_SAMPLE_SOL).bool_or(true));
    }

    #[test]
    fn grabs_at_configured_interval() {
        let store = running_store(10.0);
        let mut sp = Setpoints::default();
        sp.sample_rate_sec = 15.0;
        let t0 = Instant::now();
        let mut sampler = Sampler::new(t0);

        sampler.execute(&store, &sp, t0);
        assert!(store.read(DO_SAMPLE_SOL).bool_or(false));
        assert_eq!(store.read(SAMPLE_TOTAL_GRABS).as_int(), Some(1));

        sampler.execute(&store, &sp, t0 + Duration::from_millis(200));
        assert!(store.read(DO_SAMPLE_SOL).bool_or(false), "pulse holds for 500ms");

        sampler.execute(&store, &sp, t0 + Duration::from_millis(600));
        assert!(!store.read(DO_SAMPLE_SOL).bool_or(true), "pulse ends after 500ms");

        sampler.execute(&store, &sp, t0 + Duration::from_secs(16));
        assert_eq!(store.read(SAMPLE_TOTAL_GRABS).as_int(), Some(2));
    }

    #[test]
    fn mixing_pump_cycles_within_five_minute_window() {
        let store = running_store(10.0);
        let mut sp = Setpoints::default();
        sp.sample_mix_time_sec = 30.0;
        let t0 = Instant::now();
        let mut sampler = Sampler::new(t0);

        sampler.execute(&store, &sp, t0 + Duration::from_secs(10));
        assert!(store.read(DO_SAMPLE_MIX_PUMP).bool_or(false));

        sampler.execute(&store, &sp, t0 + Duration::from_secs(60));
        assert!(!store.read(DO_SAMPLE_MIX_PUMP).bool_or(true));
    }
}
