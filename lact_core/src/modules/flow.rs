//! Flow Totalizer (spec §4.5): pulse counting, meter-factor and CTL
//! correction, and batch accumulation.

use std::time::{Duration, Instant};

use lact_common::setpoints::Setpoints;

use crate::store::TagStore;
use crate::tags::{
    BATCH_GROSS_BBL, BATCH_NET_BBL, CTL_FACTOR, FLOW_NET_BBL, FLOW_RATE_BPH, FLOW_TOTAL_BBL,
    METER_FACTOR, PI_METER_PULSE,
};

pub struct FlowTotalizer {
    last_pulses: Option<i64>,
    last_time: Option<Instant>,
    rate_bph: f64,
    total_gross_bbl: f64,
    total_net_bbl: f64,
    batch_gross_bbl: f64,
    batch_net_bbl: f64,
}

impl FlowTotalizer {
    pub fn new() -> Self {
        Self {
            last_pulses: None,
            last_time: None,
            rate_bph: 0.0,
            total_gross_bbl: 0.0,
            total_net_bbl: 0.0,
            batch_gross_bbl: 0.0,
            batch_net_bbl: 0.0,
        }
    }

    /// Zeros the batch accumulators (spec §4.5). The lifetime totalizer
    /// registers (`FLOW_TOTAL_BBL`/`FLOW_NET_BBL`) are unaffected, the
    /// same way a meter's odometer isn't zeroed by starting a new batch.
    pub fn reset_totals(&mut self) {
        self.batch_gross_bbl = 0.0;
        self.batch_net_bbl = 0.0;
    }

    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        let current_pulses = store.read(PI_METER_PULSE).int_or(0);

        let delta_pulses = match self.last_pulses {
            Some(prev) => {
                let delta = current_pulses - prev;
                if delta < 0 {
                    current_pulses
                } else {
                    delta
                }
            }
            None => 0,
        };
        let delta_seconds = self
            .last_time
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);

        self.last_pulses = Some(current_pulses);
        self.last_time = Some(now);

        let delta_volume = if sp.meter_k_factor != 0.0 {
            delta_pulses as f64 / sp.meter_k_factor
        } else {
            0.0
        };

        if delta_pulses > 0 && delta_seconds > 0.0 {
            self.rate_bph = (delta_volume / delta_seconds) * 3600.0;
        } else if delta_pulses == 0 && delta_seconds > 2.0 {
            self.rate_bph = 0.0;
        }

        let meter_factor = store.read(METER_FACTOR).float_or(1.0);
        let ctl = store.read(CTL_FACTOR).float_or(1.0);
        let corrected_gross = delta_volume * meter_factor;
        let net_increment = corrected_gross * ctl;

        self.total_gross_bbl += corrected_gross;
        self.total_net_bbl += net_increment;
        self.batch_gross_bbl += corrected_gross;
        self.batch_net_bbl += net_increment;

        store.write_good(FLOW_RATE_BPH, self.rate_bph);
        store.write_good(FLOW_TOTAL_BBL, self.total_gross_bbl);
        store.write_good(FLOW_NET_BBL, self.total_net_bbl);
        store.write_good(BATCH_GROSS_BBL, self.batch_gross_bbl);
        store.write_good(BATCH_NET_BBL, self.batch_net_bbl);
    }
}

impl Default for FlowTotalizer {
    fn default() -> Self {
        Self::new()
    }
}
