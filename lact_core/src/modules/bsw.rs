//! BS&W Monitor (spec §4.6): range-rejects the raw probe, maintains a
//! rolling mean, and debounces the divert-reason annotation.

use std::collections::VecDeque;
use std::time::Instant;

use lact_common::setpoints::Setpoints;
use lact_common::tag::Quality;

use crate::store::TagStore;
use crate::tags::{AI_BSW_PROBE, BSW_PCT, DIVERT_REASON};

const WINDOW_LEN: usize = 10;
const VALID_LO: f64 = -0.1;
const VALID_HI: f64 = 5.5;

pub struct BswMonitor {
    window: VecDeque<f64>,
    divert_since: Option<Instant>,
}

impl BswMonitor {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_LEN),
            divert_since: None,
        }
    }

    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        let raw = store.read(AI_BSW_PROBE).float_or(0.0);

        if raw < VALID_LO || raw > VALID_HI {
            store.write(AI_BSW_PROBE, raw, Quality::Bad);
        } else {
            store.write_good(AI_BSW_PROBE, raw);
            self.window.push_back(raw);
            if self.window.len() > WINDOW_LEN {
                self.window.pop_front();
            }
        }

        let mean = if self.window.is_empty() {
            0.0
        } else {
            self.window.iter().sum::<f64>() / self.window.len() as f64
        };
        store.write_good(BSW_PCT, mean);

        if mean >= sp.bsw_divert_pct {
            let since = *self.divert_since.get_or_insert(now);
            if now.duration_since(since).as_secs_f64() > sp.bsw_divert_delay_sec {
                store.write_good(DIVERT_REASON, format!("BS&W {mean:.2}%"));
            }
        } else {
            self.divert_since = None;
        }
    }
}

impl Default for BswMonitor {
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
    fn out_of_range_sample_is_marked_bad_but_published() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(AI_BSW_PROBE, 9.0);
        let mut bsw = BswMonitor::new();
        bsw.execute(&store, &Setpoints::default(), Instant::now());
        assert_eq!(store.read(AI_BSW_PROBE).as_float(), Some(9.0));
        assert_eq!(store.quality(AI_BSW_PROBE), Quality::Bad);
        assert_eq!(store.read(BSW_PCT).as_float(), Some(0.0));
    }

    #[test]
    fn rolling_mean_over_window() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut bsw = BswMonitor::new();
        let t0 = Instant::now();
        for (i, v) in [0.1, 0.2, 0.3].iter().enumerate() {
            store.write_good(AI_BSW_PROBE, *v);
            bsw.execute(&store, &Setpoints::default(), t0 + Duration::from_millis(i as u64));
        }
        let mean = store.read(BSW_PCT).as_float().unwrap();
        assert!((mean - 0.2).abs() < 1e-9);
    }

    #[test]
    fn divert_reason_set_only_after_debounce() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut sp = Setpoints::default();
        sp.bsw_divert_pct = 1.0;
        sp.bsw_divert_delay_sec = 3.0;
        let mut bsw = BswMonitor::new();
        let t0 = Instant::now();
        store.write_good(AI_BSW_PROBE, 2.0);
        bsw.execute(&store, &sp, t0);
        assert_eq!(store.read(DIVERT_REASON).as_str(), Some(""));

        store.write_good(AI_BSW_PROBE, 2.0);
        bsw.execute(&store, &sp, t0 + Duration::from_secs(4));
        assert!(store.read(DIVERT_REASON).as_str().unwrap().starts_with("BS&W"));
    }
}
