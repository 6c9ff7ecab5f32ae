//! Temperature / CTL module (spec §4.10): publishes the corrected
//! meter temperature and the correction-to-60°F factor.

use lact_common::setpoints::Setpoints;

use crate::store::TagStore;
use crate::tags::{AI_METER_TEMP, CTL_FACTOR, TEMP_CORRECTED_F};

/// Approximate thermal expansion coefficient for ~35°API crude, per
/// the simplified API MPMS 11.1 form this module implements.
const ALPHA: f64 = 0.00046;

pub struct TemperatureModule;

impl TemperatureModule {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints) {
        let observed = store.read(AI_METER_TEMP).float_or(sp.temp_base_deg_f);
        store.write_good(TEMP_CORRECTED_F, observed);

        let d_t = observed - sp.temp_base_deg_f;
        let ctl = if d_t.abs() < 0.01 {
            1.0
        } else {
            (-ALPHA * d_t * (1.0 + 0.8 * ALPHA * d_t)).exp().clamp(0.9, 1.1)
        };
        store.write_good(CTL_FACTOR, ctl);
    }
}

impl Default for TemperatureModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn ctl_is_exactly_one_at_base_temperature() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(AI_METER_TEMP, 60.0);
        let sp = Setpoints::default();
        let mut module = TemperatureModule::new();
        module.execute(&store, &sp);
        assert_eq!(store.read(CTL_FACTOR).as_float(), Some(1.0));
    }

    #[test]
    fn ctl_shrinks_above_base_temperature() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(AI_METER_TEMP, 100.0);
        let sp = Setpoints::default();
        let mut module = TemperatureModule::new();
        module.execute(&store, &sp);
        let ctl = store.read(CTL_FACTOR).as_float().unwrap();
        assert!(ctl < 1.0 && ctl >= 0.9);
    }

    #[test]
    fn ctl_is_clamped() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(AI_METER_TEMP, 1000.0);
        let sp = Setpoints::default();
        let mut module = TemperatureModule::new();
        module.execute(&store, &sp);
        let ctl = store.read(CTL_FACTOR).as_float().unwrap();
        assert_eq!(ctl, 0.9);
    }
}
