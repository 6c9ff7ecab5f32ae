//! Pressure module: publishes the backpressure valve setpoints each
//! cycle. Alarm thresholds on the raw pressure inputs themselves are
//! the Safety Evaluator's job (spec §4.3); this module only owns the
//! two backpressure-control analog outputs.

use lact_common::setpoints::Setpoints;

use crate::store::TagStore;
use crate::tags::{AO_BP_DIVERT_SP, AO_BP_SALES_SP};

pub struct PressureModule;

impl PressureModule {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints) {
        store.write_good(AO_BP_SALES_SP, sp.backpressure_sales_psi);
        store.write_good(AO_BP_DIVERT_SP, sp.backpressure_divert_psi);
    }
}

impl Default for PressureModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn publishes_configured_setpoints() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let sp = Setpoints::default();
        let mut module = PressureModule::new();
        module.execute(&store, &sp);
        assert_eq!(
            store.read(AO_BP_SALES_SP).as_float(),
            Some(sp.backpressure_sales_psi)
        );
        assert_eq!(
            store.read(AO_BP_DIVERT_SP).as_float(),
            Some(sp.backpressure_divert_psi)
        );
    }
}
