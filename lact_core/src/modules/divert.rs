//! Divert valve supervisor: the final writer of the divert command
//! output, and the source of truth for the valve's confirmed position.

use crate::store::TagStore;
use crate::tags::{DIVERT_VALVE_POS, DI_DIVERT_DIVERT, DI_DIVERT_SALES, DO_DIVERT_CMD};

pub struct DivertSupervisor;

impl DivertSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Writes the commanded side and the observed limit-switch position;
    /// returns the commanded side for the Safety Evaluator's travel
    /// timeout check.
    pub fn execute(&mut self, store: &TagStore, desired_divert: bool) -> bool {
        store.write_good(DO_DIVERT_CMD, desired_divert);

        let at_divert = store.read(DI_DIVERT_DIVERT).bool_or(false);
        let at_sales = store.read(DI_DIVERT_SALES).bool_or(false);
        let pos = match (at_sales, at_divert) {
            (true, false) => "SALES",
            (false, true) => "DIVERT",
            _ => "TRANSIT",
        };
        store.write_good(DIVERT_VALVE_POS, pos);

        desired_divert
    }
}

impl Default for DivertSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn reports_transit_when_no_limit_is_made() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let mut div = DivertSupervisor::new();
        div.execute(&store, true);
        assert_eq!(store.read(DIVERT_VALVE_POS).as_str(), Some("TRANSIT"));
    }

    #[test]
    fn reports_sales_when_sales_limit_made() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(DI_DIVERT_SALES, true);
        let mut div = DivertSupervisor::new();
        div.execute(&store, false);
        assert_eq!(store.read(DIVERT_VALVE_POS).as_str(), Some("SALES"));
        assert!(!store.read(DO_DIVERT_CMD).bool_or(true));
    }
}
