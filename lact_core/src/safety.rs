//! Safety Evaluator (spec §4.3): the fixed check battery that derives
//! alarm state and the ephemeral shutdown/divert request flags the
//! State Machine consults every cycle.

use std::time::{Duration, Instant};

use lact_common::setpoints::Setpoints;
use lact_common::tag::Quality;

use crate::alarm_registry::AlarmRegistry;
use crate::store::TagStore;
use crate::tags::*;

pub const ALM_ESTOP: &str = "ALM_ESTOP";
pub const ALM_PUMP_OVERLOAD: &str = "ALM_PUMP_OVERLOAD";
pub const ALM_PUMP_FAIL_START: &str = "ALM_PUMP_FAIL_START";
pub const ALM_PUMP_MAX_STARTS: &str = "ALM_PUMP_MAX_STARTS";
pub const ALM_BSW_PROBE_FAIL: &str = "ALM_BSW_PROBE_FAIL";
pub const ALM_BSW_HIGH: &str = "ALM_BSW_HIGH";
pub const ALM_BSW_DIVERT: &str = "ALM_BSW_DIVERT";
pub const ALM_INLET_PRESS_LO: &str = "ALM_INLET_PRESS_LO";
pub const ALM_INLET_PRESS_HI: &str = "ALM_INLET_PRESS_HI";
pub const ALM_LOOP_PRESS_HI: &str = "ALM_LOOP_PRESS_HI";
pub const ALM_OUTLET_PRESS_LO: &str = "ALM_OUTLET_PRESS_LO";
pub const ALM_STRAINER_DP_HI: &str = "ALM_STRAINER_DP_HI";
pub const ALM_TEMP_LO: &str = "ALM_TEMP_LO";
pub const ALM_TEMP_HI: &str = "ALM_TEMP_HI";
pub const ALM_TEMP_DELTA: &str = "ALM_TEMP_DELTA";
pub const ALM_FLOW_LO: &str = "ALM_FLOW_LO";
pub const ALM_FLOW_HI: &str = "ALM_FLOW_HI";
pub const ALM_FLOW_NO_FLOW: &str = "ALM_FLOW_NO_FLOW";
pub const ALM_DIVERT_FAIL: &str = "ALM_DIVERT_FAIL";
pub const ALM_SAMPLE_POT_FULL: &str = "ALM_SAMPLE_POT_FULL";
pub const ALM_GAS_DETECTED: &str = "ALM_GAS_DETECTED";
pub const ALM_PROVE_REPEAT_FAIL: &str = "ALM_PROVE_REPEAT_FAIL";
pub const ALM_PROVE_MF_RANGE: &str = "ALM_PROVE_MF_RANGE";

/// Tags the Prover module writes to report its own outcome to the
/// evaluator (spec §4.3: "activated by the Prover module's own
/// outcome ... still route through the same activate/deactivate path").
pub const PROVE_REPEATABILITY_FAILED: &str = "PROVE_REPEATABILITY_FAILED";
pub const PROVE_MF_OUT_OF_RANGE: &str = "PROVE_MF_OUT_OF_RANGE";

/// Request flags the evaluator derives each cycle; consumed (read-only)
/// by the State Machine and cleared/rederived at the top of the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyRequests {
    pub shutdown_requested: bool,
    pub divert_requested: bool,
}

pub struct SafetyEvaluator {
    registry: AlarmRegistry,
    pump_fail_start_since: Option<Instant>,
    no_flow_since: Option<Instant>,
    divert_travel_since: Option<(bool, Instant)>,
    /// Timestamp of the operator's last horn-silence request, if any
    /// unacknowledged alarm hasn't re-armed it since.
    horn_silence_requested_at: Option<Instant>,
}

impl SafetyEvaluator {
    pub fn new(registry: AlarmRegistry) -> Self {
        Self {
            registry,
            pump_fail_start_since: None,
            no_flow_since: None,
            divert_travel_since: None,
            horn_silence_requested_at: None,
        }
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AlarmRegistry {
        &mut self.registry
    }

    pub fn silence_horn(&mut self, now: Instant) {
        self.horn_silence_requested_at = Some(now);
    }

    /// Run the full check battery and return this cycle's request
    /// flags. `divert_travel_commanded` is the divert valve's last
    /// commanded side ("true" = Divert), used by the travel-timeout
    /// check.
    pub fn evaluate(
        &mut self,
        store: &TagStore,
        sp: &Setpoints,
        now: Instant,
        pump_running_feedback_gate: bool,
        divert_travel_commanded: Option<bool>,
    ) -> SafetyRequests {
        let mut requests = SafetyRequests::default();

        self.check_estop(store, now, &mut requests);
        self.check_pump_overload(store, now, &mut requests);
        self.check_pump_fail_start(store, now, &mut requests);
        self.check_bsw(store, sp, now, &mut requests);
        self.check_pressures(store, sp, now, pump_running_feedback_gate, &mut requests);
        self.check_strainer(store, sp, now, &mut requests);
        self.check_temperature(store, sp, now, &mut requests);
        self.check_flow(store, sp, now, pump_running_feedback_gate, &mut requests);
        self.check_divert_travel(sp, now, divert_travel_commanded, &mut requests);
        self.check_sample_pot(store, now, &mut requests);
        self.check_gas(store, now, &mut requests);
        self.check_prover_outcomes(store, now, &mut requests);

        self.update_summary_tags(store);
        self.drive_annunciators(store, sp, now);

        requests
    }

    fn activate(&mut self, tag: &str, condition: bool, now: Instant, requests: &mut SafetyRequests) {
        self.registry.evaluate(tag, condition, now);
        if condition {
            if let Some(def) = self.registry.definition(tag) {
                use lact_common::alarm::AlarmAction;
                match def.action {
                    AlarmAction::Shutdown | AlarmAction::EmergencyStop => {
                        requests.shutdown_requested = true;
                    }
                    AlarmAction::Divert => requests.divert_requested = true,
                    _ => {}
                }
            }
        }
    }

    fn check_estop(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let estop = store.read(DI_ESTOP).bool_or(false);
        self.activate(ALM_ESTOP, estop, now, requests);
    }

    fn check_pump_overload(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let overload = store.read(DI_PUMP_OVERLOAD).bool_or(false);
        self.activate(ALM_PUMP_OVERLOAD, overload, now, requests);
    }

    fn check_pump_fail_start(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let cmd = store.read(DO_PUMP_START).bool_or(false);
        let running = store.read(DI_PUMP_RUNNING).bool_or(false);

        let failed = if cmd && !running {
            let since = *self.pump_fail_start_since.get_or_insert(now);
            now.duration_since(since) > Duration::from_secs(10)
        } else {
            self.pump_fail_start_since = None;
            false
        };
        self.activate(ALM_PUMP_FAIL_START, failed, now, requests);
    }

    fn check_bsw(&mut self, store: &TagStore, sp: &Setpoints, now: Instant, requests: &mut SafetyRequests) {
        let probe_bad = store.quality(AI_BSW_PROBE) == Quality::Bad;
        self.activate(ALM_BSW_PROBE_FAIL, probe_bad, now, requests);

        let bsw = store.read(BSW_PCT).float_or(0.0);
        self.activate(ALM_BSW_HIGH, bsw >= sp.bsw_alarm_pct, now, requests);
        self.activate(ALM_BSW_DIVERT, bsw >= sp.bsw_divert_pct, now, requests);
    }

    fn check_pressures(
        &mut self,
        store: &TagStore,
        sp: &Setpoints,
        now: Instant,
        pump_running: bool,
        requests: &mut SafetyRequests,
    ) {
        let inlet = store.read(AI_INLET_PRESS).float_or(0.0);
        let loop_p = store.read(AI_LOOP_HI_PRESS).float_or(0.0);
        let outlet = store.read(AI_OUTLET_PRESS).float_or(0.0);

        self.activate(
            ALM_INLET_PRESS_LO,
            pump_running && inlet < sp.inlet_press_lo_psi,
            now,
            requests,
        );
        self.activate(ALM_INLET_PRESS_HI, inlet > sp.inlet_press_hi_psi, now, requests);
        self.activate(ALM_LOOP_PRESS_HI, loop_p > sp.loop_press_hi_psi, now, requests);
        self.activate(
            ALM_OUTLET_PRESS_LO,
            pump_running && outlet < sp.outlet_press_lo_psi,
            now,
            requests,
        );
    }

    fn check_strainer(&mut self, store: &TagStore, sp: &Setpoints, now: Instant, requests: &mut SafetyRequests) {
        let dp = store.read(AI_STRAINER_DP).float_or(0.0);
        self.activate(ALM_STRAINER_DP_HI, dp > sp.strainer_dp_hi_psi, now, requests);
    }

    fn check_temperature(&mut self, store: &TagStore, sp: &Setpoints, now: Instant, requests: &mut SafetyRequests) {
        let meter_temp = store.read(AI_METER_TEMP).float_or(sp.temp_base_deg_f);
        let test_temp = store.read(AI_TEST_THERMO).float_or(sp.temp_base_deg_f);

        self.activate(ALM_TEMP_LO, meter_temp < sp.temp_lo_alarm_f, now, requests);
        self.activate(ALM_TEMP_HI, meter_temp > sp.temp_hi_alarm_f, now, requests);
        self.activate(
            ALM_TEMP_DELTA,
            (meter_temp - test_temp).abs() > sp.temp_max_delta_f,
            now,
            requests,
        );
    }

    fn check_flow(
        &mut self,
        store: &TagStore,
        sp: &Setpoints,
        now: Instant,
        pump_running: bool,
        requests: &mut SafetyRequests,
    ) {
        let rate = store.read(FLOW_RATE_BPH).float_or(0.0);

        self.activate(ALM_FLOW_LO, pump_running && rate < sp.meter_min_flow_bph, now, requests);
        self.activate(ALM_FLOW_HI, rate > sp.meter_max_flow_bph, now, requests);

        let no_flow = if pump_running && rate <= 0.0 {
            let since = *self.no_flow_since.get_or_insert(now);
            now.duration_since(since).as_secs_f64() > sp.meter_no_flow_timeout_sec
        } else {
            self.no_flow_since = None;
            false
        };
        self.activate(ALM_FLOW_NO_FLOW, no_flow, now, requests);
    }

    fn check_divert_travel(
        &mut self,
        sp: &Setpoints,
        now: Instant,
        commanded: Option<bool>,
        requests: &mut SafetyRequests,
    ) {
        let failed = match commanded {
            Some(side) => {
                let (tracked_side, since) = *self.divert_travel_since.get_or_insert((side, now));
                if tracked_side != side {
                    self.divert_travel_since = Some((side, now));
                    false
                } else {
                    now.duration_since(since).as_secs_f64() > sp.divert_travel_timeout_sec
                }
            }
            None => {
                self.divert_travel_since = None;
                false
            }
        };
        self.activate(ALM_DIVERT_FAIL, failed, now, requests);
    }

    fn check_sample_pot(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let hi = store.read(DI_SAMPLE_POT_HI).bool_or(false);
        self.activate(ALM_SAMPLE_POT_FULL, hi, now, requests);
    }

    fn check_gas(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let gas = store.read(DI_AIR_ELIM_FLOAT).bool_or(false);
        self.activate(ALM_GAS_DETECTED, gas, now, requests);
    }

    fn check_prover_outcomes(&mut self, store: &TagStore, now: Instant, requests: &mut SafetyRequests) {
        let repeat_fail = store.read(PROVE_REPEATABILITY_FAILED).bool_or(false);
        let mf_range_fail = store.read(PROVE_MF_OUT_OF_RANGE).bool_or(false);
        self.activate(ALM_PROVE_REPEAT_FAIL, repeat_fail, now, requests);
        self.activate(ALM_PROVE_MF_RANGE, mf_range_fail, now, requests);
    }

    fn update_summary_tags(&self, store: &TagStore) {
        store.write_good(ALARM_ACTIVE_COUNT, self.registry.active_count() as i64);
        store.write_good(ALARM_UNACK_COUNT, self.registry.unacknowledged_count() as i64);
        let pri = self
            .registry
            .highest_active_priority()
            .map(|p| p as i64)
            .unwrap_or(0);
        store.write_good(HIGHEST_ALARM_PRI, pri);
    }

    fn drive_annunciators(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        let any_unacked = self.registry.any_unacked_annunciating();
        store.write_good(DO_ALARM_BEACON, any_unacked);

        let horn = match self.horn_silence_requested_at {
            None => any_unacked,
            Some(silenced_at) => {
                let newer_alarm = self
                    .registry
                    .newest_unacked_annunciating()
                    .map(|t| t > silenced_at)
                    .unwrap_or(false);
                let timed_out = now.duration_since(silenced_at).as_secs_f64() > sp.alarm_horn_silence_sec;
                if newer_alarm || timed_out {
                    self.horn_silence_requested_at = None;
                    any_unacked
                } else {
                    false
                }
            }
        };
        store.write_good(DO_ALARM_HORN, horn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lact_common::alarm::{AlarmAction, AlarmDefinition, AlarmPriority};

    fn default_registry() -> AlarmRegistry {
        AlarmRegistry::new(vec![
            AlarmDefinition::new(ALM_ESTOP, "estop", AlarmPriority::Critical, AlarmAction::EmergencyStop),
            AlarmDefinition::new(ALM_PUMP_OVERLOAD, "pump overload", AlarmPriority::Critical, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_PUMP_FAIL_START, "fail start", AlarmPriority::High, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_PUMP_MAX_STARTS, "max starts", AlarmPriority::High, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_BSW_PROBE_FAIL, "probe fail", AlarmPriority::High, AlarmAction::Divert),
            AlarmDefinition::new(ALM_BSW_HIGH, "bsw high", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_BSW_DIVERT, "bsw divert", AlarmPriority::High, AlarmAction::Divert),
            AlarmDefinition::new(ALM_INLET_PRESS_LO, "inlet lo", AlarmPriority::High, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_INLET_PRESS_HI, "inlet hi", AlarmPriority::High, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_LOOP_PRESS_HI, "loop hi", AlarmPriority::High, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_OUTLET_PRESS_LO, "outlet lo", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_STRAINER_DP_HI, "strainer dp", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_TEMP_LO, "temp lo", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_TEMP_HI, "temp hi", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_TEMP_DELTA, "temp delta", AlarmPriority::Low, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_FLOW_LO, "flow lo", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_FLOW_HI, "flow hi", AlarmPriority::High, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_FLOW_NO_FLOW, "no flow", AlarmPriority::High, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_DIVERT_FAIL, "divert fail", AlarmPriority::Critical, AlarmAction::Shutdown),
            AlarmDefinition::new(ALM_SAMPLE_POT_FULL, "pot full", AlarmPriority::Low, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_GAS_DETECTED, "gas", AlarmPriority::Medium, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_PROVE_REPEAT_FAIL, "prove repeat", AlarmPriority::Low, AlarmAction::Annunciate),
            AlarmDefinition::new(ALM_PROVE_MF_RANGE, "prove mf", AlarmPriority::Medium, AlarmAction::Annunciate),
        ])
    }

    #[test]
    fn estop_requests_shutdown() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(DI_ESTOP, true);
        let mut eval = SafetyEvaluator::new(default_registry());
        let sp = Setpoints::default();
        let req = eval.evaluate(&store, &sp, Instant::now(), false, None);
        assert!(req.shutdown_requested);
        assert!(eval.registry().state(ALM_ESTOP).unwrap().active);
    }

    #[test]
    fn bsw_divert_sets_divert_requested() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(BSW_PCT, 5.0);
        let mut eval = SafetyEvaluator::new(default_registry());
        let sp = Setpoints::default();
        let req = eval.evaluate(&store, &sp, Instant::now(), false, None);
        assert!(req.divert_requested);
    }

    #[test]
    fn pump_fail_to_start_debounces_ten_seconds() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(DO_PUMP_START, true);
        store.write_good(DI_PUMP_RUNNING, false);
        let mut eval = SafetyEvaluator::new(default_registry());
        let sp = Setpoints::default();
        let t0 = Instant::now();
        let req = eval.evaluate(&store, &sp, t0, false, None);
        assert!(!req.shutdown_requested, "must not trip before debounce elapses");
        let req = eval.evaluate(&store, &sp, t0 + Duration::from_secs(11), false, None);
        assert!(req.shutdown_requested);
    }

    #[test]
    fn beacon_follows_unacked_annunciating_alarm() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(DI_SAMPLE_POT_HI, true);
        let mut eval = SafetyEvaluator::new(default_registry());
        let sp = Setpoints::default();
        eval.evaluate(&store, &sp, Instant::now(), false, None);
        assert!(store.read(DO_ALARM_BEACON).bool_or(false));
    }

    #[test]
    fn horn_silence_holds_until_newer_alarm_or_timeout() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(DI_SAMPLE_POT_HI, true);
        let mut eval = SafetyEvaluator::new(default_registry());
        let sp = Setpoints::default();
        let t0 = Instant::now();
        eval.evaluate(&store, &sp, t0, false, None);
        assert!(store.read(DO_ALARM_HORN).bool_or(false));

        eval.silence_horn(t0 + Duration::from_millis(10));
        eval.evaluate(&store, &sp, t0 + Duration::from_millis(20), false, None);
        assert!(!store.read(DO_ALARM_HORN).bool_or(false), "horn should be silenced");

        store.write_good(DI_AIR_ELIM_FLOAT, true);
        eval.evaluate(&store, &sp, t0 + Duration::from_millis(30), false, None);
        assert!(
            store.read(DO_ALARM_HORN).bool_or(false),
            "a newer unacked alarm should re-arm the horn"
        );
    }

    #[test]
    fn horn_silence_times_out_even_without_a_newer_alarm() {
        let store = TagStore::new();
        crate::tags::seed_defaults(&store);
        store.write_good(DI_SAMPLE_POT_HI, true);
        let mut eval = SafetyEvaluator::new(default_registry());
        let mut sp = Setpoints::default();
        sp.alarm_horn_silence_sec = 1.0;
        let t0 = Instant::now();
        eval.evaluate(&store, &sp, t0, false, None);
        eval.silence_horn(t0);
        eval.evaluate(&store, &sp, t0 + Duration::from_millis(500), false, None);
        assert!(!store.read(DO_ALARM_HORN).bool_or(false));
        eval.evaluate(&store, &sp, t0 + Duration::from_millis(1500), false, None);
        assert!(store.read(DO_ALARM_HORN).bool_or(false), "silence timeout must re-arm the horn");
    }
}
