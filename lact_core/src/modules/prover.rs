//! Prover (spec §4.8): multi-run meter-factor calibration.
//!
//! `prover_reference_volume_bbl` is the prover's certified displacement
//! volume — a physical constant of the installed prover loop, not an
//! operator setpoint, so it's supplied at construction rather than
//! read from `Setpoints`.

use std::time::Instant;

use lact_common::setpoints::Setpoints;

use crate::safety::{PROVE_MF_OUT_OF_RANGE, PROVE_REPEATABILITY_FAILED};
use crate::store::TagStore;
use crate::tags::{DI_PROVER_VLV_OPEN, DO_PROVER_VLV_CMD, METER_FACTOR, PI_METER_PULSE};

/// Simulated run duration when no external prover-detector signal is
/// wired (spec §4.8: "by elapsed 60 s in simulation").
const SIMULATED_RUN_SECONDS: f64 = 60.0;
const VALVE_CONFIRM_CYCLES: u32 = 5;
const VALVE_CONFIRM_SECONDS: f64 = 0.5;
const SETUP_TIMEOUT_SECONDS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverState {
    Idle,
    Setup,
    Running,
    Calculating,
    Complete,
    Failed,
}

struct RunInFlight {
    start_pulses: i64,
    start_time: Instant,
}

pub struct Prover {
    state: ProverState,
    entered_at: Instant,
    current_run: Option<RunInFlight>,
    run_factors: Vec<f64>,
    valve_confirm_cycles: u32,
    valve_confirm_since: Option<Instant>,
    reference_volume_bbl: f64,
}

impl Prover {
    pub fn new(now: Instant, reference_volume_bbl: f64) -> Self {
        Self {
            state: ProverState::Idle,
            entered_at: now,
            current_run: None,
            run_factors: Vec::new(),
            valve_confirm_cycles: 0,
            valve_confirm_since: None,
            reference_volume_bbl,
        }
    }

    pub fn state(&self) -> ProverState {
        self.state
    }

    pub fn start_proving(&mut self, store: &TagStore, now: Instant) {
        self.run_factors.clear();
        self.current_run = None;
        self.valve_confirm_cycles = 0;
        self.valve_confirm_since = None;
        self.state = ProverState::Setup;
        self.entered_at = now;
        store.write_good(PROVE_REPEATABILITY_FAILED, false);
        store.write_good(PROVE_MF_OUT_OF_RANGE, false);
    }

    pub fn execute(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        match self.state {
            ProverState::Idle => {}
            ProverState::Setup => self.tick_setup(store, now),
            ProverState::Running => self.tick_running(store, sp, now),
            ProverState::Calculating => self.calculate(store, sp),
            ProverState::Complete | ProverState::Failed => {
                store.write_good(DO_PROVER_VLV_CMD, false);
            }
        }
    }

    fn tick_setup(&mut self, store: &TagStore, now: Instant) {
        store.write_good(DO_PROVER_VLV_CMD, true);

        if store.read(DI_PROVER_VLV_OPEN).bool_or(false) {
            if self.valve_confirm_since.is_none() {
                self.valve_confirm_since = Some(now);
            }
            self.valve_confirm_cycles += 1;
        } else {
            self.valve_confirm_cycles = 0;
            self.valve_confirm_since = None;
        }

        let debounced = self.valve_confirm_cycles >= VALVE_CONFIRM_CYCLES
            && self
                .valve_confirm_since
                .map(|s| now.duration_since(s).as_secs_f64() >= VALVE_CONFIRM_SECONDS)
                .unwrap_or(false);

        if debounced {
            self.state = ProverState::Running;
            self.begin_run(store, now);
        } else if now.duration_since(self.entered_at).as_secs_f64() > SETUP_TIMEOUT_SECONDS {
            self.state = ProverState::Failed;
        }
    }

    fn begin_run(&mut self, store: &TagStore, now: Instant) {
        self.current_run = Some(RunInFlight {
            start_pulses: store.read(PI_METER_PULSE).int_or(0),
            start_time: now,
        });
    }

    fn tick_running(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        store.write_good(DO_PROVER_VLV_CMD, true);
        let Some(run) = &self.current_run else {
            self.begin_run(store, now);
            return;
        };
        if now.duration_since(run.start_time).as_secs_f64() >= SIMULATED_RUN_SECONDS {
            self.end_run(store, sp, now);
        }
    }

    /// Exposed for a real prover-detector signal to close out a run
    /// early in production, instead of waiting on the simulated timer.
    pub fn end_run_now(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        if self.state == ProverState::Running {
            self.end_run(store, sp, now);
        }
    }

    /// Drops the prover back to `Idle` once its `Complete`/`Failed`
    /// outcome has been consumed by the state machine's return to
    /// `Running`, so a later `start_proving` begins clean.
    pub fn finish(&mut self) {
        self.state = ProverState::Idle;
        self.current_run = None;
        self.run_factors.clear();
        self.valve_confirm_cycles = 0;
        self.valve_confirm_since = None;
    }

    fn end_run(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) {
        let Some(run) = self.current_run.take() else { return };
        let end_pulses = store.read(PI_METER_PULSE).int_or(0);
        let run_pulses = end_pulses - run.start_pulses;
        let indicated_volume = if sp.meter_k_factor != 0.0 {
            run_pulses as f64 / sp.meter_k_factor
        } else {
            0.0
        };
        let run_mf = if indicated_volume != 0.0 {
            self.reference_volume_bbl / indicated_volume
        } else {
            0.0
        };
        self.run_factors.push(run_mf);

        if self.run_factors.len() as u32 >= sp.prove_num_runs {
            self.state = ProverState::Calculating;
        } else {
            self.begin_run(store, now);
        }
    }

    fn calculate(&mut self, store: &TagStore, sp: &Setpoints) {
        let avg = self.run_factors.iter().sum::<f64>() / self.run_factors.len() as f64;
        let max = self.run_factors.iter().cloned().fold(f64::MIN, f64::max);
        let min = self.run_factors.iter().cloned().fold(f64::MAX, f64::min);
        let repeatability = if avg != 0.0 { (max - min) / avg * 100.0 } else { 0.0 };

        let repeatability_failed = repeatability > sp.prove_repeatability_pct;
        let mf_out_of_range = avg < sp.prove_meter_factor_min || avg > sp.prove_meter_factor_max;

        store.write_good(PROVE_REPEATABILITY_FAILED, repeatability_failed);
        store.write_good(PROVE_MF_OUT_OF_RANGE, mf_out_of_range);

        if repeatability_failed || mf_out_of_range {
            self.state = ProverState::Failed;
        } else {
            store.write_good(METER_FACTOR, avg);
            self.state = ProverState::Complete;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;
    use std::time::Duration;

    fn sp() -> Setpoints {
        Setpoints {
            meter_k_factor: 100.0,
            prove_num_runs: 2,
            prove_repeatability_pct: 0.5,
            prove_meter_factor_min: 0.98,
            prove_meter_factor_max: 1.02,
            ..Setpoints::default()
        }
    }

    #[test]
    fn setup_times_out_to_failed_if_valve_never_confirms() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        let t0 = Instant::now();
        let mut prover = Prover::new(t0, 100.0);
        prover.start_proving(&store, t0);
        prover.execute(&store, &sp(), t0 + Duration::from_secs(31));
        assert_eq!(prover.state(), ProverState::Failed);
    }

    #[test]
    fn setup_requires_debounced_valve_confirm() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(DI_PROVER_VLV_OPEN, true);
        let t0 = Instant::now();
        let mut prover = Prover::new(t0, 100.0);
        prover.start_proving(&store, t0);

        for i in 0..4 {
            prover.execute(&store, &sp(), t0 + Duration::from_millis(100 * i));
            assert_eq!(prover.state(), ProverState::Setup, "must not confirm before 5 cycles/500ms");
        }
        prover.execute(&store, &sp(), t0 + Duration::from_millis(600));
        assert_eq!(prover.state(), ProverState::Running);
    }

    #[test]
    fn full_run_sequence_completes_with_meter_factor() {
        let store = TagStore::new();
        tags::seed_defaults(&store);
        store.write_good(DI_PROVER_VLV_OPEN, true);
        let t0 = Instant::now();
        let mut prover = Prover::new(t0, 10.0);
        prover.start_proving(&store, t0);

        let mut now = t0;
        for i in 0..6 {
            now = t0 + Duration::from_millis(100 * i);
            prover.execute(&store, &sp(), now);
        }
        assert_eq!(prover.state(), ProverState::Running);

        store.write_good(PI_METER_PULSE, 1000i64);
        prover.end_run_now(&store, &sp(), now);
        assert_eq!(prover.state(), ProverState::Running, "second run begins");

        store.write_good(PI_METER_PULSE, 2000i64);
        prover.end_run_now(&store, &sp(), now);
        assert_eq!(prover.state(), ProverState::Calculating);

        prover.execute(&store, &sp(), now);
        assert_eq!(prover.state(), ProverState::Complete);
        assert_eq!(store.read(METER_FACTOR).as_float(), Some(1.0));
    }
}
