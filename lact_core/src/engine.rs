//! Scan Engine (spec §4.11): owns the fixed-period loop and the
//! per-cycle orchestration of every other module.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lact_common::setpoints::Setpoints;
use tracing::{error, warn};

use crate::alarm_registry::AlarmRegistry;
use crate::command::{controller_channel, Command, CommandMailbox, ControllerHandle};
use crate::config::UnitConfig;
use crate::io_bridge::{IoBackend, IoBridge, IoMap};
use crate::modules::bsw::BswMonitor;
use crate::modules::divert::DivertSupervisor;
use crate::modules::flow::FlowTotalizer;
use crate::modules::pressure::PressureModule;
use crate::modules::prover::{Prover, ProverState};
use crate::modules::pump::PumpSupervisor;
use crate::modules::sampler::Sampler;
use crate::modules::temperature::TemperatureModule;
use crate::safety::SafetyEvaluator;
use crate::state_machine::{State, StateMachine};
use crate::store::TagStore;
use crate::tags;
use crate::tags::{
    DI_PUMP_RUNNING, DO_ALARM_BEACON, DO_ALARM_HORN, DO_DIVERT_CMD, DO_PROVER_VLV_CMD,
    DO_PUMP_START, DO_SAMPLE_MIX_PUMP, DO_SAMPLE_SOL,
};

/// Mirrors the reference control unit's `CycleStats` accumulator
/// (count/last/max/overruns), kept in a simpler form since this
/// controller has no per-axis timing breakdown to track.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub scan_count: u64,
    pub last_cycle_ms: f64,
    pub max_scan_time_ms: f64,
    pub overrun_count: u64,
}

impl CycleStats {
    fn record(&mut self, elapsed: Duration, overrun: bool) {
        self.scan_count += 1;
        self.last_cycle_ms = elapsed.as_secs_f64() * 1000.0;
        if self.last_cycle_ms > self.max_scan_time_ms {
            self.max_scan_time_ms = self.last_cycle_ms;
        }
        if overrun {
            self.overrun_count += 1;
        }
    }
}

pub struct ScanEngine {
    store: Arc<TagStore>,
    io_bridge: IoBridge,
    backend: Box<dyn IoBackend>,
    safety: SafetyEvaluator,
    state_machine: StateMachine,
    pressure: PressureModule,
    temperature: TemperatureModule,
    flow: FlowTotalizer,
    bsw: BswMonitor,
    sampler: Sampler,
    prover: Prover,
    divert: DivertSupervisor,
    pump: PumpSupervisor,
    mailbox: CommandMailbox,
    setpoints: Setpoints,
    stats: CycleStats,
    last_divert_commanded: Option<bool>,
}

impl ScanEngine {
    pub fn new(config: UnitConfig, backend: Box<dyn IoBackend>) -> (Self, ControllerHandle) {
        let store = Arc::new(TagStore::new());
        tags::seed_defaults(&store);

        let io_bridge = IoBridge::new(IoMap {
            points: config.io_points.clone(),
        });
        let registry = AlarmRegistry::new(config.alarms.clone());
        let safety = SafetyEvaluator::new(registry);

        let now = Instant::now();
        let state_machine = StateMachine::new(now);
        let prover = Prover::new(now, config.prover_reference_volume_bbl);
        let sampler = Sampler::new(now);

        let (handle, mailbox) = controller_channel(store.clone());

        let engine = Self {
            store,
            io_bridge,
            backend,
            safety,
            state_machine,
            pressure: PressureModule::new(),
            temperature: TemperatureModule::new(),
            flow: FlowTotalizer::new(),
            bsw: BswMonitor::new(),
            sampler,
            prover,
            divert: DivertSupervisor::new(),
            pump: PumpSupervisor::new(),
            mailbox,
            setpoints: config.setpoints,
            stats: CycleStats::default(),
            last_divert_commanded: None,
        };
        (engine, handle)
    }

    pub fn store(&self) -> &Arc<TagStore> {
        &self.store
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn state(&self) -> State {
        self.state_machine.state()
    }

    fn apply_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::RequestTransition(target) => {
                if !self.state_machine.request_transition(target) {
                    warn!(?target, "operator requested an illegal state transition");
                }
            }
            Command::AcknowledgeAlarm(tag) => {
                self.safety.registry_mut().acknowledge(&tag);
            }
            Command::AcknowledgeAll => {
                self.safety.registry_mut().acknowledge_all();
            }
            Command::SilenceHorn => {
                self.safety.silence_horn(now);
            }
            Command::StartProving => {
                if self.state_machine.request_transition(State::Proving) {
                    self.prover.start_proving(&self.store, now);
                }
            }
            Command::ResetBatchTotals => {
                self.flow.reset_totals();
            }
            Command::UpdateSetpoint { key, value } => {
                if !self.setpoints.update(&key, value) {
                    warn!(key, "rejected setpoint update: unknown key or type mismatch");
                }
            }
        }
    }

    fn step(&mut self, now: Instant) {
        for command in self.mailbox.drain() {
            self.apply_command(command, now);
        }

        self.io_bridge.read_inputs(&self.store, self.backend.as_mut());

        let pump_running = self.store.read(DI_PUMP_RUNNING).bool_or(false);
        let requests = self.safety.evaluate(
            &self.store,
            &self.setpoints,
            now,
            pump_running,
            self.last_divert_commanded,
        );

        let intent = self.state_machine.tick(&self.store, &self.setpoints, now, requests);

        self.pressure.execute(&self.store, &self.setpoints);
        self.temperature.execute(&self.store, &self.setpoints);
        self.flow.execute(&self.store, &self.setpoints, now);
        self.bsw.execute(&self.store, &self.setpoints, now);

        match self.state_machine.state() {
            State::Running | State::Divert => {
                self.sampler.execute(&self.store, &self.setpoints, now);
            }
            State::Proving => {
                self.prover.execute(&self.store, &self.setpoints, now);
                if matches!(self.prover.state(), ProverState::Complete | ProverState::Failed) {
                    self.state_machine.request_transition(State::Running);
                    self.prover.finish();
                }
            }
            _ => {
                self.store.write_good(DO_SAMPLE_SOL, false);
                self.store.write_good(DO_SAMPLE_MIX_PUMP, false);
                self.store.write_good(DO_PROVER_VLV_CMD, false);
            }
        }

        self.last_divert_commanded = Some(self.divert.execute(&self.store, intent.divert_to_divert));
        self.pump.execute(&self.store, &self.setpoints, now, intent.pump_run_request);

        self.io_bridge.write_outputs(&self.store, self.backend.as_mut());
    }

    /// All-off-divert-open pattern (spec §4.11), flushed straight to the
    /// backend without waiting for the next cycle's write phase.
    fn force_safe_state(&mut self) {
        self.store.write_good(DO_PUMP_START, false);
        self.store.write_good(DO_DIVERT_CMD, true);
        self.store.write_good(DO_SAMPLE_SOL, false);
        self.store.write_good(DO_SAMPLE_MIX_PUMP, false);
        self.store.write_good(DO_PROVER_VLV_CMD, false);
        self.store.write_good(DO_ALARM_BEACON, true);
        self.store.write_good(DO_ALARM_HORN, true);
        self.io_bridge.write_outputs(&self.store, self.backend.as_mut());
    }

    /// Run exactly one cycle, returning its wall-clock duration. Any
    /// panic escaping the cycle body is caught and converted into a
    /// safe-state pass; the engine keeps running afterward.
    pub fn run_once(&mut self) -> Duration {
        let now = Instant::now();
        let start = Instant::now();

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.step(now)));
        if outcome.is_err() {
            error!("scan cycle panicked; forcing safe state");
            self.force_safe_state();
        }

        let elapsed = start.elapsed();
        let period = Duration::from_millis(self.setpoints.scan_rate_ms);
        let overrun = elapsed > period;
        if overrun {
            warn!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, period_ms = period.as_millis() as f64, "scan cycle overrun");
        }
        self.stats.record(elapsed, overrun);
        elapsed
    }

    /// Runs the fixed-period loop until `stop` is set. Never accumulates
    /// pacing debt across cycles: an overrun skips the sleep entirely
    /// rather than shortening the next one.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            let period = Duration::from_millis(self.setpoints.scan_rate_ms);
            let elapsed = self.run_once();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lact_common::alarm::{AlarmAction, AlarmDefinition, AlarmPriority};
    use lact_common::io::IoPoint;
    use lact_common::io::SignalKind;

    struct NullBackend;
    impl IoBackend for NullBackend {
        fn read_digital(&mut self, _address: u32) -> Result<bool, String> {
            Ok(false)
        }
        fn write_digital(&mut self, _address: u32, _value: bool) -> Result<(), String> {
            Ok(())
        }
        fn read_analog(&mut self, _address: u32) -> Result<u16, String> {
            Ok(0)
        }
        fn write_analog(&mut self, _address: u32, _value: u16) -> Result<(), String> {
            Ok(())
        }
        fn read_pulse(&mut self, _address: u32) -> Result<u64, String> {
            Ok(0)
        }
    }

    fn minimal_config() -> UnitConfig {
        UnitConfig {
            io_points: vec![IoPoint::new("DI_ESTOP", SignalKind::DigitalIn, 0)],
            alarms: vec![AlarmDefinition::new(
                "ALM_ESTOP",
                "estop",
                AlarmPriority::Critical,
                AlarmAction::EmergencyStop,
            )],
            setpoints: Setpoints::default(),
            prover_reference_volume_bbl: 100.0,
        }
    }

    #[test]
    fn idle_without_commands_stays_idle_and_records_stats() {
        let (mut engine, _handle) = ScanEngine::new(minimal_config(), Box::new(NullBackend));
        engine.run_once();
        assert_eq!(engine.state(), State::Idle);
        assert_eq!(engine.stats().scan_count, 1);
    }

    #[test]
    fn operator_request_moves_through_startup() {
        let (mut engine, handle) = ScanEngine::new(minimal_config(), Box::new(NullBackend));
        engine.store().write_good(tags::DI_INLET_VLV_OPEN, true);
        engine.store().write_good(tags::DI_OUTLET_VLV_OPEN, true);
        assert!(handle.send(Command::RequestTransition(State::Startup)).is_accepted());

        engine.run_once();
        assert_eq!(engine.state(), State::Startup);
    }
}
