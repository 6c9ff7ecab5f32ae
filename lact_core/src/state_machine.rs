//! State Machine (spec §4.4): the fixed 7-state sequence governing
//! what the rest of the scan cycle is allowed to do.
//!
//! The machine itself only decides *state* and exposes the intents
//! downstream modules need (desired pump run, desired divert side,
//! sampler/prover gates); supervisory modules (Pump Supervisor, the
//! divert valve driver, the Prover) still get the final say over their
//! own output, e.g. a pump-overload lockout can refuse a run request
//! the state machine issues.

use std::fmt;
use std::time::{Duration, Instant};

use lact_common::setpoints::Setpoints;

use crate::safety::SafetyRequests;
use crate::store::TagStore;
use crate::tags::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Startup,
    Running,
    Divert,
    Proving,
    Shutdown,
    EStop,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Idle => "IDLE",
            State::Startup => "STARTUP",
            State::Running => "RUNNING",
            State::Divert => "DIVERT",
            State::Proving => "PROVING",
            State::Shutdown => "SHUTDOWN",
            State::EStop => "ESTOP",
        };
        write!(f, "{s}")
    }
}

impl State {
    fn legal_transitions(self) -> &'static [State] {
        match self {
            State::Idle => &[State::Startup, State::EStop],
            State::Startup => &[State::Running, State::Idle, State::EStop],
            State::Running => &[State::Divert, State::Proving, State::Shutdown, State::EStop],
            State::Divert => &[State::Running, State::Shutdown, State::EStop],
            State::Proving => &[State::Running, State::Shutdown, State::EStop],
            State::Shutdown => &[State::Idle, State::EStop],
            State::EStop => &[State::Idle],
        }
    }

    fn can_transition_to(self, target: State) -> bool {
        self.legal_transitions().contains(&target)
    }
}

/// What the State Machine wants this cycle; supervisory modules apply
/// their own vetoes on top (e.g. pump lockout, divert travel fault).
#[derive(Debug, Clone, Copy, Default)]
pub struct StateIntent {
    pub pump_run_request: bool,
    pub divert_to_divert: bool,
    pub sampler_enabled: bool,
    pub prover_enabled: bool,
}

pub struct StateMachine {
    state: State,
    prev_state: State,
    entered_at: Instant,
    step: u8,
    step_entered_at: Instant,
    batch_start: Option<Instant>,
    estop_clear_since: Option<Instant>,
    divert_recovery_since: Option<Instant>,
    pending_request: Option<State>,
}

impl StateMachine {
    pub fn new(now: Instant) -> Self {
        Self {
            state: State::Idle,
            prev_state: State::Idle,
            entered_at: now,
            step: 0,
            step_entered_at: now,
            batch_start: None,
            estop_clear_since: None,
            divert_recovery_since: None,
            pending_request: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn batch_elapsed(&self, now: Instant) -> Option<Duration> {
        self.batch_start.map(|s| now.duration_since(s))
    }

    /// Operator-requested transition (spec §4.12), applied at the top
    /// of the next `tick` if legal.
    pub fn request_transition(&mut self, target: State) -> bool {
        if self.state.can_transition_to(target) {
            self.pending_request = Some(target);
            true
        } else {
            false
        }
    }

    fn enter(&mut self, target: State, now: Instant) {
        self.prev_state = self.state;
        self.state = target;
        self.entered_at = now;
        self.step = 0;
        self.step_entered_at = now;
        if target == State::Running && self.prev_state != State::Divert {
            self.batch_start = Some(now);
        }
        if target == State::Idle || target == State::EStop {
            self.batch_start = None;
        }
    }

    fn enter_step(&mut self, step: u8, now: Instant) {
        self.step = step;
        self.step_entered_at = now;
    }

    pub fn tick(
        &mut self,
        store: &TagStore,
        sp: &Setpoints,
        now: Instant,
        safety: SafetyRequests,
    ) -> StateIntent {
        let estop_asserted = store.read(DI_ESTOP).bool_or(false);

        let mut transitioned = false;

        if let Some(target) = self.pending_request.take() {
            if self.state.can_transition_to(target) {
                self.enter(target, now);
                transitioned = true;
            }
        }

        if !transitioned && estop_asserted && self.state != State::EStop {
            self.enter(State::EStop, now);
            transitioned = true;
        }

        if !transitioned {
            if safety.shutdown_requested
                && !matches!(self.state, State::EStop | State::Shutdown | State::Idle)
            {
                self.enter(State::Shutdown, now);
                transitioned = true;
            } else if safety.divert_requested && self.state == State::Running {
                self.enter(State::Divert, now);
                transitioned = true;
            }
        }

        store.write_good(PREV_STATE, self.prev_state.to_string());
        store.write_good(LACT_STATE, self.state.to_string());

        if transitioned {
            return self.passive_intent();
        }

        match self.state {
            State::Idle => self.tick_idle(store),
            State::Startup => self.tick_startup(store, sp, now),
            State::Running => self.tick_running(store),
            State::Divert => self.tick_divert(store, sp, now),
            State::Proving => self.tick_proving(),
            State::Shutdown => self.tick_shutdown(store, sp, now),
            State::EStop => self.tick_estop(store, now),
        }
    }

    fn passive_intent(&self) -> StateIntent {
        match self.state {
            State::Running => StateIntent {
                pump_run_request: true,
                sampler_enabled: true,
                ..Default::default()
            },
            State::Divert => StateIntent {
                pump_run_request: true,
                divert_to_divert: true,
                sampler_enabled: true,
                ..Default::default()
            },
            State::Proving => StateIntent {
                pump_run_request: true,
                prover_enabled: true,
                ..Default::default()
            },
            _ => StateIntent::default(),
        }
    }

    fn tick_idle(&mut self, store: &TagStore) -> StateIntent {
        store.write_good(DO_STATUS_GREEN, false);
        StateIntent::default()
    }

    fn tick_startup(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) -> StateIntent {
        let step_elapsed = now.duration_since(self.step_entered_at);

        match self.step {
            0 => {
                let inlet_open = store.read(DI_INLET_VLV_OPEN).bool_or(false);
                let outlet_open = store.read(DI_OUTLET_VLV_OPEN).bool_or(false);
                if inlet_open && outlet_open {
                    self.enter_step(1, now);
                } else {
                    self.enter(State::Idle, now);
                }
                StateIntent::default()
            }
            1 => {
                self.enter_step(2, now);
                StateIntent {
                    divert_to_divert: true,
                    ..Default::default()
                }
            }
            2 => {
                let at_divert = store.read(DI_DIVERT_DIVERT).bool_or(false);
                if at_divert {
                    self.enter_step(3, now);
                } else if step_elapsed.as_secs_f64() > sp.divert_travel_timeout_sec {
                    self.enter(State::Idle, now);
                }
                StateIntent {
                    divert_to_divert: true,
                    ..Default::default()
                }
            }
            3 => {
                let wanted_pump = step_elapsed.as_secs_f64() > sp.pump_start_delay_sec;
                if wanted_pump {
                    self.enter_step(4, now);
                }
                StateIntent {
                    divert_to_divert: true,
                    pump_run_request: wanted_pump,
                    ..Default::default()
                }
            }
            4 => {
                let running = store.read(DI_PUMP_RUNNING).bool_or(false);
                let limit = Duration::from_secs_f64(sp.pump_start_delay_sec + 10.0);
                if running {
                    self.enter_step(5, now);
                } else if step_elapsed > limit {
                    self.enter(State::Idle, now);
                }
                StateIntent {
                    divert_to_divert: true,
                    pump_run_request: true,
                    ..Default::default()
                }
            }
            _ => {
                let limit = Duration::from_secs_f64(sp.pump_start_delay_sec + sp.bsw_sample_delay_sec + 10.0);
                if step_elapsed > limit {
                    let bsw = store.read(BSW_PCT).float_or(0.0);
                    if bsw < sp.bsw_divert_pct {
                        self.enter(State::Running, now);
                    } else {
                        self.enter(State::Divert, now);
                    }
                }
                StateIntent {
                    divert_to_divert: true,
                    pump_run_request: true,
                    ..Default::default()
                }
            }
        }
    }

    fn tick_running(&mut self, store: &TagStore) -> StateIntent {
        store.write_good(DO_STATUS_GREEN, true);
        StateIntent {
            pump_run_request: true,
            sampler_enabled: true,
            ..Default::default()
        }
    }

    fn tick_divert(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) -> StateIntent {
        let bsw = store.read(BSW_PCT).float_or(0.0);
        if bsw < sp.bsw_divert_pct {
            let since = *self.divert_recovery_since.get_or_insert(now);
            if now.duration_since(since).as_secs_f64() > sp.bsw_divert_delay_sec {
                self.divert_recovery_since = None;
                self.enter(State::Running, now);
            }
        } else {
            self.divert_recovery_since = None;
        }
        StateIntent {
            pump_run_request: true,
            divert_to_divert: true,
            sampler_enabled: true,
            ..Default::default()
        }
    }

    fn tick_proving(&mut self) -> StateIntent {
        StateIntent {
            pump_run_request: true,
            prover_enabled: true,
            ..Default::default()
        }
    }

    fn tick_shutdown(&mut self, store: &TagStore, sp: &Setpoints, now: Instant) -> StateIntent {
        let step_elapsed = now.duration_since(self.step_entered_at);

        match self.step {
            0 => {
                self.enter_step(1, now);
                StateIntent {
                    divert_to_divert: true,
                    ..Default::default()
                }
            }
            1 => {
                if step_elapsed.as_secs_f64() > sp.pump_stop_delay_sec {
                    self.enter_step(2, now);
                }
                StateIntent {
                    divert_to_divert: true,
                    pump_run_request: step_elapsed.as_secs_f64() <= sp.pump_stop_delay_sec,
                    ..Default::default()
                }
            }
            _ => {
                let stopped = !store.read(DI_PUMP_RUNNING).bool_or(false);
                let limit = Duration::from_secs(15);
                if stopped || step_elapsed > limit {
                    self.enter(State::Idle, now);
                }
                StateIntent {
                    divert_to_divert: true,
                    ..Default::default()
                }
            }
        }
    }

    fn tick_estop(&mut self, store: &TagStore, now: Instant) -> StateIntent {
        store.write_good(DO_ALARM_BEACON, true);
        store.write_good(DO_ALARM_HORN, true);

        let estop_asserted = store.read(DI_ESTOP).bool_or(false);
        if estop_asserted {
            self.estop_clear_since = None;
        } else {
            let since = *self.estop_clear_since.get_or_insert(now);
            if now.duration_since(since) > Duration::from_secs(2) {
                self.enter(State::Idle, now);
            }
        }

        StateIntent {
            divert_to_divert: true,
            ..Default::default()
        }
    }
}
