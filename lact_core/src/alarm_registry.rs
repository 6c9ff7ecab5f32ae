//! Alarm Registry (spec §4.3's upstream data, spec §3 "Alarm State"):
//! immutable definitions plus the mutable active/acknowledged state
//! the Safety Evaluator drives each cycle.
//!
//! Only the control thread touches this registry — operator
//! acknowledge requests arrive through the command mailbox (§4.12) and
//! are applied here at the top of a cycle, so no internal locking is
//! needed.

use std::collections::HashMap;
use std::time::Instant;

use lact_common::alarm::AlarmDefinition;

/// Mutable runtime state for one alarm point.
///
/// Invariants (spec §3): `!active ⇒ acknowledged`; activation always
/// resets `acknowledged` to `false`; a latching alarm cannot go
/// inactive while unacknowledged even if its field condition clears;
/// acknowledging a non-latching *active* alarm clears it immediately.
#[derive(Debug, Clone)]
pub struct AlarmState {
    pub active: bool,
    pub acknowledged: bool,
    pub activated_at: Option<Instant>,
}

impl Default for AlarmState {
    fn default() -> Self {
        Self {
            active: false,
            acknowledged: true,
            activated_at: None,
        }
    }
}

pub struct AlarmRegistry {
    definitions: HashMap<String, AlarmDefinition>,
    states: HashMap<String, AlarmState>,
}

impl AlarmRegistry {
    pub fn new(definitions: Vec<AlarmDefinition>) -> Self {
        let states = definitions
            .iter()
            .map(|d| (d.tag.clone(), AlarmState::default()))
            .collect();
        let definitions = definitions.into_iter().map(|d| (d.tag.clone(), d)).collect();
        Self { definitions, states }
    }

    pub fn definition(&self, tag: &str) -> Option<&AlarmDefinition> {
        self.definitions.get(tag)
    }

    pub fn state(&self, tag: &str) -> Option<&AlarmState> {
        self.states.get(tag)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &AlarmDefinition> {
        self.definitions.values()
    }

    pub fn states(&self) -> impl Iterator<Item = (&String, &AlarmState)> {
        self.states.iter()
    }

    /// Evaluate one alarm's field condition for this cycle. `condition
    /// = true` means the underlying fault is currently present.
    ///
    /// Activating an already-active alarm is a no-op (the timestamp is
    /// not refreshed — `activated_at` marks when the alarm first went
    /// active, used by the horn's newer-alarm re-arm check). A latching
    /// alarm whose condition clears stays `active` until acknowledged.
    pub fn evaluate(&mut self, tag: &str, condition: bool, now: Instant) {
        let Some(def) = self.definitions.get(tag) else {
            return;
        };
        let Some(state) = self.states.get_mut(tag) else {
            return;
        };

        if condition {
            if !state.active {
                state.active = true;
                state.acknowledged = false;
                state.activated_at = Some(now);
            }
        } else if def.latching {
            if state.acknowledged {
                state.active = false;
                state.activated_at = None;
            }
        } else {
            state.active = false;
            state.acknowledged = true;
            state.activated_at = None;
        }
    }

    /// Operator acknowledge (spec §4.12). Clears a non-latching active
    /// alarm immediately; a latching alarm stays active until its field
    /// condition next clears.
    pub fn acknowledge(&mut self, tag: &str) -> bool {
        let Some(def) = self.definitions.get(tag) else {
            return false;
        };
        let Some(state) = self.states.get_mut(tag) else {
            return false;
        };
        if !state.active {
            return false;
        }
        state.acknowledged = true;
        if !def.latching {
            state.active = false;
            state.activated_at = None;
        }
        true
    }

    pub fn acknowledge_all(&mut self) {
        let tags: Vec<String> = self.states.keys().cloned().collect();
        for tag in tags {
            self.acknowledge(&tag);
        }
    }

    pub fn active_count(&self) -> usize {
        self.states.values().filter(|s| s.active).count()
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.states.values().filter(|s| s.active && !s.acknowledged).count()
    }

    /// Highest priority among currently active alarms, if any.
    pub fn highest_active_priority(&self) -> Option<lact_common::alarm::AlarmPriority> {
        self.states
            .iter()
            .filter(|(_, s)| s.active)
            .filter_map(|(tag, _)| self.definitions.get(tag).map(|d| d.priority))
            .max()
    }

    /// The newest activation timestamp among active, unacknowledged
    /// alarms with annunciate-or-higher action — used by the horn's
    /// newer-alarm re-arm rule.
    pub fn newest_unacked_annunciating(&self) -> Option<Instant> {
        self.states
            .iter()
            .filter(|(_, s)| s.active && !s.acknowledged)
            .filter_map(|(tag, s)| {
                let def = self.definitions.get(tag)?;
                if def.action.annunciates() {
                    s.activated_at
                } else {
                    None
                }
            })
            .max()
    }

    pub fn any_unacked_annunciating(&self) -> bool {
        self.states.iter().any(|(tag, s)| {
            s.active
                && !s.acknowledged
                && self
                    .definitions
                    .get(tag)
                    .map(|d| d.action.annunciates())
                    .unwrap_or(false)
        })
    }
}
