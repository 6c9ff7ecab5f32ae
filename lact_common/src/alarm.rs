//! Alarm definition types (spec §3: "Alarm Definition").
//!
//! Definitions are immutable, loaded once from configuration. Runtime
//! alarm state (active/acknowledged/timestamp) lives in `lact_core`,
//! since it is mutated only by the control thread.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPriority {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAction {
    LogOnly,
    Annunciate,
    Divert,
    Shutdown,
    EmergencyStop,
}

impl AlarmAction {
    /// `action >= Annunciate`, the threshold the beacon/horn logic uses.
    pub fn annunciates(&self) -> bool {
        *self >= AlarmAction::Annunciate
    }
}

/// Immutable definition of a single alarm point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub tag: String,
    pub description: String,
    pub priority: AlarmPriority,
    pub action: AlarmAction,
    #[serde(default = "default_latching")]
    pub latching: bool,
    #[serde(default)]
    pub auto_acknowledge: bool,
}

fn default_latching() -> bool {
    true
}

impl AlarmDefinition {
    pub fn new(
        tag: impl Into<String>,
        description: impl Into<String>,
        priority: AlarmPriority,
        action: AlarmAction,
    ) -> Self {
        Self {
            tag: tag.into(),
            description: description.into(),
            priority,
            action,
            latching: true,
            auto_acknowledge: false,
        }
    }

    pub fn non_latching(mut self) -> Self {
        self.latching = false;
        self
    }
}
