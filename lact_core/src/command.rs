//! Command Surface & Status (spec §4.12): the operator-facing handle
//! into a running `ScanEngine`, backed by a bounded mailbox the scan
//! thread drains at the top of each cycle.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use lact_common::tag::{Quality, TagValue};

use crate::error::CommandOutcome;
use crate::state_machine::State;
use crate::store::TagStore;
use crate::tags::{
    ALARM_ACTIVE_COUNT, ALARM_UNACK_COUNT, BATCH_GROSS_BBL, BATCH_NET_BBL, FLOW_RATE_BPH,
    HIGHEST_ALARM_PRI, LACT_STATE,
};

const MAILBOX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub enum Command {
    RequestTransition(State),
    AcknowledgeAlarm(String),
    AcknowledgeAll,
    SilenceHorn,
    StartProving,
    ResetBatchTotals,
    UpdateSetpoint { key: String, value: serde_json::Value },
}

/// A snapshot suitable for an operator console; assembled directly off
/// the Tag Store, never round-tripping through the mailbox.
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub state: String,
    pub flow_rate_bph: f64,
    pub batch_gross_bbl: f64,
    pub batch_net_bbl: f64,
    pub active_alarms: i64,
    pub unacknowledged_alarms: i64,
    pub highest_alarm_priority: i64,
}

impl ControllerStatus {
    pub fn from_store(store: &TagStore) -> Self {
        Self {
            state: store.read(LACT_STATE).as_str().unwrap_or("UNKNOWN").to_string(),
            flow_rate_bph: store.read(FLOW_RATE_BPH).float_or(0.0),
            batch_gross_bbl: store.read(BATCH_GROSS_BBL).float_or(0.0),
            batch_net_bbl: store.read(BATCH_NET_BBL).float_or(0.0),
            active_alarms: store.read(ALARM_ACTIVE_COUNT).int_or(0),
            unacknowledged_alarms: store.read(ALARM_UNACK_COUNT).int_or(0),
            highest_alarm_priority: store.read(HIGHEST_ALARM_PRI).int_or(0),
        }
    }
}

/// Operator-facing side of the mailbox.
#[derive(Clone)]
pub struct ControllerHandle {
    sender: SyncSender<Command>,
    store: Arc<TagStore>,
}

impl ControllerHandle {
    pub fn send(&self, command: Command) -> CommandOutcome {
        match self.sender.try_send(command) {
            Ok(()) => CommandOutcome::Accepted,
            Err(TrySendError::Full(_)) => CommandOutcome::Rejected("command mailbox is full"),
            Err(TrySendError::Disconnected(_)) => CommandOutcome::Rejected("controller is not running"),
        }
    }

    pub fn get_status(&self) -> ControllerStatus {
        ControllerStatus::from_store(&self.store)
    }

    pub fn read_tag(&self, tag: &str) -> TagValue {
        self.store.read(tag)
    }

    pub fn write_tag(&self, tag: &str, value: impl Into<TagValue>, quality: Quality) {
        self.store.write(tag, value, quality);
    }
}

/// Control-thread side: constructed alongside the `ScanEngine`, drained
/// once per cycle before phase 1.
pub struct CommandMailbox {
    receiver: Receiver<Command>,
}

impl CommandMailbox {
    pub fn drain(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }
}

pub fn controller_channel(store: Arc<TagStore>) -> (ControllerHandle, CommandMailbox) {
    let (sender, receiver) = sync_channel(MAILBOX_DEPTH);
    (ControllerHandle { sender, store }, CommandMailbox { receiver })
}
