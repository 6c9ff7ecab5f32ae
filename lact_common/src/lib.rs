//! Shared vocabulary for the LACT unit control core.
//!
//! Types in this crate carry no behavior beyond what their invariants
//! require (scaling, (de)serialization, simple predicates). The engine
//! and process modules that interpret them live in `lact_core`.

pub mod alarm;
pub mod io;
pub mod setpoints;
pub mod tag;

pub mod prelude {
    pub use crate::alarm::{AlarmAction, AlarmDefinition, AlarmPriority};
    pub use crate::io::{IoPoint, SignalKind};
    pub use crate::setpoints::Setpoints;
    pub use crate::tag::{Quality, TagValue};
}
