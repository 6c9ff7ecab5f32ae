//! Error taxonomy (spec §7).
//!
//! Field/transport and data-quality faults never reach these types —
//! they are swallowed at the I/O Bridge boundary into tag quality.
//! A panicking scan cycle is caught at the engine's loop boundary and
//! never surfaces as a typed error either (see `ScanEngine::run_once`).
//! What's left is the one fault class a caller actually needs to match
//! on: a bad static configuration at startup.

use std::fmt;

/// Failure loading or validating the static unit configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    DuplicateTag(String),
    DuplicateAddress { kind: String, address: u32 },
    DegenerateScaling { tag: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config io error: {msg}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::DuplicateTag(tag) => write!(f, "duplicate tag in config: {tag}"),
            Self::DuplicateAddress { kind, address } => {
                write!(f, "duplicate {kind} address: {address}")
            }
            Self::DegenerateScaling { tag } => {
                write!(f, "analog point {tag} has raw_hi == raw_lo")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Outcome of an operator command (spec §4.12, §6).
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Accepted,
    Rejected(&'static str),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
