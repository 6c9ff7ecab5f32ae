//! Tag value and quality types (spec §3: "Tag").
//!
//! A tag cell holds a tagged union over the scalar types the controller
//! actually moves around, plus a quality flag. The union replaces the
//! dynamically-typed cell the original controller used — callers ask
//! for a type and get the null sentinel (`TagValue::Null`) on mismatch
//! or on a read of an unregistered tag, never an error.

use serde::{Deserialize, Serialize};

/// Per-tag data quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
    Stale,
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Good
    }
}

/// A tagged-union scalar value, plus the null sentinel for unregistered
/// or type-mismatched reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Widens `Int` as well, since the tag store is commonly populated
    /// from round-tripped JSON where integral setpoints arrive as floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TagValue::Float(f) => Some(*f),
            TagValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }

    /// Convenience for call sites that want a bool with a default when
    /// the tag is unregistered or holds a non-bool value.
    pub fn bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }

    pub fn float_or(&self, default: f64) -> f64 {
        self.as_float().unwrap_or(default)
    }

    pub fn int_or(&self, default: i64) -> i64 {
        self.as_int().unwrap_or(default)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::Int(v as i64)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}
