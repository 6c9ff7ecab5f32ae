//! Tunable process setpoints (spec §6: "Setpoints persistence").
//!
//! All tunable process parameters. These can be adjusted at runtime
//! via the operator command surface and persist to a flat JSON file
//! independent of the static TOML configuration.
//!
//! References:
//!   - API MPMS Chapter 6 (Metering Assemblies)
//!   - API MPMS Chapter 8 (Sampling)
//!   - API MPMS Chapter 4 (Proving)
//!   - API MPMS Chapter 12 (Calculation of Petroleum Quantities)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setpoints {
    // ── BS&W ──────────────────────────────────────────────
    pub bsw_divert_pct: f64,
    pub bsw_alarm_pct: f64,
    pub bsw_sample_delay_sec: f64,
    pub bsw_divert_delay_sec: f64,

    // ── Flow Measurement ──────────────────────────────────
    pub meter_k_factor: f64,
    pub meter_min_flow_bph: f64,
    pub meter_max_flow_bph: f64,
    pub meter_no_flow_timeout_sec: f64,

    // ── Temperature Compensation ──────────────────────────
    pub temp_base_deg_f: f64,
    pub temp_lo_alarm_f: f64,
    pub temp_hi_alarm_f: f64,
    pub temp_max_delta_f: f64,

    // ── Pressure ──────────────────────────────────────────
    pub inlet_press_lo_psi: f64,
    pub inlet_press_hi_psi: f64,
    pub loop_press_hi_psi: f64,
    pub outlet_press_lo_psi: f64,
    pub backpressure_sales_psi: f64,
    pub backpressure_divert_psi: f64,
    pub strainer_dp_hi_psi: f64,

    // ── Pump Control ──────────────────────────────────────
    pub pump_start_delay_sec: f64,
    pub pump_stop_delay_sec: f64,
    pub pump_restart_lockout_sec: f64,
    pub pump_max_starts_per_hour: u32,

    // ── Sampling System ────────────────────────────────────
    pub sample_rate_sec: f64,
    pub sample_volume_ml: f64,
    pub sample_mix_time_sec: f64,
    pub sample_pot_full_gal: f64,

    // ── Proving ────────────────────────────────────────────
    pub prove_num_runs: u32,
    pub prove_repeatability_pct: f64,
    pub prove_meter_factor_min: f64,
    pub prove_meter_factor_max: f64,

    // ── Divert Valve ───────────────────────────────────────
    pub divert_travel_timeout_sec: f64,
    pub divert_confirm_delay_sec: f64,

    // ── Safety / General ───────────────────────────────────
    pub scan_rate_ms: u64,
    pub alarm_horn_silence_sec: f64,
    pub watchdog_timeout_sec: f64,
}

impl Default for Setpoints {
    fn default() -> Self {
        Self {
            bsw_divert_pct: 1.0,
            bsw_alarm_pct: 0.5,
            bsw_sample_delay_sec: 5.0,
            bsw_divert_delay_sec: 3.0,

            meter_k_factor: 100.0,
            meter_min_flow_bph: 30.0,
            meter_max_flow_bph: 750.0,
            meter_no_flow_timeout_sec: 60.0,

            temp_base_deg_f: 60.0,
            temp_lo_alarm_f: 20.0,
            temp_hi_alarm_f: 150.0,
            temp_max_delta_f: 2.0,

            inlet_press_lo_psi: 5.0,
            inlet_press_hi_psi: 250.0,
            loop_press_hi_psi: 250.0,
            outlet_press_lo_psi: 5.0,
            backpressure_sales_psi: 50.0,
            backpressure_divert_psi: 50.0,
            strainer_dp_hi_psi: 15.0,

            pump_start_delay_sec: 5.0,
            pump_stop_delay_sec: 3.0,
            pump_restart_lockout_sec: 30.0,
            pump_max_starts_per_hour: 6,

            sample_rate_sec: 15.0,
            sample_volume_ml: 5.0,
            sample_mix_time_sec: 30.0,
            sample_pot_full_gal: 15.0,

            prove_num_runs: 5,
            prove_repeatability_pct: 0.05,
            prove_meter_factor_min: 0.98,
            prove_meter_factor_max: 1.02,

            divert_travel_timeout_sec: 15.0,
            divert_confirm_delay_sec: 2.0,

            scan_rate_ms: 100,
            alarm_horn_silence_sec: 300.0,
            watchdog_timeout_sec: 5.0,
        }
    }
}

impl Setpoints {
    /// Load from JSON, falling back to defaults for a missing or
    /// unparsable file. Unknown keys are ignored; a key whose value
    /// can't be coerced to the default's type is skipped (default kept).
    pub fn load(path: &Path) -> Self {
        let defaults = Self::default();
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return defaults,
        };
        let loaded: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "setpoints file malformed, using defaults");
                return defaults;
            }
        };
        let Value::Object(loaded) = loaded else {
            return defaults;
        };
        let mut merged = serde_json::to_value(&defaults).expect("Setpoints always serializes");
        if let Value::Object(map) = &mut merged {
            for (key, incoming) in loaded {
                let Some(default_value) = map.get(&key).cloned() else {
                    continue;
                };
                match coerce_like(&default_value, &incoming) {
                    Some(coerced) => {
                        map.insert(key, coerced);
                    }
                    None => tracing::warn!(key = %key, "setpoint value type mismatch, keeping default"),
                }
            }
        }
        serde_json::from_value(merged).unwrap_or(defaults)
    }

    /// Persist current setpoints to JSON, creating the parent directory
    /// if missing. Writes are whole-file (no partial/torn writes under
    /// normal filesystem semantics).
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(self).expect("Setpoints always serializes");
        std::fs::write(path, data)
    }

    /// Update a single setpoint by name, coercing `value` to the
    /// field's type. Returns `false` (no change) for an unknown key or
    /// a value that can't be coerced.
    pub fn update(&mut self, key: &str, value: Value) -> bool {
        let mut map = match serde_json::to_value(&*self).expect("Setpoints always serializes") {
            Value::Object(m) => m,
            _ => unreachable!("Setpoints serializes to an object"),
        };
        let Some(default_value) = map.get(key).cloned() else {
            return false;
        };
        let Some(coerced) = coerce_like(&default_value, &value) else {
            return false;
        };
        map.insert(key.to_string(), coerced);
        match serde_json::from_value::<Setpoints>(Value::Object(map)) {
            Ok(sp) => {
                *self = sp;
                true
            }
            Err(_) => false,
        }
    }

    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).expect("Setpoints always serializes")
    }
}

/// Coerce `incoming` to look like `default`'s JSON shape (number vs.
/// integer vs. string vs. bool), mirroring the source's
/// `type(getattr(sp, key))(value)` behavior.
fn coerce_like(default: &Value, incoming: &Value) -> Option<Value> {
    match default {
        Value::Number(n) if n.is_u64() || n.is_i64() => incoming
            .as_u64()
            .map(Value::from)
            .or_else(|| incoming.as_f64().map(|f| Value::from(f.round() as i64))),
        Value::Number(_) => incoming.as_f64().map(Value::from),
        Value::String(_) => incoming.as_str().map(|s| Value::from(s.to_string())),
        Value::Bool(_) => incoming.as_bool().map(Value::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("setpoints.json");
        let mut sp = Setpoints::default();
        sp.meter_k_factor = 123.5;
        sp.pump_max_starts_per_hour = 9;
        sp.save(&path).unwrap();

        let loaded = Setpoints::load(&path);
        assert_eq!(loaded, sp);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert_eq!(Setpoints::load(&path), Setpoints::default());
    }

    #[test]
    fn load_ignores_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("setpoints.json");
        std::fs::write(&path, r#"{"meter_k_factor": 200.0, "bogus_key": 42}"#).unwrap();
        let loaded = Setpoints::load(&path);
        assert_eq!(loaded.meter_k_factor, 200.0);
    }

    #[test]
    fn update_unknown_key_rejected() {
        let mut sp = Setpoints::default();
        assert!(!sp.update("not_a_real_setpoint", Value::from(1.0)));
    }

    #[test]
    fn update_known_key_applies() {
        let mut sp = Setpoints::default();
        assert!(sp.update("bsw_divert_pct", Value::from(2.5)));
        assert_eq!(sp.bsw_divert_pct, 2.5);
    }

    #[test]
    fn update_type_mismatch_rejected() {
        let mut sp = Setpoints::default();
        let before = sp.clone();
        assert!(!sp.update("bsw_divert_pct", Value::from("not a number")));
        assert_eq!(sp, before);
    }
}
