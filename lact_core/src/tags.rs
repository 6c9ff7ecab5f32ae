//! Tag name constants and the initial value set (mirrors the fixed
//! tag list the source pre-registers at controller construction).
//!
//! The tag store itself doesn't require pre-registration — an
//! unregistered read returns the null sentinel — but seeding sensible
//! defaults means status queries before the first scan cycle see
//! `60.0°F` rather than a null, matching the source's behavior.

use crate::store::TagStore;

// ── Digital Inputs ──────────────────────────────────────────────
pub const DI_INLET_VLV_OPEN: &str = "DI_INLET_VLV_OPEN";
pub const DI_INLET_VLV_CLOSED: &str = "DI_INLET_VLV_CLOSED";
pub const DI_STRAINER_HI_DP: &str = "DI_STRAINER_HI_DP";
pub const DI_PUMP_RUNNING: &str = "DI_PUMP_RUNNING";
pub const DI_PUMP_OVERLOAD: &str = "DI_PUMP_OVERLOAD";
pub const DI_DIVERT_SALES: &str = "DI_DIVERT_SALES";
pub const DI_DIVERT_DIVERT: &str = "DI_DIVERT_DIVERT";
pub const DI_SAMPLE_POT_HI: &str = "DI_SAMPLE_POT_HI";
pub const DI_SAMPLE_POT_LO: &str = "DI_SAMPLE_POT_LO";
pub const DI_PROVER_VLV_OPEN: &str = "DI_PROVER_VLV_OPEN";
pub const DI_AIR_ELIM_FLOAT: &str = "DI_AIR_ELIM_FLOAT";
pub const DI_OUTLET_VLV_OPEN: &str = "DI_OUTLET_VLV_OPEN";
pub const DI_ESTOP: &str = "DI_ESTOP";

// ── Digital Outputs ──────────────────────────────────────────────
pub const DO_PUMP_START: &str = "DO_PUMP_START";
pub const DO_DIVERT_CMD: &str = "DO_DIVERT_CMD";
pub const DO_SAMPLE_SOL: &str = "DO_SAMPLE_SOL";
pub const DO_SAMPLE_MIX_PUMP: &str = "DO_SAMPLE_MIX_PUMP";
pub const DO_PROVER_VLV_CMD: &str = "DO_PROVER_VLV_CMD";
pub const DO_ALARM_BEACON: &str = "DO_ALARM_BEACON";
pub const DO_ALARM_HORN: &str = "DO_ALARM_HORN";
pub const DO_STATUS_GREEN: &str = "DO_STATUS_GREEN";

// ── Analog Inputs ────────────────────────────────────────────────
pub const AI_INLET_PRESS: &str = "AI_INLET_PRESS";
pub const AI_LOOP_HI_PRESS: &str = "AI_LOOP_HI_PRESS";
pub const AI_STRAINER_DP: &str = "AI_STRAINER_DP";
pub const AI_BSW_PROBE: &str = "AI_BSW_PROBE";
pub const AI_METER_TEMP: &str = "AI_METER_TEMP";
pub const AI_TEST_THERMO: &str = "AI_TEST_THERMO";
pub const AI_OUTLET_PRESS: &str = "AI_OUTLET_PRESS";

// ── Pulse Input ───────────────────────────────────────────────────
pub const PI_METER_PULSE: &str = "PI_METER_PULSE";

// ── Analog Outputs ───────────────────────────────────────────────
pub const AO_BP_SALES_SP: &str = "AO_BP_SALES_SP";
pub const AO_BP_DIVERT_SP: &str = "AO_BP_DIVERT_SP";

// ── Computed / Derived ────────────────────────────────────────────
pub const FLOW_RATE_BPH: &str = "FLOW_RATE_BPH";
pub const FLOW_TOTAL_BBL: &str = "FLOW_TOTAL_BBL";
pub const FLOW_NET_BBL: &str = "FLOW_NET_BBL";
pub const BSW_PCT: &str = "BSW_PCT";
pub const TEMP_CORRECTED_F: &str = "TEMP_CORRECTED_F";
pub const METER_FACTOR: &str = "METER_FACTOR";
pub const CTL_FACTOR: &str = "CTL_FACTOR";
pub const SAMPLE_TOTAL_GRABS: &str = "SAMPLE_TOTAL_GRABS";
pub const SAMPLE_TOTAL_ML: &str = "SAMPLE_TOTAL_ML";
pub const BATCH_GROSS_BBL: &str = "BATCH_GROSS_BBL";
pub const BATCH_NET_BBL: &str = "BATCH_NET_BBL";
pub const DIVERT_VALVE_POS: &str = "DIVERT_VALVE_POS";
pub const DIVERT_REASON: &str = "DIVERT_REASON";

// ── State ─────────────────────────────────────────────────────────
pub const LACT_STATE: &str = "LACT_STATE";
pub const PREV_STATE: &str = "PREV_STATE";

// ── Alarm summary ─────────────────────────────────────────────────
pub const ALARM_ACTIVE_COUNT: &str = "ALARM_ACTIVE_COUNT";
pub const ALARM_UNACK_COUNT: &str = "ALARM_UNACK_COUNT";
pub const HIGHEST_ALARM_PRI: &str = "HIGHEST_ALARM_PRI";

/// Seed the store with the same initial values the source pre-registers,
/// so a status read before the first scan cycle sees realistic values
/// rather than the null sentinel.
pub fn seed_defaults(store: &TagStore) {
    for tag in [
        DI_INLET_VLV_OPEN,
        DI_INLET_VLV_CLOSED,
        DI_STRAINER_HI_DP,
        DI_PUMP_RUNNING,
        DI_PUMP_OVERLOAD,
        DI_DIVERT_SALES,
        DI_DIVERT_DIVERT,
        DI_SAMPLE_POT_HI,
        DI_SAMPLE_POT_LO,
        DI_PROVER_VLV_OPEN,
        DI_AIR_ELIM_FLOAT,
        DI_OUTLET_VLV_OPEN,
        DI_ESTOP,
        DO_PUMP_START,
        DO_DIVERT_CMD,
        DO_SAMPLE_SOL,
        DO_SAMPLE_MIX_PUMP,
        DO_PROVER_VLV_CMD,
        DO_ALARM_BEACON,
        DO_ALARM_HORN,
        DO_STATUS_GREEN,
    ] {
        store.write_good(tag, false);
    }

    for tag in [
        AI_INLET_PRESS,
        AI_LOOP_HI_PRESS,
        AI_STRAINER_DP,
        AI_BSW_PROBE,
        AI_OUTLET_PRESS,
    ] {
        store.write_good(tag, 0.0);
    }
    store.write_good(AI_METER_TEMP, 60.0);
    store.write_good(AI_TEST_THERMO, 60.0);

    store.write_good(PI_METER_PULSE, 0i64);

    store.write_good(AO_BP_SALES_SP, 50.0);
    store.write_good(AO_BP_DIVERT_SP, 50.0);

    for tag in [FLOW_RATE_BPH, FLOW_TOTAL_BBL, FLOW_NET_BBL, BSW_PCT] {
        store.write_good(tag, 0.0);
    }
    store.write_good(TEMP_CORRECTED_F, 60.0);
    store.write_good(METER_FACTOR, 1.0);
    store.write_good(CTL_FACTOR, 1.0);
    store.write_good(SAMPLE_TOTAL_GRABS, 0i64);
    store.write_good(SAMPLE_TOTAL_ML, 0.0);
    store.write_good(BATCH_GROSS_BBL, 0.0);
    store.write_good(BATCH_NET_BBL, 0.0);
    store.write_good(DIVERT_VALVE_POS, "SALES");
    store.write_good(DIVERT_REASON, "");

    store.write_good(LACT_STATE, "IDLE");
    store.write_good(PREV_STATE, "IDLE");

    store.write_good(ALARM_ACTIVE_COUNT, 0i64);
    store.write_good(ALARM_UNACK_COUNT, 0i64);
    store.write_good(HIGHEST_ALARM_PRI, 0i64);
}
