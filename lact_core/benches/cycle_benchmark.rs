//! Throughput benchmark for a single scan cycle, run against the
//! in-process hardware simulator so it exercises every module the way
//! a real deployment would.

use criterion::{criterion_group, criterion_main, Criterion};

use lact_common::alarm::{AlarmAction, AlarmDefinition, AlarmPriority};
use lact_common::io::{IoPoint, Scaling, SignalKind};
use lact_common::setpoints::Setpoints;
use lact_core::backend::simulator::HardwareSimulator;
use lact_core::config::UnitConfig;
use lact_core::engine::ScanEngine;

fn analog(tag: &str, address: u32, eng_hi: f64) -> IoPoint {
    IoPoint::new(tag, SignalKind::AnalogIn, address).with_scaling(Scaling {
        raw_lo: 0.0,
        raw_hi: 4095.0,
        eng_lo: 0.0,
        eng_hi,
    })
}

fn bench_config() -> UnitConfig {
    UnitConfig {
        io_points: vec![
            IoPoint::new("DI_INLET_VLV_OPEN", SignalKind::DigitalIn, 0),
            IoPoint::new("DI_INLET_VLV_CLOSED", SignalKind::DigitalIn, 1),
            IoPoint::new("DI_STRAINER_HI_DP", SignalKind::DigitalIn, 2),
            IoPoint::new("DI_PUMP_RUNNING", SignalKind::DigitalIn, 3),
            IoPoint::new("DI_PUMP_OVERLOAD", SignalKind::DigitalIn, 4),
            IoPoint::new("DI_DIVERT_SALES", SignalKind::DigitalIn, 5),
            IoPoint::new("DI_DIVERT_DIVERT", SignalKind::DigitalIn, 6),
            IoPoint::new("DI_SAMPLE_POT_HI", SignalKind::DigitalIn, 7),
            IoPoint::new("DI_SAMPLE_POT_LO", SignalKind::DigitalIn, 8),
            IoPoint::new("DI_PROVER_VLV_OPEN", SignalKind::DigitalIn, 9),
            IoPoint::new("DI_AIR_ELIM_FLOAT", SignalKind::DigitalIn, 10),
            IoPoint::new("DI_OUTLET_VLV_OPEN", SignalKind::DigitalIn, 11),
            IoPoint::new("DI_ESTOP", SignalKind::DigitalIn, 12),
            IoPoint::new("DO_PUMP_START", SignalKind::DigitalOut, 0),
            IoPoint::new("DO_DIVERT_CMD", SignalKind::DigitalOut, 1),
            IoPoint::new("DO_SAMPLE_SOL", SignalKind::DigitalOut, 2),
            IoPoint::new("DO_SAMPLE_MIX_PUMP", SignalKind::DigitalOut, 3),
            IoPoint::new("DO_PROVER_VLV_CMD", SignalKind::DigitalOut, 4),
            IoPoint::new("DO_ALARM_BEACON", SignalKind::DigitalOut, 5),
            IoPoint::new("DO_ALARM_HORN", SignalKind::DigitalOut, 6),
            IoPoint::new("DO_STATUS_GREEN", SignalKind::DigitalOut, 7),
            analog("AI_INLET_PRESS", 0, 300.0),
            analog("AI_LOOP_HI_PRESS", 1, 300.0),
            analog("AI_STRAINER_DP", 2, 50.0),
            analog("AI_BSW_PROBE", 3, 10.0),
            analog("AI_METER_TEMP", 4, 200.0),
            analog("AI_TEST_THERMO", 5, 200.0),
            analog("AI_OUTLET_PRESS", 6, 300.0),
            IoPoint::new("PI_METER_PULSE", SignalKind::PulseIn, 0),
            analog("AO_BP_SALES_SP", 0, 150.0),
            analog("AO_BP_DIVERT_SP", 1, 150.0),
        ],
        alarms: vec![AlarmDefinition::new(
            "ALM_ESTOP",
            "emergency stop",
            AlarmPriority::Critical,
            AlarmAction::EmergencyStop,
        )],
        setpoints: Setpoints::default(),
        prover_reference_volume_bbl: 100.0,
    }
}

fn bench_scan_cycle(c: &mut Criterion) {
    c.bench_function("scan_cycle_idle", |b| {
        let (mut engine, _handle) = ScanEngine::new(bench_config(), Box::new(HardwareSimulator::new()));
        b.iter(|| {
            engine.run_once();
        });
    });
}

criterion_group!(benches, bench_scan_cycle);
criterion_main!(benches);
