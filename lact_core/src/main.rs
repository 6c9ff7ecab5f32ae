//! LACT unit control core binary: loads configuration, wires up the
//! scan engine, and runs the fixed-period control loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use lact_common::setpoints::Setpoints;
use tracing::{error, info};

use lact_core::backend::simulator::HardwareSimulator;
use lact_core::config::UnitConfig;
use lact_core::engine::ScanEngine;

#[derive(Parser, Debug)]
#[command(name = "lact-core", about = "LACT unit control core")]
struct Cli {
    /// Path to the static unit configuration (I/O map + alarm definitions).
    #[arg(long, default_value = "config/lact.toml")]
    config: PathBuf,

    /// Path to the persisted setpoints file.
    #[arg(long, default_value = "config/setpoints.json")]
    setpoints: PathBuf,

    /// Minimum tracing level.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run against the in-process hardware simulator. No production
    /// Modbus backend ships with this build (spec §1's non-goals), so
    /// this must be set for the controller to start.
    #[arg(long)]
    simulate: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    if !cli.simulate {
        error!("no production I/O backend is compiled into this build; pass --simulate");
        return ExitCode::from(1);
    }

    let mut config = match UnitConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "failed to load unit configuration");
            return ExitCode::from(1);
        }
    };
    config.setpoints = Setpoints::load(&cli.setpoints);

    info!(
        io_points = config.io_points.len(),
        alarms = config.alarms.len(),
        "configuration loaded"
    );

    let (mut engine, _handle) = ScanEngine::new(config, Box::new(HardwareSimulator::new()));

    // No signal handling is wired up here: the process relies on the
    // platform default (immediate exit) for SIGINT/SIGTERM, same as the
    // reference control unit when run outside its supervised harness.
    let stop = Arc::new(AtomicBool::new(false));
    engine.run(&stop);

    let stats = engine.stats();
    info!(
        scan_count = stats.scan_count,
        overrun_count = stats.overrun_count,
        max_scan_time_ms = stats.max_scan_time_ms,
        "controller stopped"
    );

    ExitCode::SUCCESS
}
