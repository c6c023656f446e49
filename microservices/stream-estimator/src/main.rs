//! Stream Estimator
//!
//! Batch tool over one Drips account snapshot:
//! - Rebuilds per-token stream histories from indexed `StreamsSet` events
//! - Estimates streamed totals for all time and for the current cycle
//! - Replays every stream into a cumulative timeline
//!
//! The report is printed to stdout as JSON; logs go to stderr.

use std::process::ExitCode;

use chrono::Utc;
use drips_core::Result;
use drips_engine::CycleClock;
use tracing::{error, info};

mod config;
mod snapshot;

use config::EstimatorConfig;
use snapshot::{build_report, AccountSnapshot};

fn main() -> ExitCode {
    if let Err(e) = drips_telemetry::init("stream-estimator") {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), error = %e, "Estimation failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = EstimatorConfig::from_env()?;
    info!(
        input = %config.input_path.display(),
        cycle_secs = config.engine.cycle_secs,
        "Starting Stream Estimator"
    );

    let snapshot = AccountSnapshot::load(&config.input_path)?;
    let clock = CycleClock::from_config(&config.engine)?;
    let now = config.now.unwrap_or_else(Utc::now);

    let report = build_report(&snapshot, now, &clock, config.stream_id.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
