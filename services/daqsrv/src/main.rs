//! Data Acquisition Service (daqsrv)
//!
//! Polls the batch transactions of a driver configuration against a simulated
//! device and logs every raised event.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

use daq_driver::{DriverConfig, EventSink};
use daq_store::SystemClock;
use daqsrv::{
    bootstrap::{self, Args},
    run, RunOptions, SimulatedTransport, TracingEventSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration first: it carries the logging settings
    let config = DriverConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    common::init_with_config(bootstrap::log_config(&args, &config))
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let driver = Arc::new(config.build_driver()?);

    if args.validate {
        info!(
            "Configuration valid: {} batch transactions, {} points",
            config.batches.len(),
            config.points.len()
        );
        return Ok(());
    }

    info!(
        "Starting {} v{} ({})",
        config.service.name,
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    let transport = Arc::new(
        SimulatedTransport::from_config(&config)
            .with_noise(args.noise)
            .with_fault_rate(args.fault_rate),
    );
    let sink = Arc::new(TracingEventSink::new());
    let options = RunOptions {
        max_cycles: args.cycles,
        demo_writes: args.demo_writes,
    };

    let summary = run(
        driver,
        transport,
        Arc::new(SystemClock),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        options,
        common::shutdown_token(),
    )
    .await?;

    info!(
        "Stopped: {} reads ({} failed), {} writes ({} failed), {} events",
        summary.read_cycles,
        summary.failed_reads,
        summary.write_cycles,
        summary.failed_writes,
        sink.raised()
    );
    Ok(())
}
