//! Polling runtime
//!
//! One task per batch transaction. Each tick runs the write cycle first, so a
//! value scheduled since the last tick is read back in the same tick, then the
//! read cycle. Tasks stop on cancellation or after the configured number of
//! read cycles.

use std::sync::Arc;

use anyhow::{Context, Result};
use daq_driver::{BatchId, Driver, EventSink, Transport};
use daq_model::Value;
use daq_store::Clock;
use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Read cycles per batch transaction before stopping; None runs until cancelled
    pub max_cycles: Option<u64>,
    /// Schedule a changed value for every output after each read
    pub demo_writes: bool,
}

/// Cycle counters, per batch or summed over all batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read_cycles: u64,
    pub failed_reads: u64,
    pub write_cycles: u64,
    pub failed_writes: u64,
    pub events: u64,
}

impl RunSummary {
    fn merge(&mut self, other: &RunSummary) {
        self.read_cycles += other.read_cycles;
        self.failed_reads += other.failed_reads;
        self.write_cycles += other.write_cycles;
        self.failed_writes += other.failed_writes;
        self.events += other.events;
    }
}

struct PollContext {
    driver: Arc<Driver>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    options: RunOptions,
}

/// Poll every batch transaction of `driver` until `token` is cancelled
pub async fn run(
    driver: Arc<Driver>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    options: RunOptions,
    token: CancellationToken,
) -> Result<RunSummary> {
    let ctx = Arc::new(PollContext {
        driver,
        transport,
        clock,
        sink,
        options,
    });

    let tasks: Vec<_> = ctx
        .driver
        .batches()
        .map(|(batch, _)| tokio::spawn(poll_batch(batch, Arc::clone(&ctx), token.clone())))
        .collect();
    info!("Started {} polling tasks", tasks.len());

    let mut summary = RunSummary::default();
    let mut first_error = None;
    for joined in join_all(tasks).await {
        match joined.context("Polling task panicked")? {
            Ok(batch_summary) => summary.merge(&batch_summary),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

async fn poll_batch(
    batch: BatchId,
    ctx: Arc<PollContext>,
    token: CancellationToken,
) -> Result<RunSummary> {
    let (id, period) = {
        let transaction = ctx.driver.batch(batch)?;
        (transaction.id().to_string(), transaction.poll_interval())
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Batch '{}' polling every {:?}", id, period);

    let mut summary = RunSummary::default();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = poll_once(batch, &ctx, &mut summary).await {
                    error!("Batch '{}' cycle failed: {:#}", id, e);
                    // One broken transaction stops the rest
                    token.cancel();
                    return Err(e.context(format!("Batch '{}' cycle failed", id)));
                }
                if ctx.options.max_cycles.is_some_and(|max| summary.read_cycles >= max) {
                    info!("Batch '{}' finished after {} read cycles", id, summary.read_cycles);
                    break;
                }
            }
            () = token.cancelled() => {
                info!("Batch '{}' polling stopped", id);
                break;
            }
        }
    }
    Ok(summary)
}

async fn poll_once(batch: BatchId, ctx: &PollContext, summary: &mut RunSummary) -> Result<()> {
    let driver = ctx.driver.as_ref();
    let transport = ctx.transport.as_ref();
    let clock = ctx.clock.as_ref();
    let sink = ctx.sink.as_ref();

    if let Some(report) = driver.run_write_cycle(batch, transport, clock, sink).await? {
        summary.write_cycles += 1;
        summary.failed_writes += u64::from(report.error.is_some());
        summary.events += report.events as u64;
    }

    let report = driver.run_read_cycle(batch, transport, clock, sink).await?;
    summary.read_cycles += 1;
    summary.failed_reads += u64::from(report.error.is_some());
    summary.events += report.events as u64;

    if ctx.options.demo_writes && report.error.is_none() {
        schedule_demo_values(driver, batch)?;
    }
    Ok(())
}

/// Schedule the successor of each output's read-back value
fn schedule_demo_values(driver: &Driver, batch: BatchId) -> Result<()> {
    for &point in driver.batch(batch)?.outputs() {
        let Some(next) = next_demo_value(&driver.read_value(point, "value")?) else {
            continue;
        };
        if let Err(e) = driver.schedule_value(point, next) {
            debug!("Demo write to {} skipped: {}", point, e);
        }
    }
    Ok(())
}

fn next_demo_value(current: &Value) -> Option<Value> {
    match *current {
        Value::Bool(v) => Some(Value::Bool(!v)),
        Value::Int(v) => Some(Value::Int(v.wrapping_add(1))),
        Value::UInt(v) => Some(Value::UInt(v.wrapping_add(1))),
        Value::Float(v) => Some(Value::Float(v + 1.0)),
        _ => None,
    }
}
