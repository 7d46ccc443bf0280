//! Polling runtime against the simulated device

#![allow(clippy::disallowed_methods)]

use std::sync::Arc;
use std::time::Duration;

use daq_driver::{DriverConfig, EventSink};
use daq_model::{ErrorCode, Quality, Value};
use daq_store::SystemClock;
use daqsrv::{run, RunOptions, SimulatedTransport, TracingEventSink};
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
batches:
  - id: fast
    pollIntervalMs: 5
  - id: slow
    pollIntervalMs: 10
points:
  - { id: temp, batch: fast, direction: input, dataType: float64, offset: 0 }
  - { id: setpoint, batch: fast, direction: output, dataType: int32, offset: 8 }
  - { id: level, batch: slow, direction: input, dataType: uint16, offset: 0 }
"#;

struct Fixture {
    config: DriverConfig,
    driver: Arc<daq_driver::Driver>,
    transport: Arc<SimulatedTransport>,
    sink: Arc<TracingEventSink>,
}

fn fixture() -> Fixture {
    let config = DriverConfig::from_yaml_str(CONFIG).unwrap();
    let driver = Arc::new(config.build_driver().unwrap());
    let transport = Arc::new(SimulatedTransport::from_config(&config));
    Fixture {
        config,
        driver,
        transport,
        sink: Arc::new(TracingEventSink::new()),
    }
}

async fn run_fixture(
    f: &Fixture,
    options: RunOptions,
    token: CancellationToken,
) -> anyhow::Result<daqsrv::RunSummary> {
    run(
        Arc::clone(&f.driver),
        Arc::clone(&f.transport) as Arc<dyn daq_driver::Transport>,
        Arc::new(SystemClock),
        Arc::clone(&f.sink) as Arc<dyn EventSink>,
        options,
        token,
    )
    .await
}

// ============================================================================
// Cycle limit
// ============================================================================

#[tokio::test]
async fn test_runs_requested_cycles_per_batch() {
    let f = fixture();
    f.transport.set_bytes("fast", 0, &21.5f64.to_be_bytes());
    f.transport.set_bytes("slow", 0, &300u16.to_be_bytes());

    let options = RunOptions {
        max_cycles: Some(3),
        demo_writes: false,
    };
    let summary = run_fixture(&f, options, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.read_cycles, 6);
    assert_eq!(summary.failed_reads, 0);
    assert_eq!(summary.write_cycles, 0);
    assert_eq!(summary.events, f.sink.raised());
    assert_eq!(f.transport.counters("fast"), Some((3, 0)));

    let temp = f.driver.point_id("temp").unwrap();
    assert_eq!(f.driver.read_value(temp, "value").unwrap(), Value::Float(21.5));
    assert_eq!(
        f.driver.read_value(temp, "quality").unwrap(),
        Value::Quality(Quality::Good)
    );
    let level = f.driver.point_id("level").unwrap();
    assert_eq!(f.driver.read_value(level, "value").unwrap(), Value::UInt(300));
}

#[tokio::test]
async fn test_demo_writes_are_read_back() {
    let f = fixture();
    let options = RunOptions {
        max_cycles: Some(3),
        demo_writes: true,
    };
    let summary = run_fixture(&f, options, CancellationToken::new()).await.unwrap();

    // Tick 1 reads 0 and schedules 1; ticks 2 and 3 write then read back
    let setpoint = f.driver.point_id("setpoint").unwrap();
    assert_eq!(f.driver.read_value(setpoint, "value").unwrap(), Value::Int(2));
    assert_eq!(summary.write_cycles, 2);
    assert_eq!(summary.failed_writes, 0);
    assert_eq!(f.driver.read_value(setpoint, "writeError").unwrap(), Value::Error(None));
}

// ============================================================================
// Faults and cancellation
// ============================================================================

#[tokio::test]
async fn test_device_fault_marks_points_bad() {
    let f = fixture();
    f.transport.set_fault("slow", Some(ErrorCode::ConnectionLost));

    let options = RunOptions {
        max_cycles: Some(2),
        demo_writes: false,
    };
    let summary = run_fixture(&f, options, CancellationToken::new()).await.unwrap();
    assert_eq!(summary.failed_reads, 2);

    let level = f.driver.point_id("level").unwrap();
    assert_eq!(
        f.driver.read_value(level, "error").unwrap(),
        Value::Error(Some(ErrorCode::ConnectionLost))
    );
    let temp = f.driver.point_id("temp").unwrap();
    assert_eq!(f.driver.read_value(temp, "error").unwrap(), Value::Error(None));
}

#[tokio::test]
async fn test_cancellation_stops_all_tasks() {
    let f = fixture();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        run_fixture(&f, RunOptions::default(), token),
    )
    .await
    .expect("run did not stop after cancellation")
    .unwrap();
    assert!(summary.read_cycles >= 2);
}

#[test]
fn test_image_matches_config() {
    let f = fixture();
    assert_eq!(f.transport.image("fast").unwrap().len(), f.config.image_size("fast"));
    assert_eq!(f.transport.image("slow").unwrap().len(), 2);
}
