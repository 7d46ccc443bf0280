//! Simulated device
//!
//! Every batch transaction maps to an in-memory device image large enough for
//! all of its points. Reads return a copy of the image, writes patch it at the
//! entry offsets, so written outputs are visible in the next read. Faults can
//! be injected per batch or drawn at random.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use daq_driver::{DriverConfig, Transport, WriteCommand};
use daq_model::{ByteOrder, DataType, Direction, ErrorCode, PointValue};
use parking_lot::Mutex;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Analog input that drifts when noise is enabled
#[derive(Debug, Clone, Copy)]
struct AnalogChannel {
    offset: usize,
    data_type: DataType,
    byte_order: ByteOrder,
}

#[derive(Debug)]
struct DeviceImage {
    bytes: BytesMut,
    analog: Vec<AnalogChannel>,
    /// Error returned by the next reads, consumed one per read
    fail_reads: u32,
    /// Error returned by every read and write until cleared
    fault: Option<ErrorCode>,
    reads: u64,
    writes: u64,
}

#[derive(Debug)]
pub struct SimulatedTransport {
    devices: FxHashMap<String, Mutex<DeviceImage>>,
    noise: bool,
    fault_rate: f64,
}

impl SimulatedTransport {
    /// One zeroed device image per batch transaction of `config`
    pub fn from_config(config: &DriverConfig) -> Self {
        let mut devices = FxHashMap::default();
        for batch in &config.batches {
            let size = config.image_size(&batch.id);
            let analog = config
                .points
                .iter()
                .filter(|p| p.batch == batch.id && p.direction == Direction::Input)
                .filter(|p| matches!(p.data_type, DataType::Float32 | DataType::Float64))
                .map(|p| AnalogChannel {
                    offset: p.offset,
                    data_type: p.data_type,
                    byte_order: p.byte_order,
                })
                .collect();
            debug!("Simulated device '{}': {} bytes", batch.id, size);
            devices.insert(
                batch.id.clone(),
                Mutex::new(DeviceImage {
                    bytes: BytesMut::zeroed(size),
                    analog,
                    fail_reads: 0,
                    fault: None,
                    reads: 0,
                    writes: 0,
                }),
            );
        }
        Self {
            devices,
            noise: false,
            fault_rate: 0.0,
        }
    }

    /// Let float inputs drift on every read
    pub fn with_noise(mut self, enabled: bool) -> Self {
        self.noise = enabled;
        self
    }

    /// Probability that a read fails with a timeout
    pub fn with_fault_rate(mut self, rate: f64) -> Self {
        self.fault_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Overwrite part of a device image; false if the batch is unknown or the range does not fit
    pub fn set_bytes(&self, batch: &str, offset: usize, data: &[u8]) -> bool {
        let Some(device) = self.devices.get(batch) else {
            return false;
        };
        let mut device = device.lock();
        let target = offset
            .checked_add(data.len())
            .and_then(|end| device.bytes.get_mut(offset..end));
        match target {
            Some(target) => {
                target.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Current device image
    pub fn image(&self, batch: &str) -> Option<Bytes> {
        self.devices
            .get(batch)
            .map(|d| Bytes::copy_from_slice(&d.lock().bytes))
    }

    /// Fail every read and write of `batch` with `fault` until cleared with None
    pub fn set_fault(&self, batch: &str, fault: Option<ErrorCode>) {
        if let Some(device) = self.devices.get(batch) {
            device.lock().fault = fault;
        }
    }

    /// Fail the next `count` reads of `batch` with a timeout
    pub fn fail_next_reads(&self, batch: &str, count: u32) {
        if let Some(device) = self.devices.get(batch) {
            device.lock().fail_reads = count;
        }
    }

    /// Reads and writes served for `batch`
    pub fn counters(&self, batch: &str) -> Option<(u64, u64)> {
        self.devices.get(batch).map(|d| {
            let d = d.lock();
            (d.reads, d.writes)
        })
    }
}

fn drift<T: PointValue + Into<f64>>(
    bytes: &mut [u8],
    channel: &AnalogChannel,
    delta: f64,
    narrow: impl Fn(f64) -> T,
) {
    let Some(slot) = bytes.get_mut(channel.offset..) else {
        return;
    };
    if let Ok(current) = T::decode(slot, channel.byte_order) {
        let next = narrow(current.into() + delta);
        let encoded = next.encode(channel.byte_order);
        if let Some(target) = slot.get_mut(..encoded.len()) {
            target.copy_from_slice(&encoded);
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn read(&self, batch: &str) -> Result<Bytes, ErrorCode> {
        let device = self.devices.get(batch).ok_or(ErrorCode::NotConnected)?;
        let mut device = device.lock();
        device.reads += 1;

        if let Some(fault) = device.fault {
            return Err(fault);
        }
        if device.fail_reads > 0 {
            device.fail_reads -= 1;
            return Err(ErrorCode::Timeout);
        }
        let mut rng = rand::thread_rng();
        if self.fault_rate > 0.0 && rng.gen_bool(self.fault_rate) {
            trace!("Simulated device '{}': random timeout", batch);
            return Err(ErrorCode::Timeout);
        }

        if self.noise {
            let DeviceImage { bytes, analog, .. } = &mut *device;
            for channel in analog.iter() {
                let delta = rng.gen_range(-0.5..0.5);
                match channel.data_type {
                    DataType::Float32 => drift::<f32>(bytes, channel, delta, |v| v as f32),
                    DataType::Float64 => drift::<f64>(bytes, channel, delta, |v| v),
                    _ => {}
                }
            }
        }

        Ok(Bytes::copy_from_slice(&device.bytes))
    }

    async fn write(&self, batch: &str, command: &WriteCommand) -> Result<(), ErrorCode> {
        let device = self.devices.get(batch).ok_or(ErrorCode::NotConnected)?;
        let mut device = device.lock();
        device.writes += 1;

        if let Some(fault) = device.fault {
            return Err(fault);
        }
        // All or nothing: any out-of-range entry rejects the whole command
        let len = device.bytes.len();
        let in_range = |offset: usize, data: &[u8]| {
            offset.checked_add(data.len()).is_some_and(|end| end <= len)
        };
        if !command.entries().iter().all(|e| in_range(e.offset, &e.data)) {
            return Err(ErrorCode::Device(2));
        }
        for entry in command.entries() {
            let end = entry.offset + entry.data.len();
            device.bytes[entry.offset..end].copy_from_slice(&entry.data);
        }
        trace!("Simulated device '{}': {} entries written", batch, command.len());
        Ok(())
    }
}
