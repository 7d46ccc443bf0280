//! Driver configuration
//!
//! Loaded with figment from YAML, TOML or JSON (chosen by file extension),
//! with `DAQ_SERVICE_*` environment variables overriding the `service`
//! section, e.g. `DAQ_SERVICE_LOG_LEVEL=debug`.
//!
//! ```yaml
//! service:
//!   name: daqsrv
//!   logLevel: info
//! batches:
//!   - id: poll1
//!     pollIntervalMs: 500
//! points:
//!   - id: temperature
//!     batch: poll1
//!     direction: input
//!     dataType: float64
//!     offset: 0
//!     byteOrder: bigEndian
//! ```

use daq_model::{ByteOrder, DataType, Direction, PointValue};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::driver::{Driver, DriverBuilder};
use crate::error::{DriverError, Result};
use crate::point::PointId;

/// Environment prefix for `service` overrides
pub const ENV_PREFIX: &str = "DAQ_SERVICE_";

fn default_service_name() -> String {
    "daqsrv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for daily log files; console only if unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_dir: None,
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchConfig {
    pub id: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl BatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PointConfig {
    pub id: String,

    /// Id of the batch transaction the point belongs to
    pub batch: String,

    pub direction: Direction,

    pub data_type: DataType,

    /// Byte offset of the value in the device image
    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl PointConfig {
    /// First byte past this point's value, None if it does not fit in `usize`
    pub fn end(&self) -> Option<usize> {
        self.offset
            .checked_add(self.data_type.encoded_size().unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    pub batches: Vec<BatchConfig>,

    #[serde(default)]
    pub points: Vec<PointConfig>,
}

impl DriverConfig {
    /// Load from a file, picking the format from its extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DriverError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DriverError::Config("Invalid file extension".to_string()))?;

        let figment = Figment::new();
        let figment = match extension {
            "json" => figment.merge(Json::file(path)),
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            _ => {
                return Err(DriverError::Config(format!(
                    "Unsupported config format: {}",
                    extension
                )))
            }
        };

        let config = Self::extract(figment.merge(service_env()))?;
        info!(
            "Loaded configuration from {}: {} batch transactions, {} points",
            path.display(),
            config.batches.len(),
            config.points.len()
        );
        Ok(config)
    }

    /// Parse YAML text without environment overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::extract(Figment::from(Yaml::string(yaml)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| DriverError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross references and ids
    pub fn validate(&self) -> Result<()> {
        if self.batches.is_empty() {
            return Err(DriverError::Config(
                "At least one batch transaction must be configured".to_string(),
            ));
        }

        let mut batch_ids = FxHashSet::default();
        for batch in &self.batches {
            if batch.id.is_empty() {
                return Err(DriverError::Config("Batch transaction with empty id".to_string()));
            }
            if !batch_ids.insert(batch.id.as_str()) {
                return Err(DriverError::Config(format!(
                    "Duplicate batch transaction id: {}",
                    batch.id
                )));
            }
            if batch.poll_interval_ms == 0 {
                return Err(DriverError::Config(format!(
                    "Batch transaction '{}': pollIntervalMs must be greater than 0",
                    batch.id
                )));
            }
        }

        let mut point_ids = FxHashSet::default();
        for point in &self.points {
            if point.id.is_empty() {
                return Err(DriverError::Config("Point with empty id".to_string()));
            }
            if !point_ids.insert(point.id.as_str()) {
                return Err(DriverError::Config(format!("Duplicate point id: {}", point.id)));
            }
            if !batch_ids.contains(point.batch.as_str()) {
                return Err(DriverError::Config(format!(
                    "Point '{}' references unknown batch transaction '{}'",
                    point.id, point.batch
                )));
            }
            if !point.data_type.is_point_type() {
                return Err(DriverError::Config(format!(
                    "Point '{}': {} is not a point data type",
                    point.id, point.data_type
                )));
            }
            if point.end().is_none() {
                return Err(DriverError::Config(format!(
                    "Point '{}': offset {} is out of range",
                    point.id, point.offset
                )));
            }
        }

        debug!("Configuration validated");
        Ok(())
    }

    /// Bytes a device image must hold for every point of `batch`
    pub fn image_size(&self, batch: &str) -> usize {
        self.points
            .iter()
            .filter(|p| p.batch == batch)
            .filter_map(PointConfig::end)
            .max()
            .unwrap_or(0)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DriverError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Build a driver with every batch transaction and point of this configuration
    pub fn build_driver(&self) -> Result<Driver> {
        self.validate()?;
        let mut builder = Driver::builder();
        for batch in &self.batches {
            builder.add_batch(&batch.id, batch.poll_interval())?;
        }
        for point in &self.points {
            add_point(&mut builder, point)?;
        }
        builder.build()
    }
}

/// `DAQ_SERVICE_LOG_LEVEL` and friends, keyed like the file's camelCase fields
fn service_env() -> Env {
    Env::prefixed(ENV_PREFIX)
        .map(|key| {
            let key = key.as_str().to_ascii_lowercase();
            let field = match key.as_str() {
                "log_level" => "logLevel",
                "log_dir" => "logDir",
                "json_logs" => "jsonLogs",
                other => other,
            };
            format!("service.{}", field).into()
        })
        .lowercase(false)
}

fn add_point(builder: &mut DriverBuilder, point: &PointConfig) -> Result<PointId> {
    match point.data_type {
        DataType::Bool => add_typed::<bool>(builder, point),
        DataType::Int16 => add_typed::<i16>(builder, point),
        DataType::UInt16 => add_typed::<u16>(builder, point),
        DataType::Int32 => add_typed::<i32>(builder, point),
        DataType::UInt32 => add_typed::<u32>(builder, point),
        DataType::Int64 => add_typed::<i64>(builder, point),
        DataType::UInt64 => add_typed::<u64>(builder, point),
        DataType::Float32 => add_typed::<f32>(builder, point),
        DataType::Float64 => add_typed::<f64>(builder, point),
        other => Err(DriverError::Config(format!(
            "Point '{}': {} is not a point data type",
            point.id, other
        ))),
    }
}

fn add_typed<T: PointValue>(builder: &mut DriverBuilder, point: &PointConfig) -> Result<PointId> {
    match point.direction {
        Direction::Input => {
            builder.add_input::<T>(&point.id, &point.batch, point.offset, point.byte_order)
        }
        Direction::Output => {
            builder.add_output::<T>(&point.id, &point.batch, point.offset, point.byte_order)
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
service:
  name: test
  logLevel: debug
batches:
  - id: poll1
    pollIntervalMs: 250
  - id: poll2
points:
  - id: temperature
    batch: poll1
    direction: input
    dataType: float64
  - id: pressure
    batch: poll1
    direction: input
    dataType: float32
    offset: 8
    byteOrder: littleEndian
  - id: valve
    batch: poll2
    direction: output
    dataType: bool
    offset: 3
"#;

    #[test]
    fn test_parse_sample() {
        let config = DriverConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.service.name, "test");
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.batches[0].poll_interval(), Duration::from_millis(250));
        assert_eq!(config.batches[1].poll_interval_ms, 1000);
        assert_eq!(config.points[1].byte_order, ByteOrder::LittleEndian);
        assert_eq!(config.points[0].byte_order, ByteOrder::BigEndian);
        assert_eq!(config.points[2].direction, Direction::Output);
    }

    #[test]
    fn test_image_size() {
        let config = DriverConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.image_size("poll1"), 12);
        assert_eq!(config.image_size("poll2"), 4);
        assert_eq!(config.image_size("nope"), 0);
    }

    #[test]
    fn test_build_driver() {
        let driver = DriverConfig::from_yaml_str(SAMPLE).unwrap().build_driver().unwrap();
        let valve = driver.point_id("valve").unwrap();
        assert_eq!(driver.point_data_type(valve).unwrap(), DataType::Bool);
        assert_eq!(driver.batches().count(), 2);
    }

    #[test]
    fn test_unknown_batch_reference_rejected() {
        let yaml = r#"
batches:
  - id: poll1
points:
  - id: temperature
    batch: poll9
    direction: input
    dataType: float64
"#;
        let err = DriverConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown batch transaction 'poll9'"));
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let yaml = format!(
            r#"
batches: [{{ id: poll1 }}]
points:
  - {{ id: far, batch: poll1, direction: input, dataType: float64, offset: {} }}
"#,
            usize::MAX - 2
        );
        let err = DriverConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("Point 'far': offset"));
    }

    #[test]
    fn test_image_size_skips_overflowing_points() {
        let mut config = DriverConfig::from_yaml_str(SAMPLE).unwrap();
        config.points[0].offset = usize::MAX;
        assert_eq!(config.points[0].end(), None);
        assert_eq!(config.image_size("poll1"), 12);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = r#"
batches:
  - id: poll1
    pollRate: 5
"#;
        assert!(matches!(
            DriverConfig::from_yaml_str(yaml),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_missing_batch_key_rejected() {
        let yaml = r#"
batches:
  - id: poll1
points:
  - id: temperature
    direction: input
    dataType: float64
"#;
        assert!(DriverConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_no_batches_rejected() {
        let err = DriverConfig::from_yaml_str("batches: []").unwrap_err();
        assert!(err.to_string().contains("At least one batch"));
    }

    #[test]
    fn test_duplicate_point_rejected() {
        let yaml = r#"
batches:
  - id: poll1
points:
  - { id: a, batch: poll1, direction: input, dataType: bool }
  - { id: a, batch: poll1, direction: output, dataType: bool }
"#;
        let err = DriverConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate point id: a"));
    }

    #[test]
    fn test_non_point_data_type_rejected() {
        let yaml = r#"
batches:
  - id: poll1
points:
  - { id: q, batch: poll1, direction: input, dataType: quality }
"#;
        let err = DriverConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("not a point data type"));
    }

    #[test]
    fn test_json_dump_round_trips_through_figment() {
        let config = DriverConfig::from_yaml_str(SAMPLE).unwrap();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"pollIntervalMs\": 250"));
        let reparsed: DriverConfig = Figment::from(Json::string(&json)).extract().unwrap();
        assert_eq!(reparsed, config);
    }
}
