//! Command line and logging bootstrap

use std::path::PathBuf;

use clap::Parser;
use common::logging::LogConfig;
use daq_driver::DriverConfig;

/// Command-line arguments for daqsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "daqsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Data Acquisition Service",
    long_about = None
)]
pub struct Args {
    /// Driver configuration file (yaml, toml or json)
    #[arg(short = 'c', long, env = "DAQSRV_CONFIG", default_value = "config/daqsrv.yaml")]
    pub config: PathBuf,

    /// Log level or filter; overrides the configuration file
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub dump_config: bool,

    /// Stop after this many read cycles per batch transaction
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Probability (0.0 - 1.0) that a simulated read fails with a timeout
    #[arg(long, default_value_t = 0.0)]
    pub fault_rate: f64,

    /// Add noise to simulated analog inputs
    #[arg(long)]
    pub noise: bool,

    /// Write back a changed value to every output after each read
    #[arg(long)]
    pub demo_writes: bool,
}

/// Logging configuration from the service section, with command line overrides
pub fn log_config(args: &Args, config: &DriverConfig) -> LogConfig {
    LogConfig {
        service_name: config.service.name.clone(),
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.service.log_level.clone()),
        log_dir: config.service.log_dir.clone(),
        enable_json: config.service.json_logs,
        enable_ansi: !args.no_color,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["daqsrv"]);
        assert!(!args.validate);
        assert_eq!(args.fault_rate, 0.0);
        assert!(args.cycles.is_none());
    }

    #[test]
    fn test_log_level_override() {
        let config = DriverConfig::from_yaml_str("batches: [{ id: poll1 }]").unwrap();
        let args = Args::parse_from(["daqsrv", "--log-level", "trace", "--no-color"]);
        let log = log_config(&args, &config);
        assert_eq!(log.level, "trace");
        assert!(!log.enable_ansi);

        let args = Args::parse_from(["daqsrv"]);
        assert_eq!(log_config(&args, &config).level, "info");
    }
}
