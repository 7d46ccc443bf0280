//! Shared service infrastructure
//!
//! - `logging`: tracing subscriber setup with runtime level changes
//! - `shutdown`: Ctrl+C / SIGTERM handling

pub mod logging;
pub mod shutdown;

pub use logging::{get_log_level, init_with_config, set_log_level, LogConfig};
pub use shutdown::{shutdown_token, wait_for_shutdown};
