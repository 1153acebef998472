//! Engine configuration.
//!
//! # Configuration Example
//!
//! ```toml
//! longMethodThreshold = 30
//! complexity_threshold = 12
//! requireTests = true
//! safeMode = true
//! test_timeout_secs = 120
//! test_command = "npm test -- --json"
//! ```
//!
//! Options may be written in snake_case or camelCase. Missing options take
//! their defaults; out-of-range values are rejected with a configuration
//! error naming the field.

mod core;
mod loader;
mod thresholds;

pub use core::RefactoringConfig;
pub use loader::{
    directory_ancestors, load_config, load_config_from, parse_and_validate_config,
    CONFIG_FILE_NAME,
};
pub use thresholds::DetectionThresholds;
