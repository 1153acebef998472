//! Progress sink trait definitions.
//!
//! - [`ProgressSink`]: receiver of pipeline milestones (UI, logs, tests)
//! - [`PipelineStage`]: the fixed milestones of one pipeline run
//!
//! # Thread Safety
//!
//! All `ProgressSink` implementations must be `Send + Sync`; detection fans
//! out with rayon and an orchestrator may be shared between threads.
//!
//! # Example
//!
//! ```rust
//! use refactron::progress::{ProgressSink, ProgressUpdate};
//!
//! struct LoggingProgressSink;
//!
//! impl ProgressSink for LoggingProgressSink {
//!     fn on_progress(&self, update: &ProgressUpdate) {
//!         log::info!("{} {}%: {}", update.stage, update.percent, update.message);
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

/// Pipeline milestones, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Detecting,
    Suggesting,
    Planning,
    Validating,
    Testing,
    Applying,
    Complete,
    Error,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detecting => "detecting",
            Self::Suggesting => "suggesting",
            Self::Planning => "planning",
            Self::Validating => "validating",
            Self::Testing => "testing",
            Self::Applying => "applying",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Percentage reported when the stage starts.
    pub fn nominal_percent(&self) -> u8 {
        match self {
            Self::Detecting => 0,
            Self::Suggesting => 25,
            Self::Planning => 40,
            Self::Validating => 50,
            Self::Testing => 60,
            Self::Applying => 75,
            Self::Complete | Self::Error => 100,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// 0..=100, never decreasing within one reporter.
    pub percent: u8,
    pub message: String,
}

/// Progress sink abstraction - receives progress updates.
///
/// Called synchronously at each milestone. Implementations must not block
/// and must not panic; progress never influences control flow.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}
