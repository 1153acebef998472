//! Progress sink implementations.
//!
//! | Use Case | Implementation |
//! |----------|----------------|
//! | Library default | [`SilentProgressSink`] |
//! | Hosts with a logger | [`LogProgressSink`] |
//! | Tests | [`RecordingProgressSink`] |

use super::traits::{PipelineStage, ProgressSink, ProgressUpdate};
use parking_lot::Mutex;
use std::sync::Arc;

/// No-op sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgressSink;

impl ProgressSink for SilentProgressSink {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Forwards milestones to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, update: &ProgressUpdate) {
        log::info!(
            "[{:>3}%] {}: {}",
            update.percent,
            update.stage,
            update.message
        );
    }
}

/// Recording progress sink - captures updates for testing.
///
/// ```rust
/// use refactron::progress::{PipelineStage, ProgressReporter, RecordingProgressSink};
/// use std::sync::Arc;
///
/// let recorder = RecordingProgressSink::new();
/// let reporter = ProgressReporter::new(Arc::new(recorder.clone()));
/// reporter.stage(PipelineStage::Detecting, "scanning");
/// reporter.stage(PipelineStage::Complete, "done");
///
/// assert_eq!(recorder.stages(), vec![PipelineStage::Detecting, PipelineStage::Complete]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordingProgressSink {
    updates: Arc<Mutex<Vec<ProgressUpdate>>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().clone()
    }

    pub fn stages(&self) -> Vec<PipelineStage> {
        self.updates.lock().iter().map(|u| u.stage).collect()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.updates.lock().iter().map(|u| u.percent).collect()
    }

    pub fn clear(&self) {
        self.updates.lock().clear();
    }
}

impl ProgressSink for RecordingProgressSink {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().push(update.clone());
    }
}
