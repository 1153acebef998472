//! Progress reporting for pipeline runs.
//!
//! A run reports fixed milestones (detecting, suggesting, planning,
//! validating, testing, applying, then complete or error) through a
//! [`ProgressReporter`], which clamps percentages so the sequence a sink
//! observes never decreases. Progress is purely observational.

pub mod implementations;
pub mod traits;

pub use implementations::{LogProgressSink, RecordingProgressSink, SilentProgressSink};
pub use traits::{PipelineStage, ProgressSink, ProgressUpdate};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Wraps a sink and enforces monotonically non-decreasing percentages.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(SilentProgressSink))
    }

    /// Report a stage at its nominal percentage.
    pub fn stage(&self, stage: PipelineStage, message: impl Into<String>) {
        self.report(stage, stage.nominal_percent(), message);
    }

    /// Report with an explicit percentage; lower values are raised to the
    /// last reported one and values above 100 are capped.
    pub fn report(&self, stage: PipelineStage, percent: u8, message: impl Into<String>) {
        let requested = percent.min(100);
        let previous = self.last.fetch_max(requested, Ordering::SeqCst);
        let update = ProgressUpdate {
            stage,
            percent: previous.max(requested),
            message: message.into(),
        };
        self.sink.on_progress(&update);
    }

    /// Interpolate between two stages' nominal percentages for step `done` of `total`.
    pub fn step(
        &self,
        stage: PipelineStage,
        next: PipelineStage,
        done: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        let from = stage.nominal_percent() as usize;
        let to = next.nominal_percent() as usize;
        let percent = if total == 0 {
            from
        } else {
            from + (to.saturating_sub(from)) * done.min(total) / total
        };
        self.report(stage, percent as u8, message);
    }

    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_never_decrease() {
        let recorder = RecordingProgressSink::new();
        let reporter = ProgressReporter::new(Arc::new(recorder.clone()));
        reporter.report(PipelineStage::Testing, 60, "before");
        reporter.report(PipelineStage::Validating, 50, "late validation");
        reporter.report(PipelineStage::Complete, 250, "done");
        assert_eq!(recorder.percents(), vec![60, 60, 100]);
    }

    #[test]
    fn test_step_interpolates_between_stages() {
        let recorder = RecordingProgressSink::new();
        let reporter = ProgressReporter::new(Arc::new(recorder.clone()));
        reporter.step(PipelineStage::Applying, PipelineStage::Complete, 1, 2, "half");
        assert_eq!(recorder.percents(), vec![87]);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let captured = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |u: &ProgressUpdate| {
            captured.lock().push(u.stage)
        }));
        reporter.stage(PipelineStage::Planning, "ordering");
        assert_eq!(*seen.lock(), vec![PipelineStage::Planning]);
    }
}
