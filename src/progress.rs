//! Progress tracking for the active job

use crate::types::JobProgress;

/// Holds the latest progress counters reported by the collaborator
///
/// Reported values are current totals, not deltas: a later report
/// overrides an earlier one, it does not add. The collaborator guarantees
/// `processed` and `rate_limit_hits` are non-decreasing within one job and
/// that `total`, once non-zero, never changes; this tracker just stores the
/// latest report.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    latest: JobProgress,
}

impl ProgressTracker {
    /// Create a zeroed tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest reported counters, overriding prior values
    pub fn apply(&mut self, progress: JobProgress) {
        self.latest = progress;
    }

    /// The latest counter triple
    pub fn current(&self) -> JobProgress {
        self.latest
    }

    /// Completion fraction in 0.0..=1.0, defined as 0.0 while total is unknown
    pub fn fraction(&self) -> f64 {
        if self.latest.total == 0 {
            0.0
        } else {
            self.latest.processed as f64 / self.latest.total as f64
        }
    }

    /// Zero all counters, called at the start of a new submission
    pub fn reset(&mut self) {
        self.latest = JobProgress::default();
    }
}
