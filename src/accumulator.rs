//! Categorized result accumulation for the active job
//!
//! One owned mutable accumulator with an explicit snapshot read, not two
//! independently-updated copies of the same data: display and export both
//! render from [`ResultAccumulator::snapshot`].

use crate::types::ResultSet;

/// Holds the three append-only categorized record sequences for one job
///
/// The struct itself is synchronous; the client serializes mutation by
/// holding it behind a single write lock, which is what makes each batch
/// application atomic with respect to snapshot reads.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    results: ResultSet,
}

impl ResultAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch's member sequences, category-wise and in order
    ///
    /// Never reorders or deduplicates: the wire protocol guarantees no
    /// duplicated records across retried frames, so arrival order is the
    /// stored order. Returns the per-category appended counts as
    /// (age_range, other_ages, failed).
    pub fn apply_batch(&mut self, batch: ResultSet) -> (usize, usize, usize) {
        let counts = batch.counts();
        self.results.age_range.extend(batch.age_range);
        self.results.other_ages.extend(batch.other_ages);
        self.results.failed.extend(batch.failed);
        counts
    }

    /// Replace all state with a whole result set
    ///
    /// Used only for the legacy protocol generation, where the complete
    /// event carries everything at once; prior state is discarded entirely.
    pub fn replace_all(&mut self, results: ResultSet) {
        self.results = results;
    }

    /// An owned point-in-time view of the three current sequences
    ///
    /// Never observes a partially-applied batch: the caller takes the same
    /// lock that guards [`apply_batch`](Self::apply_batch).
    pub fn snapshot(&self) -> ResultSet {
        self.results.clone()
    }

    /// Per-category record counts as (age_range, other_ages, failed)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.results.counts()
    }

    /// Clear all three sequences, called at the start of a new submission
    pub fn reset(&mut self) {
        self.results = ResultSet::default();
    }
}
