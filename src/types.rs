//! Core types for phone-enrich

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A successful lookup, permanently assigned to one category at arrival time
///
/// Field names follow the collaborator's wire casing (`Name`, `Number`,
/// `Age`) so records deserialize directly from batch frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Full name returned by the enrichment service
    #[serde(rename = "Name")]
    pub name: String,
    /// The looked-up phone number
    #[serde(rename = "Number")]
    pub number: String,
    /// Reported age in years
    #[serde(rename = "Age")]
    pub age: u32,
}

/// Status code attached to a failed lookup
///
/// The collaborator emits either an HTTP-style integer (`429`) or a short
/// text code (`"timeout"`); both shapes appear in production streams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCode {
    /// Numeric status code (e.g., 429)
    Code(i64),
    /// Textual status code (e.g., "timeout")
    Text(String),
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::Code(code) => write!(f, "{}", code),
            StatusCode::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A lookup that did not resolve
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttempt {
    /// The phone number whose lookup failed
    #[serde(rename = "Number")]
    pub number: String,
    /// Status code reported for the failure
    #[serde(rename = "StatusCode")]
    pub status_code: StatusCode,
    /// Human-readable failure reason
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// A batch lookup request, immutable once submitted
///
/// Serializes to the collaborator's JSON body shape
/// (`apiKey`, `phoneNumbers`, `rangeSize`, `minAge`, `maxAge`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// API key forwarded to the enrichment service
    pub api_key: String,
    /// Base phone numbers to expand and look up (must be non-empty)
    pub phone_numbers: Vec<String>,
    /// Consecutive numbers scanned per base number (1..=1000)
    pub range_size: u32,
    /// Lower bound of the target age range (0..=120)
    pub min_age: u32,
    /// Upper bound of the target age range (0..=120)
    pub max_age: u32,
}

impl JobRequest {
    /// Validate the request locally before any network activity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the offending field. The
    /// empty-number-list check is the fail-fast path: a request that
    /// violates it never opens a stream.
    pub fn validate(&self) -> Result<()> {
        if self.phone_numbers.is_empty() {
            return Err(Error::validation(
                "phone_numbers",
                "at least one base phone number is required",
            ));
        }
        if !(1..=1000).contains(&self.range_size) {
            return Err(Error::validation(
                "range_size",
                format!("range size {} is outside 1..=1000", self.range_size),
            ));
        }
        if self.min_age > 120 || self.max_age > 120 {
            return Err(Error::validation(
                "min_age",
                "age bounds must be within 0..=120",
            ));
        }
        if self.min_age > self.max_age {
            return Err(Error::validation(
                "min_age",
                format!(
                    "min age {} exceeds max age {}",
                    self.min_age, self.max_age
                ),
            ));
        }
        Ok(())
    }
}

/// The three categorized record sequences for one job
///
/// Append-only for the duration of a job; replaced wholesale only by a
/// legacy whole-result delivery or by a new submission. Field names follow
/// the collaborator's wire casing so this doubles as the `batch.data` /
/// `complete.results` payload shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// Matches whose age falls inside the requested range
    #[serde(default)]
    pub age_range: Vec<MatchRecord>,
    /// Matches whose age falls outside the requested range
    #[serde(default)]
    pub other_ages: Vec<MatchRecord>,
    /// Lookups that did not resolve
    #[serde(default)]
    pub failed: Vec<FailedAttempt>,
}

impl ResultSet {
    /// True if all three categories are empty
    pub fn is_empty(&self) -> bool {
        self.age_range.is_empty() && self.other_ages.is_empty() && self.failed.is_empty()
    }

    /// Per-category record counts as (age_range, other_ages, failed)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.age_range.len(), self.other_ages.len(), self.failed.len())
    }
}

/// Monotonic job counters as last reported by the collaborator
///
/// Values are current totals, not deltas: a later report overrides an
/// earlier one. `rate_limit_hits` is an opaque external metric; retrying on
/// rate limits is the collaborator's responsibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    /// Numbers processed so far
    #[serde(default)]
    pub processed: u64,
    /// Total numbers the job will process (fixed once first reported non-zero)
    #[serde(default)]
    pub total: u64,
    /// Rate-limit responses observed by the collaborator so far
    #[serde(default)]
    pub rate_limit_hits: u64,
}

/// Job lifecycle phase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// No job has been submitted yet
    Idle,
    /// Request validated, stream not yet open
    Submitting,
    /// Stream open, events being applied
    Streaming,
    /// Terminal: the collaborator reported completion
    Completed,
    /// Terminal: the job failed with an error message
    Failed {
        /// The failure message (server-reported or transport-level)
        error: String,
    },
}

impl JobPhase {
    /// True for the terminal phases (Completed, Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed { .. })
    }
}

/// Point-in-time view of the active job for display
#[derive(Clone, Debug, Serialize)]
pub struct JobStatus {
    /// Current lifecycle phase
    pub phase: JobPhase,
    /// Latest progress counters
    pub progress: JobProgress,
    /// Completion fraction in 0.0..=1.0 (0.0 while total is unknown)
    pub fraction: f64,
    /// Records accumulated in the target age range so far
    pub age_range_count: usize,
    /// Records accumulated outside the target age range so far
    pub other_ages_count: usize,
    /// Failed lookups accumulated so far
    pub failed_count: usize,
    /// When the current job was submitted
    pub started_at: Option<DateTime<Utc>>,
    /// When the current job reached a terminal phase
    pub finished_at: Option<DateTime<Utc>>,
}

/// Event emitted during the job lifecycle
///
/// Pure observability: consumers subscribe for display updates, but all
/// state remains readable through the client's snapshot accessors.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A request passed validation and a new job superseded any prior state
    Submitted {
        /// Number of base phone numbers in the request
        base_numbers: usize,
    },

    /// The stream to the collaborator is open
    Streaming,

    /// A batch frame was applied to the accumulator
    BatchApplied {
        /// Records appended to the target age range category
        age_range: usize,
        /// Records appended to the other-ages category
        other_ages: usize,
        /// Failed attempts appended
        failed: usize,
    },

    /// Progress counters were updated
    Progress {
        /// Numbers processed so far
        processed: u64,
        /// Total numbers the job will process
        total: u64,
        /// Rate-limit responses observed so far
        rate_limit_hits: u64,
    },

    /// The job completed successfully
    Completed,

    /// The job ended in failure
    Failed {
        /// The failure message
        error: String,
    },
}
