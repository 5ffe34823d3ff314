//! Wire protocol for the collaborator's event stream
//!
//! One frame per line, prefixed `data: ` and carrying a JSON payload. Two
//! incompatible protocol generations exist side by side:
//! - **Legacy**: standalone `progress` reports plus a `complete` event that
//!   carries the entire result set at once.
//! - **Incremental**: `batch` events that deliver newly available records
//!   plus updated counters, with a payload-less `complete` (the client
//!   already holds everything).
//!
//! Both generations are modeled as one exhaustive tagged union so adding a
//! third variant is a compile-time-checked change rather than ad hoc field
//! probing.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{JobProgress, ResultSet};

/// Prefix marking a line as a frame; all other lines are keep-alives
pub const FRAME_PREFIX: &str = "data: ";

/// One parsed event from the wire stream
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Legacy standalone progress report
    ///
    /// Carries category counts for display; the incremental protocol
    /// superseded these with accumulator-derived counts, so only the
    /// processed/total pair feeds the tracker.
    Progress {
        /// Numbers processed so far
        #[serde(default)]
        processed: u64,
        /// Total numbers the job will process
        #[serde(default)]
        total: u64,
        /// Rate-limit responses observed so far (absent in oldest streams)
        #[serde(default, rename = "rateLimitHits")]
        rate_limit_hits: u64,
        /// Running count of target-age matches
        #[serde(default, rename = "ageRangeCount")]
        age_range_count: u64,
        /// Running count of other-age matches
        #[serde(default, rename = "otherAgesCount")]
        other_ages_count: u64,
        /// Running count of failed lookups
        #[serde(default, rename = "failedCount")]
        failed_count: u64,
    },

    /// Incremental delivery of newly available records plus counters
    Batch {
        /// Records to append, category-wise
        data: ResultSet,
        /// Updated progress counters
        progress: JobProgress,
    },

    /// Terminal success event, in either protocol generation
    ///
    /// Legacy streams attach the full result set; incremental streams send
    /// only final counters because every record already arrived in batches.
    Complete {
        /// Full result set (legacy generation only)
        #[serde(default)]
        results: Option<ResultSet>,
        /// Final processed count (incremental generation)
        #[serde(default)]
        processed: Option<u64>,
        /// Final rate-limit count (incremental generation)
        #[serde(default, rename = "rateLimitHits")]
        rate_limit_hits: Option<u64>,
    },

    /// Terminal failure event; the message is surfaced verbatim
    Error {
        /// Error message from the collaborator
        message: String,
    },
}

/// Discriminants this client understands; anything else is ignored
const KNOWN_TYPES: [&str; 4] = ["progress", "batch", "complete", "error"];

/// Classify one complete line from the stream
///
/// - `None`: not a frame (keep-alive/comment) or a well-formed frame with
///   an unrecognized discriminant; both are ignored without logging noise.
/// - `Some(Ok(event))`: a recognized, well-formed frame.
/// - `Some(Err(_))`: a frame whose payload is malformed; the caller logs
///   and skips it — a bad line must never abort the stream or delay
///   subsequent lines.
pub fn parse_frame(line: &str) -> Option<Result<StreamEvent>> {
    let payload = line.strip_prefix(FRAME_PREFIX)?;

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            // A well-formed payload with an unknown discriminant is a newer
            // protocol revision, not corruption: ignore it silently.
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(payload)
                && let Some(tag) = value.get("type").and_then(|t| t.as_str())
                && !KNOWN_TYPES.contains(&tag)
            {
                return None;
            }
            Some(Err(Error::Frame(e)))
        }
    }
}
