//! CSV rendering of categorized result sequences
//!
//! Pure text generation: identical input yields byte-identical output, and
//! saving the text to disk is the embedding application's concern. Two
//! fixed shapes exist, one per record type, so a general CSV writer would
//! be heavier than the format itself.
//!
//! Embedded quote characters in field values are not escaped. This is a
//! known limitation, acceptable because inputs are constrained to numeric
//! phone strings and collaborator-supplied short names and reasons.

use crate::types::{FailedAttempt, MatchRecord};

/// Header line for match-record exports
pub const MATCH_HEADER: &str = "Name,Number,Age";

/// Header line for failed-attempt exports
pub const FAILED_HEADER: &str = "Number,StatusCode,Reason";

/// Render match records as `Name,Number,Age`
///
/// Name and number are quoted; age is a bare integer. An empty sequence
/// yields header-only output.
///
/// # Examples
///
/// ```
/// use phone_enrich::export::matches_to_csv;
/// use phone_enrich::MatchRecord;
///
/// let records = vec![MatchRecord {
///     name: "A".to_string(),
///     number: "5550".to_string(),
///     age: 15,
/// }];
/// assert_eq!(matches_to_csv(&records), "Name,Number,Age\n\"A\",\"5550\",15");
/// ```
pub fn matches_to_csv(records: &[MatchRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| format!("\"{}\",\"{}\",{}", r.name, r.number, r.age))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", MATCH_HEADER, rows)
}

/// Render failed attempts as `Number,StatusCode,Reason`
///
/// All three fields are quoted, including numeric status codes: the status
/// code column mixes integer and text values, and a uniform quoting keeps
/// the column shape stable for downstream spreadsheet imports.
pub fn failures_to_csv(records: &[FailedAttempt]) -> String {
    let rows = records
        .iter()
        .map(|r| format!("\"{}\",\"{}\",\"{}\"", r.number, r.status_code, r.reason))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", FAILED_HEADER, rows)
}

/// Conventional filename for target-age matches, embedding the requested bounds
pub fn age_range_filename(min_age: u32, max_age: u32) -> String {
    format!("age-{}-to-{}.csv", min_age, max_age)
}

/// Conventional filename for matches outside the target age range
pub fn other_ages_filename() -> String {
    "other-ages.csv".to_string()
}

/// Conventional filename for failed lookups
pub fn failed_filename() -> String {
    "failed-requests.csv".to_string()
}
