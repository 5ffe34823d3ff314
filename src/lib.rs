//! # phone-enrich
//!
//! Streaming client library for long-running batch phone-enrichment jobs.
//!
//! This crate is the client half of a remote enrichment job: it submits a
//! batch lookup request, consumes the continuously-delivered, line-framed
//! event stream carried over a single persistent response body, and
//! maintains a live, readable, monotonically growing set of categorized
//! results while the job is still running.
//!
//! ## Design Philosophy
//!
//! phone-enrich is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Loss-proof** - Frames split at arbitrary transport chunk boundaries
//!   (including inside a multi-byte character) are reassembled exactly
//! - **Strictly ordered** - One consumer task applies events sequentially;
//!   a snapshot never observes a partially-applied batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use phone_enrich::{ClientConfig, EnrichmentClient, JobRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EnrichmentClient::new(ClientConfig::default())?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     client
//!         .submit(JobRequest {
//!             api_key: "key".to_string(),
//!             phone_numbers: vec!["7609993322".to_string()],
//!             range_size: 600,
//!             min_age: 78,
//!             max_age: 96,
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Categorized result accumulation
pub mod accumulator;
/// Job lifecycle control and stream consumption
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// CSV rendering of result sequences
pub mod export;
/// Line framing over raw transport chunks
pub mod framer;
/// Progress tracking
pub mod progress;
/// Wire protocol for the collaborator's event stream
pub mod protocol;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use accumulator::ResultAccumulator;
pub use client::EnrichmentClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use framer::LineFramer;
pub use progress::ProgressTracker;
pub use protocol::{FRAME_PREFIX, StreamEvent, parse_frame};
pub use types::{
    FailedAttempt, JobEvent, JobPhase, JobProgress, JobRequest, JobStatus, MatchRecord, ResultSet,
    StatusCode,
};
