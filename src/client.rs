//! Job lifecycle control and stream consumption
//!
//! [`EnrichmentClient`] owns the whole pipeline: it validates and submits
//! the job request, opens the single persistent response body, feeds
//! transport chunks through the [`LineFramer`](crate::framer::LineFramer),
//! classifies each complete line via
//! [`parse_frame`](crate::protocol::parse_frame), and applies events to the
//! accumulator and tracker strictly in arrival order from one consumer
//! task. Reads (snapshot, status, export) may happen at any time; each
//! event is applied under a single write guard, so a reader never observes
//! a partially-applied batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::accumulator::ResultAccumulator;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::export;
use crate::framer::LineFramer;
use crate::progress::ProgressTracker;
use crate::protocol::{StreamEvent, parse_frame};
use crate::types::{JobEvent, JobPhase, JobProgress, JobRequest, JobStatus, ResultSet};

/// All mutable state for the active job, guarded by one lock
///
/// The generation counter ties the state to the submission that created
/// it: a superseded job's consumer task may still be draining its stream,
/// and the generation check keeps it from mutating the new job's state.
struct JobState {
    phase: JobPhase,
    accumulator: ResultAccumulator,
    tracker: ProgressTracker,
    request: Option<JobRequest>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    generation: u64,
}

/// What applying one event means for the consumer loop
enum Applied {
    /// Keep consuming
    Continue,
    /// A terminal event was applied; stop consuming
    Terminal,
    /// A later submission owns the state now; stop without touching it
    Stale,
}

/// Streaming client for long-running batch enrichment jobs
///
/// Cloneable: all fields are Arc-wrapped, so clones share the same job
/// state and event channel. Only one job is active at a time; submitting a
/// new one discards all prior state unconditionally.
#[derive(Clone)]
pub struct EnrichmentClient {
    /// Client configuration (wrapped in Arc for sharing across tasks)
    config: Arc<ClientConfig>,
    /// Shared HTTP client for job submission
    http: reqwest::Client,
    /// Active job state (phase, accumulator, tracker)
    state: Arc<RwLock<JobState>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<JobEvent>,
    /// Cancellation token of the active job's consumer task
    ///
    /// Lock order: `active` before `state`, everywhere both are held
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl EnrichmentClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration fails validation and
    /// [`Error::Network`] if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity);
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
            state: Arc::new(RwLock::new(JobState {
                phase: JobPhase::Idle,
                accumulator: ResultAccumulator::new(),
                tracker: ProgressTracker::new(),
                request: None,
                started_at: None,
                finished_at: None,
                generation: 0,
            })),
            event_tx,
            active: Arc::new(Mutex::new(None)),
        })
    }

    /// Submit a job, superseding any in-flight one
    ///
    /// Validation happens first and fails fast without contacting the
    /// collaborator or touching existing state. On success the previous
    /// job's transport is abandoned, all accumulated state is reset, and a
    /// single consumer task is spawned for the new stream. There is no
    /// queue of pending submissions: a later submission always wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the request violates its local
    /// constraints; the active job (if any) is left untouched.
    pub async fn submit(&self, request: JobRequest) -> Result<()> {
        request.validate()?;

        let token = CancellationToken::new();

        // Generation bump, token swap, and state takeover happen under both
        // locks as one step, so two racing submissions cannot interleave and
        // leave the live generation holding a cancelled token.
        let generation = {
            let mut active = self.active.lock().await;
            let mut state = self.state.write().await;
            let generation = state.generation + 1;
            state.generation = generation;
            state.phase = JobPhase::Submitting;
            state.accumulator.reset();
            state.tracker.reset();
            state.request = Some(request.clone());
            state.started_at = Some(Utc::now());
            state.finished_at = None;
            // Abandon the previous transport now that the state is ours
            if let Some(previous) = active.replace(token.clone()) {
                previous.cancel();
            }
            generation
        };
        self.event_tx
            .send(JobEvent::Submitted {
                base_numbers: request.phone_numbers.len(),
            })
            .ok();

        tracing::info!(
            generation,
            base_numbers = request.phone_numbers.len(),
            range_size = request.range_size,
            "submitting enrichment job"
        );

        let client = self.clone();
        tokio::spawn(async move {
            client.run_stream(generation, token, request).await;
        });

        Ok(())
    }

    /// Abandon the active job's transport
    ///
    /// No graceful cancel message is sent to the collaborator; closing the
    /// stream is the only cancellation primitive, and any buffered
    /// unterminated fragment is dropped. The job transitions to Failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoJob`] if no job has been submitted or the active
    /// job already reached a terminal phase.
    pub async fn cancel(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if self.state.read().await.phase.is_terminal() {
            // The token (if any) belongs to a finished job
            active.take();
            return Err(Error::NoJob);
        }
        match active.take() {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(Error::NoJob),
        }
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> JobPhase {
        self.state.read().await.phase.clone()
    }

    /// Immutable point-in-time view of the three categorized sequences
    ///
    /// Safe to call at any time, including mid-stream: batch application
    /// holds the write half of the same lock, so the snapshot never
    /// contains a partially-applied batch.
    pub async fn snapshot(&self) -> ResultSet {
        self.state.read().await.accumulator.snapshot()
    }

    /// Latest progress counters
    pub async fn progress(&self) -> JobProgress {
        self.state.read().await.tracker.current()
    }

    /// Full job status for display
    pub async fn status(&self) -> JobStatus {
        let state = self.state.read().await;
        let (age_range_count, other_ages_count, failed_count) = state.accumulator.counts();
        JobStatus {
            phase: state.phase.clone(),
            progress: state.tracker.current(),
            fraction: state.tracker.fraction(),
            age_range_count,
            other_ages_count,
            failed_count,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to job lifecycle events as a `Stream`
    pub fn event_stream(&self) -> BroadcastStream<JobEvent> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Export target-age matches as `(filename, csv_text)`
    ///
    /// The filename embeds the requested age bounds
    /// (`age-{min}-to-{max}.csv`), so a request must have been submitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoJob`] if no job has been submitted.
    pub async fn export_age_range(&self) -> Result<(String, String)> {
        let state = self.state.read().await;
        let request = state.request.as_ref().ok_or(Error::NoJob)?;
        let csv = export::matches_to_csv(&state.accumulator.snapshot().age_range);
        Ok((
            export::age_range_filename(request.min_age, request.max_age),
            csv,
        ))
    }

    /// Export other-age matches as `(filename, csv_text)`
    pub async fn export_other_ages(&self) -> (String, String) {
        let state = self.state.read().await;
        let csv = export::matches_to_csv(&state.accumulator.snapshot().other_ages);
        (export::other_ages_filename(), csv)
    }

    /// Export failed lookups as `(filename, csv_text)`
    pub async fn export_failed(&self) -> (String, String) {
        let state = self.state.read().await;
        let csv = export::failures_to_csv(&state.accumulator.snapshot().failed);
        (export::failed_filename(), csv)
    }

    /// Drive one job's stream to a terminal state
    async fn run_stream(self, generation: u64, token: CancellationToken, request: JobRequest) {
        match self.consume_stream(generation, &token, &request).await {
            // Terminal event already applied, or a later submission owns
            // the state; either way there is nothing left to record.
            Ok(Applied::Terminal) | Ok(Applied::Stale) => {}
            Ok(Applied::Continue) => {
                // Stream ended without a Complete/Error event
                self.fail_job(generation, "stream ended before a terminal event".to_string())
                    .await;
            }
            Err(Error::Server(message)) => {
                // The collaborator's message is surfaced verbatim
                tracing::warn!(generation, error = %message, "collaborator reported an error");
                self.fail_job(generation, message).await;
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "enrichment stream failed");
                self.fail_job(generation, e.to_string()).await;
            }
        }
    }

    /// Open the stream and apply its events strictly in arrival order
    async fn consume_stream(
        &self,
        generation: u64,
        token: &CancellationToken,
        request: &JobRequest,
    ) -> Result<Applied> {
        let response = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            result = self
                .http
                .post(self.config.endpoint.as_str())
                .json(request)
                .send() => result?,
        };
        let response = response.error_for_status()?;

        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                return Ok(Applied::Stale);
            }
            state.phase = JobPhase::Streaming;
        }
        self.event_tx.send(JobEvent::Streaming).ok();
        tracing::debug!(generation, "stream open");

        let mut framer = LineFramer::new(self.config.max_line_bytes);
        let mut chunks = response.bytes_stream();

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                next = chunks.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(Error::Network(e)),
                None => break,
            };

            for line in framer.push(&chunk)? {
                match parse_frame(&line) {
                    None => {
                        tracing::trace!(generation, line = %line, "ignoring non-frame line");
                    }
                    Some(Err(e)) => {
                        // Recovered locally: the offending line is skipped
                        // and the stream continues with the next line.
                        tracing::warn!(generation, line = %line, error = %e, "skipping malformed frame");
                    }
                    Some(Ok(event)) => match self.apply_event(generation, event).await? {
                        Applied::Continue => {}
                        terminal => {
                            let dropped = framer.finish();
                            if dropped > 0 {
                                tracing::debug!(
                                    generation,
                                    dropped,
                                    "dropped buffered bytes after terminal event"
                                );
                            }
                            return Ok(terminal);
                        }
                    },
                }
            }
        }

        let dropped = framer.finish();
        if dropped > 0 {
            tracing::debug!(generation, dropped, "discarding unterminated trailing frame");
        }
        Ok(Applied::Continue)
    }

    /// Apply one parsed event as a single non-preemptible step
    ///
    /// The write guard is held across the whole application, which is what
    /// gives batch application its atomicity with respect to snapshot
    /// reads. Events from a superseded job are detected here and dropped.
    ///
    /// A server-reported error event does not touch the state; it surfaces
    /// as [`Error::Server`] and fails the job through the common path.
    async fn apply_event(&self, generation: u64, event: StreamEvent) -> Result<Applied> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return Ok(Applied::Stale);
        }

        match event {
            StreamEvent::Progress {
                processed,
                total,
                rate_limit_hits,
                ..
            } => {
                // Legacy category counts are display hints only; the
                // accumulator stays the single source of truth for counts.
                state.tracker.apply(JobProgress {
                    processed,
                    total,
                    rate_limit_hits,
                });
                self.emit_progress(&state);
                Ok(Applied::Continue)
            }
            StreamEvent::Batch { data, progress } => {
                let (age_range, other_ages, failed) = state.accumulator.apply_batch(data);
                state.tracker.apply(progress);
                self.event_tx
                    .send(JobEvent::BatchApplied {
                        age_range,
                        other_ages,
                        failed,
                    })
                    .ok();
                self.emit_progress(&state);
                Ok(Applied::Continue)
            }
            StreamEvent::Complete {
                results,
                processed,
                rate_limit_hits,
            } => {
                if let Some(results) = results {
                    // Legacy whole-result delivery replaces everything
                    state.accumulator.replace_all(results);
                }
                let mut finals = state.tracker.current();
                if let Some(processed) = processed {
                    finals.processed = processed;
                }
                if let Some(rate_limit_hits) = rate_limit_hits {
                    finals.rate_limit_hits = rate_limit_hits;
                }
                state.tracker.apply(finals);

                state.phase = JobPhase::Completed;
                state.finished_at = Some(Utc::now());
                let (age_range, other_ages, failed) = state.accumulator.counts();
                tracing::info!(
                    generation,
                    age_range,
                    other_ages,
                    failed,
                    "enrichment job completed"
                );
                self.event_tx.send(JobEvent::Completed).ok();
                Ok(Applied::Terminal)
            }
            StreamEvent::Error { message } => Err(Error::Server(message)),
        }
    }

    /// Mark the job Failed unless a later submission already owns the state
    async fn fail_job(&self, generation: u64, error: String) {
        let mut state = self.state.write().await;
        if state.generation != generation || state.phase.is_terminal() {
            return;
        }
        state.phase = JobPhase::Failed {
            error: error.clone(),
        };
        state.finished_at = Some(Utc::now());
        drop(state);
        self.event_tx.send(JobEvent::Failed { error }).ok();
    }

    /// Emit the current progress triple to subscribers
    fn emit_progress(&self, state: &JobState) {
        let current = state.tracker.current();
        self.event_tx
            .send(JobEvent::Progress {
                processed: current.processed,
                total: current.total,
                rate_limit_hits: current.rate_limit_hits,
            })
            .ok();
    }
}
