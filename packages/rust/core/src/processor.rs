//! Stream processor: the summarization stage.
//!
//! Reads records from the fetcher queue, decides per record whether a
//! summarization call is needed, and forwards every handled record in
//! arrival order. A rate-limit failure ends the stream after the offending
//! record; every other failure is written into the record's keypoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use regcrawler_shared::{
    EMPTY_RESPONSE_MARKER, KeypointState, NO_CONTENT_MARKER, ProcessorConfig, Regulation, Result,
    failure_marker,
};

use crate::summarizer::{PromptTemplate, Summarizer};

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Decides whether an existing summary is outdated and must be redone.
#[derive(Debug, Clone, Default)]
pub struct RecheckPolicy {
    tokens: Vec<String>,
}

impl RecheckPolicy {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// True when `keypoints` contains any recheck token.
    pub fn needs_recheck(&self, keypoints: &str) -> bool {
        self.tokens
            .iter()
            .any(|t| !t.is_empty() && keypoints.contains(t.as_str()))
    }
}

/// Recognizes rate-limit failures from the summarizer's error text.
#[derive(Debug, Clone, Default)]
pub struct RateLimitPolicy {
    markers: Vec<String>,
}

impl RateLimitPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn is_rate_limited(&self, error_text: &str) -> bool {
        self.markers
            .iter()
            .any(|m| !m.is_empty() && error_text.contains(m.as_str()))
    }
}

/// What the processor does with one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No document text: mark it, no call.
    NoContent,
    /// Carries a current summary: forward unchanged.
    AlreadySummarized,
    /// Call the summarizer.
    NeedsSummary,
}

impl Disposition {
    pub fn of(record: &Regulation, recheck: &RecheckPolicy) -> Self {
        if record.content.is_empty() {
            return Self::NoContent;
        }
        match record.keypoint_state() {
            KeypointState::Summarized if !recheck.needs_recheck(&record.keypoints) => {
                Self::AlreadySummarized
            }
            _ => Self::NeedsSummary,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessReport
// ---------------------------------------------------------------------------

/// Outcome counts for one processing run.
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    /// Records written to the output queue.
    pub emitted: usize,
    pub summarized: usize,
    pub no_content: usize,
    pub already_done: usize,
    /// Calls that failed (rate limit included).
    pub failed: usize,
    pub empty_responses: usize,
    /// The stream stopped early on a rate-limit failure.
    pub rate_limited: bool,
    /// The stream stopped early on cancellation.
    pub cancelled: bool,
    pub duration: Duration,
}

impl ProcessReport {
    /// Whether the stream stopped before its input was exhausted.
    pub fn stopped_early(&self) -> bool {
        self.rate_limited || self.cancelled
    }
}

// ---------------------------------------------------------------------------
// StreamProcessor
// ---------------------------------------------------------------------------

/// Summarizes records flowing between two bounded queues.
pub struct StreamProcessor {
    summarizer: Arc<dyn Summarizer>,
    model: String,
    prompt: PromptTemplate,
    pacing: Duration,
    recheck: RecheckPolicy,
    rate_limit: RateLimitPolicy,
}

/// Result of handling a single record.
struct Handled {
    record: Regulation,
    called: bool,
    terminate: bool,
}

impl StreamProcessor {
    /// Create a processor using the default prompt.
    pub fn new(summarizer: Arc<dyn Summarizer>, config: ProcessorConfig) -> Self {
        Self {
            summarizer,
            model: config.model,
            prompt: PromptTemplate::default(),
            pacing: Duration::from_millis(config.pacing_ms),
            recheck: RecheckPolicy::new(config.recheck_tokens),
            rate_limit: RateLimitPolicy::new(config.rate_limit_markers),
        }
    }

    /// Replace the prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Drain `input`, forwarding each handled record to `output` in order.
    ///
    /// Both queue ends are consumed: `output` closes exactly once when this
    /// returns, and dropping `input` on an early stop lets the fetcher see
    /// that downstream has gone away.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        mut input: mpsc::Receiver<Regulation>,
        output: mpsc::Sender<Regulation>,
    ) -> Result<ProcessReport> {
        let start = Instant::now();
        let mut report = ProcessReport::default();

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let record = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = input.recv() => match next {
                    Some(record) => record,
                    None => break,
                },
            };

            let handled = self.handle(record, cancel, &mut report).await;

            if output.send(handled.record).await.is_err() {
                warn!(emitted = report.emitted, "output queue closed, stopping processor");
                break;
            }
            report.emitted += 1;

            if handled.terminate {
                report.rate_limited = true;
                warn!(emitted = report.emitted, "rate limited, terminating stream");
                break;
            }

            if handled.called && !self.pacing.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.pacing) => {}
                }
            }
        }

        if report.cancelled {
            info!(emitted = report.emitted, "processing cancelled");
        }

        report.duration = start.elapsed();

        info!(
            emitted = report.emitted,
            summarized = report.summarized,
            no_content = report.no_content,
            already_done = report.already_done,
            failed = report.failed,
            rate_limited = report.rate_limited,
            duration_ms = report.duration.as_millis(),
            "processing completed"
        );

        Ok(report)
    }

    async fn handle(
        &self,
        mut record: Regulation,
        cancel: &CancellationToken,
        report: &mut ProcessReport,
    ) -> Handled {
        match Disposition::of(&record, &self.recheck) {
            Disposition::NoContent => {
                debug!(title = %record.title, "no content, skipping summarization");
                record.keypoints = NO_CONTENT_MARKER.to_string();
                report.no_content += 1;
                Handled {
                    record,
                    called: false,
                    terminate: false,
                }
            }
            Disposition::AlreadySummarized => {
                debug!(title = %record.title, "already summarized");
                report.already_done += 1;
                Handled {
                    record,
                    called: false,
                    terminate: false,
                }
            }
            Disposition::NeedsSummary => {
                let prompt = self.prompt.render(&record.content);
                let mut terminate = false;

                match self.summarizer.summarize(&self.model, &prompt, cancel).await {
                    Ok(text) if text.trim().is_empty() => {
                        warn!(title = %record.title, "summarizer returned an empty response");
                        record.keypoints = EMPTY_RESPONSE_MARKER.to_string();
                        report.empty_responses += 1;
                    }
                    Ok(text) => {
                        debug!(title = %record.title, chars = text.chars().count(), "summarized");
                        record.keypoints = text;
                        report.summarized += 1;
                    }
                    Err(e) => {
                        let detail = e.to_string();
                        warn!(title = %record.title, error = %detail, "summarization failed");
                        record.keypoints = failure_marker(&detail);
                        report.failed += 1;
                        terminate = self.rate_limit.is_rate_limited(&detail);
                    }
                }

                Handled {
                    record,
                    called: true,
                    terminate,
                }
            }
        }
    }
}

/// Move every record from `input` to `output` unchanged.
///
/// Used when summarization is disabled. Stops early on cancellation or when
/// `output` closes.
#[instrument(skip_all)]
pub async fn forward_unprocessed(
    cancel: &CancellationToken,
    mut input: mpsc::Receiver<Regulation>,
    output: mpsc::Sender<Regulation>,
) -> Result<ProcessReport> {
    let start = Instant::now();
    let mut report = ProcessReport::default();

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            next = input.recv() => match next {
                Some(record) => record,
                None => break,
            },
        };

        if output.send(record).await.is_err() {
            warn!(emitted = report.emitted, "output queue closed, stopping forwarder");
            break;
        }
        report.emitted += 1;
    }

    report.duration = start.elapsed();
    debug!(emitted = report.emitted, "forwarded records without summarization");
    Ok(report)
}
