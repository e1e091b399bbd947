//! Pipeline orchestration and summarization for RegCrawler.
//!
//! This crate ties the fetcher, the summarizing stream processor and the
//! collector together into one bounded, cancellable run ([`run_pipeline`]).

pub mod gemini;
pub mod pipeline;
pub mod processor;
pub mod summarizer;

pub use gemini::GeminiClient;
pub use pipeline::{
    PipelineOutcome, ProcessingStage, ProgressReporter, SilentProgress, run_pipeline,
    spawn_shutdown_listener,
};
pub use processor::{
    Disposition, ProcessReport, RateLimitPolicy, RecheckPolicy, StreamProcessor,
    forward_unprocessed,
};
pub use summarizer::{DEFAULT_PROMPT, PromptTemplate, Summarizer};
