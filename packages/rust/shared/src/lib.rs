//! Shared types, error model, and configuration for RegCrawler.
//!
//! This crate is the foundation depended on by all other RegCrawler crates.
//! It provides:
//! - [`RegCrawlerError`]: the unified error type
//! - The [`Regulation`] record and its keypoint markers
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, GeminiConfig, PipelineConfig, PipelineSettings, ProcessorConfig,
    ReportConfig, SourceConfig, TransportConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{RegCrawlerError, Result};
pub use types::{
    EMPTY_RESPONSE_MARKER, ERROR_PREFIX, KeypointState, NO_CONTENT_MARKER, Regulation,
    WARNING_PREFIX, failure_marker,
};
