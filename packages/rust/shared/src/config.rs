//! Application configuration for RegCrawler.
//!
//! User config lives at `~/.regcrawler/regcrawler.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegCrawlerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "regcrawler.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".regcrawler";

// ---------------------------------------------------------------------------
// Config structs (matching regcrawler.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing source and link resolution.
    #[serde(default)]
    pub source: SourceConfig,

    /// Gemini summarization settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Queue sizing, pacing and skip policies.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// HTTP transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Export defaults.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page listing the latest regulatory updates.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Origin prefixed to root-relative links.
    #[serde(default = "default_base_origin")]
    pub base_origin: String,

    /// Directory that bare relative links live under.
    #[serde(default = "default_listing_dir")]
    pub listing_dir: String,

    /// Origin prefixed to root-relative web-text links.
    #[serde(default = "default_gazette_origin")]
    pub gazette_origin: String,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            base_origin: default_base_origin(),
            listing_dir: default_listing_dir(),
            gazette_origin: default_gazette_origin(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_listing_url() -> String {
    "https://law.moj.gov.tw/News/NewsList.aspx".into()
}
fn default_base_origin() -> String {
    "https://law.moj.gov.tw".into()
}
fn default_listing_dir() -> String {
    "/News/".into()
}
fn default_gazette_origin() -> String {
    "https://gazette.nat.gov.tw".into()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36"
        .into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for summarization.
    #[serde(default = "default_model")]
    pub model: String,

    /// REST API base URL.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds for generation requests.
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_gemini_timeout_secs() -> u64 {
    180
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Capacity of each inter-stage queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delay in ms after each summarization call.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Error-text fragments that mean the API is rate limiting us.
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,

    /// Fragments marking a prior summary as outdated (re-summarize it).
    #[serde(default = "default_recheck_tokens")]
    pub recheck_tokens: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            pacing_ms: default_pacing_ms(),
            rate_limit_markers: default_rate_limit_markers(),
            recheck_tokens: default_recheck_tokens(),
        }
    }
}

fn default_queue_capacity() -> usize {
    30
}
fn default_pacing_ms() -> u64 {
    5_000
}
fn default_rate_limit_markers() -> Vec<String> {
    vec!["HTTP 429".into()]
}
fn default_recheck_tokens() -> Vec<String> {
    vec!["Affected Entities".into()]
}

/// `[transport]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates when fetching document pages.
    #[serde(default)]
    pub insecure_content_tls: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            insecure_content_tls: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Export format: "json", "markdown" or "mdstdout".
    #[serde(default = "default_format")]
    pub format: String,

    /// Output file; each exporter has its own default name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output: None,
        }
    }
}

fn default_format() -> String {
    "markdown".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetcher/extractor configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub listing_url: String,
    pub base_origin: String,
    pub listing_dir: String,
    pub gazette_origin: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Relaxed certificate validation for document pages (opt-in).
    pub insecure_content_tls: bool,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            listing_url: config.source.listing_url.clone(),
            base_origin: config.source.base_origin.clone(),
            listing_dir: config.source.listing_dir.clone(),
            gazette_origin: config.source.gazette_origin.clone(),
            user_agent: config.source.user_agent.clone(),
            timeout_secs: config.transport.timeout_secs,
            insecure_content_tls: config.transport.insecure_content_tls,
        }
    }
}

/// Runtime stream processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Model identifier passed to the summarizer.
    pub model: String,
    /// Delay in ms after each summarization call.
    pub pacing_ms: u64,
    pub rate_limit_markers: Vec<String>,
    pub recheck_tokens: Vec<String>,
}

impl From<&AppConfig> for ProcessorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.gemini.model.clone(),
            pacing_ms: config.pipeline.pacing_ms,
            rate_limit_markers: config.pipeline.rate_limit_markers.clone(),
            recheck_tokens: config.pipeline.recheck_tokens.clone(),
        }
    }
}

/// Runtime orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each inter-stage queue.
    pub queue_capacity: usize,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            queue_capacity: config.pipeline.queue_capacity.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.regcrawler/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RegCrawlerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.regcrawler/regcrawler.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RegCrawlerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        RegCrawlerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RegCrawlerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RegCrawlerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RegCrawlerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the Gemini API key from the configured env var.
///
/// Fails if the variable is unset or empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.gemini.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(RegCrawlerError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable, \
             e.g. export {var_name}='your_key_here'"
        ))),
    }
}
