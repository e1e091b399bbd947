//! Report exporters for collected regulation records.
//!
//! - [`json`]: JSON export, reload, and prior-summary extraction
//! - [`markdown`]: Markdown report rendering (file or stdout)

pub mod json;
pub mod markdown;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use regcrawler_shared::{RegCrawlerError, Regulation, Result};

pub use json::{DEFAULT_JSON_FILE, JsonExporter, load_json, prior_summaries, to_json};
pub use markdown::{
    DEFAULT_MARKDOWN_FILE, MarkdownFileExporter, MarkdownStdoutExporter, render_markdown,
    render_report,
};

/// Hands a finalized, ordered record list to some output.
pub trait Exporter {
    /// Export `records`; `output` overrides the exporter's default target.
    ///
    /// Returns the written file, or `None` when the target is not a file.
    fn export(&self, records: &[Regulation], output: Option<&Path>) -> Result<Option<PathBuf>>;
}

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Json,
    #[default]
    Markdown,
    MarkdownStdout,
}

impl ExportFormat {
    /// Parse a format name, falling back to Markdown with a warning.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(format = %name, "unknown format, defaulting to markdown");
            Self::Markdown
        })
    }

    /// The exporter for this format.
    pub fn exporter(self) -> Box<dyn Exporter> {
        match self {
            Self::Json => Box::new(JsonExporter),
            Self::Markdown => Box::new(MarkdownFileExporter),
            Self::MarkdownStdout => Box::new(MarkdownStdoutExporter),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::MarkdownStdout => "mdstdout",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = RegCrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "mdstdout" => Ok(Self::MarkdownStdout),
            other => Err(RegCrawlerError::validation(format!(
                "unknown export format '{other}' (expected json, markdown or mdstdout)"
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export `records` in `format`, skipping an empty collection.
pub fn export_records(
    records: &[Regulation],
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        warn!("no regulations collected, nothing to export");
        return Ok(None);
    }

    info!(records = records.len(), format = %format, "exporting records");
    format.exporter().export(records, output)
}
