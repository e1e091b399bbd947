//! Markdown report rendering and the two Markdown exporters.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use regcrawler_shared::{RegCrawlerError, Regulation, Result, WARNING_PREFIX};

use crate::Exporter;

/// Default file written by [`MarkdownFileExporter`].
pub const DEFAULT_MARKDOWN_FILE: &str = "regulatory_report.md";

const REPORT_HEADING: &str = "# 最新法規動態彙整 (Regulatory Update Summary)";
const UNTITLED: &str = "無標題";
const UNKNOWN_DATE: &str = "未知日期";
const NO_SUMMARY: &str = "無摘要";

/// Render the report with the current local time as its timestamp.
pub fn render_report(records: &[Regulation]) -> String {
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    render_markdown(records, &generated_at)
}

/// Render `records` as a Markdown report.
///
/// Failed summaries (warning-prefixed keypoints) are shown as a warning
/// callout with a link back to the original text.
pub fn render_markdown(records: &[Regulation], generated_at: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{REPORT_HEADING}\nGenerated on: {generated_at}\n\n"));

    for record in records {
        let title = non_empty_or(&record.title, UNTITLED);
        let date = non_empty_or(&record.date, UNKNOWN_DATE);
        let link = non_empty_or(&record.link, "#");
        let keypoints = non_empty_or(&record.keypoints, NO_SUMMARY);

        out.push_str(&format!("## [{title}]({link})\n"));
        out.push_str(&format!("**發布日期**: {date}\n\n"));

        if keypoints.starts_with(WARNING_PREFIX) {
            out.push_str(&format!("> [!WARNING]\n> {keypoints}\n"));
            out.push_str(&format!("> \n> [Original Text Link]({link})\n"));
        } else {
            out.push_str(keypoints);
            out.push('\n');
        }

        out.push_str("\n---\n\n");
    }

    out
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

// ---------------------------------------------------------------------------
// Exporters
// ---------------------------------------------------------------------------

/// Writes the Markdown report to a file.
#[derive(Debug, Default)]
pub struct MarkdownFileExporter;

impl Exporter for MarkdownFileExporter {
    fn export(&self, records: &[Regulation], output: Option<&Path>) -> Result<Option<PathBuf>> {
        let path = output.map_or_else(|| PathBuf::from(DEFAULT_MARKDOWN_FILE), Path::to_path_buf);
        info!(path = %path.display(), "generating Markdown report");

        std::fs::write(&path, render_report(records)).map_err(|e| RegCrawlerError::io(&path, e))?;

        info!(path = %path.display(), records = records.len(), "Markdown report saved");
        Ok(Some(path))
    }
}

/// Prints the Markdown report to stdout as plain text.
#[derive(Debug, Default)]
pub struct MarkdownStdoutExporter;

impl Exporter for MarkdownStdoutExporter {
    fn export(&self, records: &[Regulation], _output: Option<&Path>) -> Result<Option<PathBuf>> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(render_report(records).as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| RegCrawlerError::Export(format!("failed to write report to stdout: {e}")))?;
        Ok(None)
    }
}
