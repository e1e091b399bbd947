//! JSON export and reload of previous runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info};

use regcrawler_shared::{KeypointState, RegCrawlerError, Regulation, Result};

use crate::Exporter;

/// Default file written by [`JsonExporter`].
pub const DEFAULT_JSON_FILE: &str = "processed_regulations.json";

/// Writes records as a pretty-printed JSON array (4-space indent).
#[derive(Debug, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn export(&self, records: &[Regulation], output: Option<&Path>) -> Result<Option<PathBuf>> {
        let path = output.map_or_else(|| PathBuf::from(DEFAULT_JSON_FILE), Path::to_path_buf);
        let bytes = to_json(records)?;

        std::fs::write(&path, bytes).map_err(|e| RegCrawlerError::io(&path, e))?;

        info!(path = %path.display(), records = records.len(), "data saved");
        Ok(Some(path))
    }
}

/// Serialize records with 4-space indentation.
pub fn to_json(records: &[Regulation]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records
        .serialize(&mut ser)
        .map_err(|e| RegCrawlerError::Export(format!("failed to serialize records: {e}")))?;
    Ok(buf)
}

/// Read a JSON export written by a previous run.
pub fn load_json(path: &Path) -> Result<Vec<Regulation>> {
    let content = std::fs::read_to_string(path).map_err(|e| RegCrawlerError::io(path, e))?;
    let records: Vec<Regulation> = serde_json::from_str(&content)
        .map_err(|e| RegCrawlerError::parse(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), records = records.len(), "loaded previous export");
    Ok(records)
}

/// Map `link → keypoints` for records that carry a usable summary.
///
/// Failed, unprocessed and no-content records are left out so they are retried.
pub fn prior_summaries(records: Vec<Regulation>) -> HashMap<String, String> {
    records
        .into_iter()
        .filter(|r| !r.link.is_empty() && r.keypoint_state() == KeypointState::Summarized)
        .map(|r| (r.link, r.keypoints))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcrawler_shared::{NO_CONTENT_MARKER, failure_marker};

    fn record(link: &str, keypoints: &str) -> Regulation {
        Regulation {
            title: "公告".into(),
            date: "2024-05-01".into(),
            category: "法規命令".into(),
            link: link.into(),
            content: "內容".into(),
            keypoints: keypoints.into(),
        }
    }

    #[test]
    fn json_uses_four_space_indent_and_omits_empty_keypoints() {
        let json = String::from_utf8(to_json(&[record("https://x.test/1", "")]).unwrap()).unwrap();
        assert!(json.starts_with("[\n    {\n        \"title\": \"公告\""));
        assert!(!json.contains("keypoints"));
    }

    #[test]
    fn export_then_load() {
        let path = std::env::temp_dir().join(format!("rc-export-{}.json", uuid::Uuid::now_v7()));
        let records = vec![record("https://x.test/1", "- 摘要"), record("https://x.test/2", "")];

        let written = JsonExporter.export(&records, Some(&path)).unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));

        let loaded = load_json(&path).unwrap();
        assert_eq!(loaded, records);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let path = std::env::temp_dir().join(format!("rc-bad-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, "{not json").unwrap();

        let err = load_json(&path).unwrap_err();
        assert!(matches!(err, RegCrawlerError::Parse { .. }));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(load_json(&path).unwrap_err(), RegCrawlerError::Io { .. }));
    }

    #[test]
    fn prior_summaries_keep_only_usable_entries() {
        let prior = prior_summaries(vec![
            record("https://x.test/1", "- 摘要"),
            record("https://x.test/2", &failure_marker("HTTP 429")),
            record("https://x.test/3", ""),
            record("https://x.test/4", NO_CONTENT_MARKER),
            record("", "- orphan"),
        ]);

        assert_eq!(prior.len(), 1);
        assert_eq!(prior["https://x.test/1"], "- 摘要");
    }
}
