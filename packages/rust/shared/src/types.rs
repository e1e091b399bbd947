//! Core domain types: the regulation record flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// Prefix marking a keypoints value as a failed summarization.
pub const WARNING_PREFIX: &str = "⚠️";

/// Legacy failure prefix, still honored when deciding whether to re-summarize.
pub const ERROR_PREFIX: &str = "Error";

/// Keypoints for a record whose document text could not be retrieved.
pub const NO_CONTENT_MARKER: &str = "No content available to summarize.";

/// Keypoints for a summarization call that succeeded with no text.
pub const EMPTY_RESPONSE_MARKER: &str = "⚠️ Summary unavailable: Empty response from API.";

/// Build the keypoints marker for a failed summarization call.
pub fn failure_marker(detail: impl std::fmt::Display) -> String {
    format!("{WARNING_PREFIX} Summary unavailable: Error ({detail})")
}

// ---------------------------------------------------------------------------
// Regulation
// ---------------------------------------------------------------------------

/// One regulatory-update item.
///
/// Created by the fetcher, finalized (keypoints) by the stream processor,
/// then handed read-only to the reporting stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regulation {
    #[serde(default)]
    pub title: String,
    /// Gregorian date string (`YYYY-MM-DD` when the source date was convertible).
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    /// Absolute URL of the announcement.
    #[serde(default)]
    pub link: String,
    /// Raw extracted document text; empty when extraction failed.
    #[serde(default)]
    pub content: String,
    /// Summary text, a failure marker, or empty when not yet processed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keypoints: String,
}

impl Regulation {
    /// Classify the current keypoints value.
    pub fn keypoint_state(&self) -> KeypointState {
        KeypointState::of(&self.keypoints)
    }
}

// ---------------------------------------------------------------------------
// KeypointState
// ---------------------------------------------------------------------------

/// Classified view over the `keypoints` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointState {
    /// Not yet seen by the stream processor.
    Unprocessed,
    /// Carries the no-content marker; summarized once content is available.
    NoContent,
    /// Carries a summary.
    Summarized,
    /// Summarization failed; the value is a warning or legacy error marker.
    Failed,
}

impl KeypointState {
    /// Classify a raw keypoints value.
    pub fn of(keypoints: &str) -> Self {
        if keypoints.is_empty() {
            Self::Unprocessed
        } else if keypoints == NO_CONTENT_MARKER {
            Self::NoContent
        } else if keypoints.starts_with(WARNING_PREFIX) || keypoints.starts_with(ERROR_PREFIX) {
            Self::Failed
        } else {
            Self::Summarized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_states() {
        assert_eq!(KeypointState::of(""), KeypointState::Unprocessed);
        assert_eq!(KeypointState::of("- **標題**: x"), KeypointState::Summarized);
        assert_eq!(KeypointState::of(NO_CONTENT_MARKER), KeypointState::NoContent);
        assert_eq!(KeypointState::of(EMPTY_RESPONSE_MARKER), KeypointState::Failed);
        assert_eq!(KeypointState::of("Error: quota"), KeypointState::Failed);
        assert_eq!(
            KeypointState::of(&failure_marker("HTTP 500")),
            KeypointState::Failed
        );
    }

    #[test]
    fn failure_marker_format() {
        assert_eq!(
            failure_marker("boom"),
            "⚠️ Summary unavailable: Error (boom)"
        );
    }

    #[test]
    fn empty_keypoints_omitted_from_json() {
        let reg = Regulation {
            title: "t".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&reg).unwrap();
        assert!(!json.contains("keypoints"));

        let back: Regulation = serde_json::from_str(r#"{"title":"t","link":"l"}"#).unwrap();
        assert_eq!(back.title, "t");
        assert!(back.keypoints.is_empty());
        assert!(back.content.is_empty());
    }
}
