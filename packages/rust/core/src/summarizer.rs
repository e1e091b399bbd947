//! Summarization seam and prompt template.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use regcrawler_shared::{RegCrawlerError, Result};

/// Placeholder replaced by the record content.
pub const CONTENT_PLACEHOLDER: &str = "%s";

/// Default prompt: structured Markdown key points in Traditional Chinese.
pub const DEFAULT_PROMPT: &str = "
你是一位法律專家。請分析以下法規文本，並提取繁體中文的重點。
請以 Markdown 格式提供結構化的摘要。
除非必要，只能輸出台灣的正體中文。
如果提供的資料不完整，請你搜尋網路補充相關資訊。
Text:
%s
輸出格式:
- **標題**: [Brief Title in Traditional Chinese]
- **法規類別**: [Category of the regulation in Traditional Chinese]
- **法規依據**: [Legal basis of the regulation in Traditional Chinese]
- **狀態**: [Status of the regulation in Traditional Chinese]
- **主要變革**: [List of main changes in Traditional Chinese]
- **影響對象**: [Who is affected in Traditional Chinese]
- **生效日期**: [Date if mentioned]
";

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// An external text-generation call.
///
/// Implementations should return promptly with [`RegCrawlerError::Cancelled`]
/// once `cancel` fires. An empty `Ok` string means the call succeeded but
/// produced no text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, model: &str, prompt: &str, cancel: &CancellationToken)
    -> Result<String>;
}

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// A prompt with a `%s` slot for the document content.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wrap a template; it must contain the `%s` placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(CONTENT_PLACEHOLDER) {
            return Err(RegCrawlerError::validation(format!(
                "prompt template has no '{CONTENT_PLACEHOLDER}' placeholder for the content"
            )));
        }
        Ok(Self { template })
    }

    /// Load a template from a text file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RegCrawlerError::io(path, e))?;
        Self::new(content)
    }

    /// Substitute `content` into the first placeholder.
    pub fn render(&self, content: &str) -> String {
        self.template.replacen(CONTENT_PLACEHOLDER, content, 1)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT.to_string(),
        }
    }
}
