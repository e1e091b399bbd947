//! Gemini REST client implementing [`Summarizer`].
//!
//! Sends `generateContent` requests and returns the first candidate's text.
//! Non-success statuses are reported as `HTTP <code> <reason>: <body excerpt>`
//! so callers can recognize rate limiting from the fixed `HTTP <code>` prefix.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use regcrawler_shared::{GeminiConfig, RegCrawlerError, Result};

use crate::summarizer::Summarizer;

/// Longest error-body excerpt carried into an error message.
const ERROR_BODY_EXCERPT: usize = 300;

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, or empty.
    fn first_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegCrawlerError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Create a client from the `[gemini]` config section.
    pub fn from_config(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self> {
        Self::new(
            api_key,
            config.base_url.as_str(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-call request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip_all, fields(model = %model, prompt_len = prompt.len()))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RegCrawlerError::Summarize(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let excerpt: String = detail.chars().take(ERROR_BODY_EXCERPT).collect();
            // Status code sits right after "HTTP" so markers never need the body
            return Err(RegCrawlerError::Summarize(format!(
                "Gemini API returned HTTP {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                excerpt.trim()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RegCrawlerError::Summarize(format!("invalid response body: {e}")))?;

        let text = parsed.first_text();
        debug!(chars = text.chars().count(), "generation complete");
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RegCrawlerError::Cancelled),
            result = self.generate(model, prompt) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn from_config_uses_gemini_timeout() {
        let config = GeminiConfig {
            base_url: "https://gemini.test/v1beta/".into(),
            timeout_secs: 240,
            ..Default::default()
        };
        let client = GeminiClient::from_config("k", &config).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(240));
        assert_eq!(client.base_url(), "https://gemini.test/v1beta");
    }

    #[test]
    fn request_serializes_correctly() {
        let req = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"contents":[{"parts":[{"text":"hello"}]}]}"#);
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(parsed.first_text(), "");

        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(parsed.first_text(), "");
    }

    #[tokio::test]
    async fn returns_first_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "prompt body"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "- **標題**: 摘要"}, {"text": "ignored"}]}
                }]
            })))
            .mount(&server)
            .await;

        let text = client(&server)
            .summarize("gemini-test", "prompt body", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "- **標題**: 摘要");
    }

    #[tokio::test]
    async fn rate_limit_status_is_visible_in_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .summarize("gemini-test", "p", &CancellationToken::new())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP 429 Too Many Requests:"), "got: {msg}");
        assert!(msg.contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn status_code_precedes_body_excerpt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend retried 429 times"))
            .mount(&server)
            .await;

        let err = client(&server)
            .summarize("gemini-test", "p", &CancellationToken::new())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP 500 Internal Server Error: backend retried 429 times"), "got: {msg}");
        assert!(!msg.contains("HTTP 429"));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .summarize("gemini-test", "p", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegCrawlerError::Summarize(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(10))
                    .set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = client(&server)
            .summarize("gemini-test", "p", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RegCrawlerError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
