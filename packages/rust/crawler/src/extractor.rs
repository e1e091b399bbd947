//! Document content extraction.
//!
//! Given a document URL, locate its substantive text:
//! 1. follow a "web text version" link if the page exposes one,
//! 2. otherwise probe the known container layouts,
//! 3. otherwise give up with an empty string.
//!
//! Every failure degrades to an empty string with a logged warning.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use regcrawler_shared::{FetchConfig, RegCrawlerError, Result};

use crate::layouts::LayoutRegistry;
use crate::listing::element_text;

/// Link text/title identifying the plain-text rendition of a gazette entry.
const WEB_TEXT_PHRASE: &str = "網頁文字版";

static WEB_TEXT_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&format!("a[title*='{WEB_TEXT_PHRASE}']")).expect("valid selector")
});
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid selector"));

/// What a document page offers, decided before any follow-up request.
#[derive(Debug, Default)]
struct PageScan {
    /// Absolute URL of the web-text version, if linked.
    web_text_url: Option<String>,
    /// First matching container layout and its text.
    container: Option<(String, String)>,
}

/// Fetches document pages and pulls out their main text.
pub struct ContentExtractor {
    client: Client,
    gazette_origin: String,
    layouts: LayoutRegistry,
}

impl ContentExtractor {
    /// Create an extractor with the built-in layouts.
    ///
    /// Certificate validation is strict unless `insecure_content_tls` is set.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs));

        if config.insecure_content_tls {
            warn!(
                "TLS certificate validation is DISABLED for document pages; \
                 responses from these hosts can be spoofed"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            RegCrawlerError::Network(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            gazette_origin: config.gazette_origin.trim_end_matches('/').to_string(),
            layouts: LayoutRegistry::new(),
        })
    }

    /// Replace the container layouts.
    pub fn with_layouts(mut self, layouts: LayoutRegistry) -> Self {
        self.layouts = layouts;
        self
    }

    /// Extract the document text at `url`; empty on any failure.
    pub async fn extract(&self, url: &str) -> String {
        match self.try_extract(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%url, error = %e, "content extraction failed");
                String::new()
            }
        }
    }

    async fn try_extract(&self, url: &str) -> Result<String> {
        let body = self.get_text(url).await?;
        let scan = scan_page(&body, url, &self.gazette_origin, &self.layouts);

        if let Some(target) = scan.web_text_url {
            debug!(%url, %target, "following web text version");
            match self.get_text(&target).await {
                Ok(text_page) => return Ok(document_text(&text_page)),
                Err(e) => {
                    warn!(%target, error = %e, "web text version unavailable, trying containers");
                }
            }
        }

        match scan.container {
            Some((layout, text)) => {
                debug!(%url, layout = %layout, chars = text.chars().count(), "extracted content");
                Ok(text)
            }
            None => {
                info!(%url, "no known content container");
                Ok(String::new())
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RegCrawlerError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegCrawlerError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| RegCrawlerError::Network(format!("{url}: body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Page inspection (sync; `Html` must not live across an await)
// ---------------------------------------------------------------------------

fn scan_page(body: &str, page_url: &str, gazette_origin: &str, layouts: &LayoutRegistry) -> PageScan {
    let doc = Html::parse_document(body);

    let web_text_url = find_web_text_href(&doc)
        .and_then(|href| resolve_web_text_href(&href, page_url, gazette_origin));

    let container = layouts
        .extract(&doc)
        .map(|(name, text)| (name.to_string(), text));

    PageScan {
        web_text_url,
        container,
    }
}

/// `href` of the web-text link: by title attribute first, then by link text.
fn find_web_text_href(doc: &Html) -> Option<String> {
    let by_title = doc.select(&WEB_TEXT_TITLE_SEL).next();
    let anchor = by_title.or_else(|| {
        doc.select(&ANCHOR_SEL)
            .find(|a| element_text(*a).contains(WEB_TEXT_PHRASE))
    })?;

    anchor.value().attr("href").map(|h| h.trim().to_string())
}

/// Root-relative targets live on the gazette origin; other relative targets
/// are resolved against the page they were found on.
fn resolve_web_text_href(href: &str, page_url: &str, gazette_origin: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if href.starts_with('/') {
        return Some(format!("{gazette_origin}{href}"));
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Whole-document text, trimmed.
fn document_text(body: &str) -> String {
    let doc = Html::parse_document(body);
    doc.root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
