//! Listing fetcher: the first pipeline stage.
//!
//! Retrieves the listing page, turns qualifying rows into [`Regulation`]
//! records (normalizing dates and links), extracts each record's document
//! text, and emits records in document order into a bounded queue.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use regcrawler_shared::{FetchConfig, RegCrawlerError, Regulation, Result};

use crate::extractor::ContentExtractor;
use crate::listing::{self, ListingRow};
use crate::normalize::{resolve_link, to_gregorian_date};

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Summary of a completed fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Records handed to the downstream queue.
    pub emitted: usize,
    /// Table rows that did not qualify as records.
    pub rows_skipped: usize,
    /// Emitted records whose content came back empty.
    pub empty_content: usize,
    /// Emitted records seeded with keypoints from a previous run.
    pub seeded: usize,
    /// The downstream queue closed before every row was emitted.
    pub downstream_closed: bool,
    /// Total duration of the fetch.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Produces regulation records from the listing page.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
    extractor: ContentExtractor,
    /// Keypoints from a previous run, keyed by absolute link.
    prior: HashMap<String, String>,
}

impl Fetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RegCrawlerError::Network(format!("failed to build HTTP client: {e}")))?;

        let extractor = ContentExtractor::new(&config)?;

        Ok(Self {
            config,
            client,
            extractor,
            prior: HashMap::new(),
        })
    }

    /// Seed records with keypoints from a previous run (`link → keypoints`).
    pub fn with_prior_summaries(mut self, prior: HashMap<String, String>) -> Self {
        self.prior = prior;
        self
    }

    /// Fetch the listing and emit one record per qualifying row into `sink`.
    ///
    /// `sink` is consumed, so the queue closes exactly once when this returns.
    /// A listing transport or status failure is returned before anything is
    /// emitted. Per-record content failures only leave `content` empty.
    #[instrument(skip_all, fields(listing_url = %listing_url))]
    pub async fn fetch(
        &self,
        listing_url: &Url,
        sink: mpsc::Sender<Regulation>,
    ) -> Result<FetchReport> {
        let start = Instant::now();
        info!("fetching regulation listing");

        let body = self.fetch_listing(listing_url).await?;
        let parsed = listing::parse_listing(&body);

        let mut report = FetchReport {
            rows_skipped: parsed.skipped,
            ..Default::default()
        };

        debug!(
            rows = parsed.rows.len(),
            skipped = report.rows_skipped,
            "listing parsed"
        );

        for row in parsed.rows {
            let record = self.build_record(row).await;

            if record.content.is_empty() {
                report.empty_content += 1;
            }
            if !record.keypoints.is_empty() {
                report.seeded += 1;
            }

            debug!(title = %record.title, date = %record.date, "emitting record");
            if sink.send(record).await.is_err() {
                warn!(emitted = report.emitted, "downstream queue closed, stopping fetch");
                report.downstream_closed = true;
                break;
            }
            report.emitted += 1;
        }

        report.duration = start.elapsed();

        info!(
            emitted = report.emitted,
            rows_skipped = report.rows_skipped,
            empty_content = report.empty_content,
            duration_ms = report.duration.as_millis(),
            "fetch completed"
        );

        Ok(report)
    }

    async fn fetch_listing(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
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

    /// Normalize a listing row and retrieve its content.
    async fn build_record(&self, row: ListingRow) -> Regulation {
        let link = resolve_link(&row.href, &self.config.base_origin, &self.config.listing_dir);
        let content = self.extractor.extract(&link).await;
        let keypoints = self.prior.get(&link).cloned().unwrap_or_default();

        Regulation {
            title: row.title,
            date: to_gregorian_date(&row.date),
            category: row.category,
            link,
            content,
            keypoints,
        }
    }
}
