//! End-to-end crawl pipeline: listing → fetcher → queue A → processor → queue B → collector.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Span, field, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use regcrawler_crawler::{FetchReport, Fetcher};
use regcrawler_shared::{PipelineConfig, RegCrawlerError, Regulation, Result};

use crate::processor::{ProcessReport, StreamProcessor, forward_unprocessed};

/// What runs between the two queues.
pub enum ProcessingStage {
    /// Summarize records with the given processor.
    Summarize(StreamProcessor),
    /// Forward records unchanged (summarization disabled).
    PassThrough,
}

impl ProcessingStage {
    fn name(&self) -> &'static str {
        match self {
            Self::Summarize(_) => "summarize",
            Self::PassThrough => "pass-through",
        }
    }
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Time-ordered identifier of this run.
    pub run_id: Uuid,
    /// Collected records, in processor emission order.
    pub records: Vec<Regulation>,
    pub fetch: FetchReport,
    pub process: ProcessReport,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for every record the collector receives.
    fn record_collected(&self, record: &Regulation, collected: usize);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_collected(&self, _record: &Regulation, _collected: usize) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

/// Run the fetcher and processing stage concurrently and collect the output.
///
/// Both stage tasks are always joined before returning. A fetch failure
/// (the listing could not be retrieved) is returned as `Err`; early stops
/// from rate limiting or cancellation are reported in the outcome.
#[instrument(skip_all, fields(run_id = field::Empty, listing_url = %listing_url, stage = stage.name()))]
pub async fn run_pipeline(
    fetcher: Fetcher,
    listing_url: Url,
    stage: ProcessingStage,
    config: &PipelineConfig,
    cancel: CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutcome> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    Span::current().record("run_id", field::display(run_id));

    let capacity = config.queue_capacity.max(1);
    info!(capacity, "starting pipeline");

    let (fetch_tx, fetch_rx) = mpsc::channel(capacity);
    let (process_tx, mut process_rx) = mpsc::channel(capacity);

    progress.phase("Fetching regulation listing");
    let fetch_task: JoinHandle<Result<FetchReport>> =
        tokio::spawn(async move { fetcher.fetch(&listing_url, fetch_tx).await });

    let process_cancel = cancel.clone();
    let process_task: JoinHandle<Result<ProcessReport>> = tokio::spawn(async move {
        match stage {
            ProcessingStage::Summarize(processor) => {
                processor.process(&process_cancel, fetch_rx, process_tx).await
            }
            ProcessingStage::PassThrough => {
                forward_unprocessed(&process_cancel, fetch_rx, process_tx).await
            }
        }
    });

    let mut records = Vec::new();
    while let Some(record) = process_rx.recv().await {
        if records.is_empty() {
            progress.phase("Collecting records");
        }
        records.push(record);
        if let Some(last) = records.last() {
            progress.record_collected(last, records.len());
        }
    }

    let fetch = join_stage(fetch_task.await, "fetcher");
    let process = join_stage(process_task.await, "processor");
    let fetch = fetch?;
    let process = process?;

    let outcome = PipelineOutcome {
        run_id,
        records,
        fetch,
        process,
        elapsed: start.elapsed(),
    };

    progress.done(&outcome);

    info!(
        collected = outcome.records.len(),
        fetched = outcome.fetch.emitted,
        summarized = outcome.process.summarized,
        failed = outcome.process.failed,
        rate_limited = outcome.process.rate_limited,
        cancelled = outcome.process.cancelled,
        elapsed_ms = outcome.elapsed.as_millis(),
        "pipeline complete"
    );

    Ok(outcome)
}

fn join_stage<T>(joined: std::result::Result<Result<T>, JoinError>, stage: &str) -> Result<T> {
    joined.map_err(|e| RegCrawlerError::Task(format!("{stage} task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Cancel `token` when the process receives Ctrl-C (or SIGTERM on Unix).
pub fn spawn_shutdown_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                warn!("shutdown signal received, stopping after the current record");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
            }
        }
        Err(e) => {
            warn!(error = %e, "could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use regcrawler_shared::{FetchConfig, NO_CONTENT_MARKER};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::processor::tests::{FakeSummarizer, processor_config};
    use crate::summarizer::PromptTemplate;

    fn fetch_config(server: &MockServer) -> FetchConfig {
        FetchConfig {
            listing_url: format!("{}/News/NewsList.aspx", server.uri()),
            base_origin: server.uri(),
            listing_dir: "/News/".into(),
            gazette_origin: server.uri(),
            user_agent: "regcrawler-test/1.0".into(),
            timeout_secs: 5,
            insecure_content_tls: false,
        }
    }

    /// Mount a listing of `count` rows; row `i` links to `msgid=i`.
    async fn mount_site(server: &MockServer, count: usize, empty: &[usize]) {
        let mut html = String::from("<table>");
        for i in 1..=count {
            html.push_str(&format!(
                r#"<tr><td>{i}</td><td>113-05-0{}</td><td>公告</td><td><a id="hlkNAME" href="NewsDetail.aspx?msgid={i}">R{i}</a></td></tr>"#,
                i % 9 + 1
            ));
        }
        html.push_str("</table>");

        Mock::given(method("GET"))
            .and(path("/News/NewsList.aspx"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(server)
            .await;

        for i in 1..=count {
            let body = if empty.contains(&i) {
                "<p>nothing here</p>".to_string()
            } else {
                format!(r#"<div class="content">c{i}</div>"#)
            };
            Mock::given(method("GET"))
                .and(path("/News/NewsDetail.aspx"))
                .and(query_param("msgid", i.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(server)
                .await;
        }
    }

    fn summarize_stage(fake: Arc<FakeSummarizer>) -> ProcessingStage {
        ProcessingStage::Summarize(
            StreamProcessor::new(fake, processor_config())
                .with_prompt(PromptTemplate::new("%s").unwrap()),
        )
    }

    struct CountingProgress {
        collected: AtomicUsize,
        done: AtomicUsize,
    }

    impl ProgressReporter for CountingProgress {
        fn phase(&self, _name: &str) {}
        fn record_collected(&self, _record: &Regulation, collected: usize) {
            self.collected.store(collected, Ordering::SeqCst);
        }
        fn done(&self, _outcome: &PipelineOutcome) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn end_to_end_preserves_order() {
        let server = MockServer::start().await;
        mount_site(&server, 8, &[4]).await;

        let config = fetch_config(&server);
        let url = Url::parse(&config.listing_url).unwrap();
        let fake = Arc::new(FakeSummarizer::echo());
        let progress = CountingProgress {
            collected: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        };

        let outcome = run_pipeline(
            Fetcher::new(config).unwrap(),
            url,
            summarize_stage(fake.clone()),
            &PipelineConfig { queue_capacity: 2 },
            CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8"]);
        assert_eq!(outcome.records[3].keypoints, NO_CONTENT_MARKER);
        assert_eq!(outcome.records[0].keypoints, "- **標題**: c1");
        assert_eq!(outcome.records[0].date, "2024-05-02");
        assert_eq!(fake.calls(), 7);
        assert_eq!(outcome.fetch.emitted, 8);
        assert_eq!(outcome.process.summarized, 7);
        assert_eq!(progress.collected.load(Ordering::SeqCst), 8);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_drops_remaining_records() {
        let server = MockServer::start().await;
        mount_site(&server, 5, &[]).await;

        let config = fetch_config(&server);
        let url = Url::parse(&config.listing_url).unwrap();
        let fake = Arc::new(FakeSummarizer::new(|prompt| {
            if prompt == "c3" {
                Err(RegCrawlerError::Summarize("Gemini API returned HTTP 429 Too Many Requests: ".into()))
            } else {
                Ok(format!("ok {prompt}"))
            }
        }));

        let outcome = run_pipeline(
            Fetcher::new(config).unwrap(),
            url,
            summarize_stage(fake),
            &PipelineConfig { queue_capacity: 30 },
            CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .unwrap();

        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["R1", "R2", "R3"]);
        assert!(outcome.records[2].keypoints.contains("429"));
        assert!(outcome.process.rate_limited);
    }

    #[tokio::test]
    async fn pass_through_leaves_keypoints_empty() {
        let server = MockServer::start().await;
        mount_site(&server, 3, &[2]).await;

        let config = fetch_config(&server);
        let url = Url::parse(&config.listing_url).unwrap();

        let outcome = run_pipeline(
            Fetcher::new(config).unwrap(),
            url,
            ProcessingStage::PassThrough,
            &PipelineConfig { queue_capacity: 30 },
            CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.records.iter().all(|r| r.keypoints.is_empty()));
        assert!(outcome.records[1].content.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_is_returned_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/News/NewsList.aspx"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = fetch_config(&server);
        let url = Url::parse(&config.listing_url).unwrap();
        let fake = Arc::new(FakeSummarizer::echo());

        let err = run_pipeline(
            Fetcher::new(config).unwrap(),
            url,
            summarize_stage(fake.clone()),
            &PipelineConfig { queue_capacity: 30 },
            CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RegCrawlerError::Network(_)));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_yields_partial_outcome() {
        let server = MockServer::start().await;
        mount_site(&server, 3, &[]).await;

        let config = fetch_config(&server);
        let url = Url::parse(&config.listing_url).unwrap();
        let fake = Arc::new(FakeSummarizer::echo());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_pipeline(
            Fetcher::new(config).unwrap(),
            url,
            summarize_stage(fake.clone()),
            &PipelineConfig { queue_capacity: 30 },
            cancel,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(outcome.records.is_empty());
        assert!(outcome.process.cancelled);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn shutdown_listener_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = spawn_shutdown_listener(token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
