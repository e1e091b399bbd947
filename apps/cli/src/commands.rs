//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use regcrawler_core::{
    GeminiClient, PipelineOutcome, ProcessingStage, ProgressReporter, PromptTemplate,
    StreamProcessor, run_pipeline, spawn_shutdown_listener,
};
use regcrawler_crawler::Fetcher;
use regcrawler_report::{ExportFormat, export_records, load_json, prior_summaries};
use regcrawler_shared::{
    AppConfig, FetchConfig, PipelineConfig, ProcessorConfig, Regulation, init_config,
    load_config, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RegCrawler: regulatory update crawler and summarizer.
#[derive(Parser)]
#[command(
    name = "regcrawler",
    version,
    about = "Fetch the latest regulatory updates, summarize them with Gemini, and export a report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch, summarize, and export the latest regulatory updates.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `regcrawler run`. Unset flags fall back to the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Skip summarization and export the fetched records as they are.
    #[arg(long)]
    pub skip_ai: bool,

    /// Gemini model to use (e.g. gemini-2.0-flash, gemini-2.5-flash).
    #[arg(long)]
    pub model: Option<String>,

    /// Path to a custom prompt file containing a `%s` placeholder.
    #[arg(long)]
    pub prompt: Option<PathBuf>,

    /// Output format: markdown, json, or mdstdout.
    #[arg(long)]
    pub format: Option<String>,

    /// Output file name.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Previous JSON export; records summarized there are not summarized again.
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Accept invalid TLS certificates on document pages.
    #[arg(long)]
    pub insecure_tls: bool,
}

impl RunArgs {
    /// Apply flag overrides on top of the loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.gemini.model = model.clone();
        }
        if let Some(format) = &self.format {
            config.report.format = format.clone();
        }
        if let Some(output) = &self.output {
            config.report.output = Some(output.to_string_lossy().into_owned());
        }
        if self.insecure_tls {
            config.transport.insecure_content_tls = true;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "regcrawler=info",
        1 => "regcrawler=debug",
        _ => "regcrawler=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = load_config()?;
    args.apply(&mut config);

    // Credential check comes before any network activity
    let api_key = if args.skip_ai {
        None
    } else {
        Some(validate_api_key(&config)?)
    };

    let prompt = match &args.prompt {
        Some(path) => {
            let prompt = PromptTemplate::from_file(path)?;
            info!(path = %path.display(), "loaded custom prompt");
            prompt
        }
        None => PromptTemplate::default(),
    };

    let prior = match &args.resume {
        Some(path) => {
            let prior = prior_summaries(load_json(path)?);
            info!(path = %path.display(), summaries = prior.len(), "loaded previous summaries");
            prior
        }
        None => Default::default(),
    };

    let listing_url = Url::parse(&config.source.listing_url)
        .map_err(|e| eyre!("invalid listing URL '{}': {e}", config.source.listing_url))?;

    let fetcher = Fetcher::new(FetchConfig::from(&config))?.with_prior_summaries(prior);

    let stage = match api_key {
        Some(key) => {
            let client = GeminiClient::from_config(key, &config.gemini)?;
            let processor = StreamProcessor::new(Arc::new(client), ProcessorConfig::from(&config))
                .with_prompt(prompt);
            ProcessingStage::Summarize(processor)
        }
        None => ProcessingStage::PassThrough,
    };

    info!(
        listing_url = %listing_url,
        model = %config.gemini.model,
        skip_ai = args.skip_ai,
        "starting regulatory crawl"
    );

    let cancel = CancellationToken::new();
    let listener = spawn_shutdown_listener(cancel.clone());

    let reporter = CliProgress::new();
    let result = run_pipeline(
        fetcher,
        listing_url,
        stage,
        &PipelineConfig::from(&config),
        cancel,
        &reporter,
    )
    .await;
    listener.abort();
    reporter.finish();
    let outcome = result?;

    let format = ExportFormat::parse_or_default(&config.report.format);
    let output = config.report.output.as_deref().map(Path::new);
    let written = export_records(&outcome.records, format, output)?;

    let summary = render_summary(&outcome, written.as_deref());
    if format == ExportFormat::MarkdownStdout {
        eprint!("{summary}");
    } else {
        print!("{summary}");
    }

    Ok(())
}

/// Human-readable run summary.
fn render_summary(outcome: &PipelineOutcome, written: Option<&Path>) -> String {
    let process = &outcome.process;
    let mut lines = vec![
        String::new(),
        format!("  Collected:  {}", outcome.records.len()),
        format!("  Summarized: {}", process.summarized),
        format!("  Skipped:    {}", process.already_done + process.no_content),
        format!("  Failed:     {}", process.failed + process.empty_responses),
    ];
    if process.rate_limited {
        lines.push("  Stopped:    rate limited by the Gemini API".into());
    } else if process.cancelled {
        lines.push("  Stopped:    interrupted".into());
    }
    if let Some(path) = written {
        lines.push(format!("  Report:     {}", path.display()));
    }
    lines.push(format!("  Time:       {:.1}s", outcome.elapsed.as_secs_f64()));
    lines.push(String::new());
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_collected(&self, record: &Regulation, collected: usize) {
        self.spinner
            .set_message(format!("[{collected}] {}", record.title));
    }

    fn done(&self, _outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_override_config() {
        let cli = Cli::parse_from([
            "regcrawler",
            "run",
            "--model",
            "gemini-2.0-flash",
            "--format",
            "json",
            "-o",
            "out.json",
            "--insecure-tls",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.report.format, "json");
        assert_eq!(config.report.output.as_deref(), Some("out.json"));
        assert!(config.transport.insecure_content_tls);
        assert!(!args.skip_ai);
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let mut config = AppConfig::default();
        RunArgs::default().apply(&mut config);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.report.format, "markdown");
        assert!(config.report.output.is_none());
    }
}
