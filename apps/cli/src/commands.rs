//! CLI definition, job wiring, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use contentpipe_core::jobs::{
    CompanyIntro, GenerateArticle, GenerateFaq, MarkdownToHtml, NoindexReport, PublishInstagram,
    PublishMedium, PublishWordPress, ScrapeContent, SeedReport, check_sitemaps, discover_urls,
    seed_urls,
};
use contentpipe_core::{
    CancelSignal, JobDefinition, Outcome, Processor, RecordOutcome, RunOptions, RunProgress,
    RunSummary, Runner,
};
use contentpipe_formula::Formula;
use contentpipe_publish::{InstagramTarget, MediumTarget, WordPressTarget};
use contentpipe_scrape::HttpFetcher;
use contentpipe_shared::{
    AppConfig, PollConfig, UniformRandom, build_client, init_config, load_config, load_config_from,
};
use contentpipe_storage::{RecordSource, open_store};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contentpipe: move content records through scraping, generation and publishing.
#[derive(Parser)]
#[command(
    name = "contentpipe",
    version,
    about = "Run one content pipeline job over the records its filter selects.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Job to run.
    #[arg(value_enum, required_unless_present = "init_config")]
    pub job: Option<Job>,

    /// Override the job's record filter formula.
    #[arg(long, short)]
    pub formula: Option<String>,

    /// Config file (default: ~/.contentpipe/contentpipe.toml).
    #[arg(long, env = "CONTENTPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Records processed at once (overrides `[runner] concurrency`).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Article URL to seed (`seed-urls`) or sitemap to check (`noindex-check`); repeatable.
    #[arg(long = "url")]
    pub urls: Vec<Url>,

    /// Write a default config file and exit.
    #[arg(long)]
    pub init_config: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Pipeline jobs, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Job {
    /// Create records for new article URLs.
    SeedUrls,
    /// Fetch source pages into `source_content_text`.
    ScrapeContent,
    /// Generate `article_text` from scraped text.
    GenerateArticle,
    /// Render `article_text` to `html`.
    MarkdownToHtml,
    /// Generate a schema.org FAQ block for `key_phrase`.
    GenerateFaq,
    /// Write a company introduction from its website.
    CompanyIntro,
    PublishMedium,
    PublishWordpress,
    PublishInstagram,
    /// Report sitemap pages marked `noindex`. Does not touch the store.
    NoindexCheck,
}

impl Job {
    /// Filter and persist set; `None` for jobs that do not walk records.
    fn definition(self) -> Option<JobDefinition> {
        match self {
            Self::SeedUrls | Self::NoindexCheck => None,
            Self::ScrapeContent => Some(ScrapeContent::DEFINITION),
            Self::GenerateArticle => Some(GenerateArticle::DEFINITION),
            Self::MarkdownToHtml => Some(MarkdownToHtml::DEFINITION),
            Self::GenerateFaq => Some(GenerateFaq::DEFINITION),
            Self::CompanyIntro => Some(CompanyIntro::DEFINITION),
            Self::PublishMedium => Some(PublishMedium::DEFINITION),
            Self::PublishWordpress => Some(PublishWordPress::DEFINITION),
            Self::PublishInstagram => Some(PublishInstagram::DEFINITION),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout carries
/// only the summary.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentpipe=info",
        1 => "contentpipe=debug",
        _ => "contentpipe=trace",
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

/// Run the selected job. Only setup failures are returned as errors; failed
/// records are reported in the summary.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if cli.init_config {
        let path = init_config()?;
        println!("  Config written to {}", path.display());
        return Ok(());
    }
    let job = cli.job.ok_or_else(|| eyre!("no job given"))?;

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let Some(definition) = job.definition() else {
        return match job {
            Job::NoindexCheck => cmd_noindex(&cli, &config).await,
            _ => cmd_seed(&cli, &config).await,
        };
    };

    // Parsed before anything is contacted so a typo never reaches the store.
    let filter = match &cli.formula {
        Some(text) => Formula::parse(text)?,
        None => definition.default_filter()?,
    };

    let client = build_client(Duration::from_secs(config.runner.request_timeout_secs))?;
    let processor = build_processor(job, &config, &client)?;
    let store = open_store(&config.store, client).await?;

    let mut options = RunOptions::from(&config.runner);
    if let Some(n) = cli.concurrency {
        options.concurrency = n.max(1);
    }

    let cancel = CancelSignal::new();
    watch_ctrl_c(cancel.clone());

    info!(
        job = definition.name,
        store = store.name(),
        concurrency = options.concurrency,
        "starting run"
    );

    let progress = CliProgress::new(cli.log_format);
    let summary = Runner::new(store)
        .with_options(options)
        .with_cancel(cancel)
        .run(&filter, processor.as_ref(), definition.persist, &progress)
        .await?;

    print_summary(definition.name, &summary, cli.log_format)?;
    Ok(())
}

/// Construct the processor for `job`, resolving every credential up front.
fn build_processor(job: Job, config: &AppConfig, client: &Client) -> Result<Box<dyn Processor>> {
    let fetcher = || Arc::new(HttpFetcher::new(client.clone()));
    let generator = || contentpipe_generation::from_config(&config.generation, client.clone());

    let processor: Box<dyn Processor> = match job {
        Job::SeedUrls | Job::NoindexCheck => {
            return Err(eyre!("{job:?} does not process records"));
        }
        Job::ScrapeContent => Box::new(ScrapeContent::new(fetcher(), config.scrape.text_mode)),
        Job::GenerateArticle => Box::new(GenerateArticle::new(generator()?, &config.jobs)),
        Job::MarkdownToHtml => Box::new(MarkdownToHtml),
        Job::GenerateFaq => Box::new(GenerateFaq::new(generator()?, &config.jobs)),
        Job::CompanyIntro => Box::new(CompanyIntro::new(
            fetcher(),
            generator()?,
            config.scrape.skip_words.clone(),
        )),
        Job::PublishMedium => Box::new(PublishMedium::new(
            Arc::new(MediumTarget::from_config(client.clone(), &config.medium)?),
            &config.medium.image_dir,
            Arc::new(UniformRandom),
        )),
        Job::PublishWordpress => Box::new(PublishWordPress::new(
            Arc::new(WordPressTarget::from_config(client.clone(), &config.wordpress)?),
            config.wordpress.media_ids.clone(),
            Arc::new(UniformRandom),
        )),
        Job::PublishInstagram => Box::new(PublishInstagram::new(Arc::new(InstagramTarget::new(
            client.clone(),
            &config.instagram,
            PollConfig::from(&config.poll),
        )))),
    };
    Ok(processor)
}

/// Raise `cancel` on the first Ctrl-C. In-flight records still finish.
fn watch_ctrl_c(cancel: CancelSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight records");
            cancel.raise();
        }
    });
}

async fn cmd_seed(cli: &Cli, config: &AppConfig) -> Result<()> {
    if cli.formula.is_some() {
        warn!("--formula is ignored by seed-urls");
    }

    let client = build_client(Duration::from_secs(config.runner.request_timeout_secs))?;
    let urls = if cli.urls.is_empty() {
        let listing = config
            .scrape
            .listing
            .as_ref()
            .ok_or_else(|| eyre!("seed-urls needs --url or a [scrape.listing] section"))?;
        let fetcher = HttpFetcher::new(client.clone());
        discover_urls(&fetcher, listing, chrono::Local::now().naive_local()).await?
    } else {
        cli.urls.clone()
    };

    let store = open_store(&config.store, client).await?;
    info!(store = store.name(), urls = urls.len(), "seeding records");
    let report = seed_urls(store.as_ref(), &urls).await;

    print_seed_report(&report, cli.log_format)?;
    Ok(())
}

async fn cmd_noindex(cli: &Cli, config: &AppConfig) -> Result<()> {
    if cli.formula.is_some() {
        warn!("--formula is ignored by noindex-check");
    }

    let sitemaps = if cli.urls.is_empty() {
        config
            .scrape
            .sitemaps
            .iter()
            .map(|s| Url::parse(s).map_err(|e| eyre!("invalid sitemap url '{s}': {e}")))
            .collect::<Result<Vec<_>>>()?
    } else {
        cli.urls.clone()
    };
    if sitemaps.is_empty() {
        return Err(eyre!("noindex-check needs --url or [scrape] sitemaps"));
    }

    let client = build_client(Duration::from_secs(config.runner.request_timeout_secs))?;
    let fetcher = HttpFetcher::new(client);
    let report = check_sitemaps(&fetcher, &sitemaps).await;

    print_noindex_report(&report, cli.log_format)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_summary(job: &str, summary: &RunSummary, format: LogFormat) -> Result<()> {
    if format == LogFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    println!("  {job} finished in {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Updated:        {}", summary.updated);
    println!("  Skipped:        {}", summary.skipped);
    println!("  Failed:         {}", summary.failed);
    if summary.cancelled {
        println!("  Not dispatched: {} (cancelled)", summary.not_dispatched);
    }
    if !summary.outcomes.is_empty() {
        println!();
        for o in &summary.outcomes {
            println!("  {}", describe(o));
        }
    }
    println!();
    Ok(())
}

fn describe(o: &RecordOutcome) -> String {
    match &o.outcome {
        Outcome::Updated { fields } => format!("{}  updated  {}", o.id, fields.join(", ")),
        Outcome::Skipped { reason } => format!("{}  skipped  {reason}", o.id),
        Outcome::Failed { error, kind } => format!("{}  failed   [{kind:?}] {error}", o.id),
    }
}

fn print_noindex_report(report: &NoindexReport, format: LogFormat) -> Result<()> {
    if format == LogFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("  Checked: {}", report.checked);
    println!("  Noindex: {}", report.noindex.len());
    for hit in &report.noindex {
        println!("    {} ({:?})", hit.url, hit.source);
    }
    println!("  Failed:  {}", report.failed.len());
    for (url, error) in &report.failed {
        println!("    {url}: {error}");
    }
    println!();
    Ok(())
}

fn print_seed_report(report: &SeedReport, format: LogFormat) -> Result<()> {
    if format == LogFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("  Created:  {}", report.created.len());
    println!("  Existing: {}", report.existing);
    println!("  Failed:   {}", report.failed.len());
    for (url, error) in &report.failed {
        println!("    {url}: {error}");
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress bar over the fetched batch. Hidden when logging JSON.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(format: LogFormat) -> Self {
        if format == LogFormat::Json {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl RunProgress for CliProgress {
    fn run_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("processing");
    }

    fn record_finished(&self, outcome: &RecordOutcome, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
        self.bar.set_message(outcome.id.to_string());
    }

    fn run_finished(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
