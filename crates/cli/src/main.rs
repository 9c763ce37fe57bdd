use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bookcrawl_core::{
    ConsistencyMode, CrawlConfig, ExtractError, Extractor, FetchError, PatternExtractor, Pipeline,
    PipelineError, SelectorExtractor,
};
use clap::{Parser, ValueEnum};
use url::Url;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("building runtime: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExtractorKind {
    /// Regular expressions over the raw markup
    Pattern,
    /// CSS selectors over the parsed document
    Selector,
}

#[derive(Parser)]
#[command(version, about = "Crawl a paginated index and download every linked file")]
struct Cli {
    /// Number of concurrent download workers
    #[arg(long = "workers", alias = "workerCount", default_value_t = 10)]
    workers: usize,

    /// Run on a multi-threaded runtime using every available core
    #[arg(long = "all-cores", alias = "allCores")]
    all_cores: bool,

    /// Index page to start from
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Continue after the last page recorded in the checkpoint file
    #[arg(long = "continue")]
    resume: bool,

    /// Overlap pages with downloads and skip checkpoint writes
    #[arg(long)]
    fast: bool,

    /// Index URL prefix; pages are fetched from <BASE_URL>/<page>
    #[arg(long, value_name = "URL", default_value = "http://www.allitebooks.com/page")]
    base_url: String,

    /// Directory downloads are stored under, one subdirectory per category
    #[arg(long, value_name = "DIR", default_value = "allitebooks")]
    output_dir: PathBuf,

    /// Checkpoint file holding the last fully processed page
    #[arg(long, value_name = "FILE", default_value = "lastpagenumber.txt")]
    checkpoint_file: PathBuf,

    /// Ledger of every discovered link
    #[arg(long, value_name = "FILE", default_value = "links.csv")]
    ledger_file: PathBuf,

    /// Markup matching strategy
    #[arg(long, value_enum, default_value_t = ExtractorKind::Pattern)]
    extractor: ExtractorKind,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Result<CrawlConfig, CliError> {
        Url::parse(&self.base_url)?;
        Ok(CrawlConfig {
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            checkpoint_path: self.checkpoint_file.clone(),
            ledger_path: self.ledger_file.clone(),
            workers: self.workers,
            start_page: self.page,
            resume: self.resume,
            mode: if self.fast {
                ConsistencyMode::Fast
            } else {
                ConsistencyMode::Slow
            },
            ..CrawlConfig::default()
        })
    }

    fn extractor(&self) -> Result<Arc<dyn Extractor>, CliError> {
        Ok(match self.extractor {
            ExtractorKind::Pattern => Arc::new(PatternExtractor::default()),
            ExtractorKind::Selector => Arc::new(SelectorExtractor::site_default()?),
        })
    }

    fn runtime(&self) -> std::io::Result<tokio::runtime::Runtime> {
        if self.all_cores {
            let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
            log::info!("Using all {cores} cores");
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(cores)
                .enable_all()
                .build()
        } else {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config()?;
    let pipeline = Pipeline::over_http(config, cli.extractor()?)?;
    let summary = cli.runtime()?.block_on(pipeline.run())?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
