mod crawl;
mod detail;
mod dispatch;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::barrier::{Barrier, CountingBarrier, Ticket};
use crate::checkpoint::{resolve_start_page, CheckpointError, CheckpointStore, FileCheckpoint};
use crate::config::{ConfigError, ConsistencyMode, CrawlConfig};
use crate::extract::{Extractor, ItemRecord};
use crate::fetch::{DownloadExecutor, FetchError, Fetcher, HttpFetcher};
use crate::layout::{ensure_output_dir, CategoryDirs, DirectoryCreator, FsDirectories};
use crate::ledger::{Ledger, LedgerError};
use crate::pool::WorkerPool;

use crawl::IndexCrawler;
use detail::DetailStage;
use dispatch::DispatchStage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("fetching index page {url}: {source}")]
    IndexFetch { url: String, source: FetchError },
    #[error("cannot create directory for category {category:?}: {source}")]
    CategoryDir {
        category: String,
        source: std::io::Error,
    },
    #[error("{0} stage stopped unexpectedly")]
    StageClosed(&'static str),
    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A detail page waiting to be fetched, tagged with the index page it came from.
#[derive(Debug)]
pub struct DetailPageRef {
    pub url: String,
    pub page: u32,
    ticket: Ticket,
}

/// An extracted record on its way to dispatch, still holding its page ticket.
#[derive(Debug)]
pub(crate) struct Extracted {
    pub record: ItemRecord,
    pub page: u32,
    pub ticket: Ticket,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: ConsistencyMode,
    pub first_page: u32,
    pub last_page: Option<u32>,
    pub pages_crawled: usize,
    pub detail_pages: usize,
    pub records: usize,
    pub skipped_details: usize,
    pub work_items: usize,
    pub downloads_ok: usize,
    pub downloads_failed: usize,
    pub barrier_registered: u64,
    pub barrier_completed: u64,
}

/// Index crawl -> detail fetch/extract -> record dispatch -> worker pool.
pub struct Pipeline {
    config: Arc<CrawlConfig>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    downloader: Arc<dyn DownloadExecutor>,
    checkpoint: Arc<dyn CheckpointStore>,
    directories: Box<dyn DirectoryCreator>,
}

impl Pipeline {
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        downloader: Arc<dyn DownloadExecutor>,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            extractor,
            downloader,
            checkpoint,
            directories: Box::new(FsDirectories),
        }
    }

    /// Plain HTTP for pages and downloads, checkpoint at `config.checkpoint_path`.
    pub fn over_http(config: CrawlConfig, extractor: Arc<dyn Extractor>) -> Result<Self, FetchError> {
        let http = Arc::new(HttpFetcher::new()?);
        let checkpoint = Arc::new(FileCheckpoint::new(config.checkpoint_path.clone()));
        Ok(Self::new(config, http.clone(), extractor, http, checkpoint))
    }

    pub fn with_directory_creator(mut self, directories: Box<dyn DirectoryCreator>) -> Self {
        self.directories = directories;
        self
    }

    pub async fn run(self) -> Result<RunSummary, PipelineError> {
        let Pipeline {
            config,
            fetcher,
            extractor,
            downloader,
            checkpoint,
            directories,
        } = self;

        config.validate()?;
        ensure_output_dir(&config.output_dir).map_err(|source| PipelineError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;
        checkpoint.prepare().await?;
        let first_page = resolve_start_page(&config, checkpoint.as_ref()).await?;
        let ledger = Ledger::open(&config.ledger_path).await?;

        let run_barrier = Arc::new(CountingBarrier::new());
        let page_barrier = config.mode.page_barrier();
        let pool = WorkerPool::start(config.workers, config.pool_intake_capacity, downloader);

        let (detail_tx, detail_rx) = mpsc::channel(config.detail_queue_capacity);
        let (record_tx, record_rx) = mpsc::channel(config.record_queue_capacity);
        let (halt_tx, halt_rx) = watch::channel(false);

        let detail = tokio::spawn(
            DetailStage {
                config: Arc::clone(&config),
                fetcher: Arc::clone(&fetcher),
                extractor: Arc::clone(&extractor),
            }
            .run(detail_rx, record_tx),
        );
        let dispatch = tokio::spawn(
            DispatchStage {
                dirs: CategoryDirs::new(
                    config.output_dir.clone(),
                    &config.default_category,
                    directories,
                ),
                ledger,
                pool: pool.sender(),
                page_barrier: Arc::clone(&page_barrier),
                run_barrier: run_barrier.clone() as Arc<dyn Barrier>,
                halt: halt_tx,
            }
            .run(record_rx),
        );

        log::info!(
            "Starting at page {first_page} with {} worker(s) in {:?} mode",
            config.workers,
            config.mode
        );
        let crawled = IndexCrawler {
            config: Arc::clone(&config),
            fetcher,
            extractor,
            checkpoint,
            page_barrier,
            halt: halt_rx,
        }
        .run(first_page, detail_tx)
        .await;

        let crawl = match crawled {
            Ok(report) => report,
            Err(PipelineError::StageClosed(stage)) => {
                // A downstream stage died first; report its error instead.
                detail.abort();
                return match dispatch.await? {
                    Err(e) => Err(e),
                    Ok(_) => Err(PipelineError::StageClosed(stage)),
                };
            }
            Err(e) => {
                detail.abort();
                dispatch.abort();
                return Err(e);
            }
        };

        let details = detail.await?;
        let dispatched = dispatch.await??;

        log::info!("Waiting for all downloads to finish.");
        run_barrier.wait().await;
        let downloads = pool.shutdown().await;

        let summary = RunSummary {
            mode: config.mode,
            first_page,
            last_page: crawl.last_page,
            pages_crawled: crawl.pages_crawled,
            detail_pages: crawl.detail_pages,
            records: details.records,
            skipped_details: details.skipped,
            work_items: dispatched.work_items,
            downloads_ok: downloads.succeeded,
            downloads_failed: downloads.failed,
            barrier_registered: run_barrier.registered(),
            barrier_completed: run_barrier.completed(),
        };
        log::info!(
            "All done: {} page(s), {} record(s), {} download(s) ok, {} failed",
            summary.pages_crawled,
            summary.records,
            summary.downloads_ok,
            summary.downloads_failed
        );
        Ok(summary)
    }
}
